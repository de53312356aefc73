// SPDX-License-Identifier: GPL-3.0-only

//! Drive layout snapshot

use serde::{Deserialize, Serialize};

use crate::{DiskIdentity, PartitionEntry, PartitionStyle};

/// Extended drive layout as read from the disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveLayout {
    pub identity: DiskIdentity,

    /// Entries in on-disk order, including unused slots
    #[serde(default)]
    pub partitions: Vec<PartitionEntry>,
}

impl DriveLayout {
    pub fn style(&self) -> PartitionStyle {
        self.identity.style()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Entry addressed by its 1-based on-disk number
    pub fn entry_by_on_disk_number(&self, on_disk_number: u32) -> Option<&PartitionEntry> {
        let index = usize::try_from(on_disk_number).ok()?.checked_sub(1)?;
        self.partitions.get(index)
    }
}
