// SPDX-License-Identifier: GPL-3.0-only

//! Published names: volume device names, partition symlinks and PnP ids

use std::sync::atomic::{AtomicU32, Ordering};

use partmgr_contracts::{PartMgrError, Result};
use partmgr_types::DiskIdentity;

/// Device id reported for every partition device
pub const PARTITION_DEVICE_ID: &str = "STORAGE\\Partition";
/// Hardware and compatible id reported for every partition device
pub const VOLUME_HARDWARE_ID: &str = "STORAGE\\Volume";

/// Longest name a counted host string can hold, in bytes
const MAX_NAME_BYTES: usize = u16::MAX as usize - 1;

/// Source of `\Device\HarddiskVolume<N>` numbers
///
/// Shared by every disk of a driver instance. Numbers are handed out once, in increasing
/// order, and never recycled, even when the device they were drawn for fails to appear.
#[derive(Debug)]
pub struct VolumeSequence {
    next: AtomicU32,
}

impl VolumeSequence {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Number the next call to [`Self::next_number`] would return
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    /// Draw the next volume number, `None` once the sequence is exhausted
    pub fn next_number(&self) -> Option<u32> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .ok()
    }

    pub fn next_device_name(&self) -> Result<String> {
        self.next_number()
            .map(harddisk_volume_name)
            .ok_or(PartMgrError::InsufficientResources)
    }
}

impl Default for VolumeSequence {
    fn default() -> Self {
        Self::new()
    }
}

pub fn harddisk_volume_name(number: u32) -> String {
    format!("\\Device\\HarddiskVolume{number}")
}

pub fn partition_symlink_name(disk_number: u32, partition_number: u32) -> String {
    format!("\\Device\\Harddisk{disk_number}\\Partition{partition_number}")
}

/// Reject names a counted host string cannot carry
pub fn validate_name(name: &str) -> Result<()> {
    let bytes = name.encode_utf16().count() * 2;
    if name.is_empty() || bytes > MAX_NAME_BYTES {
        return Err(PartMgrError::NameTooLong(name.chars().take(64).collect()));
    }
    Ok(())
}

/// Instance id of a partition, unique across every disk in the system
pub fn instance_id(identity: &DiskIdentity, starting_offset: u64, length: u64) -> Option<String> {
    let prefix = identity.instance_id_prefix()?;
    Some(format!("{prefix}_O{starting_offset:x}_L{length:x}"))
}

/// Multi-string form of a single id: the entry followed by its NUL separator
pub fn multi_string(id: &str) -> String {
    format!("{id}\0")
}
