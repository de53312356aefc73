// SPDX-License-Identifier: GPL-3.0-only

//! Partition type catalog
//!
//! Names and classifies MBR type codes and GPT type GUIDs. Enumeration uses it to skip
//! container entries and to decide whether an MBR partition is recognized; the set-info
//! paths use it to keep `recognized_partition` in step with a new type code.

mod catalog;
mod query;

use enumflags2::{BitFlags, bitflags};
use serde::Deserialize;
use uuid::Uuid;

pub use catalog::{GPT_TYPES, MBR_TYPES};
pub use query::{find_gpt_type, find_mbr_type, is_container_mbr_type, is_recognized_mbr_type};

/// Flags describing a partition type.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PartitionTypeFlag {
    /// The host file-system stack mounts partitions of this type.
    Recognized = 1 << 0,
    /// Extended partition holding logical drives; never exposed as a volume itself.
    Container = 1 << 1,
    /// Type code marks the partition as hidden from volume listings.
    Hidden = 1 << 2,
    /// Part of the system / boot loader (EFI system, protective MBR, recovery).
    System = 1 << 3,
}

/// Catalog key: a type byte or a type GUID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionTypeId {
    Mbr(u8),
    Gpt(Uuid),
}

/// Detailed information about a partition type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTypeInfo {
    pub id: PartitionTypeId,
    /// Human-readable type name
    pub name: String,
    pub flags: BitFlags<PartitionTypeFlag>,
}

impl PartitionTypeInfo {
    pub fn has(&self, flag: PartitionTypeFlag) -> bool {
        self.flags.contains(flag)
    }
}
