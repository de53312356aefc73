// SPDX-License-Identifier: GPL-3.0-only

//! Partition style and disk-wide identity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Partition table style of a disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStyle {
    /// Master Boot Record
    Mbr,

    /// GUID Partition Table
    Gpt,

    /// No recognized partition table
    Raw,
}

impl PartitionStyle {
    /// Value of the style discriminant on the wire
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Mbr => 0,
            Self::Gpt => 1,
            Self::Raw => 2,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Mbr),
            1 => Some(Self::Gpt),
            2 => Some(Self::Raw),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mbr => "mbr",
            Self::Gpt => "gpt",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for PartitionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disk-wide identity, keyed by partition style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum DiskIdentity {
    Mbr { signature: u32 },
    Gpt { disk_id: Uuid },
    Raw,
}

impl DiskIdentity {
    pub fn style(&self) -> PartitionStyle {
        match self {
            Self::Mbr { .. } => PartitionStyle::Mbr,
            Self::Gpt { .. } => PartitionStyle::Gpt,
            Self::Raw => PartitionStyle::Raw,
        }
    }

    /// Prefix of a partition instance id, unique per disk.
    ///
    /// MBR disks use the 32-bit signature, GPT disks the disk GUID in its usual grouping.
    /// Raw disks have nothing to derive one from.
    pub fn instance_id_prefix(&self) -> Option<String> {
        match self {
            Self::Mbr { signature } => Some(format!("S{signature:08x}")),
            Self::Gpt { disk_id } => {
                let (d1, d2, d3, d4) = disk_id.as_fields();
                let hex = |bytes: &[u8]| -> String {
                    bytes.iter().map(|b| format!("{b:02x}")).collect()
                };
                Some(format!(
                    "S{d1:08x}-{d2:04x}-{d3:04x}-{}-{}S",
                    hex(&d4[..2]),
                    hex(&d4[2..])
                ))
            }
            Self::Raw => None,
        }
    }
}
