// SPDX-License-Identifier: GPL-3.0-only

//! Partition entries - one row of a drive layout
//!
//! The style-specific fields are carried as a tagged variant so a GPT entry can never be
//! read through its MBR arm and vice versa.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PartitionStyle;

/// Capacity of a GPT partition name in UTF-16 code units
pub const GPT_NAME_CHARS: usize = 36;

/// Fixed-capacity UTF-16 GPT partition name, zero padded
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GptName([u16; GPT_NAME_CHARS]);

impl GptName {
    pub const EMPTY: Self = Self([0; GPT_NAME_CHARS]);

    pub fn from_units(units: [u16; GPT_NAME_CHARS]) -> Self {
        Self(units)
    }

    pub fn units(&self) -> &[u16; GPT_NAME_CHARS] {
        &self.0
    }

    /// Code units up to the first NUL
    pub fn trimmed(&self) -> &[u16] {
        let end = self.0.iter().position(|&u| u == 0).unwrap_or(GPT_NAME_CHARS);
        &self.0[..end]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.trimmed())
    }
}

impl Default for GptName {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for GptName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl TryFrom<&str> for GptName {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut units = [0u16; GPT_NAME_CHARS];
        let mut len = 0;
        for unit in value.encode_utf16() {
            if len == GPT_NAME_CHARS {
                return Err(format!(
                    "GPT partition name longer than {GPT_NAME_CHARS} UTF-16 units: {value:?}"
                ));
            }
            units[len] = unit;
            len += 1;
        }
        Ok(Self(units))
    }
}

impl TryFrom<String> for GptName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<GptName> for String {
    fn from(name: GptName) -> Self {
        name.to_string_lossy()
    }
}

/// MBR-specific partition fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MbrPartitionInfo {
    /// One-byte partition type code (e.g. 0x07 for IFS/NTFS)
    pub partition_type: u8,

    /// Active/bootable flag
    pub boot_indicator: bool,

    /// Whether the host file-system stack mounts this type
    pub recognized_partition: bool,

    /// Sectors between the partition table and the partition's first sector
    pub hidden_sectors: u32,
}

/// GPT-specific partition fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GptPartitionInfo {
    pub partition_type: Uuid,
    pub partition_id: Uuid,

    /// Attribute bitmask (bit 0 platform required, bits 60-63 basic-data attributes)
    pub attributes: u64,

    #[serde(default)]
    pub name: GptName,
}

/// Style-specific fields of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum PartitionDetails {
    Mbr(MbrPartitionInfo),
    Gpt(GptPartitionInfo),
}

impl PartitionDetails {
    pub fn style(&self) -> PartitionStyle {
        match self {
            Self::Mbr(_) => PartitionStyle::Mbr,
            Self::Gpt(_) => PartitionStyle::Gpt,
        }
    }

    pub fn as_mbr(&self) -> Option<&MbrPartitionInfo> {
        match self {
            Self::Mbr(mbr) => Some(mbr),
            Self::Gpt(_) => None,
        }
    }

    pub fn as_gpt(&self) -> Option<&GptPartitionInfo> {
        match self {
            Self::Gpt(gpt) => Some(gpt),
            Self::Mbr(_) => None,
        }
    }
}

/// A drive-layout entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// Offset from start of disk in bytes
    pub starting_offset: u64,

    /// Size in bytes
    pub partition_length: u64,

    /// Position reported by the last enumeration (1-based, 0 if not reported)
    pub partition_number: u32,

    #[serde(default)]
    pub rewrite_partition: bool,

    pub details: PartitionDetails,
}

impl PartitionEntry {
    pub fn style(&self) -> PartitionStyle {
        self.details.style()
    }

    /// End of the partition in bytes (exclusive)
    pub fn end_offset(&self) -> u64 {
        self.starting_offset.saturating_add(self.partition_length)
    }
}
