// SPDX-License-Identifier: GPL-3.0-only

//! Device-control codes and the fixed-size buffers exchanged through them
//!
//! Layouts match the host platform's published structures on 64-bit targets so that
//! existing callers (mount managers, disk utilities) can talk to a partition device
//! unchanged. All integers are little-endian; GUIDs use the mixed-endian GUID layout.

use thiserror::Error;
use uuid::Uuid;

use crate::partition::{GPT_NAME_CHARS, GptName, GptPartitionInfo, MbrPartitionInfo};
use crate::{PartitionDetails, PartitionEntry, PartitionStyle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("buffer too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("unknown partition style {0}")]
    UnknownStyle(u32),

    #[error("partition style {0} carries no partition fields")]
    NoDetails(PartitionStyle),
}

const FILE_DEVICE_DISK: u32 = 0x0000_0007;
const MOUNTDEVCONTROLTYPE: u32 = 0x0000_004D;
const IOCTL_VOLUME_BASE: u32 = 0x0000_0056;

const METHOD_BUFFERED: u32 = 0;
const FILE_ANY_ACCESS: u32 = 0;
const FILE_READ_ACCESS: u32 = 1;
const FILE_WRITE_ACCESS: u32 = 2;

/// A device-control code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoControlCode(pub u32);

impl IoControlCode {
    pub const DISK_GET_PARTITION_INFO: Self =
        Self::new(FILE_DEVICE_DISK, 0x0001, METHOD_BUFFERED, FILE_READ_ACCESS);
    pub const DISK_SET_PARTITION_INFO: Self = Self::new(
        FILE_DEVICE_DISK,
        0x0002,
        METHOD_BUFFERED,
        FILE_READ_ACCESS | FILE_WRITE_ACCESS,
    );
    pub const DISK_VERIFY: Self = Self::new(FILE_DEVICE_DISK, 0x0005, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const DISK_GET_PARTITION_INFO_EX: Self =
        Self::new(FILE_DEVICE_DISK, 0x0012, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const DISK_SET_PARTITION_INFO_EX: Self = Self::new(
        FILE_DEVICE_DISK,
        0x0013,
        METHOD_BUFFERED,
        FILE_READ_ACCESS | FILE_WRITE_ACCESS,
    );
    pub const DISK_GET_LENGTH_INFO: Self =
        Self::new(FILE_DEVICE_DISK, 0x0017, METHOD_BUFFERED, FILE_READ_ACCESS);
    pub const DISK_GET_DRIVE_LAYOUT_EX: Self =
        Self::new(FILE_DEVICE_DISK, 0x0014, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const DISK_UPDATE_PROPERTIES: Self =
        Self::new(FILE_DEVICE_DISK, 0x0050, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const MOUNTDEV_QUERY_UNIQUE_ID: Self =
        Self::new(MOUNTDEVCONTROLTYPE, 0, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const MOUNTDEV_QUERY_DEVICE_NAME: Self =
        Self::new(MOUNTDEVCONTROLTYPE, 2, METHOD_BUFFERED, FILE_ANY_ACCESS);
    pub const VOLUME_GET_GPT_ATTRIBUTES: Self =
        Self::new(IOCTL_VOLUME_BASE, 14, METHOD_BUFFERED, FILE_ANY_ACCESS);

    pub const fn new(device_type: u32, function: u32, method: u32, access: u32) -> Self {
        Self((device_type << 16) | (access << 14) | (function << 2) | method)
    }

    pub const fn device_type(self) -> u32 {
        self.0 >> 16
    }

    pub const fn function(self) -> u32 {
        (self.0 >> 2) & 0x0FFF
    }
}

impl std::fmt::Display for IoControlCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Size of the legacy partition information buffer
pub const PARTITION_INFORMATION_SIZE: usize = 32;
/// Size of the extended partition information buffer
pub const PARTITION_INFORMATION_EX_SIZE: usize = 144;
/// Size of the legacy set-partition-information buffer
pub const SET_PARTITION_INFORMATION_SIZE: usize = 1;
/// Size of the extended set-partition-information buffer
pub const SET_PARTITION_INFORMATION_EX_SIZE: usize = 120;
/// Size of the verify request buffer
pub const VERIFY_INFORMATION_SIZE: usize = 16;
/// Size of the length-info buffer
pub const GET_LENGTH_INFORMATION_SIZE: usize = 8;
/// Size of the GPT attributes buffer
pub const VOLUME_GPT_ATTRIBUTES_SIZE: usize = 8;
/// Size of a mount-manager name or unique-id header: a 16-bit length plus one padded payload unit
pub const MOUNTDEV_HEADER_SIZE: usize = 4;
/// Offset of the payload behind the 16-bit length of a mount-manager buffer
pub const MOUNTDEV_PAYLOAD_OFFSET: usize = 2;

const EX_UNION_OFFSET: usize = 32;
const SET_EX_UNION_OFFSET: usize = 8;
const GPT_FIELDS_SIZE: usize = 16 + 16 + 8 + GPT_NAME_CHARS * 2;

fn check_len(bytes: &[u8], needed: usize) -> Result<(), WireError> {
    if bytes.len() < needed {
        return Err(WireError::Truncated {
            needed,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn read_guid(bytes: &[u8], at: usize) -> Uuid {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&bytes[at..at + 16]);
    Uuid::from_bytes_le(raw)
}

fn put(out: &mut [u8], at: usize, bytes: &[u8]) {
    out[at..at + bytes.len()].copy_from_slice(bytes);
}

fn encode_gpt_fields(gpt: &GptPartitionInfo, out: &mut [u8], at: usize) {
    put(out, at, &gpt.partition_type.to_bytes_le());
    put(out, at + 16, &gpt.partition_id.to_bytes_le());
    put(out, at + 32, &gpt.attributes.to_le_bytes());
    for (i, unit) in gpt.name.units().iter().enumerate() {
        put(out, at + 40 + i * 2, &unit.to_le_bytes());
    }
}

fn decode_gpt_fields(bytes: &[u8], at: usize) -> GptPartitionInfo {
    let mut units = [0u16; GPT_NAME_CHARS];
    for (i, unit) in units.iter_mut().enumerate() {
        *unit = read_u16(bytes, at + 40 + i * 2);
    }
    GptPartitionInfo {
        partition_type: read_guid(bytes, at),
        partition_id: read_guid(bytes, at + 16),
        attributes: read_u64(bytes, at + 32),
        name: GptName::from_units(units),
    }
}

/// Legacy partition information (MBR only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionInformation {
    pub starting_offset: u64,
    pub partition_length: u64,
    pub hidden_sectors: u32,
    pub partition_number: u32,
    pub partition_type: u8,
    pub boot_indicator: bool,
    pub recognized_partition: bool,
    pub rewrite_partition: bool,
}

impl PartitionInformation {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, WireError> {
        check_len(out, PARTITION_INFORMATION_SIZE)?;
        out[..PARTITION_INFORMATION_SIZE].fill(0);
        put(out, 0, &self.starting_offset.to_le_bytes());
        put(out, 8, &self.partition_length.to_le_bytes());
        put(out, 16, &self.hidden_sectors.to_le_bytes());
        put(out, 20, &self.partition_number.to_le_bytes());
        out[24] = self.partition_type;
        out[25] = u8::from(self.boot_indicator);
        out[26] = u8::from(self.recognized_partition);
        out[27] = u8::from(self.rewrite_partition);
        Ok(PARTITION_INFORMATION_SIZE)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        check_len(bytes, PARTITION_INFORMATION_SIZE)?;
        Ok(Self {
            starting_offset: read_u64(bytes, 0),
            partition_length: read_u64(bytes, 8),
            hidden_sectors: read_u32(bytes, 16),
            partition_number: read_u32(bytes, 20),
            partition_type: bytes[24],
            boot_indicator: bytes[25] != 0,
            recognized_partition: bytes[26] != 0,
            rewrite_partition: bytes[27] != 0,
        })
    }
}

/// Write an extended partition information buffer for `entry`
pub fn encode_partition_information_ex(
    entry: &PartitionEntry,
    out: &mut [u8],
) -> Result<usize, WireError> {
    check_len(out, PARTITION_INFORMATION_EX_SIZE)?;
    out[..PARTITION_INFORMATION_EX_SIZE].fill(0);
    put(out, 0, &entry.style().as_raw().to_le_bytes());
    put(out, 8, &entry.starting_offset.to_le_bytes());
    put(out, 16, &entry.partition_length.to_le_bytes());
    put(out, 24, &entry.partition_number.to_le_bytes());
    out[28] = u8::from(entry.rewrite_partition);

    match &entry.details {
        PartitionDetails::Mbr(mbr) => {
            out[EX_UNION_OFFSET] = mbr.partition_type;
            out[EX_UNION_OFFSET + 1] = u8::from(mbr.boot_indicator);
            out[EX_UNION_OFFSET + 2] = u8::from(mbr.recognized_partition);
            put(out, EX_UNION_OFFSET + 4, &mbr.hidden_sectors.to_le_bytes());
        }
        PartitionDetails::Gpt(gpt) => encode_gpt_fields(gpt, out, EX_UNION_OFFSET),
    }

    Ok(PARTITION_INFORMATION_EX_SIZE)
}

/// Read an extended partition information buffer
pub fn decode_partition_information_ex(bytes: &[u8]) -> Result<PartitionEntry, WireError> {
    check_len(bytes, PARTITION_INFORMATION_EX_SIZE)?;
    let raw_style = read_u32(bytes, 0);
    let style = PartitionStyle::from_raw(raw_style).ok_or(WireError::UnknownStyle(raw_style))?;
    let details = match style {
        PartitionStyle::Mbr => PartitionDetails::Mbr(MbrPartitionInfo {
            partition_type: bytes[EX_UNION_OFFSET],
            boot_indicator: bytes[EX_UNION_OFFSET + 1] != 0,
            recognized_partition: bytes[EX_UNION_OFFSET + 2] != 0,
            hidden_sectors: read_u32(bytes, EX_UNION_OFFSET + 4),
        }),
        PartitionStyle::Gpt => PartitionDetails::Gpt(decode_gpt_fields(bytes, EX_UNION_OFFSET)),
        PartitionStyle::Raw => return Err(WireError::NoDetails(style)),
    };

    Ok(PartitionEntry {
        starting_offset: read_u64(bytes, 8),
        partition_length: read_u64(bytes, 16),
        partition_number: read_u32(bytes, 24),
        rewrite_partition: bytes[28] != 0,
        details,
    })
}

/// Legacy set request: a new MBR type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPartitionInformation {
    pub partition_type: u8,
}

impl SetPartitionInformation {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, WireError> {
        check_len(out, SET_PARTITION_INFORMATION_SIZE)?;
        out[0] = self.partition_type;
        Ok(SET_PARTITION_INFORMATION_SIZE)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        check_len(bytes, SET_PARTITION_INFORMATION_SIZE)?;
        Ok(Self {
            partition_type: bytes[0],
        })
    }
}

/// Extended set request, discriminated by partition style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPartitionInformationEx {
    Mbr { partition_type: u8 },
    Gpt(GptPartitionInfo),
}

impl SetPartitionInformationEx {
    pub fn style(&self) -> PartitionStyle {
        match self {
            Self::Mbr { .. } => PartitionStyle::Mbr,
            Self::Gpt(_) => PartitionStyle::Gpt,
        }
    }

    pub fn encode(&self, out: &mut [u8]) -> Result<usize, WireError> {
        check_len(out, SET_PARTITION_INFORMATION_EX_SIZE)?;
        out[..SET_PARTITION_INFORMATION_EX_SIZE].fill(0);
        put(out, 0, &self.style().as_raw().to_le_bytes());
        match self {
            Self::Mbr { partition_type } => out[SET_EX_UNION_OFFSET] = *partition_type,
            Self::Gpt(gpt) => encode_gpt_fields(gpt, out, SET_EX_UNION_OFFSET),
        }
        Ok(SET_PARTITION_INFORMATION_EX_SIZE)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        check_len(bytes, SET_PARTITION_INFORMATION_EX_SIZE)?;
        let raw_style = read_u32(bytes, 0);
        match PartitionStyle::from_raw(raw_style) {
            Some(PartitionStyle::Mbr) => Ok(Self::Mbr {
                partition_type: bytes[SET_EX_UNION_OFFSET],
            }),
            Some(PartitionStyle::Gpt) => Ok(Self::Gpt(decode_gpt_fields(bytes, SET_EX_UNION_OFFSET))),
            Some(style) => Err(WireError::NoDetails(style)),
            None => Err(WireError::UnknownStyle(raw_style)),
        }
    }
}

/// Verify request: a byte range to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyInformation {
    pub starting_offset: u64,
    pub length: u32,
}

impl VerifyInformation {
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, WireError> {
        check_len(out, VERIFY_INFORMATION_SIZE)?;
        out[..VERIFY_INFORMATION_SIZE].fill(0);
        put(out, 0, &self.starting_offset.to_le_bytes());
        put(out, 8, &self.length.to_le_bytes());
        Ok(VERIFY_INFORMATION_SIZE)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        check_len(bytes, VERIFY_INFORMATION_SIZE)?;
        Ok(Self {
            starting_offset: read_u64(bytes, 0),
            length: read_u32(bytes, 8),
        })
    }
}

/// Write a single 64-bit value (length info, GPT attributes)
pub fn encode_u64(value: u64, out: &mut [u8]) -> Result<usize, WireError> {
    check_len(out, 8)?;
    put(out, 0, &value.to_le_bytes());
    Ok(8)
}

pub fn decode_u64(bytes: &[u8]) -> Result<u64, WireError> {
    check_len(bytes, 8)?;
    Ok(read_u64(bytes, 0))
}

/// Write the 16-bit payload length of a mount-manager name or unique-id buffer
pub fn encode_mountdev_length(len: u16, out: &mut [u8]) -> Result<(), WireError> {
    check_len(out, MOUNTDEV_PAYLOAD_OFFSET)?;
    put(out, 0, &len.to_le_bytes());
    Ok(())
}

/// Split a mount-manager buffer into its declared length and the payload that follows
pub fn decode_mountdev(bytes: &[u8]) -> Result<(u16, &[u8]), WireError> {
    check_len(bytes, MOUNTDEV_PAYLOAD_OFFSET)?;
    let len = read_u16(bytes, 0);
    let end = MOUNTDEV_PAYLOAD_OFFSET + usize::from(len);
    check_len(bytes, end)?;
    Ok((len, &bytes[MOUNTDEV_PAYLOAD_OFFSET..end]))
}

/// UTF-16LE bytes of a name, the on-wire form of every published name
pub fn utf16le_bytes(name: &str) -> Vec<u8> {
    name.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
