// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for the partition manager
//!
//! This crate defines the single source of truth for everything that describes a
//! disk's partitioning, independent of how it is read or published:
//!
//! - **style**: partition style and the disk-wide identity (MBR signature / GPT disk GUID)
//! - **partition**: one drive-layout entry with its style-specific fields as a tagged variant
//! - **layout**: a drive-layout snapshot as returned by the lower disk
//! - **wire**: device-control codes and the bit-compatible buffers exchanged with callers
//! - **partition_types**: the MBR/GPT partition type catalog
//!
//! Nothing here locks or performs I/O; `partmgr` owns both.

pub mod layout;
pub mod partition;
pub mod partition_types;
pub mod style;
pub mod wire;

pub use layout::DriveLayout;
pub use partition::{
    GPT_NAME_CHARS, GptName, GptPartitionInfo, MbrPartitionInfo, PartitionDetails, PartitionEntry,
};
pub use partition_types::{
    GPT_TYPES, MBR_TYPES, PartitionTypeFlag, PartitionTypeId, PartitionTypeInfo, find_gpt_type,
    find_mbr_type, is_container_mbr_type, is_recognized_mbr_type,
};
pub use style::{DiskIdentity, PartitionStyle};
pub use wire::{IoControlCode, WireError};
