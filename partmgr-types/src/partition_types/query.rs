// SPDX-License-Identifier: GPL-3.0-only

use uuid::Uuid;

use super::{GPT_TYPES, MBR_TYPES, PartitionTypeFlag, PartitionTypeId, PartitionTypeInfo};

pub fn find_mbr_type(code: u8) -> Option<&'static PartitionTypeInfo> {
    MBR_TYPES.iter().find(|p| p.id == PartitionTypeId::Mbr(code))
}

pub fn find_gpt_type(type_guid: &Uuid) -> Option<&'static PartitionTypeInfo> {
    GPT_TYPES
        .iter()
        .find(|p| p.id == PartitionTypeId::Gpt(*type_guid))
}

/// Whether an MBR partition of this type is mounted by the host file-system stack
pub fn is_recognized_mbr_type(code: u8) -> bool {
    find_mbr_type(code).is_some_and(|p| p.has(PartitionTypeFlag::Recognized))
}

/// Whether an MBR type code denotes an extended (container) partition
pub fn is_container_mbr_type(code: u8) -> bool {
    find_mbr_type(code).is_some_and(|p| p.has(PartitionTypeFlag::Container))
}
