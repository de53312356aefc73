// SPDX-License-Identifier: GPL-3.0-only

//! Layout builders for tests that do not need a TOML fixture

use partmgr_types::{
    DiskIdentity, DriveLayout, GptName, GptPartitionInfo, MbrPartitionInfo, PartitionDetails,
    PartitionEntry, is_recognized_mbr_type,
};
use uuid::Uuid;

pub const MIB: u64 = 1024 * 1024;

/// Microsoft basic data partition
pub const BASIC_DATA_GUID: Uuid = Uuid::from_u128(0xebd0a0a2_b9e5_4433_87c0_68b6b72699c7);
/// EFI system partition
pub const EFI_SYSTEM_GUID: Uuid = Uuid::from_u128(0xc12a7328_f81f_11d2_ba4b_00a0c93ec93b);

pub fn mbr_entry(starting_offset: u64, partition_length: u64, partition_type: u8) -> PartitionEntry {
    PartitionEntry {
        starting_offset,
        partition_length,
        partition_number: 0,
        rewrite_partition: false,
        details: PartitionDetails::Mbr(MbrPartitionInfo {
            partition_type,
            boot_indicator: false,
            recognized_partition: is_recognized_mbr_type(partition_type),
            hidden_sectors: u32::try_from(starting_offset / 512).unwrap_or(u32::MAX),
        }),
    }
}

pub fn gpt_entry(
    starting_offset: u64,
    partition_length: u64,
    partition_type: Uuid,
    partition_id: Uuid,
    name: &str,
) -> PartitionEntry {
    PartitionEntry {
        starting_offset,
        partition_length,
        partition_number: 0,
        rewrite_partition: false,
        details: PartitionDetails::Gpt(GptPartitionInfo {
            partition_type,
            partition_id,
            attributes: 0,
            name: GptName::try_from(name).unwrap_or_default(),
        }),
    }
}

pub fn mbr_layout(signature: u32, partitions: Vec<PartitionEntry>) -> DriveLayout {
    DriveLayout {
        identity: DiskIdentity::Mbr { signature },
        partitions,
    }
}

pub fn gpt_layout(disk_id: Uuid, partitions: Vec<PartitionEntry>) -> DriveLayout {
    DriveLayout {
        identity: DiskIdentity::Gpt { disk_id },
        partitions,
    }
}

/// Two NTFS partitions, an extended container and an unused slot
pub fn two_partition_mbr() -> DriveLayout {
    mbr_layout(
        0x1234_abcd,
        vec![
            mbr_entry(MIB, 100 * MIB, 0x07),
            mbr_entry(101 * MIB, 500 * MIB, 0x0f),
            mbr_entry(102 * MIB, 200 * MIB, 0x07),
            mbr_entry(0, 0, 0x00),
        ],
    )
}

/// An EFI system partition followed by a basic data partition
pub fn two_partition_gpt() -> DriveLayout {
    gpt_layout(
        Uuid::from_u128(0xa1b2c3d4_e5f6_0718_293a_4b5c6d7e8f90),
        vec![
            gpt_entry(
                MIB,
                100 * MIB,
                EFI_SYSTEM_GUID,
                Uuid::from_u128(0x1111_1111_2222_3333_4444_555555555555),
                "EFI system partition",
            ),
            gpt_entry(
                101 * MIB,
                900 * MIB,
                BASIC_DATA_GUID,
                Uuid::from_u128(0x6666_6666_7777_8888_9999_aaaaaaaaaaaa),
                "Basic data partition",
            ),
        ],
    )
}
