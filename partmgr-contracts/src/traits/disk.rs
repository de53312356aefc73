// SPDX-License-Identifier: GPL-3.0-only

use partmgr_types::DriveLayout;
use partmgr_types::wire::SetPartitionInformationEx;

use crate::{Irp, NtStatus};

/// The whole-disk device below the partition manager
///
/// Partition-level setters address partitions by on-disk number, never by the detected
/// number an enumeration pass assigned.
pub trait LowerDisk: Send + Sync {
    /// Read the current extended drive layout
    fn read_drive_layout(&self) -> Result<DriveLayout, NtStatus>;

    fn set_partition_information(
        &self,
        bytes_per_sector: u32,
        on_disk_number: u32,
        partition_type: u8,
    ) -> Result<(), NtStatus>;

    fn set_partition_information_ex(
        &self,
        on_disk_number: u32,
        info: &SetPartitionInformationEx,
    ) -> Result<(), NtStatus>;

    /// Pass a request down the stack; completing it becomes the lower driver's job
    fn call_driver(&self, irp: Irp) -> NtStatus;
}
