// SPDX-License-Identifier: GPL-3.0-only

//! Major-function routing
//!
//! The partition manager owns two kinds of device: the filter above each disk and the
//! partition devices it creates. Each request is routed by which kind it was sent to.

use std::sync::Arc;

use partmgr_contracts::{Irp, NtStatus};

use crate::disk::DiskFdo;
use crate::partition::PartitionDevice;

#[derive(Debug, Clone)]
pub enum DeviceExtension {
    Disk(Arc<DiskFdo>),
    Partition(Arc<PartitionDevice>),
}

impl DeviceExtension {
    pub fn is_disk(&self) -> bool {
        matches!(self, Self::Disk(_))
    }

    pub fn dispatch_pnp(&self, irp: Irp) -> NtStatus {
        match self {
            Self::Disk(disk) => disk.dispatch_pnp(irp),
            Self::Partition(partition) => partition.dispatch_pnp(irp),
        }
    }

    pub fn dispatch_device_control(&self, irp: Irp) -> NtStatus {
        match self {
            Self::Disk(disk) => disk.dispatch_device_control(irp),
            Self::Partition(partition) => partition.dispatch_device_control(irp),
        }
    }
}

impl From<Arc<DiskFdo>> for DeviceExtension {
    fn from(disk: Arc<DiskFdo>) -> Self {
        Self::Disk(disk)
    }
}

impl From<Arc<PartitionDevice>> for DeviceExtension {
    fn from(partition: Arc<PartitionDevice>) -> Self {
        Self::Partition(partition)
    }
}
