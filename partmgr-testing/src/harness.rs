// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use partmgr::{DiskData, DiskFdo, PartitionDevice, VolumeSequence};
use partmgr_contracts::{Irp, NtStatus};
use partmgr_types::{DriveLayout, IoControlCode, PartitionStyle};

use crate::fake::{FakeDeviceServices, FakeLowerDisk};

/// A disk wired to in-memory collaborators
pub struct TestDisk {
    pub services: Arc<FakeDeviceServices>,
    pub lower: Arc<FakeLowerDisk>,
    pub names: Arc<VolumeSequence>,
    pub disk: Arc<DiskFdo>,
}

impl TestDisk {
    pub fn new(device_number: u32, layout: DriveLayout) -> Self {
        Self::with_names(device_number, layout, Arc::new(VolumeSequence::new()))
    }

    /// A disk drawing volume names from a sequence shared with other disks
    pub fn with_names(device_number: u32, layout: DriveLayout, names: Arc<VolumeSequence>) -> Self {
        let data = DiskData {
            disk_size: layout
                .partitions
                .iter()
                .map(|p| p.end_offset())
                .max()
                .unwrap_or(0),
            device_number,
            bytes_per_sector: 512,
            identity: layout.identity,
        };
        Self::from_parts(data, layout, names)
    }

    pub fn from_parts(data: DiskData, layout: DriveLayout, names: Arc<VolumeSequence>) -> Self {
        let services = Arc::new(FakeDeviceServices::new());
        let lower = Arc::new(FakeLowerDisk::new(layout));
        let disk = DiskFdo::new(data, lower.clone(), services.clone(), names.clone());
        Self {
            services,
            lower,
            names,
            disk,
        }
    }

    pub fn style(&self) -> PartitionStyle {
        self.disk.partition_style()
    }

    /// Enumerate, panicking on failure
    pub fn enumerate(&self) -> Vec<Arc<PartitionDevice>> {
        match self.disk.enumerate_partitions() {
            Ok(devices) => devices,
            Err(e) => panic!("enumeration failed: {e}"),
        }
    }

    /// Send a device-control request to `partition` and return it as completed
    ///
    /// Returns `None` when the request went to the lower disk instead.
    pub fn device_control(
        &self,
        partition: &Arc<PartitionDevice>,
        code: IoControlCode,
        input: &[u8],
        output_len: usize,
    ) -> (NtStatus, Option<Irp>) {
        let before = self.services.completed_count();
        let status =
            partition.dispatch_device_control(Irp::device_control(code, input, output_len));
        let completed = if self.services.completed_count() > before {
            self.services.pop_completed()
        } else {
            None
        };
        (status, completed)
    }

    /// Send a PnP request to `partition` and return it as completed
    pub fn pnp(
        &self,
        partition: &Arc<PartitionDevice>,
        request: partmgr_contracts::PnpRequest,
    ) -> (NtStatus, Irp) {
        let status = partition.dispatch_pnp(Irp::pnp(request));
        match self.services.pop_completed() {
            Some(irp) => (status, irp),
            None => panic!("PnP request {request:?} was not completed"),
        }
    }
}

impl Drop for TestDisk {
    fn drop(&mut self) {
        self.disk.teardown();
    }
}
