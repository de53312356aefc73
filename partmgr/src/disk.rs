// SPDX-License-Identifier: GPL-3.0-only

//! Whole-disk context, layout cache and layout lock

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use partmgr_contracts::{
    DeviceRef, DeviceRelationType, DeviceRelations, DeviceServices, Information, Irp, LowerDisk,
    NtStatus, PartMgrError, PnpRequest, PriorityBoost, Result,
};
use partmgr_types::{
    DiskIdentity, DriveLayout, PartitionDetails, PartitionEntry, PartitionStyle,
    is_container_mbr_type,
};
use tracing::{debug, info, warn};

use crate::naming::VolumeSequence;
use crate::partition::{Lifecycle, PartitionDevice};

/// Geometry and identity of a disk, as known when its FDO starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskData {
    pub disk_size: u64,
    /// Number `N` in `\Device\Harddisk<N>`
    pub device_number: u32,
    pub bytes_per_sector: u32,
    pub identity: DiskIdentity,
}

#[derive(Debug)]
struct LayoutState {
    identity: DiskIdentity,
    cache: Option<DriveLayout>,
    partitions: Vec<Arc<PartitionDevice>>,
    enumerated_total: u32,
}

/// The function device of one disk
///
/// Holds the per-disk layout lock. The cached layout, the disk identity, the partition
/// list and every partition's style-specific fields are only read or written while
/// holding it, through a [`LayoutGuard`].
pub struct DiskFdo {
    disk_size: u64,
    device_number: u32,
    bytes_per_sector: u32,
    /// Raw partition style; written under the layout lock, read without it
    style: AtomicU32,
    lower: Arc<dyn LowerDisk>,
    services: Arc<dyn DeviceServices>,
    volume_names: Arc<VolumeSequence>,
    layout: Mutex<LayoutState>,
}

impl std::fmt::Debug for DiskFdo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskFdo")
            .field("device_number", &self.device_number)
            .field("disk_size", &self.disk_size)
            .field("style", &self.partition_style())
            .finish_non_exhaustive()
    }
}

impl DiskFdo {
    pub fn new(
        data: DiskData,
        lower: Arc<dyn LowerDisk>,
        services: Arc<dyn DeviceServices>,
        volume_names: Arc<VolumeSequence>,
    ) -> Arc<Self> {
        Arc::new(Self {
            disk_size: data.disk_size,
            device_number: data.device_number,
            bytes_per_sector: data.bytes_per_sector,
            style: AtomicU32::new(data.identity.style().as_raw()),
            lower,
            services,
            volume_names,
            layout: Mutex::new(LayoutState {
                identity: data.identity,
                cache: None,
                partitions: Vec::new(),
                enumerated_total: 0,
            }),
        })
    }

    pub fn disk_size(&self) -> u64 {
        self.disk_size
    }

    pub fn device_number(&self) -> u32 {
        self.device_number
    }

    pub fn bytes_per_sector(&self) -> u32 {
        self.bytes_per_sector
    }

    pub fn partition_style(&self) -> PartitionStyle {
        PartitionStyle::from_raw(self.style.load(Ordering::Acquire)).unwrap_or(PartitionStyle::Raw)
    }

    pub fn lower(&self) -> &Arc<dyn LowerDisk> {
        &self.lower
    }

    pub fn services(&self) -> &Arc<dyn DeviceServices> {
        &self.services
    }

    pub fn volume_names(&self) -> &VolumeSequence {
        &self.volume_names
    }

    /// Acquire the layout lock
    ///
    /// Not reentrant: a thread holding a guard must not call anything that takes the lock
    /// again.
    pub fn lock_layout(&self) -> LayoutGuard<'_> {
        LayoutGuard {
            disk: self,
            state: self.layout.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Refresh the cached layout from the lower disk
    pub fn read_layout(&self) -> Result<DriveLayout> {
        self.lock_layout().read_layout()
    }

    /// Copy of the cached layout, if one has been read
    pub fn cached_layout(&self) -> Option<DriveLayout> {
        self.lock_layout().cached().cloned()
    }

    pub fn partitions(&self) -> Vec<Arc<PartitionDevice>> {
        self.lock_layout().partitions().to_vec()
    }

    /// Re-read the layout and reconcile the partition list against it
    ///
    /// Returns the devices to report for a bus-relations query, in list order. When a
    /// device cannot be created the pass stops there, but the enumerated count and the
    /// removal of partitions gone from the layout still reflect what was reconciled.
    pub fn enumerate_partitions(self: &Arc<Self>) -> Result<Vec<Arc<PartitionDevice>>> {
        let mut layout = self.lock_layout();
        let snapshot = layout.read_layout()?;
        let style = snapshot.style();

        let mut reported: Vec<Arc<PartitionDevice>> = Vec::new();
        let outcome = self.reconcile(&mut layout, &snapshot, &mut reported);

        for partition in layout.partitions() {
            let in_layout = snapshot
                .partitions
                .iter()
                .any(|entry| is_exposed(entry) && matches_entry(partition, entry));
            if !in_layout && !partition.is_removed() {
                debug!(
                    device = %partition.device_name(),
                    "partition no longer in layout"
                );
                partition.set_enumerated(false);
                partition.mark_removed();
            }
        }

        layout.state.enumerated_total = u32::try_from(reported.len()).unwrap_or(u32::MAX);
        if let Err(e) = outcome {
            warn!(
                disk = self.device_number,
                reported = reported.len(),
                error = %e,
                "partition enumeration stopped early"
            );
            return Err(e);
        }

        info!(
            disk = self.device_number,
            %style,
            reported = reported.len(),
            "partitions enumerated"
        );
        Ok(reported)
    }

    /// Match layout entries to listed devices, creating devices for new entries
    fn reconcile(
        self: &Arc<Self>,
        layout: &mut LayoutGuard<'_>,
        snapshot: &DriveLayout,
        reported: &mut Vec<Arc<PartitionDevice>>,
    ) -> Result<()> {
        let style = snapshot.style();
        let mut detected = 0u32;

        for (index, entry) in snapshot.partitions.iter().enumerate() {
            if !is_exposed(entry) {
                continue;
            }
            let on_disk_number = u32::try_from(index + 1)
                .map_err(|_| PartMgrError::InvalidParameter("too many layout entries".into()))?;
            detected += 1;

            let existing = layout
                .partitions()
                .iter()
                .find(|p| !p.is_removed() && matches_entry(p, entry))
                .cloned();

            let device = match existing {
                Some(device) => {
                    device.set_detected_number(detected);
                    *device.details(layout) = entry.details;
                    device
                }
                None => {
                    let entry = PartitionEntry {
                        partition_number: detected,
                        ..*entry
                    };
                    let device = PartitionDevice::create(self, &entry, on_disk_number, style)?;
                    device.set_attached(true);
                    layout.state.partitions.push(Arc::clone(&device));
                    device
                }
            };
            device.set_enumerated(true);
            reported.push(device);
        }
        Ok(())
    }

    /// Unlink a removed partition from the list and delete its device object
    pub fn delete_partition_device(&self, partition: &Arc<PartitionDevice>) -> Result<()> {
        if partition.lifecycle() == Lifecycle::Started {
            warn!(
                device = %partition.device_name(),
                "refusing to delete a started partition device"
            );
            return Err(PartMgrError::InvalidDeviceRequest);
        }

        {
            let mut layout = self.lock_layout();
            layout
                .state
                .partitions
                .retain(|p| !Arc::ptr_eq(p, partition));
        }
        partition.set_attached(false);
        partition.set_enumerated(false);
        self.services.delete_device(partition.object_id());
        info!(device = %partition.device_name(), "partition device deleted");
        Ok(())
    }

    /// Detach every partition and drop the cached layout
    ///
    /// Returns the detached devices; their device objects are left to the caller.
    pub fn teardown(&self) -> Vec<Arc<PartitionDevice>> {
        let detached = {
            let mut layout = self.lock_layout();
            layout.state.cache = None;
            layout.state.enumerated_total = 0;
            std::mem::take(&mut layout.state.partitions)
        };
        for partition in &detached {
            partition.set_attached(false);
            partition.set_enumerated(false);
        }
        debug!(disk = self.device_number, detached = detached.len(), "disk torn down");
        detached
    }

    /// PnP requests addressed to the disk itself
    pub fn dispatch_pnp(self: &Arc<Self>, mut irp: Irp) -> NtStatus {
        if irp.pnp_request() != Some(&PnpRequest::QueryDeviceRelations(DeviceRelationType::Bus)) {
            return self.lower.call_driver(irp);
        }

        match self.enumerate_partitions() {
            Ok(devices) => {
                let objects = devices
                    .into_iter()
                    .map(|device| device as DeviceRef)
                    .collect();
                irp.io_status.status = NtStatus::SUCCESS;
                irp.io_status.information = Information::Relations(DeviceRelations { objects });
                self.lower.call_driver(irp)
            }
            Err(e) => {
                warn!(disk = self.device_number, error = %e, "bus enumeration failed");
                let status = e.status();
                irp.io_status.status = status;
                irp.io_status.information = Information::None;
                self.services.complete_request(irp, PriorityBoost::NO_INCREMENT);
                status
            }
        }
    }

    /// Device-control requests addressed to the disk go straight down
    pub fn dispatch_device_control(&self, irp: Irp) -> NtStatus {
        self.lower.call_driver(irp)
    }
}

/// Whether a listed device stands for this layout entry
fn matches_entry(partition: &PartitionDevice, entry: &PartitionEntry) -> bool {
    partition.style() == entry.style()
        && partition.starting_offset() == entry.starting_offset
        && partition.partition_length() == entry.partition_length
}

/// Whether a layout entry gets a partition device
fn is_exposed(entry: &PartitionEntry) -> bool {
    if entry.partition_length == 0 {
        return false;
    }
    match &entry.details {
        PartitionDetails::Mbr(mbr) => {
            mbr.partition_type != 0 && !is_container_mbr_type(mbr.partition_type)
        }
        PartitionDetails::Gpt(gpt) => !gpt.partition_type.is_nil(),
    }
}

/// Proof of holding a disk's layout lock
pub struct LayoutGuard<'a> {
    disk: &'a DiskFdo,
    state: MutexGuard<'a, LayoutState>,
}

impl LayoutGuard<'_> {
    pub fn disk(&self) -> &DiskFdo {
        self.disk
    }

    pub fn cached(&self) -> Option<&DriveLayout> {
        self.state.cache.as_ref()
    }

    pub fn identity(&self) -> DiskIdentity {
        self.state.identity
    }

    pub fn partitions(&self) -> &[Arc<PartitionDevice>] {
        &self.state.partitions
    }

    /// Partitions reported by the last enumeration pass
    pub fn enumerated_total(&self) -> u32 {
        self.state.enumerated_total
    }

    /// Replace the cache with a fresh layout from the lower disk
    ///
    /// On failure the previous cache is kept.
    pub fn read_layout(&mut self) -> Result<DriveLayout> {
        let layout = self.disk.lower.read_drive_layout().map_err(|status| {
            warn!(disk = self.disk.device_number, %status, "drive layout read failed");
            PartMgrError::from(status)
        })?;

        debug!(
            disk = self.disk.device_number,
            style = %layout.style(),
            entries = layout.partition_count(),
            "drive layout read"
        );
        self.state.identity = layout.identity;
        self.disk
            .style
            .store(layout.style().as_raw(), Ordering::Release);
        self.state.cache = Some(layout.clone());
        Ok(layout)
    }

    /// Update a cached entry in place after a successful set on the lower disk
    pub(crate) fn update_cached_entry(&mut self, on_disk_number: u32, details: PartitionDetails) {
        let Some(cache) = self.state.cache.as_mut() else {
            return;
        };
        let index = usize::try_from(on_disk_number)
            .ok()
            .and_then(|n| n.checked_sub(1));
        if let Some(entry) = index.and_then(|i| cache.partitions.get_mut(i)) {
            entry.details = details;
        }
    }
}
