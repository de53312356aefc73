// SPDX-License-Identifier: GPL-3.0-only

//! Partition devices
//!
//! One `PartitionDevice` per partition the disk exposes. Its immutable geometry is set
//! at creation; its style-specific fields change only through the set-info controls and
//! are guarded by the owning disk's layout lock.

mod ioctl;
mod pnp;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use enumflags2::{BitFlags, bitflags};
use partmgr_contracts::{
    CreateDevice, DeviceObject, DeviceObjectId, FILE_DEVICE_DISK, FILE_DEVICE_SECURE_OPEN,
    InterfaceClass, NtStatus, PartMgrError, Result,
};
use partmgr_types::{PartitionDetails, PartitionEntry, PartitionStyle};
use tracing::{error, info};

use crate::disk::{DiskFdo, LayoutGuard};
use crate::naming::validate_name;

/// Device-object flags the partition manager manages
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFlag {
    DirectIo = 0x0000_0010,
    /// Cleared once the device is fully set up; requests are refused until then
    DeviceInitializing = 0x0000_0080,
}

/// PnP state of a partition device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Created,
    Started,
    Removed,
}

/// Names published by a PnP start
#[derive(Debug, Default)]
struct Published {
    lifecycle: Lifecycle,
    symlink: bool,
    partition_interface: Option<String>,
    volume_interface: Option<String>,
}

impl Published {
    fn interface_slot(&mut self, class: InterfaceClass) -> &mut Option<String> {
        match class {
            InterfaceClass::Partition => &mut self.partition_interface,
            InterfaceClass::Volume => &mut self.volume_interface,
        }
    }
}

pub struct PartitionDevice {
    disk: Arc<DiskFdo>,
    object: DeviceObjectId,
    device_name: String,
    flags: AtomicU32,
    style: PartitionStyle,
    starting_offset: u64,
    partition_length: u64,
    on_disk_number: u32,
    detected_number: AtomicU32,
    /// Guarded by the disk's layout lock
    details: Mutex<PartitionDetails>,
    published: Mutex<Published>,
    enumerated: AtomicBool,
    attached: AtomicBool,
    removed: AtomicBool,
}

impl std::fmt::Debug for PartitionDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionDevice")
            .field("object", &self.object)
            .field("device_name", &self.device_name)
            .field("style", &self.style)
            .field("starting_offset", &self.starting_offset)
            .field("partition_length", &self.partition_length)
            .field("on_disk_number", &self.on_disk_number)
            .field("detected_number", &self.detected_number())
            .finish_non_exhaustive()
    }
}

impl PartitionDevice {
    /// Create the device object for one layout entry
    ///
    /// The entry's `partition_number` becomes the detected number; `on_disk_number` is
    /// the entry's 1-based position in the layout and never changes afterwards. The
    /// returned device is ready: its initializing flag is already cleared.
    pub fn create(
        disk: &Arc<DiskFdo>,
        entry: &PartitionEntry,
        on_disk_number: u32,
        style: PartitionStyle,
    ) -> Result<Arc<Self>> {
        if entry.style() != style {
            return Err(PartMgrError::InvalidParameter(format!(
                "{} entry on a {style} disk",
                entry.style()
            )));
        }

        let device_name = disk.volume_names().next_device_name()?;
        validate_name(&device_name)?;

        let object = disk
            .services()
            .create_device(&CreateDevice {
                name: &device_name,
                extension_size: std::mem::size_of::<Self>(),
                device_type: FILE_DEVICE_DISK,
                characteristics: FILE_DEVICE_SECURE_OPEN,
                exclusive: false,
            })
            .map_err(|status| {
                error!(device = %device_name, %status, "failed to create partition device");
                if status == NtStatus::INSUFFICIENT_RESOURCES {
                    PartMgrError::InsufficientResources
                } else {
                    PartMgrError::Lower(status)
                }
            })?;

        let device = Self {
            disk: Arc::clone(disk),
            object,
            device_name,
            flags: AtomicU32::new(
                (DeviceFlag::DirectIo | DeviceFlag::DeviceInitializing).bits(),
            ),
            style,
            starting_offset: entry.starting_offset,
            partition_length: entry.partition_length,
            on_disk_number,
            detected_number: AtomicU32::new(entry.partition_number),
            details: Mutex::new(entry.details),
            published: Mutex::new(Published::default()),
            enumerated: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        };
        device
            .flags
            .fetch_and(!BitFlags::from(DeviceFlag::DeviceInitializing).bits(), Ordering::Release);

        info!(
            device = %device.device_name,
            disk = disk.device_number(),
            %style,
            offset = device.starting_offset,
            length = device.partition_length,
            on_disk_number,
            "partition device created"
        );
        Ok(Arc::new(device))
    }

    pub fn disk(&self) -> &Arc<DiskFdo> {
        &self.disk
    }

    pub fn object_id(&self) -> DeviceObjectId {
        self.object
    }

    /// `\Device\HarddiskVolume<N>`
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn flags(&self) -> BitFlags<DeviceFlag> {
        BitFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        !self.flags().contains(DeviceFlag::DeviceInitializing)
    }

    pub fn style(&self) -> PartitionStyle {
        self.style
    }

    pub fn starting_offset(&self) -> u64 {
        self.starting_offset
    }

    pub fn partition_length(&self) -> u64 {
        self.partition_length
    }

    pub fn on_disk_number(&self) -> u32 {
        self.on_disk_number
    }

    /// Position in the last enumeration that reported this partition
    pub fn detected_number(&self) -> u32 {
        self.detected_number.load(Ordering::Acquire)
    }

    pub(crate) fn set_detected_number(&self, number: u32) {
        self.detected_number.store(number, Ordering::Release);
    }

    /// Style-specific fields, borrowed under the layout lock
    pub fn details<'g>(&'g self, _layout: &'g LayoutGuard<'_>) -> MutexGuard<'g, PartitionDetails> {
        self.details.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the partition as a layout entry; takes the layout lock
    pub fn entry(&self) -> PartitionEntry {
        let layout = self.disk.lock_layout();
        let details = *self.details(&layout);
        PartitionEntry {
            starting_offset: self.starting_offset,
            partition_length: self.partition_length,
            partition_number: self.detected_number(),
            rewrite_partition: false,
            details,
        }
    }

    pub fn is_enumerated(&self) -> bool {
        self.enumerated.load(Ordering::Acquire)
    }

    pub(crate) fn set_enumerated(&self, enumerated: bool) {
        self.enumerated.store(enumerated, Ordering::Release);
    }

    /// Whether the device is linked into its disk's partition list
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.published().lifecycle
    }

    pub fn has_symlink(&self) -> bool {
        self.published().symlink
    }

    pub fn interface_name(&self, class: InterfaceClass) -> Option<String> {
        self.published().interface_slot(class).clone()
    }

    fn published(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceObject for PartitionDevice {
    fn object_id(&self) -> DeviceObjectId {
        self.object
    }

    fn device_name(&self) -> Option<&str> {
        Some(&self.device_name)
    }
}
