// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use uuid::Uuid;

use crate::{Irp, NtStatus, PriorityBoost};

/// Handle of a device object owned by the object services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceObjectId(pub u64);

/// A device object visible to the PnP manager
pub trait DeviceObject: Send + Sync + std::fmt::Debug {
    fn object_id(&self) -> DeviceObjectId;

    fn device_name(&self) -> Option<&str>;
}

/// A counted reference to a device object
pub type DeviceRef = Arc<dyn DeviceObject>;

/// Disk device type
pub const FILE_DEVICE_DISK: u32 = 0x0000_0007;
/// Apply the device's security descriptor to relative opens
pub const FILE_DEVICE_SECURE_OPEN: u32 = 0x0000_0100;

/// Parameters of a device-object allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateDevice<'a> {
    pub name: &'a str,
    pub extension_size: usize,
    pub device_type: u32,
    pub characteristics: u32,
    pub exclusive: bool,
}

/// Device interface classes a partition publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceClass {
    /// Watched by the mount manager to discover new volumes
    Partition,
    Volume,
}

impl InterfaceClass {
    pub fn guid(self) -> Uuid {
        match self {
            Self::Partition => Uuid::from_u128(0x53f5630a_b6bf_11d0_94f2_00a0c91efb8b),
            Self::Volume => Uuid::from_u128(0x53f5630d_b6bf_11d0_94f2_00a0c91efb8b),
        }
    }
}

/// Object, PnP and I/O manager services the partition manager calls into
pub trait DeviceServices: Send + Sync {
    /// Allocate a named device object
    fn create_device(&self, request: &CreateDevice<'_>) -> Result<DeviceObjectId, NtStatus>;

    fn delete_device(&self, device: DeviceObjectId);

    fn create_symbolic_link(&self, link: &str, target: &str) -> Result<(), NtStatus>;

    fn delete_symbolic_link(&self, link: &str) -> Result<(), NtStatus>;

    /// Register an interface of `class` on `device`, returning its symbolic name
    fn register_device_interface(
        &self,
        device: DeviceObjectId,
        class: InterfaceClass,
    ) -> Result<String, NtStatus>;

    fn set_device_interface_state(&self, interface: &str, enable: bool) -> Result<(), NtStatus>;

    /// Hand a finished request back to its originator
    fn complete_request(&self, irp: Irp, boost: PriorityBoost);
}
