// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{
    BusQueryIdType, DeviceCapabilities, DeviceControlRequest, DeviceRelationType, DeviceRelations,
    Information, IoStackLocation, IoStatus, Irp, NtStatus, PartMgrError, PnpRequest,
    PriorityBoost, Result,
};
pub use traits::{
    CreateDevice, DeviceObject, DeviceObjectId, DeviceRef, DeviceServices, FILE_DEVICE_DISK,
    FILE_DEVICE_SECURE_OPEN, InterfaceClass, LowerDisk,
};
