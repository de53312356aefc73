// SPDX-License-Identifier: GPL-3.0-only

pub mod device;
pub mod disk;

pub use device::{
    CreateDevice, DeviceObject, DeviceObjectId, DeviceRef, DeviceServices, FILE_DEVICE_DISK,
    FILE_DEVICE_SECURE_OPEN, InterfaceClass,
};
pub use disk::LowerDisk;
