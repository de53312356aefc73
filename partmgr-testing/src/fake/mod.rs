// SPDX-License-Identifier: GPL-3.0-only

mod disk;
mod services;

pub use disk::{FakeLowerDisk, SetCall};
pub use services::{CreatedDevice, FakeDeviceServices, InterfaceRecord, ServiceCall};
