// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod irp;
pub mod status;

pub use error::{PartMgrError, Result};
pub use irp::{
    BusQueryIdType, DeviceCapabilities, DeviceControlRequest, DeviceRelationType, DeviceRelations,
    Information, IoStackLocation, IoStatus, Irp, PnpRequest, PriorityBoost,
};
pub use status::NtStatus;
