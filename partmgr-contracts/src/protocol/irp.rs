// SPDX-License-Identifier: GPL-3.0-only

//! Request packets
//!
//! An `Irp` is owned by whoever currently handles it. A dispatcher either completes it
//! through `DeviceServices::complete_request` or hands it to the lower disk, and in both
//! cases gives up ownership.

use partmgr_types::IoControlCode;

use super::NtStatus;
use crate::traits::DeviceRef;

/// Priority boost applied when completing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityBoost(pub i8);

impl PriorityBoost {
    pub const NO_INCREMENT: Self = Self(0);
}

/// Relation kinds a PnP relations query can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRelationType {
    Bus,
    Ejection,
    Power,
    Removal,
    TargetDevice,
}

/// Id kinds a PnP id query can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusQueryIdType {
    DeviceId,
    HardwareIds,
    CompatibleIds,
    InstanceId,
    DeviceSerialNumber,
    ContainerId,
}

/// Device capabilities filled in by a PnP capabilities query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub silent_install: bool,
    pub raw_device_ok: bool,
    pub unique_id: bool,
    pub removable: bool,
    pub address: u32,
}

/// Referenced devices returned by a relations query; dropping the list releases them
#[derive(Debug, Clone, Default)]
pub struct DeviceRelations {
    pub objects: Vec<DeviceRef>,
}

impl DeviceRelations {
    pub fn count(&self) -> usize {
        self.objects.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnpRequest {
    StartDevice,
    RemoveDevice,
    QueryDeviceRelations(DeviceRelationType),
    QueryId(BusQueryIdType),
    QueryCapabilities(DeviceCapabilities),
    /// Any minor function this stack does not name
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceControlRequest {
    pub code: IoControlCode,
    pub input_buffer_length: usize,
    pub output_buffer_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoStackLocation {
    Pnp(PnpRequest),
    DeviceControl(DeviceControlRequest),
}

/// Result payload of a completed request
#[derive(Debug, Clone, Default)]
pub enum Information {
    /// Bytes valid in the system buffer, or a required size on buffer-size failures
    Bytes(usize),
    Relations(DeviceRelations),
    /// A PnP id string; multi-string ids hold their entries separated by NUL
    Id(String),
    #[default]
    None,
}

impl Information {
    pub fn bytes(&self) -> usize {
        match self {
            Self::Bytes(n) => *n,
            _ => 0,
        }
    }

    pub fn relations(&self) -> Option<&DeviceRelations> {
        match self {
            Self::Relations(relations) => Some(relations),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IoStatus {
    pub status: NtStatus,
    pub information: Information,
}

#[derive(Debug, Clone)]
pub struct Irp {
    pub io_status: IoStatus,
    pub stack: IoStackLocation,
    /// Buffered-I/O system buffer: input on entry, output on completion
    pub system_buffer: Vec<u8>,
}

impl Irp {
    /// A PnP request as the PnP manager issues it: not-supported until a driver answers
    pub fn pnp(request: PnpRequest) -> Self {
        Self {
            io_status: IoStatus {
                status: NtStatus::NOT_SUPPORTED,
                information: Information::None,
            },
            stack: IoStackLocation::Pnp(request),
            system_buffer: Vec::new(),
        }
    }

    /// A buffered device-control request; the system buffer is sized for the larger of
    /// input and output
    pub fn device_control(code: IoControlCode, input: &[u8], output_buffer_length: usize) -> Self {
        let mut system_buffer = vec![0u8; input.len().max(output_buffer_length)];
        system_buffer[..input.len()].copy_from_slice(input);
        Self {
            io_status: IoStatus {
                status: NtStatus::PENDING,
                information: Information::Bytes(0),
            },
            stack: IoStackLocation::DeviceControl(DeviceControlRequest {
                code,
                input_buffer_length: input.len(),
                output_buffer_length,
            }),
            system_buffer,
        }
    }

    pub fn pnp_request(&self) -> Option<&PnpRequest> {
        match &self.stack {
            IoStackLocation::Pnp(request) => Some(request),
            IoStackLocation::DeviceControl(_) => None,
        }
    }

    pub fn device_control_request(&self) -> Option<&DeviceControlRequest> {
        match &self.stack {
            IoStackLocation::DeviceControl(request) => Some(request),
            IoStackLocation::Pnp(_) => None,
        }
    }

    pub fn status(&self) -> NtStatus {
        self.io_status.status
    }

    /// Input bytes of a device-control request
    pub fn input(&self) -> &[u8] {
        let len = self
            .device_control_request()
            .map_or(0, |r| r.input_buffer_length)
            .min(self.system_buffer.len());
        &self.system_buffer[..len]
    }

    /// Output region of a device-control request, sized to what the caller provided
    pub fn output_mut(&mut self) -> &mut [u8] {
        let len = self
            .device_control_request()
            .map_or(0, |r| r.output_buffer_length)
            .min(self.system_buffer.len());
        &mut self.system_buffer[..len]
    }

    /// Bytes returned by a completed device-control request
    pub fn returned_bytes(&self) -> &[u8] {
        let len = self.io_status.information.bytes().min(self.system_buffer.len());
        &self.system_buffer[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_control_buffer_fits_both_directions() {
        let irp = Irp::device_control(IoControlCode::DISK_VERIFY, &[1, 2, 3], 8);
        assert_eq!(irp.system_buffer.len(), 8);
        assert_eq!(irp.input(), &[1, 2, 3]);

        let mut irp = Irp::device_control(IoControlCode::DISK_VERIFY, &[0; 16], 4);
        assert_eq!(irp.output_mut().len(), 4);
    }

    #[test]
    fn pnp_requests_start_unanswered() {
        let irp = Irp::pnp(PnpRequest::StartDevice);
        assert_eq!(irp.status(), NtStatus::NOT_SUPPORTED);
        assert_eq!(irp.pnp_request(), Some(&PnpRequest::StartDevice));
        assert!(irp.device_control_request().is_none());
    }
}
