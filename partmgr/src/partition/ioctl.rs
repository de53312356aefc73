// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use partmgr_contracts::{
    Information, InterfaceClass, IoStatus, Irp, NtStatus, PartMgrError, PriorityBoost, Result,
};
use partmgr_types::wire::{
    GET_LENGTH_INFORMATION_SIZE, MOUNTDEV_HEADER_SIZE, MOUNTDEV_PAYLOAD_OFFSET,
    PARTITION_INFORMATION_EX_SIZE, PARTITION_INFORMATION_SIZE, PartitionInformation,
    SET_PARTITION_INFORMATION_EX_SIZE, SET_PARTITION_INFORMATION_SIZE, SetPartitionInformation,
    SetPartitionInformationEx, VERIFY_INFORMATION_SIZE, VOLUME_GPT_ATTRIBUTES_SIZE,
    VerifyInformation, encode_mountdev_length, encode_partition_information_ex, encode_u64,
    utf16le_bytes,
};
use partmgr_types::{
    IoControlCode, MbrPartitionInfo, PartitionDetails, PartitionStyle, WireError, find_mbr_type,
    is_recognized_mbr_type,
};
use tracing::{debug, info};

use super::PartitionDevice;

fn require_output(irp: &mut Irp, required: usize) -> Result<()> {
    if irp.output_mut().len() < required {
        return Err(PartMgrError::BufferTooSmall { required });
    }
    Ok(())
}

fn encode_failed(e: WireError) -> PartMgrError {
    match e {
        WireError::Truncated { needed, .. } => PartMgrError::BufferTooSmall { required: needed },
        other => PartMgrError::InvalidParameter(other.to_string()),
    }
}

/// Write a mount-manager reply: a 16-bit byte length followed by the payload
///
/// A buffer that only fits the fixed header gets buffer-too-small with the header size.
/// A larger buffer that still cannot hold the payload gets the length field filled in and
/// buffer-overflow with the size needed.
fn write_mountdev(out: &mut [u8], payload: &[u8]) -> Result<usize> {
    if out.len() < MOUNTDEV_HEADER_SIZE {
        return Err(PartMgrError::BufferTooSmall {
            required: MOUNTDEV_HEADER_SIZE,
        });
    }
    let len = u16::try_from(payload.len())
        .map_err(|_| PartMgrError::NameTooLong(format!("{} byte name", payload.len())))?;
    let required = MOUNTDEV_PAYLOAD_OFFSET + payload.len();

    out[..MOUNTDEV_HEADER_SIZE].fill(0);
    if out.len() < required {
        if out.len() == MOUNTDEV_HEADER_SIZE {
            return Err(PartMgrError::BufferTooSmall {
                required: MOUNTDEV_HEADER_SIZE,
            });
        }
        encode_mountdev_length(len, out).map_err(encode_failed)?;
        return Err(PartMgrError::BufferOverflow { required });
    }

    encode_mountdev_length(len, out).map_err(encode_failed)?;
    out[MOUNTDEV_PAYLOAD_OFFSET..required].copy_from_slice(payload);
    Ok(required)
}

impl PartitionDevice {
    /// Handle a device-control request addressed to this partition
    ///
    /// Codes served here are completed; verify and unknown codes go to the lower disk.
    pub fn dispatch_device_control(self: &Arc<Self>, mut irp: Irp) -> NtStatus {
        if !self.is_ready() {
            return self.complete(irp, Err(PartMgrError::InvalidDeviceRequest));
        }
        let Some(code) = irp.device_control_request().map(|r| r.code) else {
            return self.complete(irp, Err(PartMgrError::InvalidDeviceRequest));
        };

        let result = match code {
            IoControlCode::DISK_GET_PARTITION_INFO => self.get_partition_info(&mut irp),
            IoControlCode::DISK_GET_PARTITION_INFO_EX => self.get_partition_info_ex(&mut irp),
            IoControlCode::DISK_SET_PARTITION_INFO => self.set_partition_info(&irp),
            IoControlCode::DISK_SET_PARTITION_INFO_EX => self.set_partition_info_ex(&irp),
            IoControlCode::DISK_GET_LENGTH_INFO => self.get_length_info(&mut irp),
            IoControlCode::VOLUME_GET_GPT_ATTRIBUTES => self.get_gpt_attributes(&mut irp),
            IoControlCode::DISK_UPDATE_PROPERTIES => self.disk().read_layout().map(|_| 0),
            IoControlCode::MOUNTDEV_QUERY_DEVICE_NAME => {
                let payload = utf16le_bytes(self.device_name());
                write_mountdev(irp.output_mut(), &payload)
            }
            IoControlCode::MOUNTDEV_QUERY_UNIQUE_ID => self.query_unique_id(&mut irp),
            IoControlCode::DISK_VERIFY => return self.verify(irp),
            other => {
                debug!(device = %self.device_name(), code = %other, "forwarding device control");
                return self.disk().lower().call_driver(irp);
            }
        };

        self.complete(irp, result)
    }

    fn complete(&self, mut irp: Irp, result: Result<usize>) -> NtStatus {
        let (status, information) = match result {
            Ok(bytes) => (NtStatus::SUCCESS, bytes),
            Err(e) => (e.status(), e.information()),
        };
        irp.io_status = IoStatus {
            status,
            information: Information::Bytes(information),
        };
        self.disk()
            .services()
            .complete_request(irp, PriorityBoost::NO_INCREMENT);
        status
    }

    fn get_partition_info(&self, irp: &mut Irp) -> Result<usize> {
        if self.disk().partition_style() != PartitionStyle::Mbr {
            return Err(PartMgrError::InvalidDeviceRequest);
        }
        require_output(irp, PARTITION_INFORMATION_SIZE)?;

        let info = {
            let layout = self.disk().lock_layout();
            let details = self.details(&layout);
            let Some(mbr) = details.as_mbr() else {
                return Err(PartMgrError::InvalidDeviceRequest);
            };
            PartitionInformation {
                starting_offset: self.starting_offset(),
                partition_length: self.partition_length(),
                hidden_sectors: mbr.hidden_sectors,
                partition_number: self.detected_number(),
                partition_type: mbr.partition_type,
                boot_indicator: mbr.boot_indicator,
                recognized_partition: mbr.recognized_partition,
                rewrite_partition: false,
            }
        };
        info.encode(irp.output_mut()).map_err(encode_failed)
    }

    fn get_partition_info_ex(&self, irp: &mut Irp) -> Result<usize> {
        require_output(irp, PARTITION_INFORMATION_EX_SIZE)?;
        let entry = self.entry();
        encode_partition_information_ex(&entry, irp.output_mut()).map_err(encode_failed)
    }

    fn set_partition_info(&self, irp: &Irp) -> Result<usize> {
        let request = SetPartitionInformation::decode(irp.input()).map_err(|_| {
            PartMgrError::InfoLengthMismatch {
                required: SET_PARTITION_INFORMATION_SIZE,
            }
        })?;
        if self.disk().partition_style() != PartitionStyle::Mbr {
            return Err(PartMgrError::InvalidDeviceRequest);
        }

        let mut layout = self.disk().lock_layout();
        let updated = {
            let mut details = self.details(&layout);
            let PartitionDetails::Mbr(mbr) = &mut *details else {
                return Err(PartMgrError::InvalidDeviceRequest);
            };
            self.disk().lower().set_partition_information(
                self.disk().bytes_per_sector(),
                self.on_disk_number(),
                request.partition_type,
            )?;
            mbr.partition_type = request.partition_type;
            mbr.recognized_partition = is_recognized_mbr_type(request.partition_type);
            *details
        };
        layout.update_cached_entry(self.on_disk_number(), updated);

        info!(
            device = %self.device_name(),
            partition_type = request.partition_type,
            type_name = find_mbr_type(request.partition_type).map_or("unknown", |t| t.name.as_str()),
            "partition type set"
        );
        Ok(0)
    }

    fn set_partition_info_ex(&self, irp: &Irp) -> Result<usize> {
        let request = SetPartitionInformationEx::decode(irp.input()).map_err(|e| match e {
            WireError::Truncated { .. } => PartMgrError::InfoLengthMismatch {
                required: SET_PARTITION_INFORMATION_EX_SIZE,
            },
            other => PartMgrError::InvalidParameter(other.to_string()),
        })?;
        let disk_style = self.disk().partition_style();
        if request.style() != disk_style {
            return Err(PartMgrError::InvalidParameter(format!(
                "{} request on a {disk_style} disk",
                request.style()
            )));
        }

        let mut layout = self.disk().lock_layout();
        let updated = {
            let mut details = self.details(&layout);
            let updated = match (*details, &request) {
                (PartitionDetails::Mbr(mbr), SetPartitionInformationEx::Mbr { partition_type }) => {
                    PartitionDetails::Mbr(MbrPartitionInfo {
                        partition_type: *partition_type,
                        recognized_partition: is_recognized_mbr_type(*partition_type),
                        ..mbr
                    })
                }
                (PartitionDetails::Gpt(_), SetPartitionInformationEx::Gpt(gpt)) => {
                    PartitionDetails::Gpt(*gpt)
                }
                (current, _) => {
                    return Err(PartMgrError::InvalidParameter(format!(
                        "{} request on a {} partition",
                        request.style(),
                        current.style()
                    )));
                }
            };
            self.disk()
                .lower()
                .set_partition_information_ex(self.on_disk_number(), &request)?;
            *details = updated;
            updated
        };
        layout.update_cached_entry(self.on_disk_number(), updated);

        info!(device = %self.device_name(), style = %request.style(), "partition information set");
        Ok(0)
    }

    fn get_length_info(&self, irp: &mut Irp) -> Result<usize> {
        require_output(irp, GET_LENGTH_INFORMATION_SIZE)?;
        encode_u64(self.partition_length(), irp.output_mut()).map_err(encode_failed)
    }

    fn get_gpt_attributes(&self, irp: &mut Irp) -> Result<usize> {
        require_output(irp, VOLUME_GPT_ATTRIBUTES_SIZE)?;
        if self.disk().partition_style() != PartitionStyle::Gpt {
            return Err(PartMgrError::InvalidDeviceRequest);
        }
        let attributes = {
            let layout = self.disk().lock_layout();
            let details = self.details(&layout);
            details
                .as_gpt()
                .map(|gpt| gpt.attributes)
                .ok_or(PartMgrError::InvalidDeviceRequest)?
        };
        encode_u64(attributes, irp.output_mut()).map_err(encode_failed)
    }

    /// Unique id is the volume interface name; empty until a start publishes it
    fn query_unique_id(&self, irp: &mut Irp) -> Result<usize> {
        let payload = self
            .interface_name(InterfaceClass::Volume)
            .map(|interface| utf16le_bytes(&interface))
            .unwrap_or_default();
        write_mountdev(irp.output_mut(), &payload)
    }

    /// Rebase a verify request onto the disk and pass it down
    fn verify(self: &Arc<Self>, mut irp: Irp) -> NtStatus {
        let mut request = match VerifyInformation::decode(irp.input()) {
            Ok(request) => request,
            Err(_) => {
                return self.complete(
                    irp,
                    Err(PartMgrError::InfoLengthMismatch {
                        required: VERIFY_INFORMATION_SIZE,
                    }),
                );
            }
        };
        let Some(disk_offset) = request.starting_offset.checked_add(self.starting_offset()) else {
            return self.complete(
                irp,
                Err(PartMgrError::InvalidParameter("verify offset overflows".into())),
            );
        };
        request.starting_offset = disk_offset;
        if let Err(e) = request.encode(&mut irp.system_buffer) {
            return self.complete(irp, Err(encode_failed(e)));
        }
        self.disk().lower().call_driver(irp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mountdev_header_only_buffer_is_too_small() {
        let payload = utf16le_bytes("\\Device\\HarddiskVolume1");
        let mut out = [0u8; MOUNTDEV_HEADER_SIZE];
        assert_eq!(
            write_mountdev(&mut out, &payload),
            Err(PartMgrError::BufferTooSmall {
                required: MOUNTDEV_HEADER_SIZE
            })
        );

        let mut out = [0u8; 3];
        assert!(matches!(
            write_mountdev(&mut out, &payload),
            Err(PartMgrError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn mountdev_partial_buffer_reports_required_size() {
        let payload = utf16le_bytes("\\Device\\HarddiskVolume1");
        let mut out = [0u8; 10];
        assert_eq!(
            write_mountdev(&mut out, &payload),
            Err(PartMgrError::BufferOverflow {
                required: 2 + payload.len()
            })
        );
        assert_eq!(u16::from_le_bytes([out[0], out[1]]) as usize, payload.len());
    }

    #[test]
    fn mountdev_full_buffer_copies_payload() {
        let payload = utf16le_bytes("\\Device\\HarddiskVolume12");
        let mut out = vec![0u8; 128];
        let written = write_mountdev(&mut out, &payload).unwrap();
        assert_eq!(written, 2 + payload.len());
        assert_eq!(&out[2..written], payload.as_slice());
    }
}
