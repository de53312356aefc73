// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use partmgr_contracts::{
    BusQueryIdType, DeviceCapabilities, DeviceRef, DeviceRelationType, DeviceRelations,
    Information, InterfaceClass, IoStackLocation, Irp, NtStatus, PartMgrError, PnpRequest,
    PriorityBoost, Result,
};
use tracing::{debug, info, warn};

use super::{Lifecycle, PartitionDevice};
use crate::naming::{
    PARTITION_DEVICE_ID, VOLUME_HARDWARE_ID, instance_id, multi_string, partition_symlink_name,
    validate_name,
};

const PUBLISHED_INTERFACES: [InterfaceClass; 2] = [InterfaceClass::Partition, InterfaceClass::Volume];

/// How a PnP handler wants its request completed
enum PnpOutcome {
    /// Success; `None` leaves the information field as the sender set it
    Done(Option<Information>),
    Failed(PartMgrError),
    /// Complete with status and information untouched
    Untouched,
}

impl From<Result<Option<Information>>> for PnpOutcome {
    fn from(result: Result<Option<Information>>) -> Self {
        match result {
            Ok(information) => Self::Done(information),
            Err(e) => Self::Failed(e),
        }
    }
}

impl PartitionDevice {
    /// Handle a PnP request addressed to this partition; always completes it
    pub fn dispatch_pnp(self: &Arc<Self>, mut irp: Irp) -> NtStatus {
        let outcome = match irp.pnp_request().copied() {
            _ if !self.is_ready() => PnpOutcome::Failed(PartMgrError::InvalidDeviceRequest),
            None => PnpOutcome::Failed(PartMgrError::InvalidDeviceRequest),
            Some(PnpRequest::StartDevice) => self.start().map(|()| None).into(),
            Some(PnpRequest::RemoveDevice) => self.remove().map(|()| None).into(),
            Some(PnpRequest::QueryDeviceRelations(DeviceRelationType::TargetDevice)) => {
                let target: DeviceRef = Arc::clone(self) as DeviceRef;
                PnpOutcome::Done(Some(Information::Relations(DeviceRelations {
                    objects: vec![target],
                })))
            }
            Some(PnpRequest::QueryDeviceRelations(_)) => PnpOutcome::Untouched,
            Some(PnpRequest::QueryId(id_type)) => self.query_id(id_type).map(Some).into(),
            Some(PnpRequest::QueryCapabilities(capabilities)) => {
                irp.stack = IoStackLocation::Pnp(PnpRequest::QueryCapabilities(
                    self.fill_capabilities(capabilities),
                ));
                PnpOutcome::Done(None)
            }
            Some(PnpRequest::Other(minor)) => {
                debug!(device = %self.device_name(), minor, "unhandled PnP request");
                PnpOutcome::Failed(PartMgrError::NotSupported)
            }
        };

        match outcome {
            PnpOutcome::Done(information) => {
                irp.io_status.status = NtStatus::SUCCESS;
                if let Some(information) = information {
                    irp.io_status.information = information;
                }
            }
            PnpOutcome::Failed(e) => {
                irp.io_status.status = e.status();
                irp.io_status.information = Information::None;
            }
            PnpOutcome::Untouched => {}
        }

        let status = irp.status();
        self.disk()
            .services()
            .complete_request(irp, PriorityBoost::NO_INCREMENT);
        status
    }

    /// Publish the partition symlink and enable both device interfaces
    fn start(&self) -> Result<()> {
        let mut published = self.published();
        if published.lifecycle != Lifecycle::Created {
            warn!(
                device = %self.device_name(),
                lifecycle = ?published.lifecycle,
                "start refused"
            );
            return Err(PartMgrError::InvalidDeviceRequest);
        }

        let services = self.disk().services();
        let symlink = partition_symlink_name(self.disk().device_number(), self.detected_number());
        validate_name(&symlink)?;
        services.create_symbolic_link(&symlink, self.device_name())?;
        published.symlink = true;
        debug!(link = %symlink, device = %self.device_name(), "symbolic link created");

        for class in PUBLISHED_INTERFACES {
            let name = services.register_device_interface(self.object_id(), class)?;
            *published.interface_slot(class) = Some(name.clone());
            if let Err(status) = services.set_device_interface_state(&name, true) {
                *published.interface_slot(class) = None;
                return Err(status.into());
            }
            info!(device = %self.device_name(), interface = %name, ?class, "interface enabled");
        }

        published.lifecycle = Lifecycle::Started;
        Ok(())
    }

    /// Withdraw what `start` published
    fn remove(&self) -> Result<()> {
        let mut published = self.published();
        let services = self.disk().services();

        let symlink = partition_symlink_name(self.disk().device_number(), self.detected_number());
        validate_name(&symlink)?;
        // Interfaces enabled by start stay enabled when this fails.
        services.delete_symbolic_link(&symlink).map_err(|status| {
            warn!(link = %symlink, %status, "symbolic link removal failed");
            PartMgrError::from(status)
        })?;
        published.symlink = false;
        debug!(link = %symlink, "symbolic link removed");

        for class in PUBLISHED_INTERFACES {
            if let Some(name) = published.interface_slot(class).take()
                && let Err(status) = services.set_device_interface_state(&name, false)
            {
                warn!(interface = %name, %status, "failed to disable interface");
            }
        }

        published.lifecycle = Lifecycle::Removed;
        self.mark_removed();
        info!(device = %self.device_name(), "partition device removed");
        Ok(())
    }

    fn query_id(&self, id_type: BusQueryIdType) -> Result<Information> {
        let id = match id_type {
            BusQueryIdType::DeviceId => PARTITION_DEVICE_ID.to_owned(),
            BusQueryIdType::HardwareIds | BusQueryIdType::CompatibleIds => {
                multi_string(VOLUME_HARDWARE_ID)
            }
            BusQueryIdType::InstanceId => {
                let layout = self.disk().lock_layout();
                layout
                    .cached()
                    .and_then(|cache| {
                        instance_id(&cache.identity, self.starting_offset(), self.partition_length())
                    })
                    .ok_or(PartMgrError::NotSupported)?
            }
            BusQueryIdType::DeviceSerialNumber | BusQueryIdType::ContainerId => {
                return Err(PartMgrError::NotSupported);
            }
        };
        Ok(Information::Id(id))
    }

    fn fill_capabilities(&self, mut capabilities: DeviceCapabilities) -> DeviceCapabilities {
        capabilities.silent_install = true;
        capabilities.raw_device_ok = true;
        capabilities.address = self.on_disk_number();
        // TODO: report unique_id = false for partitions on removable media
        capabilities.unique_id = true;
        capabilities
    }
}
