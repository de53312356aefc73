// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use partmgr_contracts::{
    CreateDevice, DeviceObjectId, DeviceServices, InterfaceClass, Irp, NtStatus, PriorityBoost,
};

/// Calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCall {
    CreateDevice,
    CreateSymbolicLink,
    DeleteSymbolicLink,
    RegisterInterface(InterfaceClass),
    EnableInterface(InterfaceClass),
    DisableInterface(InterfaceClass),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDevice {
    pub object: DeviceObjectId,
    pub name: String,
    pub extension_size: usize,
    pub device_type: u32,
    pub characteristics: u32,
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub device: DeviceObjectId,
    pub class: InterfaceClass,
    pub enabled: bool,
}

#[derive(Debug, Default)]
struct State {
    next_object: u64,
    created: Vec<CreatedDevice>,
    deleted: Vec<DeviceObjectId>,
    symlinks: BTreeMap<String, String>,
    interfaces: BTreeMap<String, InterfaceRecord>,
    completed: Vec<(Irp, PriorityBoost)>,
    failures: HashMap<ServiceCall, NtStatus>,
}

/// Object, PnP and I/O manager services kept in memory
///
/// Records every call so tests can assert on what a dispatcher published, and fails any
/// call armed with [`FakeDeviceServices::fail`] until it is cleared.
#[derive(Debug, Default)]
pub struct FakeDeviceServices {
    state: Mutex<State>,
}

impl FakeDeviceServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn armed(&self, call: ServiceCall) -> Result<(), NtStatus> {
        match self.state().failures.get(&call) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }

    pub fn fail(&self, call: ServiceCall, status: NtStatus) {
        self.state().failures.insert(call, status);
    }

    pub fn clear_failure(&self, call: ServiceCall) {
        self.state().failures.remove(&call);
    }

    pub fn created_devices(&self) -> Vec<CreatedDevice> {
        self.state().created.clone()
    }

    pub fn deleted_devices(&self) -> Vec<DeviceObjectId> {
        self.state().deleted.clone()
    }

    pub fn symlinks(&self) -> BTreeMap<String, String> {
        self.state().symlinks.clone()
    }

    pub fn symlink_target(&self, link: &str) -> Option<String> {
        self.state().symlinks.get(link).cloned()
    }

    pub fn interface(&self, name: &str) -> Option<InterfaceRecord> {
        self.state().interfaces.get(name).cloned()
    }

    pub fn enabled_interfaces(&self) -> Vec<String> {
        self.state()
            .interfaces
            .iter()
            .filter(|(_, record)| record.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Drain the requests completed so far, oldest first
    pub fn take_completed(&self) -> Vec<Irp> {
        std::mem::take(&mut self.state().completed)
            .into_iter()
            .map(|(irp, _)| irp)
            .collect()
    }

    /// Remove and return the most recently completed request
    pub fn pop_completed(&self) -> Option<Irp> {
        self.state().completed.pop().map(|(irp, _)| irp)
    }

    pub fn completed_count(&self) -> usize {
        self.state().completed.len()
    }
}

impl DeviceServices for FakeDeviceServices {
    fn create_device(&self, request: &CreateDevice<'_>) -> Result<DeviceObjectId, NtStatus> {
        self.armed(ServiceCall::CreateDevice)?;
        let mut state = self.state();
        let live_name = state
            .created
            .iter()
            .any(|d| d.name == request.name && !state.deleted.contains(&d.object));
        if live_name {
            return Err(NtStatus::OBJECT_NAME_COLLISION);
        }
        state.next_object += 1;
        let object = DeviceObjectId(state.next_object);
        state.created.push(CreatedDevice {
            object,
            name: request.name.to_owned(),
            extension_size: request.extension_size,
            device_type: request.device_type,
            characteristics: request.characteristics,
            exclusive: request.exclusive,
        });
        Ok(object)
    }

    fn delete_device(&self, device: DeviceObjectId) {
        self.state().deleted.push(device);
    }

    fn create_symbolic_link(&self, link: &str, target: &str) -> Result<(), NtStatus> {
        self.armed(ServiceCall::CreateSymbolicLink)?;
        let mut state = self.state();
        if state.symlinks.contains_key(link) {
            return Err(NtStatus::OBJECT_NAME_COLLISION);
        }
        state.symlinks.insert(link.to_owned(), target.to_owned());
        Ok(())
    }

    fn delete_symbolic_link(&self, link: &str) -> Result<(), NtStatus> {
        self.armed(ServiceCall::DeleteSymbolicLink)?;
        self.state()
            .symlinks
            .remove(link)
            .map(|_| ())
            .ok_or(NtStatus::OBJECT_NAME_NOT_FOUND)
    }

    fn register_device_interface(
        &self,
        device: DeviceObjectId,
        class: InterfaceClass,
    ) -> Result<String, NtStatus> {
        self.armed(ServiceCall::RegisterInterface(class))?;
        let name = format!(
            "\\??\\STORAGE#Volume#{:04}#{{{}}}",
            device.0,
            class.guid()
        );
        self.state()
            .interfaces
            .entry(name.clone())
            .or_insert(InterfaceRecord {
                device,
                class,
                enabled: false,
            });
        Ok(name)
    }

    fn set_device_interface_state(&self, interface: &str, enable: bool) -> Result<(), NtStatus> {
        let class = self
            .state()
            .interfaces
            .get(interface)
            .map(|record| record.class)
            .ok_or(NtStatus::OBJECT_NAME_NOT_FOUND)?;
        if enable {
            self.armed(ServiceCall::EnableInterface(class))?;
        } else {
            self.armed(ServiceCall::DisableInterface(class))?;
        }
        if let Some(record) = self.state().interfaces.get_mut(interface) {
            record.enabled = enable;
        }
        Ok(())
    }

    fn complete_request(&self, irp: Irp, boost: PriorityBoost) {
        self.state().completed.push((irp, boost));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symlinks_collide_and_vanish() {
        let services = FakeDeviceServices::new();
        services.create_symbolic_link("\\a", "\\b").unwrap();
        assert_eq!(
            services.create_symbolic_link("\\a", "\\c"),
            Err(NtStatus::OBJECT_NAME_COLLISION)
        );
        services.delete_symbolic_link("\\a").unwrap();
        assert_eq!(
            services.delete_symbolic_link("\\a"),
            Err(NtStatus::OBJECT_NAME_NOT_FOUND)
        );
    }

    #[test]
    fn armed_failures_persist_until_cleared() {
        let services = FakeDeviceServices::new();
        services.fail(ServiceCall::CreateSymbolicLink, NtStatus::IO_DEVICE_ERROR);
        assert_eq!(
            services.create_symbolic_link("\\a", "\\b"),
            Err(NtStatus::IO_DEVICE_ERROR)
        );
        assert!(services.create_symbolic_link("\\a", "\\b").is_err());
        services.clear_failure(ServiceCall::CreateSymbolicLink);
        assert!(services.create_symbolic_link("\\a", "\\b").is_ok());
    }

    #[test]
    fn interfaces_start_disabled() {
        let services = FakeDeviceServices::new();
        let name = services
            .register_device_interface(DeviceObjectId(3), InterfaceClass::Volume)
            .unwrap();
        assert!(services.enabled_interfaces().is_empty());
        services.set_device_interface_state(&name, true).unwrap();
        assert_eq!(services.enabled_interfaces(), vec![name]);
    }
}
