// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use partmgr::{Lifecycle, PartitionDevice};
use partmgr_contracts::{
    BusQueryIdType, DeviceCapabilities, DeviceObject, DeviceRelationType, Information,
    InterfaceClass, IoStackLocation, NtStatus, PnpRequest,
};
use partmgr_testing::fake::ServiceCall;
use partmgr_testing::fixtures::{two_partition_gpt, two_partition_mbr};
use partmgr_testing::harness::TestDisk;

fn started(lab: &TestDisk) -> Vec<Arc<PartitionDevice>> {
    let devices = lab.enumerate();
    for device in &devices {
        let (status, _) = lab.pnp(device, PnpRequest::StartDevice);
        assert_eq!(status, NtStatus::SUCCESS);
    }
    devices
}

#[test]
fn start_publishes_symlink_and_both_interfaces() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let second = &devices[1];

    let (status, irp) = lab.pnp(second, PnpRequest::StartDevice);

    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(irp.status(), NtStatus::SUCCESS);
    assert_eq!(second.lifecycle(), Lifecycle::Started);
    assert!(second.has_symlink());
    assert_eq!(
        lab.services
            .symlink_target("\\Device\\Harddisk0\\Partition2")
            .as_deref(),
        Some("\\Device\\HarddiskVolume2")
    );

    let partition = second.interface_name(InterfaceClass::Partition).unwrap();
    let volume = second.interface_name(InterfaceClass::Volume).unwrap();
    assert!(lab.services.interface(&partition).unwrap().enabled);
    assert!(lab.services.interface(&volume).unwrap().enabled);
    assert_eq!(
        lab.services.interface(&volume).unwrap().class,
        InterfaceClass::Volume
    );
    assert_eq!(lab.services.enabled_interfaces().len(), 2);
}

#[test]
fn second_start_is_refused() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = started(&lab);

    let (status, irp) = lab.pnp(&devices[0], PnpRequest::StartDevice);

    assert_eq!(status, NtStatus::INVALID_DEVICE_REQUEST);
    assert_eq!(irp.status(), NtStatus::INVALID_DEVICE_REQUEST);
    assert_eq!(lab.services.symlinks().len(), 2);
}

#[test]
fn symlink_failure_fails_start_without_interfaces() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    lab.services
        .fail(ServiceCall::CreateSymbolicLink, NtStatus::OBJECT_NAME_COLLISION);

    let (status, _) = lab.pnp(&devices[0], PnpRequest::StartDevice);

    assert_eq!(status, NtStatus::OBJECT_NAME_COLLISION);
    assert!(!devices[0].has_symlink());
    assert!(devices[0].interface_name(InterfaceClass::Partition).is_none());
    assert!(lab.services.enabled_interfaces().is_empty());
    assert_eq!(devices[0].lifecycle(), Lifecycle::Created);
}

#[test]
fn enable_failure_clears_the_stored_name() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    lab.services.fail(
        ServiceCall::EnableInterface(InterfaceClass::Volume),
        NtStatus::IO_DEVICE_ERROR,
    );

    let (status, _) = lab.pnp(&devices[0], PnpRequest::StartDevice);

    assert_eq!(status, NtStatus::IO_DEVICE_ERROR);
    assert!(devices[0].interface_name(InterfaceClass::Partition).is_some());
    assert!(devices[0].interface_name(InterfaceClass::Volume).is_none());
    assert_eq!(devices[0].lifecycle(), Lifecycle::Created);
}

#[test]
fn remove_withdraws_everything_start_published() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = started(&lab);
    let first = &devices[0];
    let partition = first.interface_name(InterfaceClass::Partition).unwrap();
    let volume = first.interface_name(InterfaceClass::Volume).unwrap();

    let (status, _) = lab.pnp(first, PnpRequest::RemoveDevice);

    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(first.lifecycle(), Lifecycle::Removed);
    assert!(first.is_removed());
    assert!(!first.has_symlink());
    assert!(first.interface_name(InterfaceClass::Partition).is_none());
    assert!(first.interface_name(InterfaceClass::Volume).is_none());
    assert!(!lab.services.interface(&partition).unwrap().enabled);
    assert!(!lab.services.interface(&volume).unwrap().enabled);
    assert!(
        lab.services
            .symlink_target("\\Device\\Harddisk0\\Partition1")
            .is_none()
    );
    // The other partition is untouched.
    assert_eq!(lab.services.symlinks().len(), 1);
}

#[test]
fn removed_device_cannot_restart() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = started(&lab);
    lab.pnp(&devices[0], PnpRequest::RemoveDevice);

    let (status, _) = lab.pnp(&devices[0], PnpRequest::StartDevice);

    assert_eq!(status, NtStatus::INVALID_DEVICE_REQUEST);
    assert_eq!(lab.services.symlinks().len(), 1);
}

#[test]
fn symlink_delete_failure_leaves_interfaces_published() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = started(&lab);
    lab.services
        .fail(ServiceCall::DeleteSymbolicLink, NtStatus::IO_DEVICE_ERROR);

    let (status, irp) = lab.pnp(&devices[0], PnpRequest::RemoveDevice);

    assert_eq!(status, NtStatus::IO_DEVICE_ERROR);
    assert_eq!(irp.status(), NtStatus::IO_DEVICE_ERROR);
    assert_eq!(devices[0].lifecycle(), Lifecycle::Started);
    assert!(devices[0].interface_name(InterfaceClass::Volume).is_some());
    assert_eq!(lab.services.enabled_interfaces().len(), 4);
}

#[test]
fn remove_uses_the_current_detected_number() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = started(&lab);
    let second = Arc::clone(&devices[1]);

    // Drop the first partition: the second becomes detected number 1.
    let mut layout = two_partition_mbr();
    layout.partitions[0].partition_length = 0;
    lab.lower.set_layout(layout);
    let reported = lab.enumerate();
    assert_eq!(reported.len(), 1);
    assert!(Arc::ptr_eq(&reported[0], &second));
    assert_eq!(second.detected_number(), 1);

    // The link was published as Partition2; removal now looks for Partition1, which is
    // still owned by the first device.
    let (status, _) = lab.pnp(&second, PnpRequest::RemoveDevice);
    assert_eq!(status, NtStatus::SUCCESS);
    assert!(
        lab.services
            .symlink_target("\\Device\\Harddisk0\\Partition2")
            .is_some()
    );
}

#[test]
fn target_relations_hold_exactly_one_reference() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let device = &devices[0];
    let before = Arc::strong_count(device);

    let (status, irp) = lab.pnp(
        device,
        PnpRequest::QueryDeviceRelations(DeviceRelationType::TargetDevice),
    );

    assert_eq!(status, NtStatus::SUCCESS);
    let relations = irp.io_status.information.relations().unwrap();
    assert_eq!(relations.count(), 1);
    assert_eq!(relations.objects[0].object_id(), device.object_id());
    assert_eq!(
        relations.objects[0].device_name(),
        Some("\\Device\\HarddiskVolume1")
    );
    assert_eq!(Arc::strong_count(device), before + 1);

    drop(irp);
    assert_eq!(Arc::strong_count(device), before);
}

#[test]
fn other_relation_queries_are_completed_untouched() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let before = Arc::strong_count(&devices[0]);

    for kind in [
        DeviceRelationType::Bus,
        DeviceRelationType::Ejection,
        DeviceRelationType::Removal,
    ] {
        let (status, irp) = lab.pnp(&devices[0], PnpRequest::QueryDeviceRelations(kind));
        assert_eq!(status, NtStatus::NOT_SUPPORTED);
        assert!(matches!(irp.io_status.information, Information::None));
    }
    assert_eq!(Arc::strong_count(&devices[0]), before);
}

#[test]
fn id_queries() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) = lab.pnp(&devices[0], PnpRequest::QueryId(BusQueryIdType::DeviceId));
    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(irp.io_status.information.id(), Some("STORAGE\\Partition"));

    for kind in [BusQueryIdType::HardwareIds, BusQueryIdType::CompatibleIds] {
        let (status, irp) = lab.pnp(&devices[0], PnpRequest::QueryId(kind));
        assert_eq!(status, NtStatus::SUCCESS);
        assert_eq!(irp.io_status.information.id(), Some("STORAGE\\Volume\0"));
    }

    let (status, irp) = lab.pnp(&devices[0], PnpRequest::QueryId(BusQueryIdType::InstanceId));
    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(
        irp.io_status.information.id(),
        Some("S1234abcd_O100000_L6400000")
    );

    let (status, _) = lab.pnp(
        &devices[0],
        PnpRequest::QueryId(BusQueryIdType::DeviceSerialNumber),
    );
    assert_eq!(status, NtStatus::NOT_SUPPORTED);
}

#[test]
fn gpt_instance_id_uses_the_disk_guid() {
    let lab = TestDisk::new(1, two_partition_gpt());
    let devices = lab.enumerate();

    let (_, irp) = lab.pnp(&devices[0], PnpRequest::QueryId(BusQueryIdType::InstanceId));

    assert_eq!(
        irp.io_status.information.id(),
        Some("Sa1b2c3d4-e5f6-0718-293a-4b5c6d7e8f90S_O100000_L6400000")
    );
}

#[test]
fn instance_id_needs_a_cached_layout() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    lab.disk.teardown();

    let (status, _) = lab.pnp(&devices[0], PnpRequest::QueryId(BusQueryIdType::InstanceId));

    assert_eq!(status, NtStatus::NOT_SUPPORTED);
}

#[test]
fn capabilities_report_on_disk_number() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) = lab.pnp(
        &devices[1],
        PnpRequest::QueryCapabilities(DeviceCapabilities::default()),
    );

    assert_eq!(status, NtStatus::SUCCESS);
    let IoStackLocation::Pnp(PnpRequest::QueryCapabilities(caps)) = irp.stack else {
        panic!("capabilities missing from the completed request");
    };
    assert!(caps.silent_install);
    assert!(caps.raw_device_ok);
    assert!(caps.unique_id);
    assert_eq!(caps.address, 3);
}

#[test]
fn unhandled_minor_functions_are_not_supported() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) = lab.pnp(&devices[0], PnpRequest::Other(0x0b));

    assert_eq!(status, NtStatus::NOT_SUPPORTED);
    assert_eq!(irp.io_status.information.bytes(), 0);
}
