// SPDX-License-Identifier: GPL-3.0-only

use partmgr_contracts::{NtStatus, PnpRequest};
use partmgr_testing::fake::SetCall;
use partmgr_testing::fixtures::{MIB, two_partition_gpt, two_partition_mbr};
use partmgr_testing::harness::TestDisk;
use partmgr_types::wire::{
    PartitionInformation, SetPartitionInformation, SetPartitionInformationEx, VerifyInformation,
    decode_mountdev, decode_partition_information_ex, decode_u64, utf16le_bytes,
};
use partmgr_types::{GptName, GptPartitionInfo, IoControlCode, PartitionDetails};
use uuid::Uuid;

fn set_ex_bytes(request: SetPartitionInformationEx) -> Vec<u8> {
    let mut buf = vec![0u8; 120];
    request.encode(&mut buf).unwrap();
    buf
}

#[test]
fn legacy_info_on_mbr() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[1], IoControlCode::DISK_GET_PARTITION_INFO, &[], 32);

    assert_eq!(status, NtStatus::SUCCESS);
    let irp = irp.unwrap();
    assert_eq!(irp.io_status.information.bytes(), 32);
    let info = PartitionInformation::decode(irp.returned_bytes()).unwrap();
    assert_eq!(info.starting_offset, 102 * MIB);
    assert_eq!(info.partition_length, 200 * MIB);
    assert_eq!(info.partition_number, 2);
    assert_eq!(info.partition_type, 0x07);
    assert!(info.recognized_partition);
    assert!(!info.rewrite_partition);
}

#[test]
fn legacy_info_buffer_too_small() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::DISK_GET_PARTITION_INFO, &[], 31);

    assert_eq!(status, NtStatus::BUFFER_TOO_SMALL);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 32);
}

#[test]
fn legacy_info_on_gpt_is_always_refused() {
    let lab = TestDisk::new(1, two_partition_gpt());
    let devices = lab.enumerate();

    for output_len in [0, 8, 32, 4096] {
        let (status, _) = lab.device_control(
            &devices[0],
            IoControlCode::DISK_GET_PARTITION_INFO,
            &[],
            output_len,
        );
        assert_eq!(status, NtStatus::INVALID_DEVICE_REQUEST, "output {output_len}");
    }
}

#[test]
fn extended_info_on_gpt() {
    let lab = TestDisk::new(1, two_partition_gpt());
    let devices = lab.enumerate();

    let (status, irp) = lab.device_control(
        &devices[1],
        IoControlCode::DISK_GET_PARTITION_INFO_EX,
        &[],
        144,
    );

    assert_eq!(status, NtStatus::SUCCESS);
    let irp = irp.unwrap();
    assert_eq!(irp.io_status.information.bytes(), 144);
    let entry = decode_partition_information_ex(irp.returned_bytes()).unwrap();
    assert_eq!(entry.starting_offset, 101 * MIB);
    assert_eq!(entry.partition_number, 2);
    assert_eq!(entry.details, two_partition_gpt().partitions[1].details);
}

#[test]
fn extended_info_buffer_too_small() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) = lab.device_control(
        &devices[0],
        IoControlCode::DISK_GET_PARTITION_INFO_EX,
        &[],
        143,
    );

    assert_eq!(status, NtStatus::BUFFER_TOO_SMALL);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 144);
}

#[test]
fn legacy_set_addresses_the_on_disk_number() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let second = &devices[1];
    assert_eq!(second.detected_number(), 2);
    assert_eq!(second.on_disk_number(), 3);

    let (status, irp) = lab.device_control(
        second,
        IoControlCode::DISK_SET_PARTITION_INFO,
        &[0x83],
        0,
    );

    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 0);
    assert_eq!(
        lab.lower.set_calls(),
        vec![SetCall::Legacy {
            bytes_per_sector: 512,
            on_disk_number: 3,
            partition_type: 0x83,
        }]
    );

    let mbr = *second.entry().details.as_mbr().unwrap();
    assert_eq!(mbr.partition_type, 0x83);
    assert!(!mbr.recognized_partition);

    let cached = lab.disk.cached_layout().unwrap();
    assert_eq!(
        cached.partitions[2].details.as_mbr().unwrap().partition_type,
        0x83
    );
}

#[test]
fn legacy_set_validates_before_touching_the_disk() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::DISK_SET_PARTITION_INFO, &[], 0);
    assert_eq!(status, NtStatus::INFO_LENGTH_MISMATCH);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 1);

    let gpt = TestDisk::new(1, two_partition_gpt());
    let gpt_devices = gpt.enumerate();
    let mut input = [0u8; 1];
    SetPartitionInformation {
        partition_type: 0x07,
    }
    .encode(&mut input)
    .unwrap();
    let (status, _) = gpt.device_control(
        &gpt_devices[0],
        IoControlCode::DISK_SET_PARTITION_INFO,
        &input,
        0,
    );
    assert_eq!(status, NtStatus::INVALID_DEVICE_REQUEST);

    assert!(lab.lower.set_calls().is_empty());
    assert!(gpt.lower.set_calls().is_empty());
}

#[test]
fn lower_set_failure_leaves_state_unchanged() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    lab.lower.fail_sets(Some(NtStatus::IO_DEVICE_ERROR));

    let (status, _) = lab.device_control(
        &devices[0],
        IoControlCode::DISK_SET_PARTITION_INFO,
        &[0x0c],
        0,
    );

    assert_eq!(status, NtStatus::IO_DEVICE_ERROR);
    assert_eq!(
        devices[0].entry().details.as_mbr().unwrap().partition_type,
        0x07
    );
}

#[test]
fn extended_set_on_gpt_replaces_the_fields() {
    let lab = TestDisk::new(1, two_partition_gpt());
    let devices = lab.enumerate();
    let new = GptPartitionInfo {
        partition_type: Uuid::from_u128(0x0fc63daf_8483_4772_8e79_3d69d8477de4),
        partition_id: Uuid::from_u128(0xdead_beef_0000_1111_2222_333344445555),
        attributes: 0x1000_0000_0000_0000,
        name: GptName::try_from("linux root").unwrap(),
    };

    let (status, _) = lab.device_control(
        &devices[1],
        IoControlCode::DISK_SET_PARTITION_INFO_EX,
        &set_ex_bytes(SetPartitionInformationEx::Gpt(new)),
        0,
    );

    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(
        lab.lower.set_calls(),
        vec![SetCall::Extended {
            on_disk_number: 2,
            info: SetPartitionInformationEx::Gpt(new),
        }]
    );
    assert_eq!(devices[1].entry().details, PartitionDetails::Gpt(new));
}

#[test]
fn extended_set_on_mbr_recomputes_recognition() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, _) = lab.device_control(
        &devices[0],
        IoControlCode::DISK_SET_PARTITION_INFO_EX,
        &set_ex_bytes(SetPartitionInformationEx::Mbr {
            partition_type: 0x83,
        }),
        0,
    );

    assert_eq!(status, NtStatus::SUCCESS);
    let mbr = *devices[0].entry().details.as_mbr().unwrap();
    assert_eq!(mbr.partition_type, 0x83);
    assert!(!mbr.recognized_partition);
}

#[test]
fn extended_set_rejects_short_input_and_style_mismatch() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) = lab.device_control(
        &devices[0],
        IoControlCode::DISK_SET_PARTITION_INFO_EX,
        &[0u8; 119],
        0,
    );
    assert_eq!(status, NtStatus::INFO_LENGTH_MISMATCH);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 120);

    let gpt_request = SetPartitionInformationEx::Gpt(GptPartitionInfo {
        partition_type: Uuid::nil(),
        partition_id: Uuid::nil(),
        attributes: 0,
        name: GptName::EMPTY,
    });
    let (status, _) = lab.device_control(
        &devices[0],
        IoControlCode::DISK_SET_PARTITION_INFO_EX,
        &set_ex_bytes(gpt_request),
        0,
    );
    assert_eq!(status, NtStatus::INVALID_PARAMETER);
    assert!(lab.lower.set_calls().is_empty());
}

#[test]
fn verify_is_rebased_and_forwarded() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let mut input = [0u8; 16];
    VerifyInformation {
        starting_offset: 4096,
        length: 512,
    }
    .encode(&mut input)
    .unwrap();

    let (status, completed) =
        lab.device_control(&devices[1], IoControlCode::DISK_VERIFY, &input, 0);

    assert_eq!(status, NtStatus::SUCCESS);
    assert!(completed.is_none());
    let forwarded = lab.lower.take_forwarded();
    assert_eq!(forwarded.len(), 1);
    let request = VerifyInformation::decode(forwarded[0].input()).unwrap();
    assert_eq!(request.starting_offset, 102 * MIB + 4096);
    assert_eq!(request.length, 512);
}

#[test]
fn verify_needs_a_full_request() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::DISK_VERIFY, &[0u8; 15], 0);

    assert_eq!(status, NtStatus::INFO_LENGTH_MISMATCH);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 16);
    assert_eq!(lab.lower.forwarded_count(), 0);
}

#[test]
fn unknown_codes_are_forwarded_unchanged() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    lab.lower.set_forward_status(NtStatus::PENDING);

    let (status, completed) = lab.device_control(
        &devices[0],
        IoControlCode::DISK_GET_DRIVE_LAYOUT_EX,
        &[1, 2, 3],
        64,
    );

    assert_eq!(status, NtStatus::PENDING);
    assert!(completed.is_none());
    let forwarded = lab.lower.take_forwarded();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].input(), &[1, 2, 3]);
}

#[test]
fn device_name_two_stage_query() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let payload = utf16le_bytes("\\Device\\HarddiskVolume1");
    let required = 2 + payload.len();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::MOUNTDEV_QUERY_DEVICE_NAME, &[], 2);
    assert_eq!(status, NtStatus::BUFFER_TOO_SMALL);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 4);

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::MOUNTDEV_QUERY_DEVICE_NAME, &[], 4);
    assert_eq!(status, NtStatus::BUFFER_TOO_SMALL);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 4);

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::MOUNTDEV_QUERY_DEVICE_NAME, &[], 16);
    assert_eq!(status, NtStatus::BUFFER_OVERFLOW);
    let irp = irp.unwrap();
    assert_eq!(irp.io_status.information.bytes(), required);
    let declared = u16::from_le_bytes([irp.system_buffer[0], irp.system_buffer[1]]);
    assert_eq!(usize::from(declared), payload.len());

    let (status, irp) = lab.device_control(
        &devices[0],
        IoControlCode::MOUNTDEV_QUERY_DEVICE_NAME,
        &[],
        required,
    );
    assert_eq!(status, NtStatus::SUCCESS);
    let irp = irp.unwrap();
    assert_eq!(irp.io_status.information.bytes(), required);
    let (len, name) = decode_mountdev(irp.returned_bytes()).unwrap();
    assert_eq!(usize::from(len), payload.len());
    assert_eq!(name, payload.as_slice());
}

#[test]
fn unique_id_is_the_volume_interface_name() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    lab.pnp(&devices[0], PnpRequest::StartDevice);
    let volume = devices[0]
        .interface_name(partmgr_contracts::InterfaceClass::Volume)
        .unwrap();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::MOUNTDEV_QUERY_UNIQUE_ID, &[], 256);
    assert_eq!(status, NtStatus::SUCCESS);
    let irp = irp.unwrap();
    let (_, id) = decode_mountdev(irp.returned_bytes()).unwrap();
    assert_eq!(id, utf16le_bytes(&volume).as_slice());
}

#[test]
fn unique_id_before_start_is_empty() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::MOUNTDEV_QUERY_UNIQUE_ID, &[], 0);
    assert_eq!(status, NtStatus::BUFFER_TOO_SMALL);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 4);

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::MOUNTDEV_QUERY_UNIQUE_ID, &[], 256);
    assert_eq!(status, NtStatus::SUCCESS);
    let irp = irp.unwrap();
    assert_eq!(irp.io_status.information.bytes(), 2);
    let (len, id) = decode_mountdev(irp.returned_bytes()).unwrap();
    assert_eq!(len, 0);
    assert!(id.is_empty());
}

#[test]
fn length_info() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::DISK_GET_LENGTH_INFO, &[], 8);
    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(decode_u64(irp.unwrap().returned_bytes()).unwrap(), 100 * MIB);

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::DISK_GET_LENGTH_INFO, &[], 7);
    assert_eq!(status, NtStatus::BUFFER_TOO_SMALL);
    assert_eq!(irp.unwrap().io_status.information.bytes(), 8);
}

#[test]
fn gpt_attributes_only_on_gpt() {
    let mut layout = two_partition_gpt();
    if let PartitionDetails::Gpt(gpt) = &mut layout.partitions[0].details {
        gpt.attributes = 0x8000_0000_0000_0001;
    }
    let lab = TestDisk::new(1, layout);
    let devices = lab.enumerate();

    let (status, irp) =
        lab.device_control(&devices[0], IoControlCode::VOLUME_GET_GPT_ATTRIBUTES, &[], 8);
    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(
        decode_u64(irp.unwrap().returned_bytes()).unwrap(),
        0x8000_0000_0000_0001
    );

    let mbr = TestDisk::new(0, two_partition_mbr());
    let mbr_devices = mbr.enumerate();
    let (status, _) = mbr.device_control(
        &mbr_devices[0],
        IoControlCode::VOLUME_GET_GPT_ATTRIBUTES,
        &[],
        8,
    );
    assert_eq!(status, NtStatus::INVALID_DEVICE_REQUEST);
}

#[test]
fn update_properties_rereads_the_layout() {
    let lab = TestDisk::new(0, two_partition_mbr());
    let devices = lab.enumerate();
    let reads = lab.lower.read_count();

    let (status, _) =
        lab.device_control(&devices[0], IoControlCode::DISK_UPDATE_PROPERTIES, &[], 0);
    assert_eq!(status, NtStatus::SUCCESS);
    assert_eq!(lab.lower.read_count(), reads + 1);

    lab.lower.fail_reads(Some(NtStatus::DEVICE_NOT_READY));
    let (status, _) =
        lab.device_control(&devices[0], IoControlCode::DISK_UPDATE_PROPERTIES, &[], 0);
    assert_eq!(status, NtStatus::DEVICE_NOT_READY);
    assert!(lab.disk.cached_layout().is_some());
}
