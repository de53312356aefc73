// SPDX-License-Identifier: GPL-3.0-only

use partmgr::PartMgrConfig;
use partmgr_testing::errors::TestingError;
use partmgr_testing::lab::{self, LabOptions};
use partmgr_testing::spec;

#[test]
fn mbr_fixture_round_trips_through_the_lab() {
    let disk = spec::load_by_name("mbr_basic").unwrap();

    let report = lab::run(&disk, &PartMgrConfig::default(), LabOptions { remove: true }).unwrap();

    assert_eq!(report.style, "mbr");
    assert_eq!(report.partitions.len(), 2);
    let first = &report.partitions[0];
    assert_eq!(first.device_name, "\\Device\\HarddiskVolume1");
    assert_eq!(first.symlink, "\\Device\\Harddisk0\\Partition1");
    assert_eq!(first.on_disk_number, 1);
    assert!(first.partition_type.starts_with("0x07"));
    assert!(first.instance_id.starts_with('S'));
    assert!(first.unique_id.contains("STORAGE#Volume#"));
    assert_eq!(report.partitions[1].detected_number, 2);
    assert_eq!(report.partitions[1].on_disk_number, 5);

    assert!(report.leftover_symlinks.is_empty());
    assert!(report.leftover_interfaces.is_empty());
}

#[test]
fn gpt_fixture_reports_catalog_names() {
    let disk = spec::load_by_name("gpt_basic").unwrap();
    let config = PartMgrConfig::from_toml_str("first_volume_number = 40").unwrap();

    let report = lab::run(&disk, &config, LabOptions::default()).unwrap();

    assert_eq!(report.style, "gpt");
    let names: Vec<_> = report.partitions.iter().map(|p| p.device_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "\\Device\\HarddiskVolume40",
            "\\Device\\HarddiskVolume41",
            "\\Device\\HarddiskVolume42",
        ]
    );
    assert_eq!(report.partitions[0].partition_type, "EFI System");
    assert!(
        report.partitions[2]
            .instance_id
            .starts_with("Sa1b2c3d4-e5f6-0718-293a-4b5c6d7e8f90S_")
    );
}

#[test]
fn report_serializes_for_the_cli() {
    let disk = spec::load_by_name("gpt_basic").unwrap();
    let report = lab::run(&disk, &PartMgrConfig::default(), LabOptions::default()).unwrap();

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["disk"], "gpt_basic");
    assert_eq!(json["partitions"].as_array().unwrap().len(), 3);
    assert_eq!(json["partitions"][1]["starting_offset"], 105_906_176u64);
}

#[test]
fn unknown_fixture_is_reported() {
    let err = spec::load_by_name("no_such_disk").unwrap_err();

    assert!(matches!(err, TestingError::SpecNotFound { spec_name } if spec_name == "no_such_disk"));
}
