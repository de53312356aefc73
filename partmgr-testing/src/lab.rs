// SPDX-License-Identifier: GPL-3.0-only

//! Drive one fixture disk through enumerate, start, query and remove

use std::sync::Arc;

use partmgr::{PartMgrConfig, PartitionDevice};
use partmgr_contracts::{BusQueryIdType, Irp, NtStatus, PnpRequest};
use partmgr_types::wire::{decode_mountdev, decode_partition_information_ex};
use partmgr_types::{IoControlCode, PartitionDetails, find_gpt_type, find_mbr_type};
use serde::Serialize;
use tracing::info;

use crate::errors::{Result, TestingError};
use crate::harness::TestDisk;
use crate::spec::DiskSpec;

#[derive(Debug, Clone, Copy, Default)]
pub struct LabOptions {
    /// Remove and delete every partition after querying it
    pub remove: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub device_name: String,
    pub symlink: String,
    pub detected_number: u32,
    pub on_disk_number: u32,
    pub starting_offset: u64,
    pub partition_length: u64,
    pub partition_type: String,
    pub instance_id: String,
    pub unique_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabReport {
    pub disk: String,
    pub style: String,
    pub partitions: Vec<PartitionReport>,
    /// Symbolic links still present after teardown
    pub leftover_symlinks: Vec<String>,
    /// Interfaces still enabled after teardown
    pub leftover_interfaces: Vec<String>,
}

fn step_failed(step: &str, reason: impl std::fmt::Display) -> TestingError {
    TestingError::LabStepFailed {
        step: step.to_string(),
        reason: reason.to_string(),
    }
}

fn expect_success(step: &str, status: NtStatus) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(step_failed(step, status))
    }
}

fn type_label(details: &PartitionDetails) -> String {
    match details {
        PartitionDetails::Mbr(mbr) => match find_mbr_type(mbr.partition_type) {
            Some(info) => format!("{:#04x} ({})", mbr.partition_type, info.name),
            None => format!("{:#04x}", mbr.partition_type),
        },
        PartitionDetails::Gpt(gpt) => match find_gpt_type(&gpt.partition_type) {
            Some(info) => info.name.clone(),
            None => gpt.partition_type.to_string(),
        },
    }
}

fn mountdev_string(irp: &Irp) -> Result<String> {
    let (_, payload) =
        decode_mountdev(irp.returned_bytes()).map_err(|e| step_failed("mountdev", e))?;
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

fn query_partition(lab: &TestDisk, partition: &Arc<PartitionDevice>) -> Result<PartitionReport> {
    let (status, irp) = lab.device_control(
        partition,
        IoControlCode::DISK_GET_PARTITION_INFO_EX,
        &[],
        256,
    );
    expect_success("get partition info", status)?;
    let irp = irp.ok_or_else(|| step_failed("get partition info", "request not completed"))?;
    let entry = decode_partition_information_ex(irp.returned_bytes())
        .map_err(|e| step_failed("get partition info", e))?;

    let (status, irp) = lab.device_control(
        partition,
        IoControlCode::MOUNTDEV_QUERY_UNIQUE_ID,
        &[],
        512,
    );
    expect_success("query unique id", status)?;
    let irp = irp.ok_or_else(|| step_failed("query unique id", "request not completed"))?;
    let unique_id = mountdev_string(&irp)?;

    let (status, irp) = lab.pnp(partition, PnpRequest::QueryId(BusQueryIdType::InstanceId));
    expect_success("query instance id", status)?;
    let instance_id = irp.io_status.information.id().unwrap_or_default().to_string();

    Ok(PartitionReport {
        device_name: partition.device_name().to_string(),
        symlink: partmgr::naming::partition_symlink_name(
            lab.disk.device_number(),
            partition.detected_number(),
        ),
        detected_number: entry.partition_number,
        on_disk_number: partition.on_disk_number(),
        starting_offset: entry.starting_offset,
        partition_length: entry.partition_length,
        partition_type: type_label(&entry.details),
        instance_id,
        unique_id,
    })
}

pub fn run(spec: &DiskSpec, config: &PartMgrConfig, options: LabOptions) -> Result<LabReport> {
    let lab = TestDisk::from_parts(
        spec.disk_data()?,
        spec.drive_layout()?,
        Arc::new(config.volume_sequence()),
    );

    let partitions = lab
        .disk
        .enumerate_partitions()
        .map_err(|e| step_failed("enumerate", e))?;
    info!(disk = %spec.name, count = partitions.len(), "lab disk enumerated");

    let mut reports = Vec::with_capacity(partitions.len());
    for partition in &partitions {
        let (status, _) = lab.pnp(partition, PnpRequest::StartDevice);
        expect_success("start", status)?;
        reports.push(query_partition(&lab, partition)?);
    }

    if options.remove {
        for partition in &partitions {
            let (status, _) = lab.pnp(partition, PnpRequest::RemoveDevice);
            expect_success("remove", status)?;
            lab.disk
                .delete_partition_device(partition)
                .map_err(|e| step_failed("delete", e))?;
        }
    }

    Ok(LabReport {
        disk: spec.name.clone(),
        style: lab.style().to_string(),
        partitions: reports,
        leftover_symlinks: if options.remove {
            lab.services.symlinks().into_keys().collect()
        } else {
            Vec::new()
        },
        leftover_interfaces: if options.remove {
            lab.services.enabled_interfaces()
        } else {
            Vec::new()
        },
    })
}
