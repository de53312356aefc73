// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use partmgr_contracts::{Irp, LowerDisk, NtStatus};
use partmgr_types::wire::SetPartitionInformationEx;
use partmgr_types::{DriveLayout, PartitionDetails, is_recognized_mbr_type};

/// A partition setter call as it reached the disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetCall {
    Legacy {
        bytes_per_sector: u32,
        on_disk_number: u32,
        partition_type: u8,
    },
    Extended {
        on_disk_number: u32,
        info: SetPartitionInformationEx,
    },
}

#[derive(Debug)]
struct State {
    layout: DriveLayout,
    reads: usize,
    read_failure: Option<NtStatus>,
    set_failure: Option<NtStatus>,
    read_delay: Option<Duration>,
    set_calls: Vec<SetCall>,
    forwarded: Vec<Irp>,
    forward_status: NtStatus,
}

/// Whole disk with a scripted partition table
///
/// Setters write through to the held layout, so the next read reflects them. Forwarded
/// requests are kept, not completed.
#[derive(Debug)]
pub struct FakeLowerDisk {
    state: Mutex<State>,
}

impl FakeLowerDisk {
    pub fn new(layout: DriveLayout) -> Self {
        Self {
            state: Mutex::new(State {
                layout,
                reads: 0,
                read_failure: None,
                set_failure: None,
                read_delay: None,
                set_calls: Vec::new(),
                forwarded: Vec::new(),
                forward_status: NtStatus::SUCCESS,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the table the next read returns
    pub fn set_layout(&self, layout: DriveLayout) {
        self.state().layout = layout;
    }

    pub fn layout(&self) -> DriveLayout {
        self.state().layout.clone()
    }

    pub fn fail_reads(&self, status: Option<NtStatus>) {
        self.state().read_failure = status;
    }

    pub fn fail_sets(&self, status: Option<NtStatus>) {
        self.state().set_failure = status;
    }

    /// Stall every layout read, widening race windows in concurrency tests
    pub fn delay_reads(&self, delay: Option<Duration>) {
        self.state().read_delay = delay;
    }

    pub fn set_forward_status(&self, status: NtStatus) {
        self.state().forward_status = status;
    }

    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    pub fn set_calls(&self) -> Vec<SetCall> {
        self.state().set_calls.clone()
    }

    pub fn take_forwarded(&self) -> Vec<Irp> {
        std::mem::take(&mut self.state().forwarded)
    }

    pub fn forwarded_count(&self) -> usize {
        self.state().forwarded.len()
    }
}

impl LowerDisk for FakeLowerDisk {
    fn read_drive_layout(&self) -> Result<DriveLayout, NtStatus> {
        let delay = {
            let mut state = self.state();
            state.reads += 1;
            if let Some(status) = state.read_failure {
                return Err(status);
            }
            state.read_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(self.state().layout.clone())
    }

    fn set_partition_information(
        &self,
        bytes_per_sector: u32,
        on_disk_number: u32,
        partition_type: u8,
    ) -> Result<(), NtStatus> {
        let mut state = self.state();
        if let Some(status) = state.set_failure {
            return Err(status);
        }
        state.set_calls.push(SetCall::Legacy {
            bytes_per_sector,
            on_disk_number,
            partition_type,
        });
        let index = on_disk_number as usize;
        let Some(PartitionDetails::Mbr(mbr)) = index
            .checked_sub(1)
            .and_then(|i| state.layout.partitions.get_mut(i))
            .map(|entry| &mut entry.details)
        else {
            return Err(NtStatus::INVALID_PARAMETER);
        };
        mbr.partition_type = partition_type;
        mbr.recognized_partition = is_recognized_mbr_type(partition_type);
        Ok(())
    }

    fn set_partition_information_ex(
        &self,
        on_disk_number: u32,
        info: &SetPartitionInformationEx,
    ) -> Result<(), NtStatus> {
        let mut state = self.state();
        if let Some(status) = state.set_failure {
            return Err(status);
        }
        state.set_calls.push(SetCall::Extended {
            on_disk_number,
            info: *info,
        });
        let index = on_disk_number as usize;
        let Some(entry) = index
            .checked_sub(1)
            .and_then(|i| state.layout.partitions.get_mut(i))
        else {
            return Err(NtStatus::INVALID_PARAMETER);
        };
        match (&mut entry.details, info) {
            (PartitionDetails::Mbr(mbr), SetPartitionInformationEx::Mbr { partition_type }) => {
                mbr.partition_type = *partition_type;
                mbr.recognized_partition = is_recognized_mbr_type(*partition_type);
            }
            (PartitionDetails::Gpt(gpt), SetPartitionInformationEx::Gpt(new)) => {
                *gpt = *new;
            }
            _ => return Err(NtStatus::INVALID_PARAMETER),
        }
        Ok(())
    }

    fn call_driver(&self, irp: Irp) -> NtStatus {
        let mut state = self.state();
        let status = state.forward_status;
        state.forwarded.push(irp);
        status
    }
}
