// SPDX-License-Identifier: GPL-3.0-only

//! Partition manager
//!
//! Sits on top of a whole-disk device, exposes every partition of the disk's layout as
//! its own device, and answers the PnP and device-control requests sent to those
//! devices:
//!
//! - [`DiskFdo`] owns the layout cache, the partition list and the per-disk layout lock
//! - [`PartitionDevice`] is one published partition and its PnP lifecycle
//! - [`DeviceExtension`] routes incoming requests to the disk or to a partition
//!
//! Host services (device objects, symbolic links, device interfaces, request completion)
//! and the lower disk are reached only through the traits in `partmgr_contracts`.

pub mod config;
pub mod disk;
pub mod dispatch;
pub mod logging;
pub mod naming;
pub mod partition;

pub use config::{LoggingConfig, LoggingLevel, PartMgrConfig};
pub use disk::{DiskData, DiskFdo, LayoutGuard};
pub use dispatch::DeviceExtension;
pub use naming::VolumeSequence;
pub use partition::{DeviceFlag, Lifecycle, PartitionDevice};
