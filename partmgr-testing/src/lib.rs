// SPDX-License-Identifier: GPL-3.0-only

//! Test support for the partition manager
//!
//! In-memory stand-ins for the host services and the lower disk, TOML disk fixtures,
//! and the lab run behind the `partmgr-lab` binary.

pub mod errors;
pub mod fake;
pub mod fixtures;
pub mod harness;
pub mod lab;
pub mod spec;
