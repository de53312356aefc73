// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use partmgr::PartMgrConfig;
use partmgr_testing::lab::{self, LabOptions, LabReport};
use partmgr_testing::spec;

#[derive(Debug, Parser)]
#[command(name = "partmgr-lab")]
#[command(about = "Run a fixture disk through the partition manager")]
struct LabCli {
    /// Fixture name under resources/disk-specs, or a path to a fixture file
    fixture: String,
    /// Partition manager configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Remove every partition afterwards and report leftovers
    #[arg(long)]
    remove: bool,
}

fn print_table(report: &LabReport) {
    println!("disk {} ({})", report.disk, report.style);
    println!(
        "{:<4} {:<4} {:<26} {:<28} {:>12} {:>12}  type",
        "det", "disk", "device", "symlink", "offset", "length"
    );
    for p in &report.partitions {
        println!(
            "{:<4} {:<4} {:<26} {:<28} {:>12} {:>12}  {}",
            p.detected_number,
            p.on_disk_number,
            p.device_name,
            p.symlink,
            p.starting_offset,
            p.partition_length,
            p.partition_type
        );
        println!("     instance {}", p.instance_id);
        println!("     unique   {}", p.unique_id);
    }
    if !report.leftover_symlinks.is_empty() || !report.leftover_interfaces.is_empty() {
        println!("leftover symlinks: {:?}", report.leftover_symlinks);
        println!("leftover interfaces: {:?}", report.leftover_interfaces);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = LabCli::parse();

    let config = match &cli.config {
        Some(path) => PartMgrConfig::load(path)?,
        None => PartMgrConfig::default(),
    };
    partmgr::logging::init(&config.logging)?;

    let path = PathBuf::from(&cli.fixture);
    let disk = if path.extension().is_some_and(|ext| ext == "toml") {
        spec::load_path(&path)
    } else {
        spec::load_by_name(&cli.fixture)
    }
    .with_context(|| format!("failed to load fixture {}", cli.fixture))?;

    let report = lab::run(&disk, &config, LabOptions { remove: cli.remove })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }
    Ok(())
}
