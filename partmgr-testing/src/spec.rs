// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use partmgr::DiskData;
use partmgr_types::{
    DiskIdentity, DriveLayout, GptName, GptPartitionInfo, MbrPartitionInfo, PartitionDetails,
    PartitionEntry, PartitionStyle, is_recognized_mbr_type,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, TestingError};

/// A disk fixture: geometry, identity and partition table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSpec {
    pub name: String,
    pub style: PartitionStyle,
    #[serde(default)]
    pub device_number: u32,
    #[serde(default = "default_bytes_per_sector")]
    pub bytes_per_sector: u32,
    pub disk_size: u64,
    /// MBR disk signature, hex
    pub signature: Option<String>,
    pub disk_id: Option<Uuid>,
    #[serde(default)]
    pub partitions: Vec<PartitionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub start: u64,
    pub length: u64,
    /// MBR type byte in hex, or GPT type GUID
    pub r#type: String,
    pub id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: u64,
    #[serde(default)]
    pub boot: bool,
}

fn default_bytes_per_sector() -> u32 {
    512
}

fn invalid(spec_name: &str, reason: impl Into<String>) -> TestingError {
    TestingError::SpecInvalid {
        spec_name: spec_name.to_string(),
        reason: reason.into(),
    }
}

fn parse_hex_u32(raw: &str) -> Option<u32> {
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).ok()
}

impl DiskSpec {
    pub fn disk_identity(&self) -> Result<DiskIdentity> {
        match self.style {
            PartitionStyle::Mbr => {
                let raw = self
                    .signature
                    .as_deref()
                    .ok_or_else(|| invalid(&self.name, "mbr disks need a signature"))?;
                let signature = parse_hex_u32(raw)
                    .ok_or_else(|| invalid(&self.name, format!("bad signature '{raw}'")))?;
                Ok(DiskIdentity::Mbr { signature })
            }
            PartitionStyle::Gpt => {
                let disk_id = self
                    .disk_id
                    .ok_or_else(|| invalid(&self.name, "gpt disks need a disk_id"))?;
                Ok(DiskIdentity::Gpt { disk_id })
            }
            PartitionStyle::Raw => Ok(DiskIdentity::Raw),
        }
    }

    pub fn disk_data(&self) -> Result<DiskData> {
        Ok(DiskData {
            disk_size: self.disk_size,
            device_number: self.device_number,
            bytes_per_sector: self.bytes_per_sector,
            identity: self.disk_identity()?,
        })
    }

    pub fn drive_layout(&self) -> Result<DriveLayout> {
        let partitions = self
            .partitions
            .iter()
            .map(|p| self.entry(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(DriveLayout {
            identity: self.disk_identity()?,
            partitions,
        })
    }

    fn entry(&self, spec: &PartitionSpec) -> Result<PartitionEntry> {
        let details = match self.style {
            PartitionStyle::Mbr => {
                let partition_type = u8::from_str_radix(
                    spec.r#type.trim_start_matches("0x"),
                    16,
                )
                .map_err(|_| invalid(&self.name, format!("bad mbr type '{}'", spec.r#type)))?;
                let hidden_sectors = spec.start / u64::from(self.bytes_per_sector.max(1));
                PartitionDetails::Mbr(MbrPartitionInfo {
                    partition_type,
                    boot_indicator: spec.boot,
                    recognized_partition: is_recognized_mbr_type(partition_type),
                    hidden_sectors: u32::try_from(hidden_sectors)
                        .map_err(|_| invalid(&self.name, "partition start beyond 2 TiB"))?,
                })
            }
            PartitionStyle::Gpt => {
                let partition_type = Uuid::parse_str(&spec.r#type).map_err(|_| {
                    invalid(&self.name, format!("bad gpt type '{}'", spec.r#type))
                })?;
                let name = match spec.name.as_deref() {
                    Some(name) => GptName::try_from(name)
                        .map_err(|e| invalid(&self.name, e.to_string()))?,
                    None => GptName::EMPTY,
                };
                PartitionDetails::Gpt(GptPartitionInfo {
                    partition_type,
                    partition_id: spec.id.unwrap_or_else(Uuid::new_v4),
                    attributes: spec.attributes,
                    name,
                })
            }
            PartitionStyle::Raw => {
                return Err(invalid(&self.name, "raw disks have no partitions"));
            }
        };
        Ok(PartitionEntry {
            starting_offset: spec.start,
            partition_length: spec.length,
            partition_number: 0,
            rewrite_partition: false,
            details,
        })
    }
}

pub fn workspace_root() -> PathBuf {
    if let Ok(value) = std::env::var("PARTMGR_TESTING_WORKSPACE_ROOT") {
        return PathBuf::from(value);
    }

    if let Ok(current_dir) = std::env::current_dir()
        && current_dir.join("resources/disk-specs").exists()
    {
        return current_dir;
    }

    let manifest_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    if manifest_root.join("resources/disk-specs").exists() {
        return manifest_root;
    }

    PathBuf::from(".")
}

pub fn specs_root() -> PathBuf {
    workspace_root().join("resources/disk-specs")
}

pub fn spec_path_for_name(spec_name: &str) -> PathBuf {
    specs_root().join(format!("{spec_name}.toml"))
}

pub fn load_by_name(spec_name: &str) -> Result<DiskSpec> {
    let path = spec_path_for_name(spec_name);
    if !path.exists() {
        return Err(TestingError::SpecNotFound {
            spec_name: spec_name.to_string(),
        });
    }
    load_path(&path)
}

pub fn load_path(path: &Path) -> Result<DiskSpec> {
    let spec_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let raw = fs::read_to_string(path).map_err(|error| invalid(&spec_name, error.to_string()))?;
    let spec: DiskSpec =
        toml::from_str(&raw).map_err(|error| invalid(&spec_name, error.to_string()))?;

    validate(&spec)?;
    Ok(spec)
}

pub fn validate(spec: &DiskSpec) -> Result<()> {
    if spec.name.is_empty() {
        return Err(invalid("<unknown>", "name must not be empty"));
    }

    if spec.bytes_per_sector == 0 {
        return Err(invalid(&spec.name, "bytes_per_sector must not be zero"));
    }

    if spec.style == PartitionStyle::Raw && !spec.partitions.is_empty() {
        return Err(invalid(&spec.name, "raw disks have no partitions"));
    }

    for partition in &spec.partitions {
        let end = partition.start.saturating_add(partition.length);
        if end > spec.disk_size {
            return Err(invalid(
                &spec.name,
                format!("partition at {} ends past the disk", partition.start),
            ));
        }
    }

    spec.drive_layout().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_spec_name_without_extension() {
        let spec = load_by_name("mbr_basic").unwrap();
        assert_eq!(spec.name, "mbr_basic");
        assert_eq!(spec.style, PartitionStyle::Mbr);
    }

    #[test]
    fn missing_spec_is_reported() {
        assert!(matches!(
            load_by_name("no-such-disk"),
            Err(TestingError::SpecNotFound { .. })
        ));
    }

    #[test]
    fn mbr_spec_requires_signature() {
        let spec: DiskSpec = toml::from_str(
            r#"
            name = "unsigned"
            style = "mbr"
            disk_size = 1048576
            "#,
        )
        .unwrap();
        assert!(matches!(
            validate(&spec),
            Err(TestingError::SpecInvalid { .. })
        ));
    }
}
