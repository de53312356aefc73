// SPDX-License-Identifier: GPL-3.0-only

use std::sync::LazyLock;

use enumflags2::BitFlags;
use serde::Deserialize;
use uuid::Uuid;

use super::{PartitionTypeFlag, PartitionTypeId, PartitionTypeInfo};

// Load TOML data at compile time from the workspace resources directory
const MBR_TOML: &str = include_str!("../../../resources/types/mbr_types.toml");
const GPT_TOML: &str = include_str!("../../../resources/types/gpt_types.toml");

#[derive(Deserialize)]
struct CatalogRecord {
    id: String,
    name: String,
    #[serde(default)]
    flags: Vec<PartitionTypeFlag>,
}

#[derive(Deserialize)]
struct PartitionTypeCatalog {
    types: Vec<CatalogRecord>,
}

fn parse_mbr_code(id: &str) -> Option<u8> {
    let digits = id.strip_prefix("0x").unwrap_or(id);
    u8::from_str_radix(digits, 16).ok()
}

fn load(source: &str, parse_id: impl Fn(&str) -> Option<PartitionTypeId>) -> Vec<PartitionTypeInfo> {
    let Ok(catalog) = toml::from_str::<PartitionTypeCatalog>(source) else {
        return vec![];
    };

    catalog
        .types
        .into_iter()
        .filter_map(|record| {
            Some(PartitionTypeInfo {
                id: parse_id(&record.id)?,
                name: record.name,
                flags: record.flags.into_iter().collect::<BitFlags<_>>(),
            })
        })
        .collect()
}

pub static MBR_TYPES: LazyLock<Vec<PartitionTypeInfo>> =
    LazyLock::new(|| load(MBR_TOML, |id| parse_mbr_code(id).map(PartitionTypeId::Mbr)));

pub static GPT_TYPES: LazyLock<Vec<PartitionTypeInfo>> = LazyLock::new(|| {
    load(GPT_TOML, |id| Uuid::parse_str(id).ok().map(PartitionTypeId::Gpt))
});
