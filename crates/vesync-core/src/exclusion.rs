// ── Device exclusions ──
//
// Filters applied before per-device detail refresh. Type, model, and name
// matches are case-insensitive; `name_patterns` are regular expressions.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::device::DeviceRecord;
use crate::error::CoreError;

/// User-facing exclusion lists, as written in config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusions {
    /// Product categories (`type` on the device record, e.g. `wifi-air`).
    #[serde(default)]
    pub types: Vec<String>,
    /// Model codes (`deviceType`, e.g. `Core300S`).
    #[serde(default)]
    pub models: Vec<String>,
    /// Exact device names.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub name_patterns: Vec<String>,
    /// Device `cid` or `uuid` values.
    #[serde(default)]
    pub ids: Vec<String>,
}

impl Exclusions {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.models.is_empty()
            && self.names.is_empty()
            && self.name_patterns.is_empty()
            && self.ids.is_empty()
    }
}

/// Compiled form of [`Exclusions`].
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    types: Vec<String>,
    models: Vec<String>,
    names: Vec<String>,
    patterns: Vec<Regex>,
    ids: Vec<String>,
}

fn lowered(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

impl ExclusionFilter {
    pub fn compile(exclusions: &Exclusions) -> Result<Self, CoreError> {
        let patterns = exclusions
            .name_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CoreError::config(format!("invalid name pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            types: lowered(&exclusions.types),
            models: lowered(&exclusions.models),
            names: lowered(&exclusions.names),
            patterns,
            ids: exclusions.ids.iter().map(|v| v.trim().to_owned()).collect(),
        })
    }

    pub fn is_excluded(&self, device: &DeviceRecord) -> bool {
        let contains = |list: &[String], value: Option<&str>| {
            value.is_some_and(|v| list.iter().any(|item| *item == v.to_lowercase()))
        };

        if contains(&self.types, device.product_type.as_deref())
            || contains(&self.models, Some(&device.device_type))
            || contains(&self.names, Some(&device.device_name))
        {
            return true;
        }
        if self.patterns.iter().any(|p| p.is_match(&device.device_name)) {
            return true;
        }
        self.ids
            .iter()
            .any(|id| *id == device.cid || device.uuid.as_deref() == Some(id.as_str()))
    }
}
