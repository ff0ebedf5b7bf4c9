/*
Caller configuration.

    MapObjectOptions: what the caller supplied, every field optional,
    readable from TOON (`mapping_options.toon`).

    MapConfig: the resolved configuration the engine runs with; every field
    not supplied keeps its default.
*/
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use crate::core::enumerate::{NameMatcher, PropertyFilter};
use crate::core::types::KeyInspector;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mapping options: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Omit members whose read faults instead of recording them as INACCESSIBLE.
    pub ignore_inaccessible: bool,
    pub key_inspector: KeyInspector,
    /// Container members found at this level or deeper are not expanded.
    /// `Some(0)` is a real ceiling that cuts the root's container members; use `None` for no limit.
    pub max_depth: Option<u32>,
    /// Omit members cut by `max_depth` instead of recording MAX DEPTH REACHED.
    pub ignore_levels_beyond_max_depth: bool,
    pub property_filter: Option<PropertyFilter>,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            ignore_inaccessible: true,
            key_inspector: KeyInspector::Simple,
            max_depth: None,
            ignore_levels_beyond_max_depth: false,
            property_filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MapObjectOptions {
    #[serde(default)]
    pub ignore_inaccessible: Option<bool>,
    #[serde(default)]
    pub key_inspector: Option<KeyInspector>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub ignore_levels_beyond_max_depth: Option<bool>,
    #[serde(default)]
    pub property_filter: Option<PropertyFilter>,
}

impl MapObjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_inaccessible(mut self, ignore: bool) -> Self {
        self.ignore_inaccessible = Some(ignore);
        self
    }

    pub fn key_inspector(mut self, inspector: KeyInspector) -> Self {
        self.key_inspector = Some(inspector);
        self
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn ignore_levels_beyond_max_depth(mut self, ignore: bool) -> Self {
        self.ignore_levels_beyond_max_depth = Some(ignore);
        self
    }

    pub fn property_filter(mut self, filter: PropertyFilter) -> Self {
        self.property_filter = Some(filter);
        self
    }

    /// Field-by-field merge over the defaults.
    pub fn resolve(&self) -> MapConfig {
        self.merge_over(MapConfig::default())
    }

    pub fn merge_over(&self, base: MapConfig) -> MapConfig {
        MapConfig {
            ignore_inaccessible: self.ignore_inaccessible.unwrap_or(base.ignore_inaccessible),
            key_inspector: self.key_inspector.unwrap_or(base.key_inspector),
            max_depth: self.max_depth.or(base.max_depth),
            ignore_levels_beyond_max_depth: self
                .ignore_levels_beyond_max_depth
                .unwrap_or(base.ignore_levels_beyond_max_depth),
            property_filter: self.property_filter.clone().or(base.property_filter),
        }
    }

    pub fn from_toon(text: &str) -> Result<Self, ConfigError> {
        toon_format::decode_default::<Self>(text).map_err(|e| ConfigError::Decode(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toon(&text)
    }
}
