use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::types::{CameraViewParams, ModuleConfig};

/// Settings file of the reader, in TOML.
///
/// ```toml
/// [camera]
/// view_type = "generic"
/// min_horizontal_resolution = 100
/// max_horizontal_resolution = 400
/// density_ratio = 1.0
///
/// [module]
/// ocr_num_threads = 1
/// det_num_threads = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Camera view passed to `lpmLoadModule`, engine defaults when absent.
    pub camera: Option<CameraViewParams>,
    /// Module configuration passed to `lpmLoadModule`, config files when absent.
    pub module: Option<ModuleConfig>,
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}
