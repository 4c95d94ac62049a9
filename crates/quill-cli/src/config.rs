//! CLI configuration file.
//!
//! Looked up at `--config` or `<config dir>/quill/config.toml`:
//!
//! ```toml
//! [controller]
//! on_disconnect = "preserve"
//! on_interrupt = "clear"
//!
//! [engine]
//! program = "maxima-quill"
//! args = ["--very-quiet"]
//! command_terminator = ";"
//!
//! [engine.markers]
//! done = "<<done>>"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use quill_core::ControllerConfig;
use quill_engine::EngineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub controller: ControllerConfig,
    pub engine: EngineConfig,
}

impl QuillConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("quill").join("config.toml"))
    }

    /// Load the config.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&source).with_context(|| format!("Invalid config {}", path.display()))
    }
}
