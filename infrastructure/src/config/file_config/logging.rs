//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Also write trace output to this file (non-blocking)
    pub file: Option<PathBuf>,
    /// Filter directive used when neither `RUST_LOG` nor `-v` is given
    pub level: Option<String>,
}
