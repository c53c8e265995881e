//! Configuration file loading for taskforge
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `TASKFORGE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./taskforge.toml` or `./.taskforge.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/taskforge/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileCoordinatorConfig, FileLlmConfig, FileLoggingConfig,
    FileOutputConfig, FileOutputFormat, FilePublisherConfig, FileRateLimitConfig,
    FileStrategyConfig,
};
pub use loader::ConfigLoader;
