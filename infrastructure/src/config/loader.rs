//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "taskforge";
const PROJECT_FILES: [&str; 2] = ["taskforge.toml", ".taskforge.toml"];
const ENV_PREFIX: &str = "TASKFORGE_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `TASKFORGE_`-prefixed environment variables (`__` separates sections,
    ///    e.g. `TASKFORGE_COORDINATOR__WORKER_POOL_SIZE=8`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./taskforge.toml` or `./.taskforge.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/taskforge/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(project_path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&project_path));
        }

        figment = Self::with_explicit(figment, config_path);
        figment.extract().map_err(Box::new)
    }

    /// Defaults, then `path`, then the environment; no discovery.
    pub fn load_file(path: &Path) -> Result<FileConfig, Box<figment::Error>> {
        let figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        Self::with_explicit(figment, Some(path))
            .extract()
            .map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn with_explicit(figment: Figment, config_path: Option<&Path>) -> Figment {
        let figment = match config_path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/taskforge/config.toml if set,
    /// otherwise falls back to ~/.config/taskforge/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for `--show-config`)
    pub fn config_sources() -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];
        lines.push(format!("  [ENV  ] {}*", ENV_PREFIX));

        match Self::project_config_path() {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push(format!(
                "  [     ] Project: ./{} or ./{}",
                PROJECT_FILES[0], PROJECT_FILES[1]
            )),
        }

        if let Some(path) = Self::global_config_path() {
            let marker = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", marker, path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.coordinator.worker_pool_size, 4);
        assert_eq!(config.rate_limit.max_executions, 10);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("taskforge"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[coordinator]
worker_pool_size = 2

[publisher]
backoff_ms = [1, 2, 3]
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(config.coordinator.worker_pool_size, 2);
        assert_eq!(config.publisher.backoff_ms, vec![1, 2, 3]);
        // untouched sections keep defaults
        assert_eq!(config.coordinator.queue_capacity, 256);
        assert_eq!(config.strategy.iterative_rounds, 3);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[coordinator]\nworker_pool_size = \"many\"\n").unwrap();

        assert!(ConfigLoader::load_file(&path).is_err());
    }

    #[test]
    fn test_config_sources_lists_every_layer() {
        let lines = ConfigLoader::config_sources();
        assert!(lines.iter().any(|l| l.contains("TASKFORGE_")));
        assert!(lines.iter().any(|l| l.contains("Default")));
    }
}
