// src/config/loader.rs
//! Configuration loader layering files and environment overrides

use crate::config::{constants::paths, PostProcessConfig};
use crate::error::PostResult;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Builds a [`PostProcessConfig`] from defaults, TOML files and the environment
///
/// Later sources win: built-in defaults, then each file in order, then
/// `B3D_POST_*` environment variables.
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create new configuration loader with no files
    pub fn new() -> Self {
        Self {
            config_paths: Vec::new(),
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            ..Self::new()
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load and validate the merged configuration
    pub fn load(&self) -> PostResult<PostProcessConfig> {
        let mut builder = Config::builder();
        for path in &self.config_paths {
            debug!(path = %path.display(), "adding configuration file");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }
        builder = builder.add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true));

        let config: PostProcessConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate a configuration file without loading the environment
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> PostResult<()> {
        let content = std::fs::read_to_string(path)?;
        let config: PostProcessConfig = toml::from_str(&content)?;
        config.validate()
    }

    /// Export a configuration to a TOML file
    pub fn export_config<P: AsRef<Path>>(&self, config: &PostProcessConfig, path: P) -> PostResult<()> {
        let toml_content = toml::to_string_pretty(config).map_err(|e| {
            crate::error::PostErrorBuilder::new("config_export").configuration(&e.to_string())
        })?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_toml(contents: &str) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(temp_file, "{}", contents).unwrap();
        temp_file
    }

    #[test]
    fn test_load_default_config() {
        let loader = ConfigLoader::new().with_env_prefix("B3D_POST_TEST_DEFAULTS");
        let config = loader.load().unwrap();
        assert_eq!(config, PostProcessConfig::default());
    }

    #[test]
    fn test_file_layering() {
        let base = temp_toml("clean_up_noise = true\nroot_history_len = 3");
        let local = temp_toml("root_history_len = 8\ntarget_sample_rate_hz = 100");

        let loader = ConfigLoader::with_paths(vec![base.path().to_path_buf(), local.path().to_path_buf()])
            .with_env_prefix("B3D_POST_TEST_LAYERS");
        let config = loader.load().unwrap();

        assert!(config.clean_up_noise);
        assert_eq!(config.root_history_len, 8);
        assert_eq!(config.target_sample_rate_hz, Some(100));
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("B3D_POST_TEST_ENV_ROOT_HISTORY_STRIDE", "4");

        let loader = ConfigLoader::new().with_env_prefix("B3D_POST_TEST_ENV");
        let config = loader.load().unwrap();
        assert_eq!(config.root_history_stride, 4);

        std::env::remove_var("B3D_POST_TEST_ENV_ROOT_HISTORY_STRIDE");
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::new();
        let temp_file = temp_toml("root_history_stride = 0");
        assert!(loader.validate_config_file(temp_file.path()).is_err());

        let temp_file = temp_toml("only_dynamics = true");
        assert!(loader.validate_config_file(temp_file.path()).is_ok());
    }

    #[test]
    fn test_config_export() {
        let loader = ConfigLoader::new();
        let temp_file = NamedTempFile::new().unwrap();
        let config = PostProcessConfig {
            recompute_values: true,
            ..Default::default()
        };

        loader.export_config(&config, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("recompute_values = true"));
    }
}
