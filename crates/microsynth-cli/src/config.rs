//! Configuration file loading for the CLI
//!
//! This module handles finding and loading TOML configuration files
//! from various locations (explicit path, local directory, system directory).

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use microsynth::{MicrosynthError, config::EditorConfig};

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

impl From<ConfigError> for MicrosynthError {
    fn from(err: ConfigError) -> Self {
        MicrosynthError::Config(err.to_string())
    }
}

/// Find and load configuration from various locations
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Local project directory (microsynth/config.toml)
/// 3. Platform-specific config directory
/// 4. Default config if none found
///
/// The loaded configuration is validated before it is returned.
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed
/// - A setting is out of range
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<EditorConfig, MicrosynthError> {
    let config = find_config(explicit_path)?;
    config.validate()?;
    Ok(config)
}

fn find_config(explicit_path: Option<impl AsRef<Path>>) -> Result<EditorConfig, MicrosynthError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new("microsynth/config.toml");
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "microsynth", "microsynth") {
        let system_config = proj_dirs.config_dir().join("config.toml");

        if system_config.exists() {
            info!(path = system_config.display().to_string(); "Loading configuration from system path");
            return load_config_file(system_config);
        }

        debug!(path = system_config.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(EditorConfig::default())
}

/// Load configuration from a TOML file
fn load_config_file(path: impl AsRef<Path>) -> Result<EditorConfig, MicrosynthError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;
    let config: EditorConfig =
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_explicit_path() {
        let file = config_file(
            r#"
            [graph]
            loop_connections_enabled = true

            [layout]
            transition_ms = 0
            "#,
        );

        let config = load_config(Some(file.path())).unwrap();
        assert!(config.graph().loop_connections_enabled());
        assert_eq!(config.layout().transition_ms(), 0);
        assert_eq!(config.routing().bend_offset(), 20.0);
    }

    #[test]
    fn test_missing_explicit_path() {
        let result = load_config(Some("does/not/exist.toml"));
        assert!(matches!(result, Err(MicrosynthError::Config(msg)) if msg.contains("Missing")));
    }

    #[test]
    fn test_invalid_toml() {
        let file = config_file("[layout\nnode_spacing = ");
        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(MicrosynthError::Config(msg)) if msg.contains("TOML")));
    }

    #[test]
    fn test_out_of_range_setting() {
        let file = config_file("[layout]\nzoom_factor = 3.0\n");
        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(MicrosynthError::Config(msg)) if msg.contains("zoom_factor")));
    }
}
