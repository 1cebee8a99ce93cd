use crate::config::{Config, ConfigError};
use log::{debug, info};
use std::fs::File;
use std::path::Path;

/// Environment variable supplying the NetBox API token
pub const APP_ID_ENV: &str = "NETBOX_APP_ID";
/// Environment variable supplying the NetBox endpoint
pub const ENDPOINT_ENV: &str = "NETBOX_ENDPOINT_ADDR";

/// Values taken from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub app_id: Option<String>,
    pub endpoint: Option<String>,
}

impl EnvOverrides {
    /// Read the overrides from the process environment
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            app_id: non_empty(APP_ID_ENV),
            endpoint: non_empty(ENDPOINT_ENV),
        }
    }
}

/// Parse configuration from a YAML file without validating it
pub fn read_config(config_path: &Path) -> Result<Config, ConfigError> {
    info!("Loading configuration from: {:?}", config_path);
    let file = File::open(config_path).map_err(|source| ConfigError::Io {
        path: config_path.display().to_string(),
        source,
    })?;
    serde_yaml::from_reader(file).map_err(|source| ConfigError::Parse {
        path: config_path.display().to_string(),
        source,
    })
}

/// Apply environment overrides to a configuration
pub fn apply_env_overrides(config: &mut Config, overrides: &EnvOverrides) {
    if let Some(app_id) = &overrides.app_id {
        debug!("Using NetBox app_id from {}", APP_ID_ENV);
        config.netbox.app_id = app_id.clone();
    }
    if let Some(endpoint) = &overrides.endpoint {
        debug!("Using NetBox endpoint {} from {}", endpoint, ENDPOINT_ENV);
        config.netbox.endpoint = endpoint.clone();
    }
}

/// Load, override and validate the configuration.
///
/// A missing file is not an error when the environment supplies everything
/// needed to reach NetBox.
pub fn load_config(config_path: &Path, overrides: &EnvOverrides) -> Result<Config, ConfigError> {
    let mut config = if config_path.exists() {
        read_config(config_path)?
    } else {
        info!("Configuration file {:?} not found, using defaults and environment", config_path);
        Config::default()
    };

    apply_env_overrides(&mut config, overrides);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_file() {
        let yaml = r#"
netbox:
  endpoint: "localhost:32777"
  app_id: "from-file"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path(), &EnvOverrides::default()).unwrap();
        assert_eq!(config.netbox.endpoint, "localhost:32777");
        assert_eq!(config.netbox.app_id, "from-file");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "netbox:\n  endpoint: a\n  app_id: b\n").unwrap();

        let overrides = EnvOverrides {
            app_id: Some("token".to_string()),
            endpoint: None,
        };
        let config = load_config(temp_file.path(), &overrides).unwrap();
        assert_eq!(config.netbox.endpoint, "a");
        assert_eq!(config.netbox.app_id, "token");
    }

    #[test]
    fn test_missing_file_with_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        assert!(load_config(&path, &EnvOverrides::default()).is_err());

        let overrides = EnvOverrides {
            app_id: Some("token".to_string()),
            endpoint: Some("netbox:8000".to_string()),
        };
        let config = load_config(&path, &overrides).unwrap();
        assert_eq!(config.netbox.base_url(), "http://netbox:8000");
    }

    #[test]
    fn test_malformed_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "netbox: [not, a, map").unwrap();
        assert!(matches!(
            load_config(temp_file.path(), &EnvOverrides::default()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
