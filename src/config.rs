use crate::policy::PolicyTables;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings for the NetBox API
    #[serde(default)]
    pub netbox: NetboxConfig,
    /// (Optional) Overrides for the built-in allocation policy
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// URL scheme used to reach NetBox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// NetBox connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetboxConfig {
    /// Host and optional port, e.g. "localhost:32777". A full URL is accepted too.
    #[serde(default)]
    pub endpoint: String,
    /// API token created in the NetBox console
    #[serde(default)]
    pub app_id: String,
    /// (Optional) URL scheme when `endpoint` has none (default: http)
    #[serde(default)]
    pub scheme: Scheme,
    /// (Optional) Per-request timeout (default: 30s)
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for NetboxConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            app_id: String::new(),
            scheme: Scheme::default(),
            timeout: default_timeout(),
        }
    }
}

impl NetboxConfig {
    /// Base URL without a trailing slash or `/api` suffix
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let endpoint = endpoint.strip_suffix("/api").unwrap_or(endpoint);
        if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("{}://{}", self.scheme.as_str(), endpoint)
        }
    }
}

/// Policy overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// (Optional) Resource type to ordered supernet pools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supernets: Option<BTreeMap<String, Vec<Ipv4Net>>>,
}

/// Configuration problems
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid netbox configuration: {0}")]
    InvalidNetbox(String),
    #[error("Invalid policy configuration: {0}")]
    InvalidPolicy(String),
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.netbox.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidNetbox(
                "endpoint cannot be empty (set netbox.endpoint or NETBOX_ENDPOINT_ADDR)".to_string(),
            ));
        }
        if self.netbox.app_id.trim().is_empty() {
            return Err(ConfigError::InvalidNetbox(
                "app_id cannot be empty (set netbox.app_id or NETBOX_APP_ID)".to_string(),
            ));
        }
        self.policy.validate()
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(supernets) = &self.supernets else {
            return Ok(());
        };
        if supernets.is_empty() {
            return Err(ConfigError::InvalidPolicy(
                "supernets cannot be an empty map".to_string(),
            ));
        }
        for (resource_type, pools) in supernets {
            if resource_type.is_empty() || resource_type.to_lowercase() != *resource_type {
                return Err(ConfigError::InvalidPolicy(format!(
                    "resource type '{}' must be non-empty and lower case",
                    resource_type
                )));
            }
            if pools.is_empty() {
                return Err(ConfigError::InvalidPolicy(format!(
                    "resource type '{}' has no pools",
                    resource_type
                )));
            }
        }
        Ok(())
    }

    /// Build the policy tables once, at startup
    pub fn tables(&self) -> PolicyTables {
        match &self.supernets {
            Some(supernets) => PolicyTables::with_supernets(supernets.clone()),
            None => PolicyTables::standard(),
        }
    }
}
