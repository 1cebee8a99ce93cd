//! Bootstrap a NetBox instance with the VRFs and supernet pools the
//! allocator expects, or wipe them again.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use log::info;

use netbox_pools::config_loader::{load_config, EnvOverrides};
use netbox_pools::ipam::NetboxClient;
use netbox_pools::setup;

#[derive(Parser, Debug)]
#[command(name = "netbox-setup")]
#[command(about = "Create the VRFs and pool prefixes used by netbox-pools")]
#[command(version)]
struct Cli {
    /// Path to the configuration YAML file
    #[arg(short, long, default_value = "netbox.yaml")]
    config: PathBuf,

    /// NetBox host and port, overrides the config file and NETBOX_ENDPOINT_ADDR
    #[arg(long)]
    endpoint: Option<String>,

    /// NetBox API token, overrides the config file and NETBOX_APP_ID
    #[arg(long)]
    app_id: Option<String>,

    /// Delete every prefix and VRF instead of creating them
    #[arg(long)]
    destroy_all: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn overrides(&self) -> EnvOverrides {
        let env = EnvOverrides::from_env();
        EnvOverrides {
            app_id: self.app_id.clone().or(env.app_id),
            endpoint: self.endpoint.clone().or(env.endpoint),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let config = load_config(&cli.config, &cli.overrides())?;
    let client = NetboxClient::new(&config.netbox)?;
    client
        .validate_connection()
        .wrap_err_with(|| format!("Could not reach NetBox at {}", config.netbox.base_url()))?;

    if cli.destroy_all {
        let (prefixes, vrfs) = setup::destroy_all(&client)?;
        info!("Removed {} prefixes and {} VRFs", prefixes, vrfs);
        return Ok(());
    }

    let summary = setup::bootstrap(&client, &config.policy.tables())
        .wrap_err("Bootstrap failed, run with --destroy-all to start over")?;
    println!(
        "Created {} VRFs, {} pools and {} other prefixes",
        summary.vrfs, summary.pools, summary.plain_prefixes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::parse_from([
            "netbox-setup",
            "--endpoint", "localhost:32777",
            "--app-id", "token",
            "--destroy-all",
        ]);
        assert!(cli.destroy_all);
        let overrides = cli.overrides();
        assert_eq!(overrides.endpoint.as_deref(), Some("localhost:32777"));
        assert_eq!(overrides.app_id.as_deref(), Some("token"));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["netbox-setup"]);
        assert!(!cli.destroy_all);
        assert_eq!(cli.config, PathBuf::from("netbox.yaml"));
    }
}
