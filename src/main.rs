use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use netbox_pools::config_loader::{load_config, read_config, EnvOverrides};
use netbox_pools::ipam::NetboxClient;
use netbox_pools::lifecycle::{self, PrefixSpec, Provider, StateStore};
use netbox_pools::policy::{are_resource_and_env_valid, PolicyTables};
use netbox_pools::tags::parse_tag_arg;
use std::fs;
use std::path::{Path, PathBuf};

/// Allocate and track a NetBox prefix from the policy-selected supernet pools
#[derive(Parser, Debug)]
#[command(name = "netbox-pools", author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration YAML file
    #[arg(short, long, default_value = "netbox.yaml")]
    config: PathBuf,

    /// Path to the allocation state file
    #[arg(short, long, default_value = "prefix.state.json")]
    state: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what apply would do, without touching NetBox
    Plan(SpecArgs),

    /// Create, re-tag or replace the allocation to match the desired state
    Apply(SpecArgs),

    /// Re-read the allocation from NetBox and update the state file
    Refresh,

    /// Release the allocation and clear the state file
    Destroy,

    /// Print the recorded allocation
    Show,

    /// Print the VRF and candidate pools for a request (no network)
    Resolve {
        /// Resource type, e.g. core, depot, edge, servicedelivery, vpn
        #[arg(long)]
        resource_type: String,

        /// Deployment environment, e.g. prod, prod1, staging, sandbox
        #[arg(long)]
        environment: String,
    },
}

#[derive(clap::Args, Debug, Default)]
struct SpecArgs {
    /// YAML file with resource_type, environment, prefix_length and tags
    #[arg(long, conflicts_with_all = ["resource_type", "environment", "prefix_length"])]
    spec: Option<PathBuf>,

    /// Resource type the prefix is for
    #[arg(long)]
    resource_type: Option<String>,

    /// Deployment environment
    #[arg(long)]
    environment: Option<String>,

    /// Prefix length to allocate (18-28)
    #[arg(long)]
    prefix_length: Option<u32>,

    /// Tag as key=value, may be repeated. Overrides tags from --spec.
    #[arg(long = "tag", value_parser = parse_tag_arg)]
    tags: Vec<(String, String)>,
}

impl SpecArgs {
    fn desired(&self) -> Result<PrefixSpec> {
        let mut spec = match &self.spec {
            Some(path) => read_spec(path)?,
            None => PrefixSpec {
                resource_type: self.resource_type.clone(),
                environment: self.environment.clone(),
                prefix_length: self.prefix_length,
                ..PrefixSpec::default()
            },
        };
        spec.tags.extend(self.tags.iter().cloned());
        Ok(spec)
    }
}

fn read_spec(path: &Path) -> Result<PrefixSpec> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read spec file '{}'", path.display()))?;
    serde_yaml::from_str(&content).wrap_err_with(|| format!("Failed to parse spec file '{}'", path.display()))
}

fn connect(config_path: &Path) -> Result<Provider<NetboxClient>> {
    let config = load_config(config_path, &EnvOverrides::from_env())?;
    let client = NetboxClient::new(&config.netbox)?;
    client
        .validate_connection()
        .wrap_err_with(|| format!("Could not reach NetBox at {}", config.netbox.base_url()))?;
    info!("Connected to NetBox at {}", config.netbox.base_url());
    Ok(Provider::new(client, config.policy.tables()))
}

/// Policy for offline commands: the config file's overrides if it exists
fn offline_policy(config_path: &Path) -> Result<PolicyTables> {
    if !config_path.exists() {
        return Ok(PolicyTables::standard());
    }
    let config = read_config(config_path)?;
    config.policy.validate()?;
    Ok(config.policy.tables())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let store = StateStore::new(&args.state);

    match &args.command {
        Command::Plan(spec_args) => {
            let desired = spec_args.desired()?;
            let current = store.load()?;
            let plan = lifecycle::plan(&desired, current.as_ref());
            println!("{}", plan);
        }

        Command::Apply(spec_args) => {
            let desired = spec_args.desired()?;
            let provider = connect(&args.config)?;
            let mut state = store.load()?;

            let result = lifecycle::apply(&provider, &desired, &mut state);
            // Whatever succeeded before a failure is already reflected in `state`.
            store.save(&state)?;
            let plan = result?;

            match &state {
                Some(record) => println!(
                    "{}: {} (id {}, vrf {})",
                    plan,
                    record.prefix,
                    record.id,
                    record.vrf.as_deref().unwrap_or("-")
                ),
                None => println!("{}: allocation no longer exists upstream", plan),
            }
        }

        Command::Refresh => {
            let Some(record) = store.load()? else {
                println!("No allocation recorded in {}", args.state.display());
                return Ok(());
            };
            let provider = connect(&args.config)?;
            let refreshed = provider.read(&record)?;
            if refreshed.is_none() {
                warn!("Prefix {} was removed outside of this tool, forgetting it", record.prefix);
            }
            store.save(&refreshed)?;
            println!("{}", serde_json::to_string_pretty(&refreshed)?);
        }

        Command::Destroy => {
            let mut state = store.load()?;
            if state.is_none() {
                println!("No allocation recorded in {}", args.state.display());
                return Ok(());
            }
            let provider = connect(&args.config)?;
            lifecycle::destroy(&provider, &mut state)?;
            store.save(&state)?;
            println!("Allocation released");
        }

        Command::Show => {
            let state = store.load()?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }

        Command::Resolve { resource_type, environment } => {
            let policy = offline_policy(&args.config)?;
            let pools = policy.pools_for(resource_type);
            if pools.is_empty() {
                return Err(eyre!("no pools found for resource type {}", resource_type));
            }
            if !are_resource_and_env_valid(resource_type, environment) {
                warn!("{} / {} is not a valid combination", resource_type, environment);
            }
            println!("environment: {}", policy.normalize_environment(environment));
            println!("vrf: {}", policy.resolve_vrf(environment, resource_type));
            println!("pools:");
            for pool in pools {
                println!("  - {}", pool);
            }
        }
    }

    Ok(())
}
