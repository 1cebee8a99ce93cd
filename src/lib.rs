//! # netbox-pools - Policy-driven prefix allocation from NetBox supernet pools
//!
//! This library allocates IPv4 prefixes (CIDR blocks) out of a fixed set of
//! supernet pools held in NetBox, placing each allocation in the VRF that
//! matches its resource type and deployment environment.
//!
//! ## Overview
//!
//! A request such as "a /28 for a `core` resource in `prod`, tagged
//! `name=web` and `unique=abc`" is turned into an upstream allocation in
//! three steps:
//!
//! 1. **Validate** the request locally: prefix length within 18..=28, a sane
//!    resource type / environment pairing, known pools, required tags.
//! 2. **Resolve** the VRF from the environment spelling and the candidate
//!    pools from the resource type.
//! 3. **Allocate** the next available sub-prefix from each pool in order,
//!    moving on only when a pool is out of space.
//!
//! The resulting identifier is tracked by the lifecycle controller so that
//! the allocation can later be re-read, re-tagged in place, or released.
//!
//! ## Architecture
//!
//! - `policy`: prefix length bounds, resource type to pools, environment to VRF
//! - `tags`: tag map <-> `key=value` wire strings
//! - `allocator`: validation and the multi-pool allocation algorithm
//! - `lifecycle`: create/read/update/delete, planning, persisted state
//! - `ipam`: the upstream contract, the NetBox REST client, an in-memory backend
//! - `setup`: bootstrapping VRFs and pools on a fresh NetBox
//! - `config`, `config_loader`: YAML configuration with environment overrides
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netbox_pools::config_loader::{load_config, EnvOverrides};
//! use netbox_pools::ipam::NetboxClient;
//! use netbox_pools::lifecycle::{PrefixSpec, Provider};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("netbox.yaml"), &EnvOverrides::from_env())?;
//! let client = NetboxClient::new(&config.netbox)?;
//! let provider = Provider::new(client, config.policy.tables());
//!
//! let spec: PrefixSpec = serde_yaml::from_str(
//!     "resource_type: core\nenvironment: prod\nprefix_length: 28\ntags: {name: web, unique: abc}",
//! )?;
//! let record = provider.create(&spec)?;
//! println!("allocated {} (id {})", record.prefix, record.id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library operations return typed `thiserror` errors (`PrefixError`,
//! `ValidationError`, `IpamError`, `ConfigError`). The binaries wrap them with
//! `color_eyre` for reporting.

pub mod allocator;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod ipam;
pub mod lifecycle;
pub mod policy;
pub mod setup;
pub mod tags;

pub use allocator::{allocate, AllocationRequest, Allocation};
pub use error::{IpamError, PrefixError, ValidationError};
pub use lifecycle::{PrefixRecord, PrefixSpec, Provider};
pub use policy::PolicyTables;
pub use tags::TagMap;
