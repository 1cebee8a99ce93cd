//! Static allocation policy.
//!
//! The tables are built once at startup, either from the built-in defaults
//! or from a configured supernet override, and are only ever read afterwards.

use ipnet::Ipv4Net;
use regex::Regex;
use std::collections::BTreeMap;

/// Smallest prefix length (largest block) that may be requested
pub const MIN_PREFIX_LENGTH: u8 = 18;
/// Largest prefix length (smallest block) that may be requested
pub const MAX_PREFIX_LENGTH: u8 = 28;

/// VRF names that an environment may name directly
pub const CANONICAL_VRFS: [&str; 4] = ["dev", "test", "stage", "prod"];

/// Resource type and VRF reserved for service delivery
pub const SERVICE_DELIVERY: &str = "servicedelivery";

/// Catch-all VRF for environment spellings that match nothing else
pub const PRE_DEV_VRF: &str = "pre-dev";

/// Built-in resource type to supernet pools mapping, in allocation order
const DEFAULT_SUPERNETS: [(&str, &[&str]); 5] = [
    ("core", &["100.64.0.0/10"]),
    ("depot", &["10.224.0.0/16", "10.225.0.0/16"]),
    ("edge", &["10.226.0.0/16", "10.227.0.0/16"]),
    (SERVICE_DELIVERY, &["10.228.0.0/16"]),
    ("vpn", &["172.16.0.0/12"]),
];

/// "prod" followed by an ASCII digit: prod0, prod1, ...
const NUMBERED_PROD_PATTERN: &str = r"^prod[0-9]";

/// Immutable lookup tables consulted by the VRF resolver and pool selector
#[derive(Debug, Clone)]
pub struct PolicyTables {
    supernets: BTreeMap<String, Vec<Ipv4Net>>,
    numbered_prod: Regex,
}

impl PolicyTables {
    /// The built-in tables
    pub fn standard() -> Self {
        let supernets = DEFAULT_SUPERNETS
            .iter()
            .map(|(resource_type, pools)| {
                let pools = pools
                    .iter()
                    .filter_map(|cidr| cidr.parse::<Ipv4Net>().ok())
                    .collect();
                (resource_type.to_string(), pools)
            })
            .collect();
        Self::with_supernets(supernets)
    }

    /// Tables with a caller-provided resource type to supernet mapping.
    ///
    /// Keys are lower-cased so lookups stay case-insensitive.
    pub fn with_supernets(supernets: BTreeMap<String, Vec<Ipv4Net>>) -> Self {
        let supernets = supernets
            .into_iter()
            .map(|(resource_type, pools)| (resource_type.to_lowercase(), pools))
            .collect();
        PolicyTables {
            supernets,
            numbered_prod: Regex::new(NUMBERED_PROD_PATTERN).expect("Invalid numbered_prod regex"),
        }
    }

    /// Whether `length` lies within the allocatable range (inclusive)
    pub fn is_length_valid(&self, length: u8) -> bool {
        is_length_valid(length)
    }

    pub(crate) fn supernets(&self) -> &BTreeMap<String, Vec<Ipv4Net>> {
        &self.supernets
    }

    pub(crate) fn is_numbered_prod(&self, lowered_env: &str) -> bool {
        self.numbered_prod.is_match(lowered_env)
    }

    /// All resource types known to the tables, sorted
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.supernets.keys().map(String::as_str)
    }
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self::standard()
    }
}

/// Inclusive bounds check on a requested prefix length
pub fn is_length_valid(length: u8) -> bool {
    (MIN_PREFIX_LENGTH..=MAX_PREFIX_LENGTH).contains(&length)
}

/// Verify that an environment of `servicedelivery` is only ever paired with
/// the `servicedelivery` resource type.
///
/// Any other pairing almost certainly means the caller swapped the two fields.
pub fn are_resource_and_env_valid(resource_type: &str, environment: &str) -> bool {
    if !environment.eq_ignore_ascii_case(SERVICE_DELIVERY) {
        return true;
    }
    resource_type.eq_ignore_ascii_case(SERVICE_DELIVERY)
}
