//! Typed views of the upstream IPAM payloads.
//!
//! Identifiers are fixed-width integers and every field the allocator reads
//! has a concrete type, so JSON is converted exactly once at the boundary.

use serde::{Deserialize, Serialize};

/// A routing domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vrf {
    pub id: i64,
    pub name: String,
}

/// Compact VRF reference embedded in a prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedVrf {
    pub id: i64,
    pub name: String,
}

/// A prefix as returned by the upstream system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefix {
    pub id: i64,
    /// CIDR notation, e.g. "100.64.0.16/28"
    pub prefix: String,
    #[serde(default)]
    pub vrf: Option<NestedVrf>,
    #[serde(default)]
    pub is_pool: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Prefix {
    /// Name of the VRF the prefix lives in, if any
    pub fn vrf_name(&self) -> Option<&str> {
        self.vrf.as_ref().map(|vrf| vrf.name.as_str())
    }
}

/// Paginated list envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}

/// Body of an "allocate next available prefix" request
#[derive(Debug, Clone, Serialize)]
pub struct AvailablePrefixRequest<'a> {
    pub prefix_length: u8,
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

/// Body of a partial prefix update
#[derive(Debug, Clone, Serialize)]
pub struct PrefixTagsUpdate<'a> {
    pub prefix: &'a str,
    pub tags: &'a [String],
}

/// Body of a VRF creation request
#[derive(Debug, Clone, Serialize)]
pub struct WritableVrf<'a> {
    pub name: &'a str,
    pub enforce_unique: bool,
    pub tags: Vec<String>,
}

/// Body of a prefix creation request
#[derive(Debug, Clone, Serialize)]
pub struct WritablePrefix<'a> {
    pub prefix: &'a str,
    pub vrf: Option<i64>,
    pub is_pool: bool,
    pub tags: Vec<String>,
}
