//! Error types for prefix allocation.

use crate::policy::{MAX_PREFIX_LENGTH, MIN_PREFIX_LENGTH};

/// Input problems detected before any upstream call is made
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("prefix_length not specified")]
    MissingPrefixLength,

    #[error("environment not specified")]
    MissingEnvironment,

    #[error("resource_type not specified")]
    MissingResourceType,

    #[error("prefix_length must be between {min} & {max}, inclusive (got {length})", min = MIN_PREFIX_LENGTH, max = MAX_PREFIX_LENGTH)]
    PrefixLengthOutOfRange { length: u32 },

    #[error("resource {resource_type} cannot be used with environment {environment}")]
    InvalidCombination {
        resource_type: String,
        environment: String,
    },

    #[error("no pools found for resource type {0}")]
    NoPools(String),

    #[error("required tags missing: {}", .0.join(", "))]
    MissingTags(Vec<&'static str>),

    #[error("prefix id must be provided")]
    MissingId,

    #[error("prefix must be provided")]
    MissingPrefix,
}

/// Failures reported by an IPAM backend
#[derive(Debug, thiserror::Error)]
pub enum IpamError {
    /// The pool has no free block of the requested size
    #[error("no available /{length} prefix in pool {pool_id}")]
    Exhausted { pool_id: i64, length: u8 },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IPAM backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the allocator and the lifecycle controller
#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("found {count} vrfs for environment {environment} (vrf {vrf})")]
    VrfConflict {
        count: usize,
        environment: String,
        vrf: String,
    },

    #[error("found {count} pools for prefix {pool} in vrf {vrf}")]
    PoolConflict {
        count: usize,
        pool: String,
        vrf: String,
    },

    #[error("did not allocate prefix for {resource_type} in {environment} (pools tried: {})", .pools.join(", "))]
    Exhausted {
        resource_type: String,
        environment: String,
        pools: Vec<String>,
    },

    #[error("upstream IPAM request failed: {0}")]
    Transport(#[from] IpamError),
}

impl PrefixError {
    /// Whether the error was raised before talking to the upstream system
    pub fn is_validation(&self) -> bool {
        matches!(self, PrefixError::Validation(_))
    }
}

/// Result alias used throughout the library
pub type Result<T, E = PrefixError> = std::result::Result<T, E>;
