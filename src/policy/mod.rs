//! Allocation policy.
//!
//! This module holds the static tables that decide where a prefix comes from:
//! the allowed prefix lengths, the supernet pools for each resource type, and
//! the rules that turn an environment spelling into a VRF name.

pub mod pools;
pub mod tables;
pub mod vrf;

// Re-export commonly used items
pub use tables::{
    are_resource_and_env_valid, is_length_valid, PolicyTables, CANONICAL_VRFS, MAX_PREFIX_LENGTH,
    MIN_PREFIX_LENGTH, PRE_DEV_VRF, SERVICE_DELIVERY,
};
