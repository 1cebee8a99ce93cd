//! Upstream IPAM collaborators.
//!
//! The allocator and lifecycle controller only ever talk to the upstream
//! system through the [`Ipam`] trait. Two backends are provided: the NetBox
//! REST client and an in-process implementation with real sub-prefix carving.
//! Bootstrap tooling additionally needs [`IpamAdmin`].

pub mod client;
pub mod memory;
pub mod types;

use crate::error::IpamError;

// Re-export commonly used types
pub use client::NetboxClient;
pub use memory::InMemoryIpam;
pub use types::{NestedVrf, Prefix, Vrf};

/// Operations the allocation core consumes.
///
/// Every call is blocking and independent; implementations own whatever
/// connection handling, locking or retries they need.
pub trait Ipam {
    /// VRFs whose name is exactly `name`
    fn lookup_vrfs_by_name(&self, name: &str) -> Result<Vec<Vrf>, IpamError>;

    /// Pool prefixes matching `cidr` exactly inside VRF `vrf_id`
    fn lookup_pool_prefixes(&self, cidr: &str, vrf_id: i64) -> Result<Vec<Prefix>, IpamError>;

    /// Carve the next available `/length` out of pool `pool_id`.
    ///
    /// Returns [`IpamError::Exhausted`] when the pool has no room left.
    fn allocate_sub_prefix(&self, pool_id: i64, length: u8, tags: &[String]) -> Result<Prefix, IpamError>;

    /// Current state of prefix `id`, or `None` if the upstream no longer knows it
    fn read_prefix(&self, id: i64) -> Result<Option<Prefix>, IpamError>;

    /// Replace the tags of prefix `id`
    fn update_prefix_tags(&self, id: i64, cidr: &str, tags: &[String]) -> Result<Prefix, IpamError>;

    fn delete_prefix(&self, id: i64) -> Result<(), IpamError>;
}

/// Administrative operations used to bootstrap an upstream installation
pub trait IpamAdmin: Ipam {
    fn list_vrfs(&self) -> Result<Vec<Vrf>, IpamError>;

    fn create_vrf(&self, name: &str) -> Result<Vrf, IpamError>;

    fn delete_vrf(&self, id: i64) -> Result<(), IpamError>;

    fn list_prefixes(&self) -> Result<Vec<Prefix>, IpamError>;

    fn create_prefix(&self, cidr: &str, vrf_id: Option<i64>, is_pool: bool) -> Result<Prefix, IpamError>;
}

impl<T: Ipam + ?Sized> Ipam for &T {
    fn lookup_vrfs_by_name(&self, name: &str) -> Result<Vec<Vrf>, IpamError> {
        (**self).lookup_vrfs_by_name(name)
    }

    fn lookup_pool_prefixes(&self, cidr: &str, vrf_id: i64) -> Result<Vec<Prefix>, IpamError> {
        (**self).lookup_pool_prefixes(cidr, vrf_id)
    }

    fn allocate_sub_prefix(&self, pool_id: i64, length: u8, tags: &[String]) -> Result<Prefix, IpamError> {
        (**self).allocate_sub_prefix(pool_id, length, tags)
    }

    fn read_prefix(&self, id: i64) -> Result<Option<Prefix>, IpamError> {
        (**self).read_prefix(id)
    }

    fn update_prefix_tags(&self, id: i64, cidr: &str, tags: &[String]) -> Result<Prefix, IpamError> {
        (**self).update_prefix_tags(id, cidr, tags)
    }

    fn delete_prefix(&self, id: i64) -> Result<(), IpamError> {
        (**self).delete_prefix(id)
    }
}
