//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use netbox_pools::ipam::{InMemoryIpam, Ipam, IpamAdmin, Prefix, Vrf};
use netbox_pools::setup;
use netbox_pools::{IpamError, PolicyTables, TagMap};
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory backend bootstrapped with the standard VRFs and pools
pub fn bootstrapped() -> InMemoryIpam {
    let ipam = InMemoryIpam::new();
    setup::bootstrap(&ipam, &PolicyTables::standard()).unwrap();
    ipam
}

pub fn tags(name: &str, unique: &str) -> TagMap {
    [("name", name), ("unique", unique)]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn vrf_id(ipam: &impl Ipam, name: &str) -> i64 {
    ipam.lookup_vrfs_by_name(name).unwrap()[0].id
}

/// Occupy the whole of `cidr` inside `vrf` so the matching pool is exhausted
pub fn fill_pool(ipam: &InMemoryIpam, vrf: &str, cidr: &str) {
    let id = vrf_id(ipam, vrf);
    ipam.create_prefix(cidr, Some(id), false).unwrap();
}

/// Wraps a backend, records every call and can fail allocations from
/// chosen pools with a transport error
#[derive(Debug, Default)]
pub struct Recording<I> {
    pub inner: I,
    calls: Mutex<Vec<String>>,
    broken_pools: HashSet<i64>,
}

impl<I: Ipam> Recording<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            broken_pools: HashSet::new(),
        }
    }

    pub fn break_pool(mut self, pool_id: i64) -> Self {
        self.broken_pools.insert(pool_id);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl<I: Ipam> Ipam for Recording<I> {
    fn lookup_vrfs_by_name(&self, name: &str) -> Result<Vec<Vrf>, IpamError> {
        self.record(format!("lookup_vrf {}", name));
        self.inner.lookup_vrfs_by_name(name)
    }

    fn lookup_pool_prefixes(&self, cidr: &str, vrf_id: i64) -> Result<Vec<Prefix>, IpamError> {
        self.record(format!("lookup_pool {}", cidr));
        self.inner.lookup_pool_prefixes(cidr, vrf_id)
    }

    fn allocate_sub_prefix(&self, pool_id: i64, length: u8, tags: &[String]) -> Result<Prefix, IpamError> {
        self.record(format!("allocate {} /{}", pool_id, length));
        if self.broken_pools.contains(&pool_id) {
            return Err(IpamError::Status {
                url: format!("http://netbox/api/ipam/prefixes/{}/available-prefixes/", pool_id),
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }
        self.inner.allocate_sub_prefix(pool_id, length, tags)
    }

    fn read_prefix(&self, id: i64) -> Result<Option<Prefix>, IpamError> {
        self.record(format!("read {}", id));
        self.inner.read_prefix(id)
    }

    fn update_prefix_tags(&self, id: i64, cidr: &str, tags: &[String]) -> Result<Prefix, IpamError> {
        self.record(format!("update {}", id));
        self.inner.update_prefix_tags(id, cidr, tags)
    }

    fn delete_prefix(&self, id: i64) -> Result<(), IpamError> {
        self.record(format!("delete {}", id));
        self.inner.delete_prefix(id)
    }
}
