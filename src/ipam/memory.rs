//! In-process IPAM backend.
//!
//! Keeps VRFs and prefixes in memory and carves sub-prefixes out of pools
//! first-fit, skipping anything already present in the same VRF. Useful for
//! offline runs and as a faithful stand-in for NetBox in tests.

use super::types::{NestedVrf, Prefix, Vrf};
use super::{Ipam, IpamAdmin};
use crate::error::IpamError;
use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredPrefix {
    net: Ipv4Net,
    vrf_id: Option<i64>,
    is_pool: bool,
    tags: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    vrfs: BTreeMap<i64, String>,
    prefixes: BTreeMap<i64, StoredPrefix>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn to_prefix(&self, id: i64, stored: &StoredPrefix) -> Prefix {
        Prefix {
            id,
            prefix: stored.net.to_string(),
            vrf: stored.vrf_id.and_then(|vrf_id| {
                self.vrfs.get(&vrf_id).map(|name| NestedVrf {
                    id: vrf_id,
                    name: name.clone(),
                })
            }),
            is_pool: stored.is_pool,
            tags: stored.tags.clone(),
        }
    }

    /// First aligned `/length` block inside `pool` that overlaps nothing
    /// already allocated in the pool's VRF
    fn find_gap(&self, pool_id: i64, pool: &StoredPrefix, length: u8) -> Option<Ipv4Net> {
        let mut taken: Vec<(u32, u32)> = self
            .prefixes
            .iter()
            .filter(|(id, p)| **id != pool_id && p.vrf_id == pool.vrf_id && pool.net.contains(&p.net))
            .map(|(_, p)| (u32::from(p.net.network()), u32::from(p.net.broadcast())))
            .collect();
        taken.sort_unstable();

        let block = 1u64 << (32 - u32::from(length));
        let space_end = u64::from(u32::from(pool.net.broadcast()));
        let mut current = u64::from(u32::from(pool.net.network()));

        for (start, end) in taken {
            let aligned = align_up(current, block);
            if aligned + block - 1 < u64::from(start) {
                break;
            }
            current = current.max(u64::from(end) + 1);
        }

        let aligned = align_up(current, block);
        if aligned + block - 1 > space_end {
            return None;
        }
        let addr = Ipv4Addr::from(u32::try_from(aligned).ok()?);
        Ipv4Net::new(addr, length).ok()
    }
}

fn align_up(addr: u64, block: u64) -> u64 {
    addr.div_ceil(block) * block
}

/// Thread-safe in-memory IPAM
#[derive(Debug, Default)]
pub struct InMemoryIpam {
    inner: Mutex<Inner>,
}

impl InMemoryIpam {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, IpamError> {
        self.inner
            .lock()
            .map_err(|_| IpamError::Backend("in-memory IPAM lock poisoned".to_string()))
    }

    /// Remove a prefix behind the caller's back, as an operator would
    pub fn forget_prefix(&self, id: i64) -> Result<bool, IpamError> {
        Ok(self.lock()?.prefixes.remove(&id).is_some())
    }

    /// Number of prefixes currently stored, pools included
    pub fn prefix_count(&self) -> Result<usize, IpamError> {
        Ok(self.lock()?.prefixes.len())
    }
}

fn parse_cidr(cidr: &str) -> Result<Ipv4Net, IpamError> {
    cidr.parse::<Ipv4Net>()
        .map_err(|e| IpamError::Backend(format!("invalid prefix '{}': {}", cidr, e)))
}

impl Ipam for InMemoryIpam {
    fn lookup_vrfs_by_name(&self, name: &str) -> Result<Vec<Vrf>, IpamError> {
        let inner = self.lock()?;
        Ok(inner
            .vrfs
            .iter()
            .filter(|(_, vrf_name)| vrf_name.as_str() == name)
            .map(|(id, vrf_name)| Vrf {
                id: *id,
                name: vrf_name.clone(),
            })
            .collect())
    }

    fn lookup_pool_prefixes(&self, cidr: &str, vrf_id: i64) -> Result<Vec<Prefix>, IpamError> {
        let net = parse_cidr(cidr)?;
        let inner = self.lock()?;
        Ok(inner
            .prefixes
            .iter()
            .filter(|(_, p)| p.is_pool && p.net == net && p.vrf_id == Some(vrf_id))
            .map(|(id, p)| inner.to_prefix(*id, p))
            .collect())
    }

    fn allocate_sub_prefix(&self, pool_id: i64, length: u8, tags: &[String]) -> Result<Prefix, IpamError> {
        let mut inner = self.lock()?;
        let pool = inner
            .prefixes
            .get(&pool_id)
            .cloned()
            .ok_or(IpamError::NotFound { kind: "prefix", id: pool_id })?;
        if !pool.is_pool {
            return Err(IpamError::Backend(format!("prefix {} is not a pool", pool_id)));
        }
        if length < pool.net.prefix_len() || length > 32 {
            return Err(IpamError::Exhausted { pool_id, length });
        }

        let net = inner
            .find_gap(pool_id, &pool, length)
            .ok_or(IpamError::Exhausted { pool_id, length })?;
        let stored = StoredPrefix {
            net,
            vrf_id: pool.vrf_id,
            is_pool: false,
            tags: tags.to_vec(),
        };
        let id = inner.next_id();
        let prefix = inner.to_prefix(id, &stored);
        inner.prefixes.insert(id, stored);
        Ok(prefix)
    }

    fn read_prefix(&self, id: i64) -> Result<Option<Prefix>, IpamError> {
        let inner = self.lock()?;
        Ok(inner.prefixes.get(&id).map(|p| inner.to_prefix(id, p)))
    }

    fn update_prefix_tags(&self, id: i64, cidr: &str, tags: &[String]) -> Result<Prefix, IpamError> {
        let net = parse_cidr(cidr)?;
        let mut inner = self.lock()?;
        let stored = inner
            .prefixes
            .get_mut(&id)
            .ok_or(IpamError::NotFound { kind: "prefix", id })?;
        if stored.net != net {
            return Err(IpamError::Backend(format!(
                "prefix {} is {}, not {}",
                id, stored.net, net
            )));
        }
        stored.tags = tags.to_vec();
        let stored = stored.clone();
        Ok(inner.to_prefix(id, &stored))
    }

    fn delete_prefix(&self, id: i64) -> Result<(), IpamError> {
        match self.lock()?.prefixes.remove(&id) {
            Some(_) => Ok(()),
            None => Err(IpamError::NotFound { kind: "prefix", id }),
        }
    }
}

impl IpamAdmin for InMemoryIpam {
    fn list_vrfs(&self) -> Result<Vec<Vrf>, IpamError> {
        Ok(self
            .lock()?
            .vrfs
            .iter()
            .map(|(id, name)| Vrf {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    fn create_vrf(&self, name: &str) -> Result<Vrf, IpamError> {
        let mut inner = self.lock()?;
        let id = inner.next_id();
        inner.vrfs.insert(id, name.to_string());
        Ok(Vrf {
            id,
            name: name.to_string(),
        })
    }

    fn delete_vrf(&self, id: i64) -> Result<(), IpamError> {
        let mut inner = self.lock()?;
        if inner.vrfs.remove(&id).is_none() {
            return Err(IpamError::NotFound { kind: "vrf", id });
        }
        for prefix in inner.prefixes.values_mut() {
            if prefix.vrf_id == Some(id) {
                prefix.vrf_id = None;
            }
        }
        Ok(())
    }

    fn list_prefixes(&self) -> Result<Vec<Prefix>, IpamError> {
        let inner = self.lock()?;
        Ok(inner
            .prefixes
            .iter()
            .map(|(id, p)| inner.to_prefix(*id, p))
            .collect())
    }

    fn create_prefix(&self, cidr: &str, vrf_id: Option<i64>, is_pool: bool) -> Result<Prefix, IpamError> {
        let net = parse_cidr(cidr)?.trunc();
        let mut inner = self.lock()?;
        if let Some(vrf_id) = vrf_id {
            if !inner.vrfs.contains_key(&vrf_id) {
                return Err(IpamError::NotFound { kind: "vrf", id: vrf_id });
            }
        }
        let stored = StoredPrefix {
            net,
            vrf_id,
            is_pool,
            tags: Vec::new(),
        };
        let id = inner.next_id();
        let prefix = inner.to_prefix(id, &stored);
        inner.prefixes.insert(id, stored);
        Ok(prefix)
    }
}
