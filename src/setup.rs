//! Upstream bootstrap.
//!
//! Creates the VRFs and pool prefixes the allocator expects to find, derived
//! from the policy tables:
//!
//! - one VRF per canonical environment, plus `pre-dev` and `servicedelivery`
//! - every standard VRF holds every supernet except service delivery as a pool
//! - the VPN client range sits next to the vpn supernet as a plain prefix
//! - `pre-dev` also gets the service delivery supernet, so ad hoc
//!   environments never draw from the real service delivery space
//! - the `servicedelivery` VRF holds only the service delivery supernet

use crate::error::IpamError;
use crate::ipam::{IpamAdmin, Vrf};
use crate::policy::{PolicyTables, CANONICAL_VRFS, PRE_DEV_VRF, SERVICE_DELIVERY};
use log::{debug, info};

/// Non-pool prefix reserved for VPN clients inside the vpn supernet
pub const VPN_CLIENT_PREFIX: &str = "172.16.6.0/24";

/// Supernet the VPN client prefix belongs next to
const VPN_SUPERNET: &str = "172.16.0.0/12";

/// Errors raised while bootstrapping
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("VRF {0} already in NetBox")]
    VrfExists(String),
    #[error("Could not find VRF {0}")]
    VrfMissing(String),
    #[error(transparent)]
    Ipam(#[from] IpamError),
}

/// What a bootstrap run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetupSummary {
    pub vrfs: usize,
    pub pools: usize,
    pub plain_prefixes: usize,
}

/// VRFs that receive the regular supernets
pub fn standard_vrfs() -> Vec<&'static str> {
    let mut vrfs = vec![PRE_DEV_VRF];
    vrfs.extend(CANONICAL_VRFS);
    vrfs
}

/// Every VRF the allocator may resolve to
pub fn all_vrfs() -> Vec<&'static str> {
    let mut vrfs = standard_vrfs();
    vrfs.push(SERVICE_DELIVERY);
    vrfs
}

/// Create the VRFs. Refuses to run if any of them already exists, since
/// NetBox does not prevent duplicate VRF names.
pub fn add_vrfs<A: IpamAdmin + ?Sized>(ipam: &A) -> Result<Vec<Vrf>, SetupError> {
    let wanted = all_vrfs();
    let existing = ipam.list_vrfs()?;
    if let Some(found) = existing.iter().find(|vrf| wanted.iter().any(|name| *name == vrf.name)) {
        return Err(SetupError::VrfExists(found.name.clone()));
    }

    let mut created = Vec::with_capacity(wanted.len());
    for name in wanted {
        let vrf = ipam.create_vrf(name)?;
        debug!("Created VRF {}:{}", vrf.id, vrf.name);
        created.push(vrf);
    }
    Ok(created)
}

/// Create the pool prefixes in every VRF
pub fn add_pools<A: IpamAdmin + ?Sized>(ipam: &A, policy: &PolicyTables) -> Result<SetupSummary, SetupError> {
    let vrfs = ipam.list_vrfs()?;
    let vrf_id = |name: &str| {
        vrfs.iter()
            .find(|vrf| vrf.name == name)
            .map(|vrf| vrf.id)
            .ok_or_else(|| SetupError::VrfMissing(name.to_string()))
    };

    let service_delivery_pools = policy.pools_for(SERVICE_DELIVERY);
    let regular_pools: Vec<String> = policy
        .resource_types()
        .filter(|resource_type| *resource_type != SERVICE_DELIVERY)
        .flat_map(|resource_type| policy.pools_for(resource_type).iter().map(ToString::to_string))
        .collect();

    let mut summary = SetupSummary::default();
    for name in standard_vrfs() {
        let id = vrf_id(name)?;
        info!("Creating prefixes for VRF {}", name);

        for pool in &regular_pools {
            let created = ipam.create_prefix(pool, Some(id), true)?;
            debug!("Created Prefix {}:{}", created.id, created.prefix);
            summary.pools += 1;

            if pool == VPN_SUPERNET {
                let client = ipam.create_prefix(VPN_CLIENT_PREFIX, Some(id), false)?;
                debug!("Created VPN Client Prefix {}:{}", client.id, client.prefix);
                summary.plain_prefixes += 1;
            }
        }

        if name == PRE_DEV_VRF {
            for pool in service_delivery_pools {
                let created = ipam.create_prefix(&pool.to_string(), Some(id), true)?;
                debug!("Created pre-dev servicedelivery prefix {}:{}", created.id, created.prefix);
                summary.pools += 1;
            }
        }
    }

    let id = vrf_id(SERVICE_DELIVERY)?;
    info!("Creating prefixes for VRF {}", SERVICE_DELIVERY);
    for pool in service_delivery_pools {
        let created = ipam.create_prefix(&pool.to_string(), Some(id), true)?;
        debug!("Created Prefix {}:{}", created.id, created.prefix);
        summary.pools += 1;
    }
    Ok(summary)
}

/// Create VRFs and pools in one go
pub fn bootstrap<A: IpamAdmin + ?Sized>(ipam: &A, policy: &PolicyTables) -> Result<SetupSummary, SetupError> {
    let vrfs = add_vrfs(ipam)?;
    let mut summary = add_pools(ipam, policy)?;
    summary.vrfs = vrfs.len();
    info!(
        "Bootstrap complete: {} VRFs, {} pools, {} other prefixes",
        summary.vrfs, summary.pools, summary.plain_prefixes
    );
    Ok(summary)
}

/// Delete every prefix, then every VRF
pub fn destroy_all<A: IpamAdmin + ?Sized>(ipam: &A) -> Result<(usize, usize), SetupError> {
    let prefixes = ipam.list_prefixes()?;
    info!("Deleting {} Prefixes", prefixes.len());
    for prefix in &prefixes {
        debug!("Deleting {}: {}", prefix.id, prefix.prefix);
        ipam.delete_prefix(prefix.id)?;
    }

    let vrfs = ipam.list_vrfs()?;
    info!("Deleting {} Vrfs", vrfs.len());
    for vrf in &vrfs {
        debug!("Deleting {}: {}", vrf.id, vrf.name);
        ipam.delete_vrf(vrf.id)?;
    }
    Ok((prefixes.len(), vrfs.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipam::{InMemoryIpam, Ipam};

    #[test]
    fn test_bootstrap_layout() {
        let ipam = InMemoryIpam::new();
        let summary = bootstrap(&ipam, &PolicyTables::standard()).unwrap();

        // 5 standard VRFs x 6 regular pools, +1 pre-dev sd pool, +1 sd VRF pool
        assert_eq!(summary.vrfs, 6);
        assert_eq!(summary.pools, 32);
        assert_eq!(summary.plain_prefixes, 5);

        let sd = &ipam.lookup_vrfs_by_name("servicedelivery").unwrap()[0];
        assert_eq!(ipam.lookup_pool_prefixes("10.228.0.0/16", sd.id).unwrap().len(), 1);
        assert!(ipam.lookup_pool_prefixes("100.64.0.0/10", sd.id).unwrap().is_empty());

        let pre_dev = &ipam.lookup_vrfs_by_name("pre-dev").unwrap()[0];
        assert_eq!(ipam.lookup_pool_prefixes("10.228.0.0/16", pre_dev.id).unwrap().len(), 1);

        let prod = &ipam.lookup_vrfs_by_name("prod").unwrap()[0];
        assert!(ipam.lookup_pool_prefixes("10.228.0.0/16", prod.id).unwrap().is_empty());
        assert_eq!(ipam.lookup_pool_prefixes("10.225.0.0/16", prod.id).unwrap().len(), 1);
    }

    #[test]
    fn test_add_vrfs_refuses_duplicates() {
        let ipam = InMemoryIpam::new();
        ipam.create_vrf("stage").unwrap();
        let err = add_vrfs(&ipam).unwrap_err();
        assert!(matches!(err, SetupError::VrfExists(ref name) if name == "stage"));
    }

    #[test]
    fn test_destroy_all() {
        let ipam = InMemoryIpam::new();
        bootstrap(&ipam, &PolicyTables::standard()).unwrap();
        let (prefixes, vrfs) = destroy_all(&ipam).unwrap();
        assert_eq!(prefixes, 37);
        assert_eq!(vrfs, 6);
        assert!(ipam.list_prefixes().unwrap().is_empty());
        assert!(ipam.list_vrfs().unwrap().is_empty());

        // A clean slate can be bootstrapped again.
        assert!(bootstrap(&ipam, &PolicyTables::standard()).is_ok());
    }
}
