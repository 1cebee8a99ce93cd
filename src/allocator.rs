//! Prefix allocation.
//!
//! This file contains the allocation algorithm: validate the request, pick
//! the VRF and candidate pools from the policy tables, then ask the upstream
//! IPAM for a sub-prefix from each pool in turn.
//!
//! Only capacity exhaustion moves on to the next pool. A pool that cannot be
//! found, or any transport failure, aborts the whole allocation so that a
//! misconfiguration is never hidden behind a fallback.

use crate::error::{IpamError, PrefixError, Result, ValidationError};
use crate::ipam::Ipam;
use crate::policy::{are_resource_and_env_valid, PolicyTables};
use crate::tags::{encode_tags, missing_required_tags, TagMap};
use ipnet::Ipv4Net;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

/// A request for a new prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub resource_type: String,
    pub environment: String,
    pub prefix_length: u32,
    pub tags: TagMap,
}

/// A request that passed every local check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest<'a> {
    pub request: &'a AllocationRequest,
    pub length: u8,
    pub vrf: &'static str,
    pub pools: &'a [Ipv4Net],
    pub wire_tags: Vec<String>,
}

/// A prefix handed out by the upstream system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: i64,
    pub prefix: String,
    pub vrf: String,
    pub pool: String,
}

/// Run every local check on `request`, without touching the upstream system.
///
/// Checks run in a fixed order: prefix length, resource/environment
/// pairing, pools for the resource type, required tags.
pub fn validate_request<'a>(
    policy: &'a PolicyTables,
    request: &'a AllocationRequest,
) -> Result<ValidatedRequest<'a>, ValidationError> {
    let length = u8::try_from(request.prefix_length)
        .ok()
        .filter(|length| policy.is_length_valid(*length))
        .ok_or(ValidationError::PrefixLengthOutOfRange {
            length: request.prefix_length,
        })?;

    if !are_resource_and_env_valid(&request.resource_type, &request.environment) {
        return Err(ValidationError::InvalidCombination {
            resource_type: request.resource_type.clone(),
            environment: request.environment.clone(),
        });
    }

    let pools = policy.pools_for(&request.resource_type);
    if pools.is_empty() {
        return Err(ValidationError::NoPools(request.resource_type.clone()));
    }

    let missing = missing_required_tags(&request.tags);
    if !missing.is_empty() {
        return Err(ValidationError::MissingTags(missing));
    }

    Ok(ValidatedRequest {
        request,
        length,
        vrf: policy.resolve_vrf(&request.environment, &request.resource_type),
        pools,
        wire_tags: encode_tags(&request.tags),
    })
}

/// Allocate a prefix for `request`.
///
/// Returns the upstream identifier and CIDR of the first successful
/// allocation across the candidate pools.
pub fn allocate<I: Ipam + ?Sized>(
    ipam: &I,
    policy: &PolicyTables,
    request: &AllocationRequest,
) -> Result<Allocation> {
    let validated = validate_request(policy, request).map_err(|e| {
        error!("{}", e);
        e
    })?;
    let vrf_id = lookup_vrf_id(ipam, &validated)?;

    for pool in validated.pools {
        let cidr = pool.to_string();
        let pool_id = lookup_pool_id(ipam, &cidr, vrf_id, validated.vrf)?;

        match ipam.allocate_sub_prefix(pool_id, validated.length, &validated.wire_tags) {
            Ok(prefix) => {
                info!(
                    "Allocated prefix {} (id {}) for {} in {} from pool {} (vrf {})",
                    prefix.prefix, prefix.id, request.resource_type, request.environment, cidr, validated.vrf
                );
                return Ok(Allocation {
                    id: prefix.id,
                    prefix: prefix.prefix,
                    vrf: validated.vrf.to_string(),
                    pool: cidr,
                });
            }
            Err(IpamError::Exhausted { .. }) => {
                info!(
                    "Did not allocate prefix for {} in {} from pool {}",
                    request.resource_type, request.environment, cidr
                );
            }
            Err(e) => {
                error!("Allocation from pool {} failed: {}", cidr, e);
                return Err(e.into());
            }
        }
    }

    Err(PrefixError::Exhausted {
        resource_type: request.resource_type.clone(),
        environment: request.environment.clone(),
        pools: validated.pools.iter().map(ToString::to_string).collect(),
    })
}

fn lookup_vrf_id<I: Ipam + ?Sized>(ipam: &I, validated: &ValidatedRequest<'_>) -> Result<i64> {
    let vrfs = ipam.lookup_vrfs_by_name(validated.vrf)?;
    match vrfs.as_slice() {
        [vrf] => {
            debug!("VRF {} has id {}", vrf.name, vrf.id);
            Ok(vrf.id)
        }
        _ => Err(PrefixError::VrfConflict {
            count: vrfs.len(),
            environment: validated.request.environment.clone(),
            vrf: validated.vrf.to_string(),
        }),
    }
}

fn lookup_pool_id<I: Ipam + ?Sized>(ipam: &I, cidr: &str, vrf_id: i64, vrf: &str) -> Result<i64> {
    let pools = ipam.lookup_pool_prefixes(cidr, vrf_id)?;
    match pools.as_slice() {
        [pool] => {
            debug!("Pool {} in vrf {} has id {}", cidr, vrf, pool.id);
            Ok(pool.id)
        }
        _ => {
            error!("Found {} pools for prefix {} in vrf {}", pools.len(), cidr, vrf);
            Err(PrefixError::PoolConflict {
                count: pools.len(),
                pool: cidr.to_string(),
                vrf: vrf.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resource_type: &str, environment: &str, prefix_length: u32, tags: &[(&str, &str)]) -> AllocationRequest {
        AllocationRequest {
            resource_type: resource_type.to_string(),
            environment: environment.to_string(),
            prefix_length,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    const TAGS: [(&str, &str); 2] = [("name", "a"), ("unique", "b")];

    #[test]
    fn test_validate_request_success() {
        let policy = PolicyTables::standard();
        let req = request("Depot", "production", 24, &TAGS);
        let validated = validate_request(&policy, &req).unwrap();
        assert_eq!(validated.length, 24);
        assert_eq!(validated.vrf, "prod");
        assert_eq!(validated.pools.len(), 2);
        assert_eq!(validated.wire_tags, vec!["name=a", "unique=b"]);
    }

    #[test]
    fn test_validate_request_length() {
        let policy = PolicyTables::standard();
        for length in [0, 16, 17, 29, 32, 300] {
            let req = request("core", "test", length, &TAGS);
            let err = validate_request(&policy, &req).unwrap_err();
            assert_eq!(err, ValidationError::PrefixLengthOutOfRange { length });
            assert!(err.to_string().contains("length"));
        }
    }

    #[test]
    fn test_validate_request_order() {
        let policy = PolicyTables::standard();

        // Length is checked before everything else.
        let req = request("bogus", "servicedelivery", 8, &[]);
        assert!(matches!(
            validate_request(&policy, &req),
            Err(ValidationError::PrefixLengthOutOfRange { .. })
        ));

        let req = request("core", "ServiceDelivery", 28, &[]);
        let err = validate_request(&policy, &req).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCombination { .. }));
        assert!(err.to_string().contains("environment"));

        let req = request("bogus", "test", 28, &[]);
        let err = validate_request(&policy, &req).unwrap_err();
        assert_eq!(err, ValidationError::NoPools("bogus".to_string()));
        assert!(err.to_string().contains("pools"));

        let req = request("core", "test", 28, &[("unique", "b")]);
        let err = validate_request(&policy, &req).unwrap_err();
        assert_eq!(err, ValidationError::MissingTags(vec!["name"]));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_service_delivery_pairing_is_accepted() {
        let policy = PolicyTables::standard();
        let req = request("servicedelivery", "servicedelivery", 28, &TAGS);
        let validated = validate_request(&policy, &req).unwrap();
        assert_eq!(validated.vrf, "pre-dev");

        let req = request("servicedelivery", "stage", 28, &TAGS);
        assert_eq!(validate_request(&policy, &req).unwrap().vrf, "servicedelivery");
    }
}
