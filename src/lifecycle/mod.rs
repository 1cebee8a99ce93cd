//! Lifecycle of an allocated prefix.
//!
//! An allocation moves through `absent -> allocated -> (tags updated)* -> absent`.
//! [`Provider`] bundles the upstream IPAM handle with the policy tables and
//! runs each transition as a self-contained sequence of blocking calls. It
//! keeps no state between calls: everything an operation needs comes in
//! through its arguments and the persisted [`PrefixRecord`].
//!
//! Only tags may change in place. A different resource type, environment or
//! prefix length means a different pool or VRF, so those require the
//! allocation to be destroyed and recreated (see [`plan`]).

pub mod plan;
pub mod store;

use crate::allocator::{allocate, AllocationRequest};
use crate::error::{Result, ValidationError};
use crate::ipam::{Ipam, Prefix};
use crate::policy::PolicyTables;
use crate::tags::{decode_tags, encode_tags, missing_required_tags, TagMap};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use plan::{apply, destroy, plan, Plan, ReplaceReason};
pub use store::StateStore;

/// Desired state of an allocation, as written by the user.
///
/// Every field is optional here so that missing input is reported with a
/// precise message instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixSpec {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub prefix_length: Option<u32>,
    #[serde(default)]
    pub tags: TagMap,
}

impl PrefixSpec {
    /// Check that everything needed to allocate is present
    pub fn to_request(&self) -> Result<AllocationRequest, ValidationError> {
        let prefix_length = self
            .prefix_length
            .filter(|length| *length != 0)
            .ok_or(ValidationError::MissingPrefixLength)?;
        let environment = non_empty(&self.environment).ok_or(ValidationError::MissingEnvironment)?;
        let resource_type = non_empty(&self.resource_type).ok_or(ValidationError::MissingResourceType)?;

        Ok(AllocationRequest {
            resource_type,
            environment,
            prefix_length,
            tags: self.tags.clone(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Durable record of an allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRecord {
    /// Upstream identifier
    pub id: i64,
    /// Allocated CIDR, never changes for a given id
    pub prefix: String,
    /// Create-time only
    pub prefix_length: u32,
    pub tags: TagMap,
    /// Create-time only
    pub resource_type: String,
    /// Create-time only
    pub environment: String,
    /// VRF as last reported by the upstream system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl PrefixRecord {
    fn refresh_from(&self, upstream: Prefix) -> PrefixRecord {
        if upstream.prefix != self.prefix {
            warn!(
                "Prefix {} changed upstream from {} to {}",
                self.id, self.prefix, upstream.prefix
            );
        }
        let vrf = upstream.vrf_name().map(str::to_string);
        PrefixRecord {
            id: upstream.id,
            prefix: upstream.prefix,
            tags: decode_tags(&upstream.tags),
            vrf,
            last_refreshed: Some(Utc::now()),
            ..self.clone()
        }
    }
}

/// Upstream handle plus policy, passed to every lifecycle operation
#[derive(Debug)]
pub struct Provider<I> {
    ipam: I,
    policy: PolicyTables,
}

impl<I: Ipam> Provider<I> {
    pub fn new(ipam: I, policy: PolicyTables) -> Self {
        Self { ipam, policy }
    }

    pub fn ipam(&self) -> &I {
        &self.ipam
    }

    pub fn policy(&self) -> &PolicyTables {
        &self.policy
    }

    /// absent -> allocated.
    ///
    /// Nothing is returned, and so nothing gets persisted, unless the
    /// upstream allocation succeeded.
    pub fn create(&self, spec: &PrefixSpec) -> Result<PrefixRecord> {
        debug!("Creating prefix for {:?}", spec);
        let request = spec.to_request().map_err(|e| {
            error!("{}", e);
            e
        })?;
        let allocation = allocate(&self.ipam, &self.policy, &request)?;

        Ok(PrefixRecord {
            id: allocation.id,
            prefix: allocation.prefix,
            prefix_length: request.prefix_length,
            tags: request.tags,
            resource_type: request.resource_type,
            environment: request.environment,
            vrf: Some(allocation.vrf),
            last_refreshed: Some(Utc::now()),
        })
    }

    /// allocated -> allocated, or allocated -> absent.
    ///
    /// Returns `Ok(None)` when the upstream no longer knows the prefix: the
    /// allocation was removed out of band and the caller should forget it.
    pub fn read(&self, record: &PrefixRecord) -> Result<Option<PrefixRecord>> {
        debug!("Reading prefix {}", record.id);
        match self.ipam.read_prefix(record.id)? {
            Some(upstream) => Ok(Some(record.refresh_from(upstream))),
            None => {
                warn!("Prefix {} ({}) no longer exists upstream", record.id, record.prefix);
                Ok(None)
            }
        }
    }

    /// allocated -> allocated with new tags, then re-read
    pub fn update(&self, record: &PrefixRecord, tags: &TagMap) -> Result<Option<PrefixRecord>> {
        let missing = missing_required_tags(tags);
        if !missing.is_empty() {
            let e = ValidationError::MissingTags(missing);
            error!("{}", e);
            return Err(e.into());
        }
        if record.id <= 0 {
            return Err(ValidationError::MissingId.into());
        }
        if record.prefix.is_empty() {
            return Err(ValidationError::MissingPrefix.into());
        }

        let wire_tags = encode_tags(tags);
        info!("Updating tags of prefix {} ({})", record.id, record.prefix);
        self.ipam
            .update_prefix_tags(record.id, &record.prefix, &wire_tags)
            .map_err(|e| {
                error!("Failed to update prefix tags: {}", e);
                e
            })?;
        self.read(record)
    }

    /// allocated -> absent. On error the record is still valid.
    pub fn delete(&self, record: &PrefixRecord) -> Result<()> {
        if record.id <= 0 {
            return Err(ValidationError::MissingId.into());
        }
        info!("Deleting prefix {} ({})", record.id, record.prefix);
        self.ipam.delete_prefix(record.id).map_err(|e| {
            error!("Failed to delete prefix {}: {}", record.id, e);
            e
        })?;
        debug!("Prefix with ID {} deleted", record.id);
        Ok(())
    }
}
