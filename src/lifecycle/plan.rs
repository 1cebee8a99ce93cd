//! Desired-state planning.
//!
//! Compares what the user asked for with what is recorded and decides which
//! lifecycle transitions to run. Fields that pick the pool or VRF force a
//! replacement; tags are updated in place.

use super::{PrefixRecord, PrefixSpec, Provider};
use crate::allocator::validate_request;
use crate::error::Result;
use crate::ipam::Ipam;
use log::info;
use std::fmt;

/// A create-time field whose change forces a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    ResourceType,
    Environment,
    PrefixLength,
}

impl fmt::Display for ReplaceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self {
            ReplaceReason::ResourceType => "resource_type",
            ReplaceReason::Environment => "environment",
            ReplaceReason::PrefixLength => "prefix_length",
        };
        f.write_str(field)
    }
}

/// What `apply` will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing recorded yet
    Create,
    /// Only the tags differ
    UpdateTags,
    /// Destroy the current allocation and allocate a new one
    Replace(Vec<ReplaceReason>),
    NoOp,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Create => write!(f, "create"),
            Plan::UpdateTags => write!(f, "update tags in place"),
            Plan::Replace(reasons) => {
                let fields: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                write!(f, "replace (changed: {})", fields.join(", "))
            }
            Plan::NoOp => write!(f, "no changes"),
        }
    }
}

/// Decide how to get from `current` to `desired`
pub fn plan(desired: &PrefixSpec, current: Option<&PrefixRecord>) -> Plan {
    let Some(current) = current else {
        return Plan::Create;
    };

    let mut reasons = Vec::new();
    if desired.resource_type.as_deref() != Some(current.resource_type.as_str()) {
        reasons.push(ReplaceReason::ResourceType);
    }
    if desired.environment.as_deref() != Some(current.environment.as_str()) {
        reasons.push(ReplaceReason::Environment);
    }
    if desired.prefix_length != Some(current.prefix_length) {
        reasons.push(ReplaceReason::PrefixLength);
    }

    if !reasons.is_empty() {
        Plan::Replace(reasons)
    } else if desired.tags != current.tags {
        Plan::UpdateTags
    } else {
        Plan::NoOp
    }
}

/// Bring the upstream allocation in line with `desired`.
///
/// `state` is the caller's persisted slot. It is only overwritten once the
/// corresponding upstream call has succeeded, so a failed step can be retried.
pub fn apply<I: Ipam>(provider: &Provider<I>, desired: &PrefixSpec, state: &mut Option<PrefixRecord>) -> Result<Plan> {
    let plan = plan(desired, state.as_ref());
    info!("Plan: {}", plan);

    let current = state.clone();
    match (&plan, current.as_ref()) {
        (Plan::Create, _) => {
            *state = Some(provider.create(desired)?);
        }
        (Plan::UpdateTags, Some(current)) => {
            *state = provider.update(current, &desired.tags)?;
        }
        (Plan::Replace(_), Some(current)) => {
            // Validate the replacement before giving up the current prefix.
            let request = desired.to_request()?;
            validate_request(provider.policy(), &request)?;
            provider.delete(current)?;
            *state = None;
            *state = Some(provider.create(desired)?);
        }
        _ => {}
    }
    Ok(plan)
}

/// Delete the recorded allocation, if any, and clear the slot
pub fn destroy<I: Ipam>(provider: &Provider<I>, state: &mut Option<PrefixRecord>) -> Result<()> {
    if let Some(current) = state.as_ref() {
        provider.delete(current)?;
    }
    *state = None;
    Ok(())
}
