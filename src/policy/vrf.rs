//! Environment to VRF resolution.
//!
//! Most resource types live in the VRF named after their environment. Service
//! delivery has a dedicated VRF, except for non-standard environments which
//! stay in `pre-dev` so ad hoc work never consumes real service delivery space:
//!
//! | resource type     | environment                   | VRF               |
//! |-------------------|-------------------------------|-------------------|
//! | servicedelivery   | dev, test, stage, prod*       | servicedelivery   |
//! | servicedelivery   | servicedelivery               | pre-dev           |
//! | servicedelivery   | anything else                 | pre-dev           |
//! | any other type    | dev, test, stage, prod*       | the environment   |
//! | any other type    | servicedelivery               | rejected upstream of this module |
//! | any other type    | anything else                 | pre-dev           |

use super::tables::{PolicyTables, CANONICAL_VRFS, PRE_DEV_VRF, SERVICE_DELIVERY};

impl PolicyTables {
    /// Map an environment spelling onto the VRF that manages it.
    ///
    /// Matching is case-insensitive; the first rule that matches wins:
    /// exact canonical name, `prod<digit>`/`production`, `staging`,
    /// and finally the `pre-dev` catch-all.
    pub fn normalize_environment(&self, environment: &str) -> &'static str {
        let lowered = environment.to_lowercase();

        if let Some(vrf) = CANONICAL_VRFS.iter().find(|vrf| **vrf == lowered) {
            return *vrf;
        }
        if self.is_numbered_prod(&lowered) || lowered == "production" {
            return "prod";
        }
        if lowered == "staging" {
            return "stage";
        }
        PRE_DEV_VRF
    }

    /// Resolve the VRF name an allocation for `resource_type` in `environment`
    /// must be made in.
    pub fn resolve_vrf(&self, environment: &str, resource_type: &str) -> &'static str {
        let env_vrf = self.normalize_environment(environment);
        if env_vrf != PRE_DEV_VRF && resource_type.eq_ignore_ascii_case(SERVICE_DELIVERY) {
            return SERVICE_DELIVERY;
        }
        env_vrf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_ENVS: [&str; 4] = ["dev", "stage", "test", "prod"];
    const OTHER_TYPES: [&str; 4] = ["core", "depot", "edge", "vpn"];

    #[test]
    fn test_canonical_environments() {
        let tables = PolicyTables::standard();
        for env in GOOD_ENVS {
            assert_eq!(tables.normalize_environment(env), env);
        }

        let mixed = ["Dev", "sTage", "Test", "prOd"];
        for (env, expected) in mixed.iter().zip(GOOD_ENVS) {
            assert_eq!(tables.normalize_environment(env), expected);
            for resource_type in OTHER_TYPES {
                assert_eq!(tables.resolve_vrf(env, resource_type), expected);
            }
        }
    }

    #[test]
    fn test_alternate_spellings() {
        let tables = PolicyTables::standard();
        assert_eq!(tables.resolve_vrf("prod1", "core"), "prod");
        assert_eq!(tables.resolve_vrf("PROD0", "edge"), "prod");
        assert_eq!(tables.resolve_vrf("prod12-east", "edge"), "prod");
        assert_eq!(tables.resolve_vrf("production", "vpn"), "prod");
        assert_eq!(tables.resolve_vrf("Staging", "depot"), "stage");
    }

    #[test]
    fn test_non_standard_environments_fall_back_to_pre_dev() {
        let tables = PolicyTables::standard();
        for env in ["non-standard", "anything-else", "prod-", "products", "pre-dev", "", "develop"] {
            assert_eq!(tables.resolve_vrf(env, "core"), "pre-dev", "env {:?}", env);
        }
    }

    #[test]
    fn test_service_delivery_override() {
        let tables = PolicyTables::standard();
        for env in GOOD_ENVS {
            assert_eq!(tables.resolve_vrf(env, "servicedelivery"), "servicedelivery");
            assert_eq!(tables.resolve_vrf(env, "ServiceDelivery"), "servicedelivery");
        }
        assert_eq!(tables.resolve_vrf("production", "servicedelivery"), "servicedelivery");
        assert_eq!(tables.resolve_vrf("non-standard", "servicedelivery"), "pre-dev");
    }

    #[test]
    fn test_non_ascii_digit_is_not_numbered_prod() {
        let tables = PolicyTables::standard();
        assert_eq!(tables.normalize_environment("prod\u{0663}"), "pre-dev");
        assert_eq!(tables.resolve_vrf("prod\u{0663}", "servicedelivery"), "pre-dev");
        assert_eq!(tables.normalize_environment("Prod3"), "prod");
    }

    #[test]
    fn test_service_delivery_environment() {
        let tables = PolicyTables::standard();
        // Not a canonical spelling, so the environment alone maps to pre-dev.
        assert_eq!(tables.normalize_environment("servicedelivery"), "pre-dev");
        assert_eq!(tables.resolve_vrf("servicedelivery", "servicedelivery"), "pre-dev");
    }
}
