//! Resource type to candidate supernet pools.

use super::tables::PolicyTables;
use ipnet::Ipv4Net;

impl PolicyTables {
    /// Candidate pools for `resource_type`, in the order they must be tried.
    ///
    /// The lookup is case-insensitive. An unknown resource type yields an
    /// empty slice; the allocator reports that as a configuration error.
    pub fn pools_for(&self, resource_type: &str) -> &[Ipv4Net] {
        self.supernets()
            .get(&resource_type.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidrs(pools: &[Ipv4Net]) -> Vec<String> {
        pools.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_pools_for_known_types() {
        let tables = PolicyTables::standard();
        let expected: [(&str, &[&str]); 5] = [
            ("core", &["100.64.0.0/10"]),
            ("depot", &["10.224.0.0/16", "10.225.0.0/16"]),
            ("edge", &["10.226.0.0/16", "10.227.0.0/16"]),
            ("servicedelivery", &["10.228.0.0/16"]),
            ("vpn", &["172.16.0.0/12"]),
        ];

        for (resource_type, pools) in expected {
            assert_eq!(cidrs(tables.pools_for(resource_type)), pools, "{}", resource_type);
            assert_eq!(
                cidrs(tables.pools_for(&resource_type.to_uppercase())),
                pools,
                "{} (upper case)",
                resource_type
            );
        }
    }

    #[test]
    fn test_pools_for_unknown_type_is_empty() {
        let tables = PolicyTables::standard();
        assert!(tables.pools_for("bad").is_empty());
        assert!(tables.pools_for("").is_empty());
        assert!(tables.pools_for("core ").is_empty());
    }
}
