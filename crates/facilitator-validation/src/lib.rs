//! Stateless normalization and validation for raw JSON documents flowing
//! into the mirror: loaded parents/policies from the DB Loader and pushed
//! snapshots from the HTTP push endpoint both go through the same parsers
//! here, so the two paths can never disagree about what "valid" means.

pub mod fields;
pub mod mirror;
pub mod parent;
pub mod policy;

pub use facilitator_core::key::svc_key;
pub use mirror::parse_mirror;
pub use parent::parse_parent;
pub use policy::{parse_edge_policy, parse_policy, parse_s2s_policy};

#[cfg(test)]
mod idempotence {
    use super::*;
    use serde_json::Value;

    fn to_wire(map: &facilitator_core::schema::MirrorMap) -> Value {
        serde_json::to_value(map).expect("normalized map always serializes")
    }

    #[test]
    fn parse_mirror_is_idempotent_on_its_own_output() {
        let raw = serde_json::json!({
            "auth@1": {
                "serviceConfig": {
                    "id": "id-1",
                    "slug": "auth",
                    "version": 1,
                    "enabled": true,
                    "internalOnly": false,
                    "baseUrl": "https://auth.internal",
                    "outboundApiPrefix": "/auth",
                    "exposeHealth": true,
                    "updatedAt": "2026-01-01T00:00:00Z",
                    "updatedBy": "operator",
                },
                "policies": { "edge": [], "s2s": [] },
            }
        });

        let once = parse_mirror(&raw).unwrap();
        let wired_once = to_wire(&once);
        let twice = parse_mirror(&wired_once).unwrap();
        let wired_twice = to_wire(&twice);

        assert_eq!(wired_once, wired_twice);
    }

    proptest::proptest! {
        #[test]
        fn parse_mirror_normalization_is_a_fixpoint(
            slug in "[a-z][a-z0-9-]{0,12}",
            version in 1u32..50,
        ) {
            let raw = serde_json::json!({
                format!("{slug}@{version}"): {
                    "serviceConfig": {
                        "id": "id-1",
                        "slug": slug,
                        "version": version,
                        "enabled": true,
                        "internalOnly": false,
                        "baseUrl": "https://svc.internal",
                        "outboundApiPrefix": "/svc",
                        "exposeHealth": true,
                        "updatedAt": "2026-01-01T00:00:00Z",
                        "updatedBy": "operator",
                    },
                    "policies": { "edge": [], "s2s": [] },
                }
            });

            let once = parse_mirror(&raw).unwrap();
            let wired = to_wire(&once);
            let twice = parse_mirror(&wired).unwrap();
            proptest::prop_assert_eq!(to_wire(&once), to_wire(&twice));
        }
    }
}
