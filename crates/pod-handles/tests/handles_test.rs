//! Capability declarations of the bundled handlers

use pod_handles::{default_handles, Operation};
use std::collections::HashSet;
use std::time::Duration;

#[test]
fn test_default_handles_claim_disjoint_resources() {
    let handles = default_handles(Duration::from_secs(5)).unwrap();

    let services: HashSet<String> = handles.iter().map(|h| h.service_type().to_string()).collect();
    assert_eq!(services.len(), handles.len());
    assert!(services.contains("neutron"));
    assert!(services.contains("nova"));
    assert!(services.contains("glance"));

    let mut seen = HashSet::new();
    for handle in &handles {
        for (resource, _) in handle.support_resource() {
            assert!(seen.insert(resource), "{} claimed twice", resource);
        }
    }
}

#[test]
fn test_endpoints_start_unset() {
    for handle in default_handles(Duration::from_secs(5)).unwrap() {
        assert!(!handle.is_endpoint_url_set());
        handle.update_endpoint_url("http://10.0.0.1:1234");
        assert!(handle.is_endpoint_url_set());
        handle.clear_endpoint_url();
        assert!(!handle.is_endpoint_url_set());
    }
}

#[test]
fn test_only_router_and_aggregate_take_actions() {
    let handles = default_handles(Duration::from_secs(5)).unwrap();
    let mut with_actions: Vec<&str> = handles
        .iter()
        .flat_map(|h| h.support_resource())
        .filter(|(_, ops)| ops.contains(Operation::Action))
        .map(|(resource, _)| resource)
        .collect();
    with_actions.sort();
    assert_eq!(with_actions, vec!["aggregate", "router"]);
}
