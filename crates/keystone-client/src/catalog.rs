//! Service catalog map
//!
//! Groups the public endpoints of the catalog by region and service name.

use crate::models::{Endpoint, Service};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// region name -> service name -> public URL
pub type CatalogMap = BTreeMap<String, BTreeMap<String, String>>;

/// Build the catalog map from the service and endpoint listings.
///
/// Only `public` endpoints are kept. Endpoints without a region, or whose
/// service is not listed, are skipped. When one region advertises a service
/// more than once, the last endpoint listed wins.
pub fn build_catalog_map(services: &[Service], endpoints: &[Endpoint]) -> CatalogMap {
    let names: HashMap<&str, &str> = services
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let mut map = CatalogMap::new();
    for endpoint in endpoints.iter().filter(|e| e.is_public()) {
        let Some(region) = endpoint.region_name() else {
            warn!("Skipping endpoint {} with no region", endpoint.id);
            continue;
        };
        let Some(service_name) = names.get(endpoint.service_id.as_str()) else {
            warn!(
                "Skipping endpoint {}: unknown service {}",
                endpoint.id, endpoint.service_id
            );
            continue;
        };
        map.entry(region.to_string())
            .or_default()
            .insert(service_name.to_string(), endpoint.url.clone());
    }
    map
}
