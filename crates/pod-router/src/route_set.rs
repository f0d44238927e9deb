//! Child-set reconciliation
//!
//! Replaces the set of child rows owned by a parent (routes of a core router,
//! destination prefixes of a route entry) with a desired set. Keys are
//! normalized first so `10.0.0.0/24` and `10.0.0.0/024` compare equal, then
//! only the difference is written, in one transaction.

use crate::error::RouterError;
use ipnet::IpNet;
use pod_store::schema::{CORE_ROUTER_ROUTES, DESTINATION_CIDRS};
use pod_store::store::Row;
use pod_store::{Filter, RelationalStore, WriteOp};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use tracing::{debug, info};

/// Canonical form of a key column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Network prefix; host bits are kept as given
    Cidr,
    /// Single IP address
    Address,
    /// Compared verbatim
    Plain,
}

impl Normalizer {
    pub fn normalize(&self, raw: &str) -> Result<String, RouterError> {
        let raw = raw.trim();
        match self {
            Normalizer::Cidr => raw
                .parse::<IpNet>()
                .map(|net| net.to_string())
                .map_err(|_| RouterError::InvalidCidr(raw.to_string())),
            Normalizer::Address => raw
                .parse::<IpAddr>()
                .map(|addr| addr.to_string())
                .map_err(|_| RouterError::InvalidCidr(raw.to_string())),
            Normalizer::Plain => Ok(raw.to_string()),
        }
    }
}

/// A child table whose rows are keyed by parent plus natural key columns
#[derive(Debug, Clone, Copy)]
pub struct ChildSet {
    pub table: &'static str,
    pub parent_column: &'static str,
    pub key_columns: &'static [(&'static str, Normalizer)],
}

/// Next-hop routes of a core router
pub const CORE_ROUTER_ROUTE_SET: ChildSet = ChildSet {
    table: CORE_ROUTER_ROUTES,
    parent_column: "core_router_id",
    key_columns: &[("destination", Normalizer::Cidr), ("nexthop", Normalizer::Address)],
};

/// Destination prefixes of a route entry
pub const DESTINATION_CIDR_SET: ChildSet = ChildSet {
    table: DESTINATION_CIDRS,
    parent_column: "route_entry_id",
    key_columns: &[("destination", Normalizer::Cidr)],
};

/// Natural key values, in `key_columns` order
pub type ChildKey = Vec<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff {
    pub to_delete: BTreeSet<ChildKey>,
    pub to_insert: BTreeSet<ChildKey>,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty()
    }
}

/// Keys only in `old` are deleted, keys only in `new` inserted
pub fn diff<'a, O, N>(old: O, new: N) -> SetDiff
where
    O: IntoIterator<Item = &'a ChildKey>,
    N: IntoIterator<Item = &'a ChildKey>,
{
    let old: BTreeSet<&ChildKey> = old.into_iter().collect();
    let new: BTreeSet<&ChildKey> = new.into_iter().collect();
    SetDiff {
        to_delete: old.difference(&new).map(|k| (*k).clone()).collect(),
        to_insert: new.difference(&old).map(|k| (*k).clone()).collect(),
    }
}

impl ChildSet {
    fn normalize_key(&self, raw: &[String]) -> Result<ChildKey, RouterError> {
        if raw.len() != self.key_columns.len() {
            return Err(RouterError::InvalidCidr(format!(
                "{} expects {} key values, got {}",
                self.table,
                self.key_columns.len(),
                raw.len()
            )));
        }
        self.key_columns
            .iter()
            .zip(raw)
            .map(|((_, normalizer), value)| normalizer.normalize(value))
            .collect()
    }

    fn raw_key(&self, row: &Row) -> Option<ChildKey> {
        self.key_columns
            .iter()
            .map(|(col, _)| row.get(*col).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    fn row(&self, parent_id: &str, key: &[String]) -> Row {
        let mut row = Row::new();
        row.insert(self.parent_column.to_string(), Value::from(parent_id));
        for ((col, _), value) in self.key_columns.iter().zip(key) {
            row.insert((*col).to_string(), Value::from(value.as_str()));
        }
        row
    }

    fn filters(&self, parent_id: &str, key: &[String]) -> Vec<Filter> {
        let mut filters = vec![Filter::eq(self.parent_column, parent_id)];
        for ((col, _), value) in self.key_columns.iter().zip(key) {
            filters.push(Filter::eq(*col, value.as_str()));
        }
        filters
    }
}

/// Make the children of `parent_id` equal `desired`; returns what changed.
///
/// Every desired key is validated before anything is written. All deletes
/// and inserts land in a single transaction.
pub async fn reconcile(
    store: &dyn RelationalStore,
    set: &ChildSet,
    parent_id: &str,
    desired: &[Vec<String>],
) -> Result<SetDiff, RouterError> {
    let desired: BTreeSet<ChildKey> = desired
        .iter()
        .map(|raw| set.normalize_key(raw))
        .collect::<Result<_, _>>()?;

    // canonical key -> key as stored, so deletes hit the stored spelling
    let mut stored: BTreeMap<ChildKey, Vec<ChildKey>> = BTreeMap::new();
    for row in store.list(set.table, &[Filter::eq(set.parent_column, parent_id)]).await? {
        let Some(raw) = set.raw_key(&row) else {
            debug!("Skipping malformed {} row of {}", set.table, parent_id);
            continue;
        };
        let canonical = set.normalize_key(&raw).unwrap_or_else(|_| raw.clone());
        stored.entry(canonical).or_default().push(raw);
    }

    let changes = diff(stored.keys(), desired.iter());
    if changes.is_empty() {
        debug!("{} of {} already up to date", set.table, parent_id);
        return Ok(changes);
    }

    let mut ops = Vec::new();
    for key in &changes.to_delete {
        for raw in stored.get(key).into_iter().flatten() {
            ops.push(WriteOp::delete(set.table, set.filters(parent_id, raw)));
        }
    }
    for key in &changes.to_insert {
        ops.push(WriteOp::Create {
            table: set.table.to_string(),
            row: set.row(parent_id, key),
        });
    }
    store.transaction(ops).await?;

    info!(
        "Updated {} of {}: {} removed, {} added",
        set.table,
        parent_id,
        changes.to_delete.len(),
        changes.to_insert.len()
    );
    Ok(changes)
}

/// Replace the `(destination, nexthop)` routes of a core router
pub async fn replace_routes(
    store: &dyn RelationalStore,
    core_router_id: &str,
    routes: &[(String, String)],
) -> Result<SetDiff, RouterError> {
    let desired: Vec<Vec<String>> = routes
        .iter()
        .map(|(destination, nexthop)| vec![destination.clone(), nexthop.clone()])
        .collect();
    reconcile(store, &CORE_ROUTER_ROUTE_SET, core_router_id, &desired).await
}

/// Replace the destination prefixes of a route entry
pub async fn replace_destination_cidrs(
    store: &dyn RelationalStore,
    route_entry_id: &str,
    cidrs: &[String],
) -> Result<SetDiff, RouterError> {
    let desired: Vec<Vec<String>> = cidrs.iter().map(|cidr| vec![cidr.clone()]).collect();
    reconcile(store, &DESTINATION_CIDR_SET, route_entry_id, &desired).await
}
