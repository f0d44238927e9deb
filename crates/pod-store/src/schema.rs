//! Table schema
//!
//! Primary keys and unique constraints of every table the router uses.
//! Constraint checks follow SQL semantics: a row with a NULL in any column of
//! a unique constraint never conflicts on that constraint.

/// Sites (pods)
pub const SITES: &str = "pods";
/// Cached service endpoints per site
pub const CACHED_ENDPOINTS: &str = "cached_endpoints";
/// Top/bottom resource identity mapping
pub const RESOURCE_ROUTINGS: &str = "resource_routings";
/// In-flight asynchronous jobs
pub const ASYNC_JOBS: &str = "async_jobs";
/// Finished asynchronous jobs
pub const ASYNC_JOB_LOGS: &str = "async_job_logs";
/// Resources queued for deletion in sites
pub const RECYCLE_RESOURCES: &str = "recycle_resources";
/// Next-hop routes of a core router
pub const CORE_ROUTER_ROUTES: &str = "core_router_routes";
/// Destination prefixes of a route entry
pub const DESTINATION_CIDRS: &str = "destination_cidrs";

/// Definition of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name
    pub name: &'static str,
    /// Primary key columns
    pub primary_key: &'static [&'static str],
    /// Store assigns the (single-column) primary key when absent
    pub auto_increment: bool,
    /// Unique constraints besides the primary key
    pub unique: &'static [&'static [&'static str]],
}

impl TableSpec {
    /// Comma separated primary key columns, used in error messages
    pub fn primary_key_label(&self) -> String {
        self.primary_key.join(", ")
    }
}

/// The full schema of the router's tables
pub fn default_schema() -> Vec<TableSpec> {
    vec![
        TableSpec {
            name: SITES,
            primary_key: &["site_id"],
            auto_increment: false,
            unique: &[&["site_name"]],
        },
        TableSpec {
            name: CACHED_ENDPOINTS,
            primary_key: &["service_id"],
            auto_increment: false,
            unique: &[&["site_id", "service_type"]],
        },
        TableSpec {
            name: RESOURCE_ROUTINGS,
            primary_key: &["id"],
            auto_increment: true,
            unique: &[&["top_id", "site_id", "resource_type"]],
        },
        TableSpec {
            name: ASYNC_JOBS,
            primary_key: &["id"],
            auto_increment: false,
            unique: &[&["type", "status", "resource_id", "extra_id"]],
        },
        TableSpec {
            name: ASYNC_JOB_LOGS,
            primary_key: &["id"],
            auto_increment: false,
            unique: &[],
        },
        TableSpec {
            name: RECYCLE_RESOURCES,
            primary_key: &["resource_id"],
            auto_increment: false,
            unique: &[],
        },
        TableSpec {
            name: CORE_ROUTER_ROUTES,
            primary_key: &["core_router_id", "destination", "nexthop"],
            auto_increment: false,
            unique: &[],
        },
        TableSpec {
            name: DESTINATION_CIDRS,
            primary_key: &["route_entry_id", "destination"],
            auto_increment: false,
            unique: &[],
        },
    ]
}
