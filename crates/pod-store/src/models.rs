//! Row models
//!
//! Typed views of the rows stored in each table. Models convert to and from
//! generic [`Row`]s through serde, so column names are the serde field names.

use crate::error::StoreError;
use crate::schema;
use crate::store::Row;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A typed row bound to a table
pub trait Model: Serialize + DeserializeOwned {
    /// Table the model lives in
    const TABLE: &'static str;

    /// Serialize into a generic row
    fn to_row(&self) -> Result<Row, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::InvalidRow(format!(
                "{} did not serialize to an object: {}",
                Self::TABLE,
                other
            ))),
        }
    }

    /// Deserialize from a generic row
    fn from_row(row: Row) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

/// Site (pod): one independently operated backend region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Site ID
    pub site_id: String,
    /// Unique site name; equals the catalog authority's region name
    pub site_name: String,
    /// Availability-zone label of the site itself
    #[serde(default)]
    pub site_az_name: Option<String>,
    /// Parent grouping label (data center)
    #[serde(default)]
    pub dc_name: Option<String>,
    /// Availability zone the site belongs to; empty for the top site
    #[serde(default)]
    pub az_name: String,
}

impl Site {
    /// Create a site with only the required labels
    pub fn new(site_id: impl Into<String>, site_name: impl Into<String>, az_name: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            site_name: site_name.into(),
            site_az_name: None,
            dc_name: None,
            az_name: az_name.into(),
        }
    }

    /// Set the parent grouping label
    #[must_use]
    pub fn with_dc(mut self, dc_name: impl Into<String>) -> Self {
        self.dc_name = Some(dc_name.into());
        self
    }

    /// Set the site's own availability-zone label
    #[must_use]
    pub fn with_site_az(mut self, site_az_name: impl Into<String>) -> Self {
        self.site_az_name = Some(site_az_name.into());
        self
    }
}

impl Model for Site {
    const TABLE: &'static str = schema::SITES;
}

/// Cached address of one service in one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEndpoint {
    /// Surrogate row ID
    pub service_id: String,
    /// Owning site
    pub site_id: String,
    /// Service kind (e.g. "neutron")
    pub service_type: String,
    /// Service URL
    pub service_url: String,
}

impl Model for CachedEndpoint {
    const TABLE: &'static str = schema::CACHED_ENDPOINTS;
}

/// Mapping between a top (global) resource and its bottom (site-local) replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRouting {
    /// Surrogate ID, assigned by the store.
    ///
    /// Not stable: the Pending -> Mapped transition replaces the row, so the
    /// mapped row gets a new ID. Key lookups on (top_id, site_id,
    /// resource_type) instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Global resource ID
    pub top_id: String,
    /// Site-local replica ID; `None` until materialized
    #[serde(default)]
    pub bottom_id: Option<String>,
    /// Site holding the replica
    pub site_id: String,
    /// Owning project
    #[serde(default)]
    pub project_id: Option<String>,
    /// Resource kind
    pub resource_type: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last touch
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ResourceRouting {
    /// A routing row that has not been materialized yet
    pub fn pending(
        top_id: impl Into<String>,
        site_id: impl Into<String>,
        project_id: Option<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            top_id: top_id.into(),
            bottom_id: None,
            site_id: site_id.into(),
            project_id,
            resource_type: resource_type.into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// True once the bottom ID is recorded
    pub fn is_mapped(&self) -> bool {
        self.bottom_id.is_some()
    }
}

impl Model for ResourceRouting {
    const TABLE: &'static str = schema::RESOURCE_ROUTINGS;
}

/// Lifecycle state of an asynchronous job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Queued, not yet picked up
    New,
    /// Being executed
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Fail,
}

impl JobStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "New",
            JobStatus::Running => "Running",
            JobStatus::Success => "Success",
            JobStatus::Fail => "Fail",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous job against a (resource, extra) target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncJob {
    /// Job ID
    pub id: String,
    /// Owning project
    #[serde(default)]
    pub project_id: Option<String>,
    /// Job type (e.g. "router_setup")
    #[serde(rename = "type")]
    pub job_type: String,
    /// Time the job entered its current status
    pub timestamp: DateTime<Utc>,
    /// Current status
    pub status: JobStatus,
    /// Target resource
    pub resource_id: String,
    /// Secondary target (site, peer resource); a fixed placeholder when unused
    pub extra_id: String,
}

impl Model for AsyncJob {
    const TABLE: &'static str = schema::ASYNC_JOBS;
}

/// Record of a successfully finished job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncJobLog {
    /// Log ID (the job ID)
    pub id: String,
    /// Owning project
    #[serde(default)]
    pub project_id: Option<String>,
    /// Target resource
    pub resource_id: String,
    /// Job type
    #[serde(rename = "type")]
    pub job_type: String,
    /// Completion time
    pub timestamp: DateTime<Utc>,
}

impl Model for AsyncJobLog {
    const TABLE: &'static str = schema::ASYNC_JOB_LOGS;
}

/// A bottom resource queued for deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleResource {
    /// Resource ID
    pub resource_id: String,
    /// Resource kind
    pub resource_type: String,
    /// Owning project
    pub project_id: String,
}

impl Model for RecycleResource {
    const TABLE: &'static str = schema::RECYCLE_RESOURCES;
}

/// A destination/next-hop pair owned by a core router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreRouterRoute {
    /// Owning core router
    pub core_router_id: String,
    /// Destination prefix
    pub destination: String,
    /// Next-hop address
    pub nexthop: String,
}

impl Model for CoreRouterRoute {
    const TABLE: &'static str = schema::CORE_ROUTER_ROUTES;
}

/// A destination prefix owned by a route entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationCidr {
    /// Owning route entry
    pub route_entry_id: String,
    /// Destination prefix
    pub destination: String,
}

impl Model for DestinationCidr {
    const TABLE: &'static str = schema::DESTINATION_CIDRS;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_routing_omits_id_and_keeps_null_bottom() {
        let routing = ResourceRouting::pending("top-1", "pod-1", Some("proj".to_string()), "network");
        let row = routing.to_row().unwrap();
        assert!(!row.contains_key("id"));
        assert_eq!(row.get("bottom_id"), Some(&Value::Null));
        assert!(!routing.is_mapped());
    }

    #[test]
    fn test_job_type_column_is_named_type() {
        let job = AsyncJob {
            id: "j1".to_string(),
            project_id: None,
            job_type: "router_setup".to_string(),
            timestamp: Utc::now(),
            status: JobStatus::Running,
            resource_id: "r1".to_string(),
            extra_id: "e1".to_string(),
        };
        let row = job.to_row().unwrap();
        assert_eq!(row.get("type"), Some(&Value::from("router_setup")));
        assert_eq!(row.get("status"), Some(&Value::from("Running")));
        assert_eq!(AsyncJob::from_row(row).unwrap(), job);
    }
}
