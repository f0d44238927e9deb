//! Identity router
//!
//! Maps a top (global) resource ID to the bottom (site-local) replica for a
//! (site, kind) pair. A row moves Unmapped -> Pending -> Mapped and the
//! Mapped transition happens at most once: the store's unique constraint on
//! `(top_id, site_id, resource_type)` decides the winner, not a lock.

use crate::error::RouterError;
use chrono::Utc;
use pod_store::schema::{RECYCLE_RESOURCES, RESOURCE_ROUTINGS};
use pod_store::store::{self, row_of};
use pod_store::{Filter, RecycleResource, RelationalStore, RequestContext, ResourceRouting, Site, StoreError, WriteOp};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts of the Pending -> Mapped transition before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// One attempt to write plus one to re-read and adopt the winner
const MIN_MAX_ATTEMPTS: usize = 2;

/// Identity of one routing row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    pub top_id: String,
    pub site_id: String,
    pub resource_type: String,
}

impl RoutingKey {
    pub fn new(top_id: impl Into<String>, site_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            top_id: top_id.into(),
            site_id: site_id.into(),
            resource_type: resource_type.into(),
        }
    }

    fn filters(&self) -> Vec<Filter> {
        vec![
            Filter::eq("top_id", self.top_id.as_str()),
            Filter::eq("site_id", self.site_id.as_str()),
            Filter::eq("resource_type", self.resource_type.as_str()),
        ]
    }

    fn conflict(&self) -> RouterError {
        RouterError::RoutingConflict {
            top_id: self.top_id.clone(),
            site_id: self.site_id.clone(),
            resource_type: self.resource_type.clone(),
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in site {}", self.resource_type, self.top_id, self.site_id)
    }
}

/// Where a routing row is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingState {
    /// No row
    Unmapped,
    /// Row exists, bottom ID not yet known
    Pending,
    /// Row carries the bottom ID
    Mapped,
}

/// Top/bottom resource identity mapping
#[derive(Clone)]
pub struct IdentityRouter {
    store: Arc<dyn RelationalStore>,
    max_attempts: usize,
}

impl IdentityRouter {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound the write attempts of [`mark_mapped`](Self::mark_mapped).
    ///
    /// At least two are always made: a caller that loses the race needs a
    /// second pass to re-read and adopt the winner's bottom ID.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(MIN_MAX_ATTEMPTS);
        self
    }

    /// The routing row for the key, if any
    pub async fn find(&self, key: &RoutingKey) -> Result<Option<ResourceRouting>, RouterError> {
        let rows: Vec<ResourceRouting> = store::list_models(self.store.as_ref(), &key.filters()).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn state(&self, key: &RoutingKey) -> Result<RoutingState, RouterError> {
        Ok(match self.find(key).await? {
            None => RoutingState::Unmapped,
            Some(row) if row.is_mapped() => RoutingState::Mapped,
            Some(_) => RoutingState::Pending,
        })
    }

    /// Unmapped -> Pending. An existing row (Pending or Mapped) is returned as is.
    pub async fn ensure_pending(
        &self,
        ctx: &RequestContext,
        key: &RoutingKey,
        project_id: Option<String>,
    ) -> Result<ResourceRouting, RouterError> {
        if let Some(row) = self.find(key).await? {
            return Ok(row);
        }
        let pending = ResourceRouting::pending(&key.top_id, &key.site_id, project_id, &key.resource_type);
        match store::create_model(self.store.as_ref(), &pending).await {
            Ok(row) => {
                debug!("[{}] Created pending routing for {}", ctx.request_id, key);
                Ok(row)
            }
            Err(e) if e.is_duplicate() => {
                debug!("[{}] Pending routing for {} created concurrently", ctx.request_id, key);
                self.find(key).await?.ok_or_else(|| key.conflict())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record the bottom ID, returning the one that won.
    ///
    /// The pending row is deleted (only while `bottom_id` is still NULL) and
    /// the mapped row inserted in one transaction. A duplicate key means
    /// another caller got there first; its row is re-read and adopted.
    ///
    /// The mapped row is a new row, so its surrogate `id` differs from the
    /// pending row's. Identify mappings by [`RoutingKey`], never by `id`.
    pub async fn mark_mapped(
        &self,
        ctx: &RequestContext,
        key: &RoutingKey,
        project_id: Option<String>,
        bottom_id: &str,
    ) -> Result<String, RouterError> {
        for attempt in 1..=self.max_attempts {
            let existing = self.find(key).await?;
            if let Some(winner) = existing.as_ref().and_then(|row| row.bottom_id.clone()) {
                if winner != bottom_id {
                    debug!("[{}] {} already mapped to {}", ctx.request_id, key, winner);
                }
                return Ok(winner);
            }

            let now = Utc::now();
            let mut mapped = ResourceRouting::pending(&key.top_id, &key.site_id, project_id.clone(), &key.resource_type);
            if let Some(pending) = existing {
                mapped.created_at = pending.created_at;
                mapped.project_id = pending.project_id.or(mapped.project_id);
            }
            mapped.bottom_id = Some(bottom_id.to_string());
            mapped.updated_at = Some(now);

            let mut filters = key.filters();
            filters.push(Filter::is_null("bottom_id"));
            let ops = vec![WriteOp::delete(RESOURCE_ROUTINGS, filters), WriteOp::create(&mapped)?];

            match self.store.transaction(ops).await {
                Ok(()) => {
                    info!("[{}] Mapped {} to bottom {}", ctx.request_id, key, bottom_id);
                    return Ok(bottom_id.to_string());
                }
                Err(e) if e.is_duplicate() => {
                    debug!(
                        "[{}] Lost mapping race for {} (attempt {}/{})",
                        ctx.request_id, key, attempt, self.max_attempts
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        warn!("[{}] Could not map {} after {} attempts", ctx.request_id, key, self.max_attempts);
        Err(key.conflict())
    }

    /// Return the bottom ID for the key, creating the replica when unmapped.
    ///
    /// `create` runs at most once and only when no mapping exists yet. If
    /// another caller maps the key first, the replica we created is queued
    /// for recycling and the winner's ID is returned.
    pub async fn get_or_materialize<F, Fut>(
        &self,
        ctx: &RequestContext,
        key: &RoutingKey,
        project_id: Option<String>,
        create: F,
    ) -> Result<String, RouterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, RouterError>>,
    {
        let routing = self.ensure_pending(ctx, key, project_id.clone()).await?;
        if let Some(bottom_id) = routing.bottom_id {
            return Ok(bottom_id);
        }

        let created = create().await?;
        let winner = self.mark_mapped(ctx, key, project_id.clone(), &created).await?;
        if winner != created {
            warn!(
                "[{}] {} was mapped concurrently, recycling orphan {}",
                ctx.request_id, key, created
            );
            self.add_recycle_resource(&created, &key.resource_type, project_id.as_deref().unwrap_or_default())
                .await?;
        }
        Ok(winner)
    }

    /// Bump `updated_at`; false when there is no row
    pub async fn touch(&self, key: &RoutingKey) -> Result<bool, RouterError> {
        let Some(id) = self.find(key).await?.and_then(|row| row.id) else {
            return Ok(false);
        };
        let values = row_of([("updated_at", serde_json::to_value(Utc::now()).map_err(StoreError::from)?)]);
        match self.store.update(RESOURCE_ROUTINGS, &id.to_string(), values).await {
            Ok(_) => Ok(true),
            // replaced by a concurrent mark_mapped
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every site holding a mapped replica of the top resource
    pub async fn get_bottom_mappings_by_top_id(
        &self,
        top_id: &str,
        resource_type: &str,
    ) -> Result<Vec<(Site, String)>, RouterError> {
        let filters = [Filter::eq("top_id", top_id), Filter::eq("resource_type", resource_type)];
        let rows: Vec<ResourceRouting> = store::list_models(self.store.as_ref(), &filters).await?;

        let mut mappings = Vec::new();
        for row in rows {
            let Some(bottom_id) = row.bottom_id else {
                continue;
            };
            match store::get_model::<_, Site>(self.store.as_ref(), &row.site_id).await {
                Ok(site) => mappings.push((site, bottom_id)),
                Err(StoreError::NotFound(_)) => {
                    debug!("Routing of {} points at unknown site {}", top_id, row.site_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(mappings)
    }

    pub async fn get_bottom_id_by_top_id_site_name(
        &self,
        top_id: &str,
        site_name: &str,
        resource_type: &str,
    ) -> Result<Option<String>, RouterError> {
        let sites: Vec<Site> = store::list_models(self.store.as_ref(), &[Filter::eq("site_name", site_name)]).await?;
        let Some(site) = sites.into_iter().next() else {
            return Ok(None);
        };
        let key = RoutingKey::new(top_id, site.site_id, resource_type);
        Ok(self.find(&key).await?.and_then(|row| row.bottom_id))
    }

    pub async fn get_top_id_by_bottom_id(
        &self,
        bottom_id: &str,
        resource_type: &str,
    ) -> Result<Option<String>, RouterError> {
        let filters = [Filter::eq("bottom_id", bottom_id), Filter::eq("resource_type", resource_type)];
        let rows: Vec<ResourceRouting> = store::list_models(self.store.as_ref(), &filters).await?;
        Ok(rows.into_iter().next().map(|row| row.top_id))
    }

    /// Remove mappings of a top resource, optionally only of one kind
    pub async fn delete_mappings_by_top_id(
        &self,
        top_id: &str,
        resource_type: Option<&str>,
    ) -> Result<u64, RouterError> {
        let mut filters = vec![Filter::eq("top_id", top_id)];
        if let Some(kind) = resource_type {
            filters.push(Filter::eq("resource_type", kind));
        }
        Ok(self.store.delete(RESOURCE_ROUTINGS, &filters).await?)
    }

    pub async fn delete_mappings_by_bottom_id(&self, bottom_id: &str) -> Result<u64, RouterError> {
        Ok(self
            .store
            .delete(RESOURCE_ROUTINGS, &[Filter::eq("bottom_id", bottom_id)])
            .await?)
    }

    /// Queue a bottom resource for deletion; false if already queued
    pub async fn add_recycle_resource(
        &self,
        resource_id: &str,
        resource_type: &str,
        project_id: &str,
    ) -> Result<bool, RouterError> {
        let resource = RecycleResource {
            resource_id: resource_id.to_string(),
            resource_type: resource_type.to_string(),
            project_id: project_id.to_string(),
        };
        match store::create_model(self.store.as_ref(), &resource).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_duplicate() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_recycle_resources(&self, filters: &[Filter]) -> Result<Vec<RecycleResource>, RouterError> {
        Ok(store::list_models(self.store.as_ref(), filters).await?)
    }

    pub async fn delete_recycle_resource(&self, resource_id: &str) -> Result<bool, RouterError> {
        let removed = self
            .store
            .delete(RECYCLE_RESOURCES, &[Filter::eq("resource_id", resource_id)])
            .await?;
        Ok(removed > 0)
    }
}
