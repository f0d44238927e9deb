//! Async jobs
//!
//! A job targets `(type, resource_id, extra_id)`. The unique constraint on
//! `(type, status, resource_id, extra_id)` allows one New and one Running job
//! per target, which is what makes "start the job if none is active" safe
//! across workers.

use crate::error::RouterError;
use chrono::{DateTime, Utc};
use pod_store::schema::ASYNC_JOBS;
use pod_store::store::{self, row_of};
use pod_store::{AsyncJob, AsyncJobLog, Filter, JobStatus, RelationalStore, RequestContext, StoreError, WriteOp};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// `extra_id` of jobs without a secondary target
pub const SP_EXTRA_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn RelationalStore>,
}

impl JobManager {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Queue a job. If a New job for the target already exists it is returned instead.
    pub async fn new_job(
        &self,
        ctx: &RequestContext,
        project_id: Option<String>,
        job_type: &str,
        resource_id: &str,
        extra_id: &str,
    ) -> Result<AsyncJob, RouterError> {
        let job = build_job(project_id, job_type, JobStatus::New, resource_id, extra_id);
        match store::create_model(self.store.as_ref(), &job).await {
            Ok(job) => {
                debug!("[{}] Queued {} job {} for {}", ctx.request_id, job_type, job.id, resource_id);
                Ok(job)
            }
            Err(e) if e.is_duplicate() => {
                let existing = self.find(job_type, JobStatus::New, resource_id, extra_id).await?;
                existing.ok_or_else(|| {
                    RouterError::Store(StoreError::Backend(format!(
                        "new {} job for {} vanished after a duplicate insert",
                        job_type, resource_id
                    )))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start a job unless one is already running for the target
    pub async fn register_job(
        &self,
        ctx: &RequestContext,
        project_id: Option<String>,
        job_type: &str,
        resource_id: &str,
        extra_id: &str,
    ) -> Result<Option<AsyncJob>, RouterError> {
        let job = build_job(project_id, job_type, JobStatus::Running, resource_id, extra_id);
        match store::create_model(self.store.as_ref(), &job).await {
            Ok(job) => {
                info!("[{}] Started {} job {} for {}", ctx.request_id, job_type, job.id, resource_id);
                Ok(Some(job))
            }
            Err(e) if e.is_duplicate() => {
                debug!("[{}] {} job for {} is already running", ctx.request_id, job_type, resource_id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Close a job.
    ///
    /// A successful job is logged and removed in one transaction. A failed
    /// job stays with status Fail; its `extra_id` is replaced by a fresh UUID
    /// so repeated failures of the same target never collide.
    pub async fn finish_job(
        &self,
        ctx: &RequestContext,
        job_id: &str,
        successful: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RouterError> {
        let job: AsyncJob = store::get_model(self.store.as_ref(), job_id).await?;

        if successful {
            let log = AsyncJobLog {
                id: job.id.clone(),
                project_id: job.project_id.clone(),
                resource_id: job.resource_id.clone(),
                job_type: job.job_type.clone(),
                timestamp,
            };
            let ops = vec![
                WriteOp::create(&log)?,
                WriteOp::delete(ASYNC_JOBS, vec![Filter::eq("id", job_id)]),
            ];
            self.store.transaction(ops).await?;
            info!("[{}] {} job {} succeeded", ctx.request_id, job.job_type, job_id);
        } else {
            let values = row_of([
                ("status", Value::from(JobStatus::Fail.as_str())),
                ("timestamp", serde_json::to_value(timestamp).map_err(StoreError::from)?),
                ("extra_id", Value::from(Uuid::new_v4().to_string())),
            ]);
            self.store.update(ASYNC_JOBS, job_id, values).await?;
            warn!("[{}] {} job {} failed", ctx.request_id, job.job_type, job_id);
        }
        Ok(())
    }

    pub async fn get_running_job(
        &self,
        job_type: &str,
        resource_id: &str,
        extra_id: &str,
    ) -> Result<Option<AsyncJob>, RouterError> {
        self.find(job_type, JobStatus::Running, resource_id, extra_id).await
    }

    /// Most recent log of a successful job for the target
    pub async fn get_latest_job_log(&self, job_type: &str, resource_id: &str) -> Result<Option<AsyncJobLog>, RouterError> {
        let filters = [Filter::eq("type", job_type), Filter::eq("resource_id", resource_id)];
        let logs: Vec<AsyncJobLog> = store::list_models(self.store.as_ref(), &filters).await?;
        Ok(logs.into_iter().max_by_key(|log| log.timestamp))
    }

    pub async fn list_jobs(&self, filters: &[Filter]) -> Result<Vec<AsyncJob>, RouterError> {
        Ok(store::list_models(self.store.as_ref(), filters).await?)
    }

    async fn find(
        &self,
        job_type: &str,
        status: JobStatus,
        resource_id: &str,
        extra_id: &str,
    ) -> Result<Option<AsyncJob>, RouterError> {
        let filters = [
            Filter::eq("type", job_type),
            Filter::eq("status", status.as_str()),
            Filter::eq("resource_id", resource_id),
            Filter::eq("extra_id", extra_id),
        ];
        let jobs: Vec<AsyncJob> = store::list_models(self.store.as_ref(), &filters).await?;
        Ok(jobs.into_iter().next())
    }
}

fn build_job(
    project_id: Option<String>,
    job_type: &str,
    status: JobStatus,
    resource_id: &str,
    extra_id: &str,
) -> AsyncJob {
    AsyncJob {
        id: Uuid::new_v4().to_string(),
        project_id,
        job_type: job_type.to_string(),
        timestamp: Utc::now(),
        status,
        resource_id: resource_id.to_string(),
        extra_id: extra_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_store::MemoryStore;

    fn manager() -> JobManager {
        JobManager::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_register_job_allows_one_running_job_per_target() {
        let jobs = manager();
        let ctx = RequestContext::admin();

        let first = jobs.register_job(&ctx, None, "router_setup", "r1", SP_EXTRA_ID).await.unwrap();
        let second = jobs.register_job(&ctx, None, "router_setup", "r1", SP_EXTRA_ID).await.unwrap();
        let other = jobs.register_job(&ctx, None, "router_setup", "r2", SP_EXTRA_ID).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(other.is_some());
        let running = jobs.get_running_job("router_setup", "r1", SP_EXTRA_ID).await.unwrap();
        assert_eq!(running.map(|j| j.id), first.map(|j| j.id));
    }

    #[tokio::test]
    async fn test_new_job_returns_existing_new_job() {
        let jobs = manager();
        let ctx = RequestContext::admin();

        let a = jobs.new_job(&ctx, Some("p".to_string()), "port_delete", "port-1", SP_EXTRA_ID).await.unwrap();
        let b = jobs.new_job(&ctx, Some("p".to_string()), "port_delete", "port-1", SP_EXTRA_ID).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.status, JobStatus::New);
    }

    #[tokio::test]
    async fn test_successful_job_is_logged_and_removed() {
        let jobs = manager();
        let ctx = RequestContext::admin();
        let job = jobs
            .register_job(&ctx, None, "router_setup", "r1", SP_EXTRA_ID)
            .await
            .unwrap()
            .unwrap();

        let done_at = Utc::now();
        jobs.finish_job(&ctx, &job.id, true, done_at).await.unwrap();

        assert!(jobs.get_running_job("router_setup", "r1", SP_EXTRA_ID).await.unwrap().is_none());
        let log = jobs.get_latest_job_log("router_setup", "r1").await.unwrap().unwrap();
        assert_eq!(log.id, job.id);
        assert_eq!(log.timestamp, done_at);

        // target is free again
        assert!(jobs.register_job(&ctx, None, "router_setup", "r1", SP_EXTRA_ID).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_jobs_never_collide() {
        let jobs = manager();
        let ctx = RequestContext::admin();

        for _ in 0..2 {
            let job = jobs
                .register_job(&ctx, None, "router_setup", "r1", SP_EXTRA_ID)
                .await
                .unwrap()
                .unwrap();
            jobs.finish_job(&ctx, &job.id, false, Utc::now()).await.unwrap();
        }

        let failed = jobs
            .list_jobs(&[Filter::eq("status", JobStatus::Fail.as_str())])
            .await
            .unwrap();
        assert_eq!(failed.len(), 2);
        assert_ne!(failed[0].extra_id, failed[1].extra_id);
        assert!(jobs.get_latest_job_log("router_setup", "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_job_log_picks_newest() {
        let jobs = manager();
        let ctx = RequestContext::admin();
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let later = Utc::now();

        for at in [later, earlier] {
            let job = jobs
                .register_job(&ctx, None, "router_setup", "r1", SP_EXTRA_ID)
                .await
                .unwrap()
                .unwrap();
            jobs.finish_job(&ctx, &job.id, true, at).await.unwrap();
        }

        let log = jobs.get_latest_job_log("router_setup", "r1").await.unwrap().unwrap();
        assert_eq!(log.timestamp, later);
    }
}
