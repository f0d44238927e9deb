//! Typed model round trips through the MemoryStore

use chrono::Utc;
use pod_store::store::{self, row_of};
use pod_store::{
    AsyncJob, CachedEndpoint, Filter, JobStatus, MemoryStore, RelationalStore, ResourceRouting, Site,
    StoreError, WriteOp,
};
use serde_json::json;

#[tokio::test]
async fn test_site_lookup_by_name() {
    let db = MemoryStore::new();
    store::create_model(&db, &Site::new("pod-1", "RegionOne", "").with_dc("dc1"))
        .await
        .unwrap();
    store::create_model(&db, &Site::new("pod-2", "RegionTwo", "az1"))
        .await
        .unwrap();

    let found: Vec<Site> = store::list_models(&db, &[Filter::eq("site_name", "RegionTwo")])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].site_id, "pod-2");
    assert_eq!(found[0].az_name, "az1");

    let top: Site = store::get_model(&db, "pod-1").await.unwrap();
    assert_eq!(top.dc_name.as_deref(), Some("dc1"));
    assert_eq!(top.site_az_name, None);
}

#[tokio::test]
async fn test_endpoint_update_in_place() {
    let db = MemoryStore::new();
    let endpoint = CachedEndpoint {
        service_id: "svc-1".to_string(),
        site_id: "pod-1".to_string(),
        service_type: "neutron".to_string(),
        service_url: "http://10.0.0.1:9696".to_string(),
    };
    store::create_model(&db, &endpoint).await.unwrap();

    let updated: CachedEndpoint = store::update_model(
        &db,
        "svc-1",
        row_of([("service_url", json!("http://10.0.0.2:9696"))]),
    )
    .await
    .unwrap();
    assert_eq!(updated.service_url, "http://10.0.0.2:9696");
    assert_eq!(updated.service_type, "neutron");
}

#[tokio::test]
async fn test_routing_unique_on_top_site_kind() {
    let db = MemoryStore::new();
    let first: ResourceRouting =
        store::create_model(&db, &ResourceRouting::pending("top-1", "pod-1", None, "network"))
            .await
            .unwrap();
    assert_eq!(first.id, Some(1));

    let err = store::create_model(&db, &ResourceRouting::pending("top-1", "pod-1", None, "network"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    // Same top id in another site is a separate replica
    store::create_model(&db, &ResourceRouting::pending("top-1", "pod-2", None, "network"))
        .await
        .unwrap();

    let pending: Vec<ResourceRouting> = store::list_models(
        &db,
        &[Filter::eq("top_id", "top-1"), Filter::is_null("bottom_id")],
    )
    .await
    .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn test_one_running_job_per_target() {
    let db = MemoryStore::new();
    let job = |id: &str| AsyncJob {
        id: id.to_string(),
        project_id: Some("proj".to_string()),
        job_type: "router_setup".to_string(),
        timestamp: Utc::now(),
        status: JobStatus::Running,
        resource_id: "router-1".to_string(),
        extra_id: "#".to_string(),
    };
    store::create_model(&db, &job("job-1")).await.unwrap();
    let err = store::create_model(&db, &job("job-2")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEntry { .. }));

    let rows = db.list("async_jobs", &[Filter::eq("status", "Running")]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("type"), Some(&json!("router_setup")));
}

#[tokio::test]
async fn test_transaction_applies_all_ops() {
    let db = MemoryStore::new();
    store::create_model(&db, &Site::new("pod-1", "RegionOne", "")).await.unwrap();

    db.transaction(vec![
        WriteOp::delete("pods", vec![Filter::eq("site_id", "pod-1")]),
        WriteOp::create(&Site::new("pod-2", "RegionOne", "")).unwrap(),
    ])
    .await
    .unwrap();

    let sites: Vec<Site> = store::list_models(&db, &[]).await.unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].site_id, "pod-2");
}
