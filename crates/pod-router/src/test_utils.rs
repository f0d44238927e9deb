//! Test utilities for router unit tests
//!
//! Fixtures wiring a [`PodRouter`] to an in-memory store, a mock catalog
//! authority and a mock Neutron handler.

use crate::{ClientConfig, PodRouter};
use keystone_client::MockKeystoneClient;
use pod_handles::{HandleError, MockResourceHandle, Operations, ResourceHandle};
use pod_store::schema::{CACHED_ENDPOINTS, RESOURCE_ROUTINGS};
use pod_store::{Filter, MemoryStore, RelationalStore, RequestContext, Row, Site, StoreError, WriteOp};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const TOP_SITE: &str = "alpha";
pub const NEUTRON_URL: &str = "http://10.1.1.1:9696";

/// Config with auto refresh on and admin credentials for the top site "alpha"
pub fn admin_config() -> ClientConfig {
    ClientConfig {
        auto_refresh_endpoint: true,
        top_site_name: TOP_SITE.to_string(),
        admin_username: Some("admin".to_string()),
        admin_password: Some("secret".to_string()),
        admin_tenant: Some("admin".to_string()),
        ..ClientConfig::default()
    }
}

/// A Neutron mock claiming networks (CRUD) and routers (CRUD and actions)
pub fn neutron_mock() -> MockResourceHandle {
    MockResourceHandle::new(
        "neutron",
        &[
            ("network", Operations::CRUD),
            ("router", Operations::CRUD | Operations::ACTION),
        ],
    )
}

pub struct Fixture {
    pub store: MemoryStore,
    pub keystone: MockKeystoneClient,
    pub neutron: MockResourceHandle,
    pub router: PodRouter,
}

/// Router over a fresh store with the top site registered but nothing cached
pub async fn fixture(config: ClientConfig) -> Fixture {
    let store = MemoryStore::new();
    fixture_with_store(config, store.clone(), Arc::new(store)).await
}

/// Like [`fixture`] but the router talks to `backend`, which must wrap `store`
pub async fn fixture_with_store(
    config: ClientConfig,
    store: MemoryStore,
    backend: Arc<dyn RelationalStore>,
) -> Fixture {
    let keystone = MockKeystoneClient::new("http://keystone.test/v3");
    let neutron = neutron_mock();
    let handles: Vec<Arc<dyn ResourceHandle>> = vec![Arc::new(neutron.clone())];
    let router = PodRouter::new(config, backend, Arc::new(keystone.clone()), handles).unwrap();

    pod_store::store::create_model(&store, &Site::new("pod-top", TOP_SITE, ""))
        .await
        .unwrap();

    Fixture {
        store,
        keystone,
        neutron,
        router,
    }
}

/// Store that lets a "concurrent writer" insert the same cached endpoint
/// right before the first cached endpoint insert goes through
#[derive(Clone)]
pub struct RacingStore {
    pub inner: MemoryStore,
    raced: Arc<AtomicBool>,
}

impl RacingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            raced: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl RelationalStore for RacingStore {
    async fn create(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        if table == CACHED_ENDPOINTS && !self.raced.swap(true, Ordering::SeqCst) {
            let mut rival = row.clone();
            rival.insert("service_id".to_string(), Value::from("rival-writer"));
            self.inner.create(table, rival).await?;
        }
        self.inner.create(table, row).await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Row, StoreError> {
        self.inner.get(table, id).await
    }

    async fn list(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        self.inner.list(table, filters).await
    }

    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Row, StoreError> {
        self.inner.update(table, id, values).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        self.inner.delete(table, filters).await
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.inner.transaction(ops).await
    }
}

/// Store where a "concurrent writer" maps the same key to `rival-bottom`
/// right before the first routing transaction commits
#[derive(Clone)]
pub struct RivalMappingStore {
    pub inner: MemoryStore,
    raced: Arc<AtomicBool>,
}

impl RivalMappingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            raced: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl RelationalStore for RivalMappingStore {
    async fn create(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        self.inner.create(table, row).await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Row, StoreError> {
        self.inner.get(table, id).await
    }

    async fn list(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        self.inner.list(table, filters).await
    }

    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Row, StoreError> {
        self.inner.update(table, id, values).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        self.inner.delete(table, filters).await
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let rival = ops
                .iter()
                .cloned()
                .map(|op| match op {
                    WriteOp::Create { table, mut row } if table == RESOURCE_ROUTINGS => {
                        row.insert("bottom_id".to_string(), Value::from("rival-bottom"));
                        WriteOp::Create { table, row }
                    }
                    other => other,
                })
                .collect();
            self.inner.transaction(rival).await?;
        }
        self.inner.transaction(ops).await
    }
}

/// Neutron mock whose endpoint slot is shared with "another call".
///
/// With `clear_before_first_list`, the slot is cleared right before the first
/// list reaches the mock, as a concurrent call clearing it would. Every
/// `clear_endpoint_url` is counted.
pub struct SharedSlotHandle {
    pub inner: MockResourceHandle,
    clear_before_first_list: AtomicBool,
    clears: AtomicUsize,
}

impl SharedSlotHandle {
    pub fn new(inner: MockResourceHandle, clear_before_first_list: bool) -> Self {
        Self {
            inner,
            clear_before_first_list: AtomicBool::new(clear_before_first_list),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ResourceHandle for SharedSlotHandle {
    fn service_type(&self) -> &str {
        self.inner.service_type()
    }

    fn support_resource(&self) -> Vec<(&'static str, Operations)> {
        self.inner.support_resource()
    }

    fn is_endpoint_url_set(&self) -> bool {
        self.inner.is_endpoint_url_set()
    }

    fn update_endpoint_url(&self, url: &str) {
        self.inner.update_endpoint_url(url);
    }

    fn clear_endpoint_url(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear_endpoint_url();
    }

    async fn handle_list(
        &self,
        ctx: &RequestContext,
        resource: &str,
        filters: &[Filter],
    ) -> Result<Vec<Value>, HandleError> {
        if self.clear_before_first_list.swap(false, Ordering::SeqCst) {
            self.inner.clear_endpoint_url();
        }
        self.inner.handle_list(ctx, resource, filters).await
    }

    async fn handle_create(&self, ctx: &RequestContext, resource: &str, body: Value) -> Result<Value, HandleError> {
        self.inner.handle_create(ctx, resource, body).await
    }

    async fn handle_delete(&self, ctx: &RequestContext, resource: &str, resource_id: &str) -> Result<(), HandleError> {
        self.inner.handle_delete(ctx, resource, resource_id).await
    }

    async fn handle_get(
        &self,
        ctx: &RequestContext,
        resource: &str,
        resource_id: &str,
    ) -> Result<Option<Value>, HandleError> {
        self.inner.handle_get(ctx, resource, resource_id).await
    }

    async fn handle_action(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: &str,
        resource_id: &str,
        body: Value,
    ) -> Result<Option<Value>, HandleError> {
        self.inner.handle_action(ctx, resource, action, resource_id, body).await
    }
}

/// Router over `handle` instead of the default Neutron mock
pub async fn router_with_handle(
    config: ClientConfig,
    handle: Arc<dyn ResourceHandle>,
) -> (MemoryStore, MockKeystoneClient, PodRouter) {
    let store = MemoryStore::new();
    let keystone = MockKeystoneClient::new("http://keystone.test/v3");
    let router = PodRouter::new(config, Arc::new(store.clone()), Arc::new(keystone.clone()), vec![handle]).unwrap();
    pod_store::store::create_model(&store, &Site::new("pod-top", TOP_SITE, ""))
        .await
        .unwrap();
    (store, keystone, router)
}
