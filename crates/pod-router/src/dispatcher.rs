//! Dispatcher
//!
//! Single entry point for resource operations on the top site. Every call
//! runs the same pre-flight: capability check, admin token, owning service,
//! endpoint resolution. It then forwards to the handler. At most one catalog
//! refresh happens per call, whether it was triggered by a cache miss or by
//! an unreachable endpoint.

use crate::config::ClientConfig;
use crate::endpoint_cache::EndpointCache;
use crate::error::RouterError;
use crate::refresher::{CatalogRefresher, RefreshSummary};
use crate::registry::CapabilityRegistry;
use pod_handles::{HandleError, Operation, ResourceHandle};
use pod_store::store;
use pod_store::{Filter, RelationalStore, RequestContext, Site};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// An operation together with its arguments
#[derive(Debug, Clone)]
enum Request<'a> {
    List(&'a [Filter]),
    Create(Value),
    Delete(&'a str),
    Get(&'a str),
    Action {
        action: &'a str,
        resource_id: &'a str,
        body: Value,
    },
}

impl Request<'_> {
    fn operation(&self) -> Operation {
        match self {
            Request::List(_) => Operation::List,
            Request::Create(_) => Operation::Create,
            Request::Delete(_) => Operation::Delete,
            Request::Get(_) => Operation::Get,
            Request::Action { .. } => Operation::Action,
        }
    }
}

/// What a handler returned
#[derive(Debug)]
enum Reply {
    Items(Vec<Value>),
    Object(Value),
    Maybe(Option<Value>),
    Done,
}

fn mismatched(operation: Operation) -> RouterError {
    RouterError::Handle(HandleError::Api(format!("handler returned the wrong reply for {}", operation)))
}

/// Routes resource operations to the handler of the owning service
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    refresher: CatalogRefresher,
    store: Arc<dyn RelationalStore>,
    config: Arc<ClientConfig>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        refresher: CatalogRefresher,
        store: Arc<dyn RelationalStore>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            registry,
            refresher,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    fn cache(&self) -> &EndpointCache {
        self.refresher.cache()
    }

    /// List resources of a kind
    pub async fn list(&self, resource: &str, ctx: &RequestContext, filters: &[Filter]) -> Result<Vec<Value>, RouterError> {
        match self.dispatch(resource, ctx, Request::List(filters)).await? {
            Reply::Items(items) => Ok(items),
            _ => Err(mismatched(Operation::List)),
        }
    }

    /// Create a resource; `body` is the unwrapped resource representation
    pub async fn create(&self, resource: &str, ctx: &RequestContext, body: Value) -> Result<Value, RouterError> {
        match self.dispatch(resource, ctx, Request::Create(body)).await? {
            Reply::Object(object) => Ok(object),
            _ => Err(mismatched(Operation::Create)),
        }
    }

    pub async fn delete(&self, resource: &str, ctx: &RequestContext, resource_id: &str) -> Result<(), RouterError> {
        match self.dispatch(resource, ctx, Request::Delete(resource_id)).await? {
            Reply::Done => Ok(()),
            _ => Err(mismatched(Operation::Delete)),
        }
    }

    /// Fetch one resource; `None` if the site does not have it
    pub async fn get(&self, resource: &str, ctx: &RequestContext, resource_id: &str) -> Result<Option<Value>, RouterError> {
        match self.dispatch(resource, ctx, Request::Get(resource_id)).await? {
            Reply::Maybe(object) => Ok(object),
            _ => Err(mismatched(Operation::Get)),
        }
    }

    /// Apply a named action to a resource
    pub async fn action(
        &self,
        resource: &str,
        ctx: &RequestContext,
        action: &str,
        resource_id: &str,
        body: Value,
    ) -> Result<Option<Value>, RouterError> {
        let request = Request::Action {
            action,
            resource_id,
            body,
        };
        match self.dispatch(resource, ctx, request).await? {
            Reply::Maybe(object) => Ok(object),
            _ => Err(mismatched(Operation::Action)),
        }
    }

    /// URL of a service in a site, refreshing once on miss when auto refresh is on
    pub async fn get_endpoint(&self, ctx: &RequestContext, site_id: &str, service: &str) -> Result<String, RouterError> {
        let mut refreshed = false;
        self.resolve_endpoint(ctx, site_id, service, &mut refreshed).await
    }

    /// Resync the endpoint cache with the caller's (admin) token
    pub async fn update_endpoint_from_catalog(&self, ctx: &RequestContext) -> Result<RefreshSummary, RouterError> {
        self.refresher.update_endpoint_from_catalog(ctx).await
    }

    async fn dispatch(&self, resource: &str, ctx: &RequestContext, request: Request<'_>) -> Result<Reply, RouterError> {
        let operation = request.operation();
        if !self.registry.supports(resource, operation) {
            return Err(RouterError::ResourceNotSupported {
                resource: resource.to_string(),
                operation,
            });
        }

        let ctx = self.effective_context(ctx).await?;
        let service = self.registry.owning_service(resource)?;
        let handle = self.registry.handle(service)?;

        let mut refreshed = false;
        let mut reloaded = false;
        if !handle.is_endpoint_url_set() {
            self.load_endpoint(&ctx, service, handle.as_ref(), &mut refreshed).await?;
        }
        loop {
            match forward(handle.as_ref(), &ctx, resource, &request).await {
                Err(e) if e.is_endpoint_not_available() && self.config.auto_refresh_endpoint && !refreshed => {
                    warn!("{}, refreshing endpoints and trying again", e);
                    self.refresher.refresh(&ctx, true).await?;
                    refreshed = true;
                    // Overwrite in place: concurrent calls share this slot.
                    self.load_endpoint(&ctx, service, handle.as_ref(), &mut refreshed).await?;
                }
                Err(e) if e.is_endpoint_not_set() && !reloaded => {
                    debug!("[{}] Endpoint slot of {} was cleared, resolving again", ctx.request_id, service);
                    reloaded = true;
                    self.load_endpoint(&ctx, service, handle.as_ref(), &mut refreshed).await?;
                }
                result => return Ok(result?),
            }
        }
    }

    /// Admin callers without a token get one minted with the admin credentials
    async fn effective_context(&self, ctx: &RequestContext) -> Result<RequestContext, RouterError> {
        if !ctx.needs_admin_token() {
            return Ok(ctx.clone());
        }
        debug!("[{}] Minting admin token for admin caller", ctx.request_id);
        let issued = self.refresher.admin_token().await?;
        Ok(ctx.clone().with_token(issued.token, issued.project_id))
    }

    async fn top_site(&self) -> Result<Site, RouterError> {
        let name = self.config.top_site_name.as_str();
        let sites: Vec<Site> = store::list_models(self.store.as_ref(), &[Filter::eq("site_name", name)]).await?;
        // site_name is unique
        sites
            .into_iter()
            .next()
            .ok_or_else(|| RouterError::SiteNotFound(name.to_string()))
    }

    /// Resolve the top site's endpoint of `service` into the handler's slot
    async fn load_endpoint(
        &self,
        ctx: &RequestContext,
        service: &str,
        handle: &dyn ResourceHandle,
        refreshed: &mut bool,
    ) -> Result<(), RouterError> {
        let site = self.top_site().await?;
        let url = self.resolve_endpoint(ctx, &site.site_id, service, refreshed).await?;
        handle.update_endpoint_url(&url);
        Ok(())
    }

    async fn resolve_endpoint(
        &self,
        ctx: &RequestContext,
        site_id: &str,
        service: &str,
        refreshed: &mut bool,
    ) -> Result<String, RouterError> {
        loop {
            let mut rows = self.cache().lookup(site_id, service).await?;
            if rows.len() > 1 {
                return Err(RouterError::EndpointNotUnique {
                    site_id: site_id.to_string(),
                    service: service.to_string(),
                });
            }
            if let Some(row) = rows.pop() {
                return Ok(row.service_url);
            }
            if !self.config.auto_refresh_endpoint || *refreshed {
                return Err(RouterError::EndpointNotFound {
                    site_id: site_id.to_string(),
                    service: service.to_string(),
                });
            }
            debug!("[{}] No endpoint of {} for site {}, refreshing", ctx.request_id, service, site_id);
            self.refresher.refresh(ctx, true).await?;
            *refreshed = true;
        }
    }
}

async fn forward(
    handle: &dyn ResourceHandle,
    ctx: &RequestContext,
    resource: &str,
    request: &Request<'_>,
) -> Result<Reply, HandleError> {
    Ok(match request {
        Request::List(filters) => Reply::Items(handle.handle_list(ctx, resource, filters).await?),
        Request::Create(body) => Reply::Object(handle.handle_create(ctx, resource, body.clone()).await?),
        Request::Delete(id) => {
            handle.handle_delete(ctx, resource, id).await?;
            Reply::Done
        }
        Request::Get(id) => Reply::Maybe(handle.handle_get(ctx, resource, id).await?),
        Request::Action {
            action,
            resource_id,
            body,
        } => Reply::Maybe(
            handle
                .handle_action(ctx, resource, action, resource_id, body.clone())
                .await?,
        ),
    })
}

/// Per-kind forwarding methods, e.g. `list_networks` or `action_routers`
macro_rules! resource_methods {
    ($($resource:literal {
        $(list: $list:ident;)?
        $(create: $create:ident;)?
        $(delete: $delete:ident;)?
        $(get: $get:ident;)?
        $(action: $action:ident;)?
    })*) => {
        impl Dispatcher {
            $(
                $(
                    #[doc = concat!("List `", $resource, "` resources")]
                    pub async fn $list(&self, ctx: &RequestContext, filters: &[Filter]) -> Result<Vec<Value>, RouterError> {
                        self.list($resource, ctx, filters).await
                    }
                )?
                $(
                    #[doc = concat!("Create a `", $resource, "`")]
                    pub async fn $create(&self, ctx: &RequestContext, body: Value) -> Result<Value, RouterError> {
                        self.create($resource, ctx, body).await
                    }
                )?
                $(
                    #[doc = concat!("Delete a `", $resource, "`")]
                    pub async fn $delete(&self, ctx: &RequestContext, resource_id: &str) -> Result<(), RouterError> {
                        self.delete($resource, ctx, resource_id).await
                    }
                )?
                $(
                    #[doc = concat!("Get a `", $resource, "`")]
                    pub async fn $get(&self, ctx: &RequestContext, resource_id: &str) -> Result<Option<Value>, RouterError> {
                        self.get($resource, ctx, resource_id).await
                    }
                )?
                $(
                    #[doc = concat!("Apply an action to a `", $resource, "`")]
                    pub async fn $action(
                        &self,
                        ctx: &RequestContext,
                        action: &str,
                        resource_id: &str,
                        body: Value,
                    ) -> Result<Option<Value>, RouterError> {
                        self.action($resource, ctx, action, resource_id, body).await
                    }
                )?
            )*
        }
    };
}

resource_methods! {
    "network" { list: list_networks; create: create_networks; delete: delete_networks; get: get_networks; }
    "subnet" { list: list_subnets; create: create_subnets; delete: delete_subnets; get: get_subnets; }
    "port" { list: list_ports; create: create_ports; delete: delete_ports; get: get_ports; }
    "router" {
        list: list_routers; create: create_routers; delete: delete_routers; get: get_routers;
        action: action_routers;
    }
    "security_group" { list: list_security_groups; create: create_security_groups; get: get_security_groups; }
    "security_group_rule" {
        list: list_security_group_rules; create: create_security_group_rules;
        delete: delete_security_group_rules;
    }
    "floatingip" { list: list_floatingips; create: create_floatingips; delete: delete_floatingips; get: get_floatingips; }
    "server" { list: list_servers; create: create_servers; delete: delete_servers; get: get_servers; }
    "flavor" { list: list_flavors; get: get_flavors; }
    "aggregate" {
        list: list_aggregates; create: create_aggregates; delete: delete_aggregates;
        action: action_aggregates;
    }
    "image" { list: list_images; get: get_images; }
}
