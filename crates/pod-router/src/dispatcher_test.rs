//! Unit tests for the dispatcher

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use crate::{ClientConfig, RouterError};
    use pod_handles::{HandleError, Operation};
    use pod_store::schema::CACHED_ENDPOINTS;
    use pod_store::store::row_of;
    use pod_store::{Filter, RequestContext};
    use serde_json::json;
    use std::sync::Arc;

    const STALE_URL: &str = "http://10.0.0.9:9696";

    fn user_ctx() -> RequestContext {
        RequestContext::new().with_token("user-token", Some("project-1".to_string()))
    }

    fn no_refresh_config() -> ClientConfig {
        ClientConfig {
            auto_refresh_endpoint: false,
            ..admin_config()
        }
    }

    #[tokio::test]
    async fn test_undeclared_operation_is_rejected_before_any_lookup() {
        let fx = fixture(admin_config()).await;
        let dispatcher = fx.router.dispatcher();
        let ctx = user_ctx();

        let err = dispatcher.list("subnet", &ctx, &[]).await.unwrap_err();
        assert!(matches!(err, RouterError::ResourceNotSupported { ref resource, operation: Operation::List } if resource == "subnet"));
        assert!(err.is_invalid_request());

        let err = dispatcher
            .action("network", &ctx, "add_interface", "net-1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::ResourceNotSupported { operation: Operation::Action, .. }));

        assert_eq!(fx.keystone.catalog_calls(), 0);
        assert!(fx.neutron.calls().is_empty());
    }

    #[tokio::test]
    async fn test_declared_operations_are_supported() {
        let fx = fixture(admin_config()).await;
        let registry = fx.router.dispatcher().registry();
        for operation in Operation::ALL {
            assert!(registry.supports("router", operation));
            assert_eq!(registry.supports("network", operation), operation != Operation::Action);
            assert!(!registry.supports("server", operation));
        }
    }

    #[tokio::test]
    async fn test_cache_miss_without_auto_refresh_is_not_found() {
        let fx = fixture(no_refresh_config()).await;

        let err = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap_err();

        assert!(matches!(err, RouterError::EndpointNotFound { ref service, .. } if service == "neutron"));
        assert!(err.is_retryable());
        assert_eq!(fx.keystone.catalog_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_refreshes_once_then_gives_up() {
        let fx = fixture(admin_config()).await;
        fx.keystone.add_endpoint(TOP_SITE, "nova", "http://10.1.1.1:8774/v2.1");

        let err = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap_err();

        assert!(matches!(err, RouterError::EndpointNotFound { .. }));
        assert_eq!(fx.keystone.catalog_calls(), 1);
        assert!(fx.neutron.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_cache_rows_are_not_unique() {
        let fx = fixture(admin_config()).await;
        for id in ["s1", "s2"] {
            let row = row_of([
                ("service_id", json!(id)),
                ("site_id", json!("pod-top")),
                ("service_type", json!("neutron")),
                ("service_url", json!(NEUTRON_URL)),
            ]);
            fx.store.insert_unchecked(CACHED_ENDPOINTS, row).unwrap();
        }

        let err = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap_err();

        assert!(matches!(err, RouterError::EndpointNotUnique { .. }));
        assert!(err.needs_operator());
        assert_eq!(fx.keystone.catalog_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_top_site_needs_operator() {
        let fx = fixture(ClientConfig {
            top_site_name: "nowhere".to_string(),
            ..admin_config()
        })
        .await;

        let err = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap_err();

        assert!(matches!(err, RouterError::SiteNotFound(ref name) if name == "nowhere"));
        assert!(err.needs_operator());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_refreshed_and_retried() {
        let fx = fixture(admin_config()).await;
        fx.router.endpoints().put("pod-top", "neutron", STALE_URL).await.unwrap();
        fx.neutron.mark_unreachable(STALE_URL);
        fx.keystone.add_endpoint(TOP_SITE, "neutron", NEUTRON_URL);

        let networks = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap();

        assert!(networks.is_empty());
        assert_eq!(fx.keystone.catalog_calls(), 1);
        let endpoints: Vec<String> = fx.neutron.calls().into_iter().map(|c| c.endpoint).collect();
        assert_eq!(endpoints, vec![STALE_URL.to_string(), NEUTRON_URL.to_string()]);
        assert_eq!(fx.router.endpoints().get("pod-top", "neutron").await.unwrap(), NEUTRON_URL);
    }

    #[tokio::test]
    async fn test_refresh_overwrites_the_shared_slot() {
        let handle = Arc::new(SharedSlotHandle::new(neutron_mock(), false));
        let (_, keystone, router) = router_with_handle(admin_config(), handle.clone()).await;
        router.endpoints().put("pod-top", "neutron", STALE_URL).await.unwrap();
        handle.inner.mark_unreachable(STALE_URL);
        keystone.add_endpoint(TOP_SITE, "neutron", NEUTRON_URL);

        router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap();

        assert_eq!(handle.clears(), 0);
        assert_eq!(handle.inner.endpoint().as_deref(), Some(NEUTRON_URL));
    }

    #[tokio::test]
    async fn test_slot_cleared_by_another_call_is_resolved_again() {
        let handle = Arc::new(SharedSlotHandle::new(neutron_mock(), true));
        let (_, keystone, router) = router_with_handle(admin_config(), handle.clone()).await;
        router.endpoints().put("pod-top", "neutron", NEUTRON_URL).await.unwrap();

        let networks = router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap();

        assert!(networks.is_empty());
        assert_eq!(keystone.catalog_calls(), 0);
        let calls = handle.inner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, NEUTRON_URL);
    }

    #[tokio::test]
    async fn test_unreachable_after_refresh_is_not_retried_again() {
        let fx = fixture(admin_config()).await;
        fx.keystone.add_endpoint(TOP_SITE, "neutron", NEUTRON_URL);
        fx.neutron.mark_unreachable(NEUTRON_URL);

        let err = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap_err();

        assert!(matches!(err, RouterError::Handle(HandleError::EndpointNotAvailable { .. })));
        assert!(err.is_retryable());
        // the miss refresh already used up the single refresh of this call
        assert_eq!(fx.keystone.catalog_calls(), 1);
        assert_eq!(fx.neutron.call_count(Operation::List), 1);
    }

    #[tokio::test]
    async fn test_unreachable_without_auto_refresh_fails_immediately() {
        let fx = fixture(no_refresh_config()).await;
        fx.router.endpoints().put("pod-top", "neutron", STALE_URL).await.unwrap();
        fx.neutron.mark_unreachable(STALE_URL);

        let err = fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap_err();

        assert!(matches!(err, RouterError::Handle(HandleError::EndpointNotAvailable { .. })));
        assert_eq!(fx.keystone.catalog_calls(), 0);
        assert_eq!(fx.neutron.call_count(Operation::List), 1);
    }

    #[tokio::test]
    async fn test_admin_without_token_gets_minted_token() {
        let fx = fixture(admin_config()).await;
        fx.router.endpoints().put("pod-top", "neutron", NEUTRON_URL).await.unwrap();

        fx.router
            .dispatcher()
            .list_networks(&RequestContext::admin(), &[])
            .await
            .unwrap();

        let calls = fx.neutron.calls();
        let call = &calls[0];
        assert_eq!(fx.keystone.auth_calls(), 1);
        assert!(call.token.as_deref().is_some_and(|t| t.starts_with("token-")));
        assert_eq!(call.project_id.as_deref(), Some(fx.keystone.admin_project_id()));
    }

    #[tokio::test]
    async fn test_caller_token_is_forwarded_as_is() {
        let fx = fixture(admin_config()).await;
        fx.router.endpoints().put("pod-top", "neutron", NEUTRON_URL).await.unwrap();

        fx.router.dispatcher().list_networks(&user_ctx(), &[]).await.unwrap();

        let calls = fx.neutron.calls();
        let call = &calls[0];
        assert_eq!(fx.keystone.auth_calls(), 0);
        assert_eq!(call.token.as_deref(), Some("user-token"));
        assert_eq!(call.project_id.as_deref(), Some("project-1"));
    }

    #[tokio::test]
    async fn test_crud_and_actions_reach_the_handler() {
        let fx = fixture(no_refresh_config()).await;
        fx.router.endpoints().put("pod-top", "neutron", NEUTRON_URL).await.unwrap();
        let dispatcher = fx.router.dispatcher();
        let ctx = user_ctx();

        let created = dispatcher.create_networks(&ctx, json!({"name": "net1"})).await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert!(dispatcher.get_networks(&ctx, &id).await.unwrap().is_some());
        assert_eq!(
            dispatcher
                .list_networks(&ctx, &[Filter::eq("name", "net1")])
                .await
                .unwrap()
                .len(),
            1
        );

        let reply = dispatcher
            .action_routers(&ctx, "add_interface", "router-1", json!({"subnet_id": "sub-1"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply["action"], "add_interface");

        dispatcher.delete_networks(&ctx, &id).await.unwrap();
        assert!(dispatcher.get_networks(&ctx, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_endpoint_refreshes_on_miss() {
        let fx = fixture(admin_config()).await;
        fx.keystone.add_endpoint(TOP_SITE, "neutron", NEUTRON_URL);
        let ctx = RequestContext::admin();

        let url = fx.router.dispatcher().get_endpoint(&ctx, "pod-top", "neutron").await.unwrap();
        assert_eq!(url, NEUTRON_URL);
        let again = fx.router.dispatcher().get_endpoint(&ctx, "pod-top", "neutron").await.unwrap();
        assert_eq!(again, NEUTRON_URL);
        assert_eq!(fx.keystone.catalog_calls(), 1);
    }
}
