// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use woopsa_core::protocol::{method, SUBSCRIPTION_SERVICE, VERB_INVOKE, VERB_READ, VERB_WRITE};

use crate::error::{ApiError, ApiResult};
use crate::handlers;
use crate::state::AppState;

// =============================================================================
// ApiServer
// =============================================================================

/// The HTTP front of a subscription service.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Creates a server with the given state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Creates the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let config = &self.state.config;

        let invoke = |name: &str| format!("/{}/{}/{}", VERB_INVOKE, SUBSCRIPTION_SERVICE, name);
        let woopsa = Router::new()
            .route(
                &invoke(method::CREATE_SUBSCRIPTION_CHANNEL),
                post(handlers::create_subscription_channel),
            )
            .route(&invoke(method::REGISTER_SUBSCRIPTION), post(handlers::register_subscription))
            .route(&invoke(method::UNREGISTER_SUBSCRIPTION), post(handlers::unregister_subscription))
            .route(&invoke(method::WAIT_NOTIFICATION), post(handlers::wait_notification))
            .route(&format!("/{}/{{*path}}", VERB_READ), get(handlers::read_property))
            .route(&format!("/{}/{{*path}}", VERB_WRITE), post(handlers::write_property));

        let base_path = config.normalized_base_path();
        let router = Router::new()
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::prometheus_metrics));
        let router = if base_path.is_empty() {
            router.merge(woopsa)
        } else {
            router.nest(&base_path, woopsa)
        };

        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

        router.layer(middleware_stack).with_state(self.state.clone())
    }

    /// Binds the configured address and serves until `shutdown` completes.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let addr = self.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to bind {}: {}", addr, e)))?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` completes.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let local = listener
            .local_addr()
            .map_err(|e| ApiError::internal(e.to_string()))?;
        info!(
            addr = %local,
            base_path = %self.state.config.normalized_base_path(),
            "Woopsa API listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        info!("Woopsa API stopped");
        Ok(())
    }

    /// Returns the configured address.
    pub fn addr(&self) -> SocketAddr {
        self.state.config.socket_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use woopsa_core::memory::MemoryModel;
    use woopsa_core::model::ObjectModel;
    use woopsa_subscription::{SubscriptionService, SubscriptionSettings};

    use crate::config::ApiConfig;

    fn router(config: ApiConfig) -> (Arc<MemoryModel>, Router) {
        let model = Arc::new(MemoryModel::new("plant"));
        model.set("Votes", 0i64);
        let service = SubscriptionService::new(
            model.clone() as Arc<dyn ObjectModel>,
            SubscriptionSettings::for_testing(),
        );
        let state = AppState::builder(service, model.clone()).config(config).build().unwrap();
        (model, ApiServer::new(state).router())
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_model, router) = router(ApiConfig::default());
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_route_exports_service_and_requests() {
        let (_model, router) = router(ApiConfig::default());
        let created = router
            .clone()
            .oneshot(form_post(
                "/woopsa/invoke/SubscriptionService/CreateSubscriptionChannel",
                "NotificationQueueSize=10",
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("woopsa_channels 1"));
        assert!(text.contains(r#"woopsa_api_requests_total{method="CreateSubscriptionChannel"} 1"#));
    }

    #[tokio::test]
    async fn test_read_under_base_path() {
        let (_model, router) = router(ApiConfig::default());
        let response = router
            .oneshot(Request::get("/woopsa/read/Votes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["Value"], 0);
        assert_eq!(body["Type"], "Integer");
    }

    #[tokio::test]
    async fn test_root_base_path() {
        let (_model, router) = router(ApiConfig::default().with_base_path("/"));
        let response = router
            .oneshot(Request::get("/read/Votes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_write_decodes_by_property_type() {
        let (model, router) = router(ApiConfig::default());
        let response = router
            .oneshot(form_post("/woopsa/write/Votes", "Value=12"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(model.get("Votes"), Some(woopsa_core::types::Value::Integer(12)));
    }

    #[tokio::test]
    async fn test_missing_parameter_is_bad_request() {
        let (_model, router) = router(ApiConfig::default());
        let response = router
            .oneshot(form_post(
                "/woopsa/invoke/SubscriptionService/WaitNotification",
                "SubscriptionChannel=1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["Error"], true);
    }
}
