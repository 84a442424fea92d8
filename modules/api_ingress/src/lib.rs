//! REST host module: owns the HTTP server and the single OpenAPI document
//! assembled from every operation registered through [`OpenApiRegistry`].

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use anyhow::{Context, Result};
use axum::http::Method;
use axum::{middleware::from_fn, routing::get, Router};
use modkit::api::{OpenApiRegistry, OperationSpec, SchemaCollection};
use modkit::registry::RegistryBuilder;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

mod config;
mod model;
mod openapi;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;
use model::{ComponentsRegistry, Registration};

pub const MODULE_NAME: &str = "api_ingress";

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed the ingress into a registry as core, REST host and stateful module.
pub fn register(b: &mut RegistryBuilder) {
    let module = Arc::new(ApiIngress::default());
    b.register_core_with_meta(MODULE_NAME, &[], module.clone());
    b.register_rest_host_with_meta(MODULE_NAME, module.clone());
    b.register_stateful_with_meta(MODULE_NAME, module);
}

pub struct ApiIngress {
    config: ArcSwap<ApiIngressConfig>,
    components_registry: ArcSwap<ComponentsRegistry>,
    // Router produced by the REST phase, taken by `start`.
    final_router: Mutex<Option<Router>>,
    server: Mutex<Option<JoinHandle<Result<()>>>>,
    local_addr: Mutex<Option<SocketAddr>>,

    registered_routes: DashMap<(Method, String), ()>,
    registered_handlers: DashMap<String, ()>,
    operation_specs: DashMap<String, OperationSpec>,
}

impl Default for ApiIngress {
    fn default() -> Self {
        Self::new(ApiIngressConfig::default())
    }
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            components_registry: ArcSwap::from_pointee(ComponentsRegistry::default()),
            final_router: Mutex::new(None),
            server: Mutex::new(None),
            local_addr: Mutex::new(None),
            registered_routes: DashMap::new(),
            registered_handlers: DashMap::new(),
            operation_specs: DashMap::new(),
        }
    }

    pub fn get_config(&self) -> ApiIngressConfig {
        (**self.config.load()).clone()
    }

    /// Address the server is listening on once started (port 0 resolved).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Wrap `router` with the ingress middleware stack.
    ///
    /// Outermost first: SetRequestId -> PropagateRequestId -> Trace ->
    /// push_req_id_to_extensions -> CatchPanic -> Timeout -> CORS -> BodyLimit.
    /// `Router::layer` wraps what is already there, so layers are added innermost first.
    pub fn apply_middleware(&self, mut router: Router) -> Router {
        let cfg = self.get_config();
        let x_request_id = request_id::header();

        router = router.layer(RequestBodyLimitLayer::new(cfg.body_limit_bytes));
        if cfg.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        if cfg.timeout_sec > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(cfg.timeout_sec)));
        }
        router
            .layer(CatchPanicLayer::custom(web::panic_to_problem))
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(request_id::create_trace_layer())
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId))
    }

    fn make_schema(
        components: &ComponentsRegistry,
        content_type: &str,
        schema_name: Option<&str>,
    ) -> serde_json::Value {
        if let Some(name) = schema_name.filter(|n| components.has_schema(n)) {
            return serde_json::json!({ "$ref": format!("#/components/schemas/{name}") });
        }
        match content_type {
            "application/json" => serde_json::json!({ "type": "object" }),
            "text/plain" | "text/html" => serde_json::json!({ "type": "string" }),
            _ => serde_json::json!({}),
        }
    }

    fn make_content_obj(
        components: &ComponentsRegistry,
        content_type: &str,
        schema_name: Option<&str>,
    ) -> serde_json::Value {
        let mut content = serde_json::Map::new();
        content.insert(
            content_type.to_string(),
            serde_json::json!({ "schema": Self::make_schema(components, content_type, schema_name) }),
        );
        serde_json::Value::Object(content)
    }

    fn operation_json(components: &ComponentsRegistry, spec: &OperationSpec) -> serde_json::Value {
        use serde_json::{json, Map, Value};

        let mut op = Map::new();
        let op_id = spec
            .operation_id
            .clone()
            .unwrap_or_else(|| spec.handler_id.clone());
        op.insert("operationId".into(), Value::String(op_id));
        if let Some(summary) = &spec.summary {
            op.insert("summary".into(), Value::String(summary.clone()));
        }
        if let Some(description) = &spec.description {
            op.insert("description".into(), Value::String(description.clone()));
        }
        if !spec.tags.is_empty() {
            op.insert("tags".into(), json!(spec.tags));
        }

        if !spec.params.is_empty() {
            let params: Vec<Value> = spec
                .params
                .iter()
                .map(|p| {
                    let mut param = json!({
                        "name": p.name,
                        "in": p.location.as_str(),
                        // OpenAPI requires path params to be required.
                        "required": p.required || p.location == modkit::api::ParamLocation::Path,
                        "schema": { "type": p.param_type },
                    });
                    if let Some(d) = &p.description {
                        param["description"] = Value::String(d.clone());
                    }
                    param
                })
                .collect();
            op.insert("parameters".into(), Value::Array(params));
        }

        if let Some(req) = &spec.request_body {
            let mut rb = json!({
                "required": req.required,
                "content": Self::make_content_obj(components, req.content_type, req.schema_name.as_deref()),
            });
            if let Some(d) = &req.description {
                rb["description"] = Value::String(d.clone());
            }
            op.insert("requestBody".into(), rb);
        }

        let mut responses = Map::new();
        for r in &spec.responses {
            responses.insert(
                r.status.to_string(),
                json!({
                    "description": r.description,
                    "content": Self::make_content_obj(components, r.content_type, r.schema_name.as_deref()),
                }),
            );
        }
        op.insert("responses".into(), Value::Object(responses));

        Value::Object(op)
    }

    /// Assemble the OpenAPI document from the registered operations and components.
    pub fn build_openapi(&self) -> Result<serde_json::Value> {
        let components_registry = self.components_registry.load();
        tracing::info!(
            operations = self.operation_specs.len(),
            schemas = components_registry.schemas.len(),
            "Building OpenAPI document"
        );

        let mut paths: std::collections::BTreeMap<
            String,
            std::collections::BTreeMap<String, serde_json::Value>,
        > = std::collections::BTreeMap::new();
        for entry in self.operation_specs.iter() {
            let spec = entry.value();
            paths.entry(spec.path.clone()).or_default().insert(
                spec.method.as_str().to_lowercase(),
                Self::operation_json(&components_registry, spec),
            );
        }

        let mut components = openapi::OpenApiComponents::default();
        for (name, schema) in &components_registry.schemas {
            components
                .schemas
                .insert(name.clone(), serde_json::to_value(schema)?);
        }

        let doc = openapi::OpenApi {
            openapi: "3.1.0",
            info: openapi::OpenApiInfo {
                title: "People API",
                version: env!("CARGO_PKG_VERSION"),
                description: Some("Validated people records, echoed back"),
            },
            paths: serde_json::to_value(paths)?,
            components: Some(components),
        };
        Ok(serde_json::to_value(doc)?)
    }

    async fn serve(listener: tokio::net::TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}

#[async_trait]
impl modkit::Module for ApiIngress {
    async fn init(&self, ctx: &modkit::ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<ApiIngressConfig>();
        tracing::debug!(
            bind_addr = %cfg.bind_addr,
            enable_docs = cfg.enable_docs,
            "api_ingress configured"
        );
        self.config.store(Arc::new(cfg));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl modkit::contracts::RestHostModule for ApiIngress {
    fn rest_prepare(&self, _ctx: &modkit::ModuleCtx, router: Router) -> Result<Router> {
        Ok(router
            .route("/health", get(web::health_check))
            .route("/healthz", get(|| async { "ok" })))
    }

    fn rest_finalize(&self, _ctx: &modkit::ModuleCtx, mut router: Router) -> Result<Router> {
        if self.get_config().enable_docs {
            // Built once; every request gets the same snapshot.
            let doc = Arc::new(self.build_openapi()?);
            router = router
                .route(
                    "/openapi.json",
                    get(move || {
                        let doc = doc.clone();
                        async move {
                            use axum::{http::header, response::IntoResponse};
                            ([(header::CACHE_CONTROL, "no-store")], axum::Json((*doc).clone()))
                                .into_response()
                        }
                    }),
                )
                .route("/docs", get(web::serve_docs));
        }

        let router = self.apply_middleware(router.fallback(web::not_found));
        *self.final_router.lock() = Some(router.clone());

        tracing::debug!(
            operations = self.operation_specs.len(),
            "REST host finalized router"
        );
        Ok(router)
    }

    fn as_registry(&self) -> &dyn OpenApiRegistry {
        self
    }
}

#[async_trait]
impl modkit::contracts::StatefulModule for ApiIngress {
    async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let cfg = self.get_config();
        let addr: SocketAddr = cfg
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", cfg.bind_addr))?;

        let stored = self.final_router.lock().take();
        let router = match stored {
            Some(r) => r,
            None => {
                tracing::debug!("No router from REST phase, serving ambient endpoints only");
                self.apply_middleware(
                    Router::new()
                        .route("/health", get(web::health_check))
                        .fallback(web::not_found),
                )
            }
        };

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let local = listener.local_addr()?;
        *self.local_addr.lock() = Some(local);
        tracing::info!(addr = %local, "HTTP server bound");

        let handle = tokio::spawn(Self::serve(listener, router, cancel));
        *self.server.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self, cancel: CancellationToken) -> Result<()> {
        cancel.cancel();
        let Some(handle) = self.server.lock().take() else {
            return Ok(());
        };
        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(joined) => joined.context("HTTP server task panicked")?,
            Err(_) => {
                tracing::warn!(timeout = ?STOP_TIMEOUT, "HTTP server did not stop in time");
                Ok(())
            }
        }
    }
}

impl OpenApiRegistry for ApiIngress {
    fn register_operation(&self, spec: &OperationSpec) {
        // First registration wins; a second one is a programming error.
        if self
            .registered_handlers
            .insert(spec.handler_id.clone(), ())
            .is_some()
        {
            tracing::error!(
                handler_id = %spec.handler_id,
                method = %spec.method,
                path = %spec.path,
                "Duplicate handler_id detected; ignoring subsequent registration"
            );
            return;
        }

        if self
            .registered_routes
            .insert((spec.method.clone(), spec.path.clone()), ())
            .is_some()
        {
            tracing::error!(
                method = %spec.method,
                path = %spec.path,
                "Duplicate (method, path) detected; ignoring subsequent registration"
            );
            return;
        }

        let operation_key = format!("{}:{}", spec.method, spec.path);
        self.operation_specs
            .insert(operation_key.clone(), spec.clone());
        tracing::debug!(
            handler_id = %spec.handler_id,
            operation_key = %operation_key,
            total_operations = self.operation_specs.len(),
            "Registered API operation"
        );
    }

    fn ensure_schema_raw(&self, root_name: &str, schemas: SchemaCollection) -> String {
        // Copy-on-write: readers keep the snapshot they loaded.
        let mut reg = (**self.components_registry.load()).clone();
        for (name, schema) in schemas {
            match reg.register_schema(name.clone(), schema) {
                Registration::Inserted => tracing::debug!(%name, "Registered schema"),
                Registration::Identical => {}
                Registration::Conflict => tracing::error!(
                    %name,
                    root = %root_name,
                    "Conflicting schema content under the same component name; keeping the first"
                ),
            }
        }
        self.components_registry.store(Arc::new(reg));
        root_name.to_string()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use modkit::api::{Missing, OperationBuilder};
    use modkit::contracts::{RestHostModule, StatefulModule};
    use modkit::ModuleCtxBuilder;
    use tower::ServiceExt;

    #[derive(serde::Serialize, utoipa::ToSchema)]
    struct Pong {
        pong: bool,
    }

    async fn pong() -> axum::Json<Pong> {
        axum::Json(Pong { pong: true })
    }

    fn ctx() -> modkit::ModuleCtx {
        ModuleCtxBuilder::new(CancellationToken::new())
            .for_module(MODULE_NAME)
            .build()
    }

    fn ingress_with_docs() -> ApiIngress {
        ApiIngress::new(ApiIngressConfig {
            enable_docs: true,
            bind_addr: "127.0.0.1:0".into(),
            ..Default::default()
        })
    }

    fn register_ping(host: &ApiIngress, router: Router) -> Router {
        OperationBuilder::<Missing, Missing, ()>::get("/ping")
            .operation_id("ping")
            .summary("Ping")
            .handler(pong)
            .json_response_with_schema::<Pong>(host, 200, "Pong")
            .register(router, host)
    }

    #[test]
    fn register_feeds_all_three_roles() {
        let mut b = RegistryBuilder::default();
        register(&mut b);
        let reg = b.build_topo_sorted().unwrap();
        let entry = &reg.modules()[0];
        assert_eq!(entry.name, MODULE_NAME);
        assert!(entry.rest_host.is_some());
        assert!(entry.stateful.is_some());
        assert!(entry.core.as_any().downcast_ref::<ApiIngress>().is_some());
    }

    #[test]
    fn duplicate_operations_keep_the_first() {
        let host = ingress_with_docs();
        let _ = register_ping(&host, Router::new());
        let spec = OperationBuilder::<Missing, Missing, ()>::get("/ping")
            .operation_id("other")
            .handler(pong)
            .json_response(200, "x");
        host.register_operation(spec.spec());

        let doc = host.build_openapi().unwrap();
        assert_eq!(doc["paths"]["/ping"]["get"]["operationId"], "ping");
    }

    #[test]
    fn openapi_references_registered_components() {
        let host = ingress_with_docs();
        let _ = register_ping(&host, Router::new());

        let doc = host.build_openapi().unwrap();
        assert_eq!(doc["openapi"], "3.1.0");
        assert_eq!(doc["info"]["title"], "People API");
        assert_eq!(
            doc["paths"]["/ping"]["get"]["responses"]["200"]["content"]["application/json"]
                ["schema"]["$ref"],
            "#/components/schemas/Pong"
        );
        assert!(doc["components"]["schemas"]["Pong"].is_object());
    }

    #[tokio::test]
    async fn finalized_router_serves_docs_health_and_problem_404() {
        let host = ingress_with_docs();
        let router = host.rest_prepare(&ctx(), Router::new()).unwrap();
        let router = register_ping(&host, router);
        let router = host.rest_finalize(&ctx(), router).unwrap();

        for (path, status) in [
            ("/health", StatusCode::OK),
            ("/healthz", StatusCode::OK),
            ("/openapi.json", StatusCode::OK),
            ("/docs", StatusCode::OK),
            ("/ping", StatusCode::OK),
            ("/nope", StatusCode::NOT_FOUND),
        ] {
            let resp = router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), status, "{path}");
            assert!(resp.headers().contains_key("x-request-id"), "{path}");
        }

        let resp = router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            resp.headers()[http::header::CONTENT_TYPE],
            modkit::api::problem::APPLICATION_PROBLEM_JSON
        );
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], 404);
    }

    #[tokio::test]
    async fn docs_are_hidden_when_disabled() {
        let host = ApiIngress::default();
        let router = host.rest_prepare(&ctx(), Router::new()).unwrap();
        let router = host.rest_finalize(&ctx(), router).unwrap();
        let resp = router
            .oneshot(Request::get("/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_binds_and_stop_joins() {
        let host = ingress_with_docs();
        let router = host.rest_prepare(&ctx(), Router::new()).unwrap();
        host.rest_finalize(&ctx(), router).unwrap();

        let cancel = CancellationToken::new();
        host.start(cancel.clone()).await.unwrap();
        let addr = host.local_addr().expect("bound address");
        assert_ne!(addr.port(), 0);

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("HTTP/1.1 200"), "{text}");
        assert!(text.ends_with("ok"), "{text}");

        host.stop(cancel).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_bind_address_fails_start() {
        let host = ApiIngress::new(ApiIngressConfig {
            bind_addr: "not-an-address".into(),
            ..Default::default()
        });
        let err = host.start(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid bind address"));
    }
}
