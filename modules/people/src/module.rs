use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use modkit::registry::RegistryBuilder;
use modkit::{Module, ModuleCtx, OpenApiRegistry, RestfulModule};

use crate::api::rest::routes;
use crate::domain::service::Service;

pub const MODULE_NAME: &str = "people";

/// Register the people module; it mounts its routes on the `api_ingress` host.
pub fn register(b: &mut RegistryBuilder) {
    let module = Arc::new(People::default());
    b.register_core_with_meta(MODULE_NAME, &["api_ingress"], module.clone());
    b.register_rest_with_meta(MODULE_NAME, module);
}

#[derive(Default)]
pub struct People {
    service: ArcSwapOption<Service>,
}

impl People {
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.load_full()
    }
}

#[async_trait]
impl Module for People {
    async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
        self.service.store(Some(Arc::new(Service::new())));
        tracing::info!("people module initialized");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl RestfulModule for People {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router> {
        let service = self
            .service()
            .ok_or_else(|| anyhow::anyhow!("{MODULE_NAME} REST registered before init"))?;
        let router = routes::register_routes(router, openapi, service)?;
        tracing::info!("people REST routes registered");
        Ok(router)
    }
}
