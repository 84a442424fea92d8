use super::*;
use crate::context::{ConfigProvider, ModuleCtx};
use crate::contracts::{Module, StatefulModule};
use crate::registry::RegistryBuilder;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct NoConfig;

impl ConfigProvider for NoConfig {
    fn get_module_config(&self, _module_name: &str) -> Option<&serde_json::Value> {
        None
    }
}

#[derive(Default)]
struct Probe {
    inits: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

#[async_trait::async_trait]
impl Module for Probe {
    async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait::async_trait]
impl StatefulModule for Probe {
    async fn start(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn stop(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn registry_with(probe: Arc<Probe>) -> crate::registry::ModuleRegistry {
    let mut b = RegistryBuilder::default();
    b.register_core_with_meta("probe", &[], probe.clone());
    b.register_stateful_with_meta("probe", probe);
    b.build_topo_sorted().unwrap()
}

#[tokio::test]
async fn token_shutdown_runs_every_phase() {
    let probe = Arc::new(Probe::default());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(run(RunOptions {
        modules_cfg: Arc::new(NoConfig),
        registry: registry_with(probe.clone()),
        shutdown: ShutdownOptions::Token(cancel.clone()),
    }));

    tokio::time::timeout(Duration::from_secs(1), async {
        while probe.starts.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("module should be started");
    assert_eq!(probe.stops.load(Ordering::SeqCst), 0);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("runner should stop")
        .unwrap()
        .unwrap();

    assert_eq!(probe.inits.load(Ordering::SeqCst), 1);
    assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn future_shutdown_stops_the_runner() {
    let probe = Arc::new(Probe::default());

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        run(RunOptions {
            modules_cfg: Arc::new(NoConfig),
            registry: registry_with(probe.clone()),
            shutdown: ShutdownOptions::Future(Box::pin(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
            })),
        }),
    )
    .await
    .expect("runner should stop after the future completes");

    assert!(result.is_ok());
    assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
}
