//! Tool Bootstrapper
//!
//! Starts every configured tool provider concurrently and merges their tools
//! into one [`ToolRegistry`]. All units run to completion; a single failure
//! fails the whole bootstrap and no partial registry is handed out.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::error::{GhostError, Result};
use crate::tool::{ToolDescriptor, ToolLauncher, ToolProvider, ToolProviderConfig, ToolRegistry};

/// Progress hooks, called from the bootstrap units
pub trait BootstrapProgress: Send + Sync {
    /// Called once with the number of providers about to start
    fn provider_started(&self, _total: usize) {}

    /// Called as each unit finishes, successful or not
    fn provider_finished(&self, _name: &str, _ok: bool) {}
}

impl BootstrapProgress for () {}

/// Tools of a successful bootstrap
pub struct ToolRuntime {
    pub registry: Arc<ToolRegistry>,

    /// Flattened descriptors of every provider, in arrival order
    pub tools: Vec<ToolDescriptor>,

    providers: Vec<Arc<dyn ToolProvider>>,
}

impl ToolRuntime {
    pub fn empty() -> Self {
        Self {
            registry: Arc::new(ToolRegistry::new()),
            tools: Vec::new(),
            providers: Vec::new(),
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Close every provider connection
    pub async fn shutdown(&self) {
        close_all(&self.providers).await;
    }
}

#[derive(Default)]
struct Collector {
    loaded: Vec<(Arc<dyn ToolProvider>, Vec<ToolDescriptor>)>,
    errors: Vec<(String, GhostError)>,
}

/// Start all providers and merge their tools
pub async fn bootstrap(
    configs: &[ToolProviderConfig],
    launcher: Arc<dyn ToolLauncher>,
    progress: Arc<dyn BootstrapProgress>,
) -> Result<ToolRuntime> {
    if configs.is_empty() {
        return Ok(ToolRuntime::empty());
    }

    progress.provider_started(configs.len());
    let collector = Arc::new(Mutex::new(Collector::default()));

    let units = configs.iter().cloned().map(|config| {
        let launcher = Arc::clone(&launcher);
        let collector = Arc::clone(&collector);
        let progress = Arc::clone(&progress);
        let name = config.name.clone();

        let handle = tokio::spawn(async move {
            let outcome = start_provider(launcher.as_ref(), &config).await;
            let ok = outcome.is_ok();

            let mut collected = collector.lock().await;
            match outcome {
                Ok(loaded) => collected.loaded.push(loaded),
                Err(err) => {
                    tracing::error!(provider = %config.name, error = %err, "Tool provider failed to start");
                    collected.errors.push((config.name.clone(), err));
                }
            }
            drop(collected);
            progress.provider_finished(&config.name, ok);
        });
        (name, handle)
    });
    let (names, handles): (Vec<_>, Vec<_>) = units.unzip();

    for (name, joined) in names.into_iter().zip(join_all(handles).await) {
        if let Err(join_err) = joined {
            tracing::error!(provider = %name, error = %join_err, "Tool provider unit aborted");
            progress.provider_finished(&name, false);
            collector.lock().await.errors.push((
                name,
                GhostError::Other(format!("bootstrap unit aborted: {join_err}")),
            ));
        }
    }

    let collected = std::mem::take(&mut *collector.lock().await);

    if let Some((provider, first)) = collected.errors.first() {
        let started: Vec<_> = collected.loaded.iter().map(|(p, _)| Arc::clone(p)).collect();
        close_all(&started).await;
        return Err(GhostError::Bootstrap {
            provider: provider.clone(),
            message: first.to_string(),
            failed: collected.errors.len(),
        });
    }

    let mut registry = ToolRegistry::new();
    let mut tools = Vec::new();
    let mut providers = Vec::with_capacity(collected.loaded.len());
    for (provider, descriptors) in collected.loaded {
        tools.extend(descriptors.iter().cloned());
        registry.register(&provider, descriptors);
        providers.push(provider);
    }

    tracing::info!(
        providers = providers.len(),
        tools = registry.len(),
        "Tool providers ready"
    );

    Ok(ToolRuntime {
        registry: Arc::new(registry),
        tools,
        providers,
    })
}

async fn start_provider(
    launcher: &dyn ToolLauncher,
    config: &ToolProviderConfig,
) -> Result<(Arc<dyn ToolProvider>, Vec<ToolDescriptor>)> {
    let provider = launcher.start(config).await?;
    match provider.list_tools().await {
        Ok(tools) => {
            tracing::debug!(provider = %config.name, tools = tools.len(), "Listed tools");
            Ok((provider, tools))
        }
        Err(err) => {
            provider.close().await;
            Err(match err {
                e @ GhostError::ToolListing { .. } => e,
                other => GhostError::ToolListing {
                    provider: config.name.clone(),
                    message: other.to_string(),
                },
            })
        }
    }
}

async fn close_all(providers: &[Arc<dyn ToolProvider>]) {
    for provider in providers {
        provider.close().await;
        tracing::debug!(provider = provider.name(), "Tool provider closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::StubProvider;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Launcher handing out prepared stubs after a per-provider delay
    #[derive(Default)]
    struct StubLauncher {
        stubs: HashMap<String, (Arc<StubProvider>, u64)>,
        broken: HashMap<String, u64>,
        finished: AtomicUsize,
    }

    impl StubLauncher {
        fn ok(mut self, name: &str, tools: &[&str], delay_ms: u64) -> Self {
            self.stubs
                .insert(name.into(), (StubProvider::new(name, tools), delay_ms));
            self
        }

        fn broken(mut self, name: &str, delay_ms: u64) -> Self {
            self.broken.insert(name.into(), delay_ms);
            self
        }

        fn stub(&self, name: &str) -> Arc<StubProvider> {
            Arc::clone(&self.stubs[name].0)
        }
    }

    #[async_trait]
    impl ToolLauncher for StubLauncher {
        async fn start(&self, config: &ToolProviderConfig) -> Result<Arc<dyn ToolProvider>> {
            if let Some(delay) = self.broken.get(&config.name) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
                self.finished.fetch_add(1, Ordering::SeqCst);
                return Err(GhostError::Handshake {
                    provider: config.name.clone(),
                    message: "connection reset".into(),
                });
            }
            let (stub, delay) = &self.stubs[&config.name];
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(stub) as Arc<dyn ToolProvider>)
        }
    }

    fn configs(names: &[&str]) -> Vec<ToolProviderConfig> {
        names
            .iter()
            .map(|n| ToolProviderConfig {
                name: (*n).into(),
                command: format!("{n}-server"),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_disjoint_tools_are_unioned() {
        let launcher = Arc::new(
            StubLauncher::default()
                .ok("a", &["read", "write"], 5)
                .ok("b", &["search"], 1)
                .ok("c", &["fetch", "post", "put"], 3),
        );

        let runtime = bootstrap(&configs(&["a", "b", "c"]), launcher, Arc::new(()))
            .await
            .unwrap();

        assert_eq!(runtime.registry.len(), 6);
        assert_eq!(runtime.tools.len(), 6);
        assert_eq!(runtime.provider_count(), 3);
        assert_eq!(runtime.registry.resolve("search").unwrap().name(), "b");
    }

    #[tokio::test]
    async fn test_collision_resolves_to_last_merged() {
        let launcher = Arc::new(
            StubLauncher::default()
                .ok("early", &["x"], 5)
                .ok("late", &["x"], 80),
        );

        let runtime = bootstrap(&configs(&["late", "early"]), launcher.clone(), Arc::new(()))
            .await
            .unwrap();

        assert_eq!(runtime.registry.len(), 1);
        let owner = runtime.registry.resolve("x").unwrap();
        assert_eq!(owner.name(), "late");

        owner.call_tool("x", &serde_json::Map::new()).await.unwrap();
        assert_eq!(launcher.stub("late").call_count(), 1);
        assert_eq!(launcher.stub("early").call_count(), 0);
    }

    #[tokio::test]
    async fn test_one_failure_fails_everything() {
        let launcher = Arc::new(
            StubLauncher::default()
                .ok("a", &["read"], 1)
                .broken("b", 5)
                .ok("c", &["search"], 40),
        );

        let err = bootstrap(&configs(&["a", "b", "c"]), launcher.clone(), Arc::new(()))
            .await
            .err()
            .expect("bootstrap should fail");

        match err {
            GhostError::Bootstrap { provider, failed, .. } => {
                assert_eq!(provider, "b");
                assert_eq!(failed, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // siblings ran to completion and were then closed
        assert_eq!(launcher.finished.load(Ordering::SeqCst), 3);
        assert_eq!(launcher.stub("a").close_count(), 1);
        assert_eq!(launcher.stub("c").close_count(), 1);
    }

    #[tokio::test]
    async fn test_first_arrival_is_reported() {
        let launcher = Arc::new(
            StubLauncher::default()
                .broken("slow", 60)
                .broken("fast", 1),
        );

        let err = bootstrap(&configs(&["slow", "fast"]), launcher, Arc::new(()))
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            GhostError::Bootstrap { ref provider, failed: 2, .. } if provider == "fast"
        ));
    }

    #[tokio::test]
    async fn test_no_configs_yield_empty_runtime() {
        let runtime = bootstrap(&[], Arc::new(StubLauncher::default()), Arc::new(()))
            .await
            .unwrap();
        assert!(runtime.registry.is_empty());
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_each_provider() {
        let launcher = Arc::new(
            StubLauncher::default()
                .ok("a", &["read"], 1)
                .ok("b", &["write"], 1),
        );
        let runtime = bootstrap(&configs(&["a", "b"]), launcher.clone(), Arc::new(()))
            .await
            .unwrap();

        runtime.shutdown().await;

        assert_eq!(launcher.stub("a").close_count(), 1);
        assert_eq!(launcher.stub("b").close_count(), 1);
    }

    struct CountingProgress(AtomicUsize);

    impl BootstrapProgress for CountingProgress {
        fn provider_finished(&self, _name: &str, _ok: bool) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_progress_sees_every_unit() {
        let launcher = Arc::new(
            StubLauncher::default()
                .ok("a", &["read"], 1)
                .broken("b", 1),
        );
        let progress = Arc::new(CountingProgress(AtomicUsize::new(0)));

        let _ = bootstrap(&configs(&["a", "b"]), launcher, progress.clone()).await;

        assert_eq!(progress.0.load(Ordering::SeqCst), 2);
    }
}
