use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use yadisk_core::YadiskClient;

use crate::config::MirrorConfig;
use crate::mirror::{PassMode, PassSummary, ReconciliationEngine, RemoteStore, YadiskStore};

/// Remembers whether the directory skeleton has been created since start-up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncPassState {
    bootstrapped: bool,
}

impl SyncPassState {
    pub fn next_mode(&self) -> PassMode {
        if self.bootstrapped {
            PassMode::Incremental
        } else {
            PassMode::Bootstrap
        }
    }

    pub fn mark_bootstrapped(&mut self) {
        self.bootstrapped = true;
    }
}

pub struct MirrorRuntime {
    config: MirrorConfig,
    engine: ReconciliationEngine,
    state: SyncPassState,
}

impl MirrorRuntime {
    /// Builds the Yandex Disk backed runtime. The token check only logs; an
    /// unreachable disk at start-up is retried by the regular cycles.
    pub async fn connect(config: MirrorConfig) -> anyhow::Result<Self> {
        let client = YadiskClient::with_base_url(&config.api_url, config.token.clone())
            .context("invalid Yandex Disk API url")?;
        match client.get_disk_info().await {
            Ok(info) => info!(
                used_bytes = info.used_space,
                total_bytes = info.total_space,
                "connected to Yandex Disk"
            ),
            Err(err) => warn!(error = %err, "Yandex Disk check failed, continuing"),
        }
        let store = YadiskStore::new(client, &config.remote_root)
            .with_permanent_delete(config.permanent_delete);
        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: MirrorConfig, store: Arc<dyn RemoteStore>) -> Self {
        let engine = ReconciliationEngine::new(store, config.engine);
        Self {
            config,
            engine,
            state: SyncPassState::default(),
        }
    }

    pub fn state(&self) -> SyncPassState {
        self.state
    }

    /// One reconciliation cycle. `None` when the pass could not start.
    pub async fn run_cycle(&mut self) -> Option<PassSummary> {
        let root = &self.config.sync_root;
        if !is_sync_root_available(root).await {
            error!(root = %root.display(), "local sync folder not found, skipping cycle");
            return None;
        }

        let mode = self.state.next_mode();
        match self.engine.run(root, mode).await {
            Ok(summary) => {
                if mode == PassMode::Bootstrap {
                    self.state.mark_bootstrapped();
                    info!("remote directory skeleton ready, later passes are incremental");
                }
                Some(summary)
            }
            Err(err) => {
                error!(error = %err, "reconciliation pass aborted");
                None
            }
        }
    }

    /// Bootstrap pass followed by one incremental pass; errors are fatal here.
    pub async fn run_once(mut self) -> anyhow::Result<PassSummary> {
        let root = self.config.sync_root.clone();
        self.engine
            .run(&root, PassMode::Bootstrap)
            .await
            .context("bootstrap pass failed")?;
        self.state.mark_bootstrapped();
        let summary = self
            .engine
            .run(&root, PassMode::Incremental)
            .await
            .context("incremental pass failed")?;
        Ok(summary)
    }

    /// Runs cycles every `sync_interval` until Ctrl+C or SIGTERM.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            sync_root = %self.config.sync_root.display(),
            remote_root = %self.config.remote_root,
            interval_secs = self.config.sync_interval.as_secs(),
            "mirror service started"
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        let interval = self.config.sync_interval;
        loop {
            // Interrupting a pass abandons in-flight requests; the next start re-diffs.
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = &mut shutdown => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break,
            }
        }

        info!("mirror service stopped");
        Ok(())
    }
}

async fn is_sync_root_available(root: &Path) -> bool {
    tokio::fs::metadata(root)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
