use std::sync::Arc;

use tokio::sync::watch;

use crate::core::config::Settings;
use crate::services::grading::GradingOrchestrator;
use crate::services::store::GradingStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn GradingStore>,
    orchestrator: GradingOrchestrator,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn GradingStore>,
        orchestrator: GradingOrchestrator,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, orchestrator, shutdown }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn GradingStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn orchestrator(&self) -> &GradingOrchestrator {
        &self.inner.orchestrator
    }

    /// Flips to `true` once the server starts shutting down; in-flight grade
    /// extraction stops on it.
    pub(crate) fn shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.clone()
    }
}
