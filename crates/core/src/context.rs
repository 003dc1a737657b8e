//! Process-wide context.

use std::sync::Arc;
use tracing::debug;

use crate::backend::{Backend, BackendError, ServicesBackend};
use crate::config::EffectiveConfig;
use crate::runner::ProcessRunner;

/// Everything a pipeline run needs, built once at startup and never mutated.
pub struct AppContext {
    config: EffectiveConfig,
    runner: ProcessRunner,
    backend: Option<Arc<dyn Backend>>,
}

impl AppContext {
    /// Builds the context, connecting to the services API when a backend
    /// URL is configured.
    pub fn new(config: EffectiveConfig) -> Result<Self, BackendError> {
        let backend: Option<Arc<dyn Backend>> = match config.backend {
            Some(ref settings) => {
                debug!(url = %settings.url, "Using services backend");
                Some(Arc::new(ServicesBackend::new(settings)?))
            }
            None => None,
        };
        Ok(Self::build(config, backend))
    }

    /// Builds the context around an existing backend.
    pub fn with_backend(config: EffectiveConfig, backend: Arc<dyn Backend>) -> Self {
        Self::build(config, Some(backend))
    }

    fn build(config: EffectiveConfig, backend: Option<Arc<dyn Backend>>) -> Self {
        let runner = ProcessRunner::new(config.kill_grace);
        Self {
            config,
            runner,
            backend,
        }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn backend(&self) -> Option<&Arc<dyn Backend>> {
        self.backend.as_ref()
    }
}
