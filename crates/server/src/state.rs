use std::sync::Arc;

use snowdash_core::{BroadcastChangeBus, Config, DataOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<DataOrchestrator>,
    change_bus: Option<Arc<BroadcastChangeBus>>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<DataOrchestrator>,
        change_bus: Option<Arc<BroadcastChangeBus>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            change_bus,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &DataOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn change_bus(&self) -> Option<&BroadcastChangeBus> {
        self.change_bus.as_deref()
    }
}
