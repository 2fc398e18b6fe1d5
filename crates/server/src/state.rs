use std::sync::Arc;

use dialer_core::{ActivityStore, CampaignController, Config, SanitizedConfig, TargetStore};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    controller: CampaignController,
    activity_store: Arc<dyn ActivityStore>,
    target_store: Arc<dyn TargetStore>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        controller: CampaignController,
        activity_store: Arc<dyn ActivityStore>,
        target_store: Arc<dyn TargetStore>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            controller,
            activity_store,
            target_store,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn controller(&self) -> &CampaignController {
        &self.controller
    }

    pub fn activity_store(&self) -> &dyn ActivityStore {
        self.activity_store.as_ref()
    }

    pub fn target_store(&self) -> &dyn TargetStore {
        self.target_store.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
