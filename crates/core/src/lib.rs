pub mod activity;
pub mod campaign;
pub mod config;
pub mod metrics;
pub mod queue;
pub mod targets;
pub mod telephony;
pub mod testing;

pub use activity::{
    ActivityError, ActivityFilter, ActivityKind, ActivityRecord, ActivityStore,
    DispositionRecorder, PersistenceSoftFailure, SqliteActivityStore,
};
pub use campaign::{
    create_campaign, CampaignConfig, CampaignController, CampaignEngine, CampaignError,
    CampaignState, CampaignStatus, DispositionEffect, DispositionOutcome,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    TelephonyBackend,
};
pub use queue::{CallTarget, Disposition, QueueError, QueueSnapshot, QueueView};
pub use targets::{SqliteTargetStore, StatusWrite, TargetFilter, TargetStore, TargetStoreError};
pub use telephony::{
    CallLifecycleState, CallSessionController, SessionError, SimulatedLine, SimulatedLineConfig,
    TelephonyError, TelephonyLine, TerminationReason,
};
