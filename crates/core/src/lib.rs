pub mod bus;
pub mod cache;
pub mod config;
pub mod freshness;
pub mod metrics;
pub mod orchestrator;
pub mod source;
pub mod testing;
pub mod ticket;

pub use bus::{BroadcastChangeBus, ChangeBus, ChangeBusError, ChangeEvent, ChangeKind, MessageId};
pub use cache::{CacheError, DurableCache, SqliteDurableCache};
pub use config::{
    load_config, load_config_from_str, validate_config, ChangeBusConfig, Config, ConfigError,
    SanitizedConfig,
};
pub use freshness::{FreshnessConfig, FreshnessDecision, FreshnessPolicy, RefreshPriority};
pub use orchestrator::{
    CacheStatsReport, DataOrchestrator, HealthDetails, HealthReport, HealthState, LookupOutcome,
    OrchestratorConfig, OrchestratorError, TicketDetails,
};
pub use source::{
    FetchResult, RecordFilter, ServiceNowClient, ServiceNowConfig, SourceError, SourceOfTruth,
};
pub use ticket::{CacheMetadata, CachedTicket, RecordSource, TicketKey, TicketRecord, TicketTable};
