pub mod backoff;
pub mod cancel;
pub mod catalog;
pub mod challenge;
pub mod config;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod relay;
pub mod resolver;
pub mod settings;
pub mod testing;
pub mod textmatch;

pub use backoff::{BackoffPolicy, DelayRange};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use catalog::{CatalogEntry, CatalogError, CatalogSnapshot, CatalogSource};
pub use challenge::{
    ArtifactPayload, ChallengeArtifact, ChallengeConfig, ChallengeError, ChallengeSolverChain,
    SolvedChallenge, SolvingCapability,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use events::{EventBroadcaster, Severity, StatusEnvelope, StatusEvent};
pub use gateway::{
    GatewayError, SubmissionPayload, SubmissionReceipt, TransactionContext, TransactionGateway,
};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use orchestrator::{
    Collaborators, FillSource, OrchestratorConfig, OrchestratorError, OrchestratorHandle,
    TransactionError, TransactionOrchestrator, TransactionPhase, TransactionSnapshot,
    TransactionState,
};
pub use relay::{
    CodeIssuer, CodePoll, CodeRelay, CodeRelayPoller, HttpCodeRelay, HttpRelayConfig,
    IssuanceOutcome, OneTimeCode, RelayConfig, RelayError,
};
pub use resolver::{CandidateResolver, ResolveOutcome, ResolverConfig};
pub use settings::{
    open_settings_store, MemorySettingsStore, SettingsBackend, SettingsConfig, SettingsError,
    SettingsStore, SqliteSettingsStore,
};
pub use textmatch::{
    normalize, select_best, BlendWeights, MatchingConfig, ScoreBreakdown, ScoredEntry,
    SimilarityEnsemble,
};
