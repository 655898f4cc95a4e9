//! # duet-core
//!
//! The cognitive orchestration core behind a dual-process coding assistant:
//! a complexity Router deciding between a fast System 1 pattern lookup and
//! a deliberative System 2 plan/execute/reflect loop, a GRPO-based learning
//! layer that moves patterns between the two, an execution sandbox that
//! gates System 2's commands rather than virtualizing them, a federated
//! swarm client for cross-install weight sharing, and a mandatory privacy
//! scrubber every outbound payload passes through first.
//!
//! ## Example
//!
//! ```rust,ignore
//! use duet_core::{Config, RequestContext, Session};
//!
//! let mut session = Session::new(Config::default(), "/tmp/duet-state");
//! let (classification, _routed_at) = session.route("fix a typo", &RequestContext::new());
//! println!("routed to {:?} at score {}", classification.system, classification.score);
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod learning;
pub mod privacy;
pub mod router;
pub mod sandbox;
pub mod session;
pub mod swarm;
pub mod system1;
pub mod system2;

pub use cancel::{CancellationSignal, CancellationToken};
pub use config::{
    Config, KnowledgeTransferConfig, LearningConfig, RouterConfig, SandboxConfig, SwarmConfig,
    SwarmSchedule, System1Config, System2Config,
};
pub use error::{Error, Result};
pub use learning::{
    batch_learn_session_end, build_candidate_group, default_registry_path, demote,
    grpo_update, load_domain_weights, persist_domain_weights, promote, weights_path,
    DomainWeights, Experience, PromotionTracker, RegistryEntry, RewardComponents,
    ScoredCandidate, StrategyCandidate, StrategyWeight, System2Registry, TransferKind,
    TransferLogEntry, BATCH_WINDOW, GROUP_SIZE, MAX_DOMAIN_SPECIFIC,
};
pub use privacy::{
    create_scoped_scrubber, scrub, validate_scrubbed, Category, Platform, Rule, ScrubMatch,
    ScrubResult, Scrubber, Span, ALL_RULES,
};
pub use router::{
    AdaptDirection, AdaptResult, Classification, FactorVector, HistoryEntry, Outcome,
    RequestContext, Router, RouterStats, System, Trend,
};
pub use sandbox::{
    check_command_safety, cleanup, execute, record_result, stats as sandbox_stats, validate,
    ActualResult, BlockedPattern, ExecutionRecord, SafetyCheck, Sandbox, SandboxOptions,
    SandboxStats, SandboxStatus, Severity, ValidationResult as SandboxValidationResult,
};
pub use session::Session;
pub use swarm::{
    add_noise, checksum, default_queue_path, package, scrub_packet, verify_checksum,
    DeltaPacket, QueuedUpload, ScheduleState, SignedPacket, SwarmClient, WeightCategory,
    WeightPacket, ALL_CATEGORIES,
};
pub use system1::{fingerprint, LookupResult, Origin, Pattern, System1Cache};
pub use system2::{
    assess_complexity, execute_plan, plan, reflect, resolve_order, solve, Attempt, Complexity,
    ComplexityTier, DetectedPattern, DryRunBackend, Execution, ExecuteOptions, ExecutionBackend,
    FailureDiagnosis, Plan, PlanOptions, PlanStep, Reflection, Risk, RiskSeverity, SolveOptions,
    SolveResult, StepResult, StepStatus, Task, TeamLevel, TeamRecommendation,
};
