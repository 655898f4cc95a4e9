//! GRPO policy optimization and knowledge transfer between System 2 and
//! System 1, driven by a shared experience log.

pub mod experience;
pub mod grpo;
pub mod transfer;

pub use experience::{batch_learn_session_end, Experience, BATCH_WINDOW};
pub use grpo::{
    build_candidate_group, grpo_update, load_domain_weights, persist_domain_weights, weights_path,
    DomainWeights, RewardComponents, ScoredCandidate, StrategyCandidate, StrategyWeight,
    GROUP_SIZE, MAX_DOMAIN_SPECIFIC,
};
pub use transfer::{
    default_registry_path, demote, promote, PromotionTracker, RegistryEntry, System2Registry,
    TransferKind, TransferLogEntry,
};
