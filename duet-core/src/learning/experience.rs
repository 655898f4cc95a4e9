//! Append-only experience log and the session-end batch-learning trigger
//! that folds the last window of experiences into GRPO updates.

use super::grpo::{self, DomainWeights, RewardComponents, StrategyCandidate};
use crate::error::Result;
use crate::fsutil;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of most-recent experiences folded into one batch-learning pass.
pub const BATCH_WINDOW: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub domain: String,
    pub strategy: StrategyCandidate,
    pub reward: RewardComponents,
    pub recorded_at: DateTime<Utc>,
}

pub fn default_log_path(root: &Path) -> PathBuf {
    root.join("learning").join("experiences.jsonl")
}

/// Append one experience to the on-disk log.
pub fn record(root: &Path, domain: &str, strategy: StrategyCandidate, reward: RewardComponents) -> Result<()> {
    fsutil::append_jsonl(
        &default_log_path(root),
        &Experience {
            domain: domain.to_string(),
            strategy,
            reward,
            recorded_at: Utc::now(),
        },
    )
}

/// Read back every logged experience.
pub fn load_all(root: &Path) -> Result<Vec<Experience>> {
    fsutil::read_jsonl(&default_log_path(root))
}

/// Session-end batch learning: take the last `BATCH_WINDOW` experiences and
/// fold them into one GRPO update per domain.
pub fn batch_learn_session_end(root: &Path) -> Result<Vec<DomainWeights>> {
    let all = load_all(root)?;
    let window_start = all.len().saturating_sub(BATCH_WINDOW);
    let window: Vec<(String, StrategyCandidate, RewardComponents)> = all[window_start..]
        .iter()
        .map(|e| (e.domain.clone(), e.strategy.clone(), e.reward))
        .collect();

    grpo::batch_learn(root, &window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_and_load_round_trip() {
        let dir = tempdir().unwrap();
        record(
            dir.path(),
            "backend",
            StrategyCandidate { name: "a".to_string(), domain_specific: false },
            RewardComponents::default(),
        )
        .unwrap();
        let all = load_all(dir.path()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].domain, "backend");
    }

    #[test]
    fn batch_learn_uses_only_the_most_recent_window() {
        let dir = tempdir().unwrap();
        for i in 0..(BATCH_WINDOW + 10) {
            record(
                dir.path(),
                "backend",
                StrategyCandidate { name: format!("s{i}"), domain_specific: false },
                RewardComponents { exit_code: 1.0, error_free: 1.0, speed: 1.0, brevity: 1.0, side_effects: 1.0 },
            )
            .unwrap();
        }
        let updated = batch_learn_session_end(dir.path()).unwrap();
        assert_eq!(updated.len(), 1);
        assert!(updated[0].strategies.len() <= BATCH_WINDOW);
    }
}
