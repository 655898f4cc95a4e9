//! Knowledge transfer between System 2 and System 1: promote a pattern that
//! System 2 has proven out, demote one System 1 has started getting wrong,
//! and record every transition in an append-only log.

use crate::error::Result;
use crate::fsutil;
use crate::system1::{Origin, Pattern, System1Cache};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const PROMOTION_STREAK: u32 = 3;
const PROMOTION_MIN_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Promote,
    Demote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLogEntry {
    pub fingerprint: String,
    pub kind: TransferKind,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Tracks a fingerprint's recent System 2 outcomes to decide when it has
/// earned promotion into the System 1 cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionTracker {
    pub consecutive_successes: u32,
    pub last_confidence: f64,
}

impl PromotionTracker {
    /// Record one System 2 outcome. Returns `true` once three consecutive
    /// successes land with confidence above 0.8.
    pub fn record(&mut self, success: bool, confidence: f64) -> bool {
        if success {
            self.consecutive_successes += 1;
            self.last_confidence = confidence;
        } else {
            self.consecutive_successes = 0;
            self.last_confidence = 0.0;
        }
        self.consecutive_successes >= PROMOTION_STREAK && self.last_confidence > PROMOTION_MIN_CONFIDENCE
    }
}

pub fn default_log_path(root: &Path) -> std::path::PathBuf {
    root.join("learning").join("transfer-log.jsonl")
}

/// One fingerprint's standing in the System 2 registry: flagged for
/// re-analysis after a demotion, tracking its promotion streak in the
/// meantime. A Pattern lives in at most one of {S1 cache, S2 registry} —
/// `promote`/`demote` move entries between the two, never copy them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub fingerprint: String,
    pub flagged_at: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub promotion: PromotionTracker,
}

/// The System 2 side of the knowledge-transfer registry, backed by
/// `learning/system2-cache.json`. Holds patterns System 1 has given up on
/// (pending re-analysis) and in-flight promotion streaks for patterns System
/// 2 is solving well enough to eventually hand back to System 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System2Registry {
    entries: std::collections::HashMap<String, RegistryEntry>,
}

impl System2Registry {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        fsutil::atomic_write_json(path, self)
    }

    pub fn get(&self, fingerprint: &str) -> Option<&RegistryEntry> {
        self.entries.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Flag a just-demoted fingerprint for re-analysis; its promotion
    /// tracker starts fresh.
    pub fn flag_for_reanalysis(&mut self, fingerprint: &str, reason: &str) {
        self.entries.insert(
            fingerprint.to_string(),
            RegistryEntry {
                fingerprint: fingerprint.to_string(),
                flagged_at: Utc::now(),
                reason: reason.to_string(),
                promotion: PromotionTracker::default(),
            },
        );
    }

    /// Record a System 2 outcome for a registered fingerprint. Returns
    /// `true` once it has earned promotion (3 consecutive successes at
    /// confidence > 0.8). The entry stays in the registry until the caller
    /// actually promotes it and calls `remove`.
    pub fn record_outcome(&mut self, fingerprint: &str, success: bool, confidence: f64, reason: &str) -> bool {
        let entry = self.entries.entry(fingerprint.to_string()).or_insert_with(|| RegistryEntry {
            fingerprint: fingerprint.to_string(),
            flagged_at: Utc::now(),
            reason: reason.to_string(),
            promotion: PromotionTracker::default(),
        });
        entry.promotion.record(success, confidence)
    }

    pub fn remove(&mut self, fingerprint: &str) -> Option<RegistryEntry> {
        self.entries.remove(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn default_registry_path(root: &Path) -> std::path::PathBuf {
    root.join("learning").join("system2-cache.json")
}

/// Promote a fingerprint/answer pair into the System 1 cache under the
/// file-lock hot-swap protocol: load, insert, persist, log. Returns the
/// cache as reloaded after the write so the caller sees the committed state.
pub fn promote(
    root: &Path,
    fingerprint: &str,
    suggested_answer: &str,
) -> Result<System1Cache> {
    let cache_path = crate::system1::default_cache_path(root);
    let mut cache = System1Cache::load(&cache_path)?;
    cache.insert(Pattern::new(fingerprint, suggested_answer, Origin::Promoted));
    cache.persist(&cache_path)?;

    let registry_path = default_registry_path(root);
    let mut registry = System2Registry::load(&registry_path)?;
    if registry.remove(fingerprint).is_some() {
        registry.persist(&registry_path)?;
    }

    fsutil::append_jsonl(
        &default_log_path(root),
        &TransferLogEntry {
            fingerprint: fingerprint.to_string(),
            kind: TransferKind::Promote,
            at: Utc::now(),
            reason: "3 consecutive System 2 successes, confidence > 0.8".to_string(),
        },
    )?;

    System1Cache::load(&cache_path)
}

/// Demote (remove) a fingerprint from the System 1 cache under the same
/// hot-swap protocol, flag it in the System 2 registry for re-analysis on
/// next use, and log why.
pub fn demote(root: &Path, fingerprint: &str, reason: &str) -> Result<System1Cache> {
    let cache_path = crate::system1::default_cache_path(root);
    let mut cache = System1Cache::load(&cache_path)?;
    cache.remove(fingerprint);
    cache.persist(&cache_path)?;

    let registry_path = default_registry_path(root);
    let mut registry = System2Registry::load(&registry_path)?;
    registry.flag_for_reanalysis(fingerprint, reason);
    registry.persist(&registry_path)?;

    fsutil::append_jsonl(
        &default_log_path(root),
        &TransferLogEntry {
            fingerprint: fingerprint.to_string(),
            kind: TransferKind::Demote,
            at: Utc::now(),
            reason: reason.to_string(),
        },
    )?;

    System1Cache::load(&cache_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tracker_promotes_after_three_confident_successes() {
        let mut tracker = PromotionTracker::default();
        assert!(!tracker.record(true, 0.9));
        assert!(!tracker.record(true, 0.9));
        assert!(tracker.record(true, 0.9));
    }

    #[test]
    fn tracker_resets_streak_on_failure() {
        let mut tracker = PromotionTracker::default();
        tracker.record(true, 0.9);
        tracker.record(true, 0.9);
        assert!(!tracker.record(false, 0.0));
        assert!(!tracker.record(true, 0.9));
    }

    #[test]
    fn tracker_requires_confidence_above_threshold() {
        let mut tracker = PromotionTracker::default();
        tracker.record(true, 0.5);
        tracker.record(true, 0.5);
        assert!(!tracker.record(true, 0.5));
    }

    #[test]
    fn promote_then_demote_round_trip() {
        let dir = tempdir().unwrap();
        let cache = promote(dir.path(), "fp:1", "do the thing").unwrap();
        assert!(cache.get("fp:1").is_some());

        let cache = demote(dir.path(), "fp:1", "2 consecutive failures").unwrap();
        assert!(cache.get("fp:1").is_none());

        let log_content = std::fs::read_to_string(default_log_path(dir.path())).unwrap();
        assert_eq!(log_content.lines().count(), 2);
    }

    #[test]
    fn demote_flags_fingerprint_in_s2_registry() {
        let dir = tempdir().unwrap();
        promote(dir.path(), "fp:2", "answer").unwrap();
        demote(dir.path(), "fp:2", "2 consecutive failures").unwrap();

        let registry = System2Registry::load(&default_registry_path(dir.path())).unwrap();
        assert!(registry.contains("fp:2"));
        assert_eq!(registry.get("fp:2").unwrap().reason, "2 consecutive failures");
    }

    #[test]
    fn promotion_removes_fingerprint_from_s2_registry() {
        let dir = tempdir().unwrap();
        let registry_path = default_registry_path(dir.path());
        let mut registry = System2Registry::load(&registry_path).unwrap();
        registry.flag_for_reanalysis("fp:3", "demoted earlier");
        registry.persist(&registry_path).unwrap();

        promote(dir.path(), "fp:3", "re-earned its spot").unwrap();

        let registry = System2Registry::load(&registry_path).unwrap();
        assert!(!registry.contains("fp:3"));
    }

    #[test]
    fn registry_record_outcome_signals_promotion_readiness() {
        let mut registry = System2Registry::default();
        assert!(!registry.record_outcome("fp:4", true, 0.9, "new"));
        assert!(!registry.record_outcome("fp:4", true, 0.9, "new"));
        assert!(registry.record_outcome("fp:4", true, 0.9, "new"));
    }
}
