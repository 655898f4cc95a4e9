//! System 1 — the fast path. Pattern fingerprinting, lock-free lookup, and
//! usage-driven demotion signaling. Mutation (insert/remove/persist) is
//! serialized through the advisory file lock described in §4.6 of the
//! design; reads never take it.

pub mod fingerprint;

use crate::error::Result;
use crate::fsutil::{self, FileLock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Instant;

const RECENT_OUTCOMES_WINDOW: usize = 50;
const DEMOTION_MIN_USES: usize = 10;
const DEMOTION_FAILURE_RATE: f64 = 0.20;
const RECENCY_FLOOR_HOURS: f64 = 168.0;

/// Where a pattern came from: seeded at install time, or promoted from
/// System 2 by the knowledge-transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Seeded,
    Promoted,
}

/// A System 1 cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub fingerprint: String,
    pub suggested_answer: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used: DateTime<Utc>,
    pub origin: Origin,
    #[serde(default)]
    recent_outcomes: VecDeque<bool>,
}

impl Pattern {
    pub fn new(fingerprint: impl Into<String>, suggested_answer: impl Into<String>, origin: Origin) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            suggested_answer: suggested_answer.into(),
            success_count: 0,
            failure_count: 0,
            last_used: Utc::now(),
            origin,
            recent_outcomes: VecDeque::new(),
        }
    }

    /// Recent success rate weighted by recency since last use. Patterns
    /// untouched for a week or more bottom out at a 0.5 recency multiplier
    /// rather than decaying to zero, so a historically solid pattern never
    /// looks worse than a coin flip purely from going stale.
    pub fn confidence(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        let base = if total == 0 {
            0.75
        } else {
            self.success_count as f64 / total as f64
        };
        let hours_idle = (Utc::now() - self.last_used).num_minutes().max(0) as f64 / 60.0;
        let recency = (1.0 - (hours_idle / RECENCY_FLOOR_HOURS)).clamp(0.5, 1.0);
        (base * recency).clamp(0.0, 1.0)
    }

    /// Record one use's outcome. Returns `true` if the pattern should be
    /// flagged for demotion: either its last two consecutive uses failed, or
    /// its overall failure rate exceeds 20% over at least 10 uses.
    pub fn record_usage(&mut self, success: bool) -> bool {
        self.last_used = Utc::now();
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }

        self.recent_outcomes.push_back(success);
        if self.recent_outcomes.len() > RECENT_OUTCOMES_WINDOW {
            self.recent_outcomes.pop_front();
        }

        let last_two_failed = self.recent_outcomes.len() >= 2
            && self.recent_outcomes.iter().rev().take(2).all(|ok| !ok);

        let total_recent = self.recent_outcomes.len();
        let failures = self.recent_outcomes.iter().filter(|ok| !**ok).count();
        let rate_triggers = total_recent >= DEMOTION_MIN_USES
            && (failures as f64 / total_recent as f64) > DEMOTION_FAILURE_RATE;

        last_two_failed || rate_triggers
    }
}

/// Result of a `lookup` call.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub hit: bool,
    pub pattern: Option<Pattern>,
    pub confidence: Option<f64>,
    pub latency_ms: u64,
}

impl LookupResult {
    fn miss(latency_ms: u64) -> Self {
        Self {
            hit: false,
            pattern: None,
            confidence: None,
            latency_ms,
        }
    }
}

/// The in-memory System 1 cache, backed by a single JSON file on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct System1Cache {
    patterns: HashMap<String, Pattern>,
}

impl System1Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`, tolerating a missing file as an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist under the advisory write lock: read-modify-write is the
    /// caller's job (they hold `&mut self` already); this method only
    /// serializes the atomic rename against other writers.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let _lock = FileLock::acquire(path)?;
        fsutil::atomic_write_json(path, self)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, fingerprint: &str) -> Option<&Pattern> {
        self.patterns.get(fingerprint)
    }

    pub fn insert(&mut self, pattern: Pattern) {
        self.patterns.insert(pattern.fingerprint.clone(), pattern);
    }

    pub fn remove(&mut self, fingerprint: &str) -> Option<Pattern> {
        self.patterns.remove(fingerprint)
    }

    /// Lock-free read: fingerprint the request, look it up, and score
    /// confidence. A miss or sub-threshold confidence both read as `hit =
    /// false` so the caller always knows to fall back to System 2.
    pub fn lookup(&self, request: &str, min_confidence: f64) -> LookupResult {
        let started = Instant::now();
        let key = fingerprint::fingerprint(request);

        let Some(pattern) = self.patterns.get(&key) else {
            return LookupResult::miss(started.elapsed().as_millis() as u64);
        };

        let confidence = pattern.confidence();
        if confidence < min_confidence {
            return LookupResult::miss(started.elapsed().as_millis() as u64);
        }

        LookupResult {
            hit: true,
            pattern: Some(pattern.clone()),
            confidence: Some(confidence),
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Record a usage outcome for a pattern already in the cache. Returns
    /// whether the pattern should now be flagged for demotion (the caller —
    /// the knowledge-transfer engine — performs the actual removal).
    pub fn record_usage(&mut self, fingerprint: &str, success: bool) -> Option<bool> {
        self.patterns
            .get_mut(fingerprint)
            .map(|pattern| pattern.record_usage(success))
    }
}

/// Default location of the System 1 cache file under a persistence root.
pub fn default_cache_path(root: &Path) -> PathBuf {
    root.join("learning").join("system1-cache.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn miss_on_empty_cache() {
        let cache = System1Cache::new();
        let result = cache.lookup("fix a typo", 0.6);
        assert!(!result.hit);
    }

    #[test]
    fn hit_on_seeded_high_confidence_pattern() {
        let mut cache = System1Cache::new();
        let key = fingerprint::fingerprint("fix a typo");
        let mut pattern = Pattern::new(key.clone(), "apply the obvious correction", Origin::Seeded);
        for _ in 0..8 {
            pattern.record_usage(true);
        }
        cache.insert(pattern);

        let result = cache.lookup("fix a typo", 0.6);
        assert!(result.hit);
        assert!(result.confidence.unwrap() >= 0.6);
    }

    #[test]
    fn two_consecutive_failures_flag_demotion() {
        let mut pattern = Pattern::new("k", "a", Origin::Seeded);
        pattern.record_usage(true);
        assert!(!pattern.record_usage(false));
        assert!(pattern.record_usage(false));
    }

    #[test]
    fn overall_failure_rate_above_20_percent_flags_demotion() {
        let mut pattern = Pattern::new("k", "a", Origin::Seeded);
        for _ in 0..8 {
            pattern.record_usage(true);
        }
        // 2 failures among the next entries push the window over 10 uses
        // and above a 20% failure rate.
        pattern.record_usage(false);
        let flagged = pattern.record_usage(false);
        assert!(flagged);
    }

    #[test]
    fn persists_and_reloads_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("system1-cache.json");

        let mut cache = System1Cache::new();
        cache.insert(Pattern::new("a:b:c", "answer", Origin::Seeded));
        cache.persist(&path).unwrap();

        let reloaded = System1Cache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("a:b:c").is_some());
    }
}
