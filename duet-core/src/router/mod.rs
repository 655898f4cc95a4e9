//! Complexity Router: deterministic five-factor scoring, System 1/System 2
//! routing, and threshold self-adaptation from outcome feedback.

pub mod factors;
pub mod keywords;

pub use factors::{FactorVector, RequestContext};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which downstream system a request was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum System {
    One,
    Two,
}

/// The immutable result of classifying one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub score: f64,
    pub system: System,
    pub confidence: f64,
    pub factors: FactorVector,
    pub threshold_at_classification: f64,
}

/// One entry in the router's routing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_truncated: String,
    pub score: f64,
    pub system: System,
    pub duration_ms: Option<u64>,
    pub outcome: Option<bool>,
}

/// Direction the threshold moved on the most recent `adapt` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptDirection {
    Lowered,
    Unchanged,
    Raised,
}

/// Outcome feedback fed back into `adapt`.
#[derive(Debug, Clone, Copy)]
pub struct Outcome {
    pub system: System,
    pub success: bool,
}

/// Result of one `adapt` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptResult {
    pub previous_threshold: f64,
    pub new_threshold: f64,
    pub direction: AdaptDirection,
    pub streak: u32,
}

/// Overall routing statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterStats {
    pub total_routed: usize,
    pub system1_count: usize,
    pub system2_count: usize,
    pub system1_ratio: f64,
    pub average_score: f64,
    pub average_duration_ms: Option<f64>,
    pub system1_success_rate: Option<f64>,
    pub system2_success_rate: Option<f64>,
    pub recent_trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Stable,
    ShiftingToSystem1,
    ShiftingToSystem2,
}

const THRESHOLD_MIN: f64 = 0.2;
const THRESHOLD_MAX: f64 = 0.7;
const SUCCESS_STREAK_TO_RAISE: u32 = 5;

/// The Complexity Router. Owns its threshold state and routing history; a
/// single instance is meant to live for the lifetime of a `Session`.
#[derive(Debug, Clone)]
pub struct Router {
    threshold: f64,
    adapt_step: f64,
    streak: u32,
    history: Vec<HistoryEntry>,
}

impl Router {
    pub fn new(initial_threshold: f64, adapt_step: f64) -> Self {
        Self {
            threshold: initial_threshold.clamp(THRESHOLD_MIN, THRESHOLD_MAX),
            adapt_step: adapt_step.clamp(0.001, 0.2),
            streak: 0,
            history: Vec::new(),
        }
    }

    /// Rebuild a Router from previously checkpointed threshold/streak state
    /// (routing history is not persisted, so it always restarts empty).
    pub fn restore(threshold: f64, streak: u32, adapt_step: f64) -> Self {
        Self {
            threshold: threshold.clamp(THRESHOLD_MIN, THRESHOLD_MAX),
            adapt_step: adapt_step.clamp(0.001, 0.2),
            streak,
            history: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Classify and route a request, appending a history entry with an empty
    /// outcome slot to be filled in later by `adapt`.
    pub fn route(&mut self, text: &str, ctx: &RequestContext) -> (Classification, DateTime<Utc>) {
        let classification = self.classify(text, ctx);
        let routed_at = Utc::now();

        self.history.push(HistoryEntry {
            request_truncated: truncate_chars(text, 200),
            score: classification.score,
            system: classification.system,
            duration_ms: None,
            outcome: None,
        });

        (classification, routed_at)
    }

    /// Pure classification step: identical `(text, ctx, threshold)` always
    /// produces an identical `Classification`.
    pub fn classify(&self, text: &str, ctx: &RequestContext) -> Classification {
        let factor_vector = factors::compute_factors(text, ctx);
        let score = factor_vector.weighted_score();
        let system = if score < self.threshold {
            System::One
        } else {
            System::Two
        };
        let confidence = (0.5 + (score - self.threshold).abs()).clamp(0.5, 1.0);

        Classification {
            score,
            system,
            confidence,
            factors: factor_vector,
            threshold_at_classification: self.threshold,
        }
    }

    /// Record the actual duration of the most recently routed request that
    /// has no duration recorded yet.
    pub fn record_duration(&mut self, duration_ms: u64) {
        if let Some(entry) = self.history.iter_mut().rev().find(|e| e.duration_ms.is_none()) {
            entry.duration_ms = Some(duration_ms);
        }
    }

    /// Adapt the threshold from a single outcome. System 2 outcomes never
    /// move the threshold: S2 is the fallback path, so its success tells us
    /// nothing about whether S1 would have sufficed.
    pub fn adapt(&mut self, outcome: Outcome) -> AdaptResult {
        let previous_threshold = self.threshold;

        if let Some(entry) = self
            .history
            .iter_mut()
            .rev()
            .find(|e| e.system == outcome.system && e.outcome.is_none())
        {
            entry.outcome = Some(outcome.success);
        }

        let direction = match outcome.system {
            System::Two => AdaptDirection::Unchanged,
            System::One if !outcome.success => {
                self.threshold = clamp_threshold(self.threshold - self.adapt_step);
                self.streak = 0;
                AdaptDirection::Lowered
            }
            System::One => {
                let next_streak = self.streak + 1;
                if next_streak >= SUCCESS_STREAK_TO_RAISE {
                    self.threshold = clamp_threshold(self.threshold + self.adapt_step);
                    self.streak = 0;
                    AdaptDirection::Raised
                } else {
                    self.streak = next_streak;
                    AdaptDirection::Unchanged
                }
            }
        };

        AdaptResult {
            previous_threshold,
            new_threshold: self.threshold,
            direction,
            streak: self.streak,
        }
    }

    pub fn stats(&self) -> RouterStats {
        let total_routed = self.history.len();
        let system1_count = self.history.iter().filter(|e| e.system == System::One).count();
        let system2_count = total_routed - system1_count;
        let system1_ratio = if total_routed == 0 {
            0.0
        } else {
            system1_count as f64 / total_routed as f64
        };
        let average_score = if total_routed == 0 {
            0.0
        } else {
            self.history.iter().map(|e| e.score).sum::<f64>() / total_routed as f64
        };
        let durations: Vec<f64> = self
            .history
            .iter()
            .filter_map(|e| e.duration_ms.map(|d| d as f64))
            .collect();
        let average_duration_ms = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };

        RouterStats {
            total_routed,
            system1_count,
            system2_count,
            system1_ratio,
            average_score,
            average_duration_ms,
            system1_success_rate: success_rate(&self.history, System::One),
            system2_success_rate: success_rate(&self.history, System::Two),
            recent_trend: self.recent_trend(),
        }
    }

    fn recent_trend(&self) -> Trend {
        if self.history.len() < 10 {
            return Trend::Stable;
        }
        let split = (self.history.len() as f64 * 0.8).floor() as usize;
        let (earlier, recent) = self.history.split_at(split);
        if recent.is_empty() || earlier.is_empty() {
            return Trend::Stable;
        }
        let ratio = |entries: &[HistoryEntry]| {
            entries.iter().filter(|e| e.system == System::One).count() as f64 / entries.len() as f64
        };
        let diff = ratio(recent) - ratio(earlier);
        if diff > 0.15 {
            Trend::ShiftingToSystem1
        } else if diff < -0.15 {
            Trend::ShiftingToSystem2
        } else {
            Trend::Stable
        }
    }
}

fn clamp_threshold(value: f64) -> f64 {
    value.clamp(THRESHOLD_MIN, THRESHOLD_MAX)
}

fn success_rate(history: &[HistoryEntry], system: System) -> Option<f64> {
    let outcomes: Vec<bool> = history
        .iter()
        .filter(|e| e.system == system)
        .filter_map(|e| e.outcome)
        .collect();
    if outcomes.is_empty() {
        return None;
    }
    let successes = outcomes.iter().filter(|s| **s).count();
    Some(successes as f64 / outcomes.len() as f64)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_stays_within_bounds_under_repeated_failures() {
        let mut router = Router::new(0.2, 0.05);
        for _ in 0..20 {
            router.adapt(Outcome {
                system: System::One,
                success: false,
            });
        }
        assert_eq!(router.threshold(), THRESHOLD_MIN);
    }

    #[test]
    fn threshold_stays_within_bounds_under_repeated_successes() {
        let mut router = Router::new(0.7, 0.05);
        for _ in 0..50 {
            router.adapt(Outcome {
                system: System::One,
                success: true,
            });
        }
        assert_eq!(router.threshold(), THRESHOLD_MAX);
    }

    #[test]
    fn adaptive_threshold_scenario() {
        let mut router = Router::new(0.4, 0.05);
        for _ in 0..5 {
            router.adapt(Outcome {
                system: System::One,
                success: true,
            });
        }
        assert!((router.threshold() - 0.45).abs() < 1e-9);

        router.adapt(Outcome {
            system: System::One,
            success: false,
        });
        assert!((router.threshold() - 0.40).abs() < 1e-9);

        let before = router.threshold();
        router.adapt(Outcome {
            system: System::Two,
            success: true,
        });
        assert_eq!(router.threshold(), before);
    }

    #[test]
    fn system2_outcomes_never_change_threshold() {
        let mut router = Router::new(0.4, 0.05);
        let result = router.adapt(Outcome {
            system: System::Two,
            success: false,
        });
        assert_eq!(result.direction, AdaptDirection::Unchanged);
        assert_eq!(result.new_threshold, result.previous_threshold);
    }

    #[test]
    fn classification_is_deterministic() {
        let router = Router::new(0.4, 0.05);
        let ctx = RequestContext::new();
        let a = router.classify("fix a typo", &ctx);
        let b = router.classify("fix a typo", &ctx);
        assert_eq!(a, b);
    }

    #[test]
    fn simple_fix_routes_to_system_one() {
        let mut router = Router::new(0.4, 0.05);
        let ctx = RequestContext::new();
        let (classification, _) = router.route("fix a typo", &ctx);
        assert!(classification.score < 0.4);
        assert_eq!(classification.system, System::One);
        assert!(classification.confidence >= 0.5);
    }
}
