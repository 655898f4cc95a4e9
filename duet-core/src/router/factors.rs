//! The five weighted complexity factors and their raw signal extraction.

use super::keywords::{self, RISK_WORDS, STEP_CONNECTORS, UNCERTAINTY_WORDS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static NUMBERED_LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s").expect("invalid regex"));

/// Matches the tail of a comma-separated enumeration ("..., and fix X"),
/// the usual way a sentence lists several actions without an explicit
/// step connector.
static ENUMERATION_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),\s*(and|or)\s").expect("invalid regex"));

/// Per-request context the router and System 2 both need to score novelty:
/// how deep into the session we are, which domains have recently come up,
/// and how well each domain has historically gone.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session_depth: u32,
    pub recent_domains: Vec<String>,
    pub domain_success_rates: HashMap<String, f64>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The five factors, each clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorVector {
    pub steps: f64,
    pub domains: f64,
    pub uncertainty: f64,
    pub risk: f64,
    pub novelty: f64,
}

impl FactorVector {
    /// Weighted sum per the classification rule: steps 0.25, domains 0.20,
    /// uncertainty 0.20, risk 0.20, novelty 0.15. Rounded to two decimals.
    pub fn weighted_score(&self) -> f64 {
        let raw = self.steps * 0.25
            + self.domains * 0.20
            + self.uncertainty * 0.20
            + self.risk * 0.20
            + self.novelty * 0.15;
        (raw * 100.0).round() / 100.0
    }
}

/// Count comma-separated clauses with more than a few characters each, a
/// weaker signal than an explicit connector but still evidence of an
/// enumerated list of actions ("migrate X, deploy Y, and fix Z").
fn comma_clause_count(text: &str) -> usize {
    text.split(',').filter(|clause| clause.trim().chars().count() > 3).count()
}

fn steps_factor(text: &str) -> f64 {
    let mut score = 0.0;
    if NUMBERED_LIST_ITEM.is_match(text) {
        score += 0.5;
    }
    if keywords::count_matches(text, STEP_CONNECTORS) > 0 {
        score += 0.4;
    }
    if comma_clause_count(text) >= 3 {
        score += 0.3;
    }
    if ENUMERATION_TAIL.is_match(text) {
        score += 0.2;
    }
    if text.chars().count() > 300 {
        score += 0.3;
    }
    score.min(1.0)
}

fn domains_factor(text: &str) -> f64 {
    match keywords::matched_domain_count(text) {
        0 => 0.0,
        1 => 0.25,
        2 => 0.75,
        _ => 1.0,
    }
}

fn uncertainty_factor(text: &str) -> f64 {
    let word_hits = keywords::count_matches(text, UNCERTAINTY_WORDS) as f64;
    let question_marks = text.matches('?').count() as f64;
    (word_hits * 0.3 + question_marks * 0.2).min(1.0)
}

fn risk_factor(text: &str) -> f64 {
    let hits = keywords::count_matches(text, RISK_WORDS) as f64;
    (hits * 0.35).min(1.0)
}

fn novelty_factor(current_domains: &[&str], ctx: &RequestContext) -> f64 {
    let is_new_domain = |d: &&str| !ctx.recent_domains.iter().any(|r| r == *d);
    let any_new = current_domains.iter().any(is_new_domain);
    let any_low_success = current_domains.iter().any(|d| {
        ctx.domain_success_rates
            .get(**d)
            .copied()
            .unwrap_or(1.0)
            < 0.5
    });

    if ctx.session_depth == 0 && ctx.recent_domains.is_empty() {
        let mut score = 0.4;
        if any_new {
            score += 0.3;
        }
        if any_low_success {
            score += 0.2;
        }
        return score.min(1.0);
    }

    let mut score = if any_new { 0.3 } else { 0.0 };
    if any_low_success {
        score += 0.2;
    }
    let decay = 1.0 / (1.0 + ctx.session_depth as f64 * 0.2);
    (score * decay).min(1.0)
}

/// Compute the full factor vector for a request's text and context.
pub fn compute_factors(text: &str, ctx: &RequestContext) -> FactorVector {
    let current_domains = keywords::matched_domains(text);
    FactorVector {
        steps: steps_factor(text),
        domains: domains_factor(text),
        uncertainty: uncertainty_factor(text),
        risk: risk_factor(text),
        novelty: novelty_factor(&current_domains, ctx),
    }
}
