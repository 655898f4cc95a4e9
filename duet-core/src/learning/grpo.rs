//! Group Relative Policy Optimization over strategy weights: generate a
//! group of candidate strategies, score each against a reward vector, and
//! nudge per-domain weights toward whatever beat the group mean.

use crate::fsutil;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// K candidates drawn per domain before any domain-specific additions.
pub const GROUP_SIZE: usize = 5;
/// Additional domain-specific candidates appended beyond the base group.
pub const MAX_DOMAIN_SPECIFIC: usize = 2;
const LEARNING_RATE: f64 = 0.1;
const WEIGHT_CLIP_MIN: f64 = 0.0;
const WEIGHT_CLIP_MAX: f64 = 2.0;

/// The five reward signals an execution outcome is scored on before being
/// folded into a single scalar.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RewardComponents {
    pub exit_code: f64,
    pub error_free: f64,
    pub speed: f64,
    pub brevity: f64,
    pub side_effects: f64,
}

impl RewardComponents {
    /// Equal-weighted combination into one scalar reward.
    pub fn scalar(&self) -> f64 {
        (self.exit_code + self.error_free + self.speed + self.brevity + self.side_effects) / 5.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCandidate {
    pub name: String,
    pub domain_specific: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: StrategyCandidate,
    pub reward: f64,
}

/// A named strategy's weight within a domain's policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyWeight {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainWeights {
    pub domain: String,
    pub strategies: Vec<StrategyWeight>,
}

impl DomainWeights {
    fn weight_mut(&mut self, name: &str) -> &mut f64 {
        if let Some(idx) = self.strategies.iter().position(|s| s.name == name) {
            &mut self.strategies[idx].weight
        } else {
            self.strategies.push(StrategyWeight {
                name: name.to_string(),
                weight: 1.0,
            });
            &mut self.strategies.last_mut().unwrap().weight
        }
    }

    fn renormalize(&mut self) {
        let sum: f64 = self.strategies.iter().map(|s| s.weight).sum();
        if sum <= 0.0 {
            return;
        }
        for s in self.strategies.iter_mut() {
            s.weight /= sum;
        }
    }
}

/// Default on-disk location for a domain's weight file, per §6's
/// `learning/weights/<domain>.json` layout. The `teams.<pattern>` namespace
/// used for team-composition GRPO is just another `domain` value here.
pub fn weights_path(base_dir: &Path, domain: &str) -> PathBuf {
    base_dir.join("weights").join(format!("{domain}.json"))
}

pub fn load_domain_weights(base_dir: &Path, domain: &str) -> crate::error::Result<DomainWeights> {
    let path = weights_path(base_dir, domain);
    if !path.exists() {
        return Ok(DomainWeights {
            domain: domain.to_string(),
            strategies: Vec::new(),
        });
    }
    let bytes = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn persist_domain_weights(base_dir: &Path, weights: &DomainWeights) -> crate::error::Result<()> {
    fsutil::atomic_write_json(&weights_path(base_dir, &weights.domain), weights)
}

/// One GRPO update step: given a group of scored candidates, compute the
/// group-mean advantage for each, nudge its domain weight by `lr * advantage`,
/// clip to `[0, 2]`, and renormalize the domain's weights to sum to 1.
pub fn grpo_update(weights: &mut DomainWeights, scored: &[ScoredCandidate]) {
    if scored.is_empty() {
        return;
    }
    let group_mean = scored.iter().map(|s| s.reward).sum::<f64>() / scored.len() as f64;

    for s in scored {
        let advantage = s.reward - group_mean;
        let delta = LEARNING_RATE * advantage;
        let w = weights.weight_mut(&s.candidate.name);
        *w = (*w + delta).clamp(WEIGHT_CLIP_MIN, WEIGHT_CLIP_MAX);
    }

    weights.renormalize();
}

/// Build the candidate group for a domain: `GROUP_SIZE` base strategies plus
/// up to `MAX_DOMAIN_SPECIFIC` domain-tagged ones.
pub fn build_candidate_group(base_strategies: &[&str], domain_strategies: &[&str]) -> Vec<StrategyCandidate> {
    let mut group: Vec<StrategyCandidate> = base_strategies
        .iter()
        .take(GROUP_SIZE)
        .map(|name| StrategyCandidate {
            name: name.to_string(),
            domain_specific: false,
        })
        .collect();

    for name in domain_strategies.iter().take(MAX_DOMAIN_SPECIFIC) {
        group.push(StrategyCandidate {
            name: name.to_string(),
            domain_specific: true,
        });
    }

    group
}

/// Run batch learning over a window of recent experiences, grouping by
/// domain and applying one `grpo_update` per domain independently.
pub fn batch_learn(
    base_dir: &Path,
    experiences: &[(String, StrategyCandidate, RewardComponents)],
) -> crate::error::Result<Vec<DomainWeights>> {
    let mut by_domain: HashMap<String, Vec<ScoredCandidate>> = HashMap::new();
    for (domain, candidate, reward) in experiences {
        by_domain
            .entry(domain.clone())
            .or_default()
            .push(ScoredCandidate {
                candidate: candidate.clone(),
                reward: reward.scalar(),
            });
    }

    let mut updated = Vec::with_capacity(by_domain.len());
    for (domain, scored) in by_domain {
        let mut weights = load_domain_weights(base_dir, &domain)?;
        grpo_update(&mut weights, &scored);
        persist_domain_weights(base_dir, &weights)?;
        updated.push(weights);
    }
    Ok(updated)
}
