//! Configuration surface: one namespace per component, builder-style
//! `with_*` constructors, defaults matching the external interface contract.

use serde::{Deserialize, Serialize};

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.clamp(lo, hi)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub threshold: f64,
    pub adapt_rate: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            adapt_rate: 0.05,
        }
    }
}

impl RouterConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = clamp(threshold, 0.2, 0.7);
        self
    }

    pub fn with_adapt_rate(mut self, adapt_rate: f64) -> Self {
        self.adapt_rate = clamp(adapt_rate, 0.001, 0.2);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System1Config {
    pub max_latency_ms: u64,
    pub min_confidence: f64,
}

impl Default for System1Config {
    fn default() -> Self {
        Self {
            max_latency_ms: 100,
            min_confidence: 0.6,
        }
    }
}

impl System1Config {
    pub fn with_max_latency_ms(mut self, ms: u64) -> Self {
        self.max_latency_ms = ms;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = clamp(confidence, 0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System2Config {
    pub max_retries: u32,
    pub sandbox_enabled: bool,
}

impl Default for System2Config {
    fn default() -> Self {
        Self {
            max_retries: 3,
            sandbox_enabled: true,
        }
    }
}

impl System2Config {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_sandbox_enabled(mut self, enabled: bool) -> Self {
        self.sandbox_enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub timeout_ms: u64,
    pub max_lifetime_ms: u64,
    pub allow_network: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_lifetime_ms: 300_000,
            allow_network: true,
        }
    }
}

impl SandboxConfig {
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_max_lifetime_ms(mut self, ms: u64) -> Self {
        self.max_lifetime_ms = ms;
        self
    }

    pub fn with_allow_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    pub batch_size: usize,
    pub grpo_group_size: usize,
    pub learning_rate: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            grpo_group_size: 5,
            learning_rate: 0.1,
        }
    }
}

impl LearningConfig {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_grpo_group_size(mut self, size: usize) -> Self {
        self.grpo_group_size = size;
        self
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate.max(0.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeTransferConfig {
    pub promotion_threshold: u32,
    pub demotion_threshold: u32,
}

impl Default for KnowledgeTransferConfig {
    fn default() -> Self {
        Self {
            promotion_threshold: 3,
            demotion_threshold: 2,
        }
    }
}

impl KnowledgeTransferConfig {
    pub fn with_promotion_threshold(mut self, n: u32) -> Self {
        self.promotion_threshold = n;
        self
    }

    pub fn with_demotion_threshold(mut self, n: u32) -> Self {
        self.demotion_threshold = n;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmSchedule {
    Session,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub schedule: SwarmSchedule,
    pub merge_ratio: f64,
    pub noise_sigma: f64,
    pub endpoint: Option<String>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            schedule: SwarmSchedule::Session,
            merge_ratio: 0.7,
            noise_sigma: 0.01,
            endpoint: None,
        }
    }
}

impl SwarmConfig {
    pub fn with_schedule(mut self, schedule: SwarmSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_merge_ratio(mut self, ratio: f64) -> Self {
        self.merge_ratio = clamp(ratio, 0.0, 1.0);
        self
    }

    pub fn with_noise_sigma(mut self, sigma: f64) -> Self {
        self.noise_sigma = sigma.max(0.0);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Top-level configuration, one nested struct per component namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub router: RouterConfig,
    pub system1: System1Config,
    pub system2: System2Config,
    pub sandbox: SandboxConfig,
    pub learning: LearningConfig,
    pub knowledge_transfer: KnowledgeTransferConfig,
    pub swarm: SwarmConfig,
}

impl Config {
    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    pub fn with_system1(mut self, system1: System1Config) -> Self {
        self.system1 = system1;
        self
    }

    pub fn with_system2(mut self, system2: System2Config) -> Self {
        self.system2 = system2;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_learning(mut self, learning: LearningConfig) -> Self {
        self.learning = learning;
        self
    }

    pub fn with_knowledge_transfer(mut self, kt: KnowledgeTransferConfig) -> Self {
        self.knowledge_transfer = kt;
        self
    }

    pub fn with_swarm(mut self, swarm: SwarmConfig) -> Self {
        self.swarm = swarm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_external_interface_contract() {
        let config = Config::default();
        assert_eq!(config.router.threshold, 0.4);
        assert_eq!(config.router.adapt_rate, 0.05);
        assert_eq!(config.system1.max_latency_ms, 100);
        assert_eq!(config.system2.max_retries, 3);
        assert_eq!(config.sandbox.timeout_ms, 30_000);
        assert_eq!(config.learning.batch_size, 50);
        assert_eq!(config.knowledge_transfer.promotion_threshold, 3);
        assert_eq!(config.swarm.merge_ratio, 0.7);
        assert_eq!(config.swarm.noise_sigma, 0.01);
    }

    #[test]
    fn out_of_range_values_clamp_rather_than_panic() {
        let router = RouterConfig::default().with_threshold(5.0).with_adapt_rate(-1.0);
        assert_eq!(router.threshold, 0.7);
        assert_eq!(router.adapt_rate, 0.001);
    }
}
