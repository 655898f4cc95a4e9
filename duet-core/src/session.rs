//! The session object: the one piece of in-process state every other
//! module is wired through. A `Session` owns the Router's adaptive
//! threshold and streak, the System 1 cache, and the persistence root
//! every subsystem's own files (experience log, GRPO weights, S2 registry,
//! swarm upload queue) live under. `load`/`checkpoint` are the only points
//! where the session itself touches disk; everything else is delegated to
//! the owning subsystem.

use crate::cancel::CancellationSignal;
use crate::config::Config;
use crate::error::Result;
use crate::fsutil;
use crate::learning::{self, DomainWeights, RewardComponents, StrategyCandidate};
use crate::privacy;
use crate::router::{AdaptResult, Classification, Outcome, RequestContext, Router, RouterStats};
use crate::sandbox::SandboxOptions;
use crate::swarm::SwarmClient;
use crate::system1::{LookupResult, Pattern, System1Cache};
use crate::system2::{self, ExecutionBackend, SolveOptions, SolveResult, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted threshold state: current value plus the consecutive-success
/// streak, so a restart resumes exactly where it left off rather than
/// re-earning the streak from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThresholdState {
    threshold: f64,
    streak: u32,
}

fn thresholds_path(root: &Path) -> PathBuf {
    root.join("learning").join("thresholds.json")
}

/// One in-process orchestrator instance, meant to live for the lifetime of
/// a single host-assistant session.
pub struct Session {
    pub config: Config,
    root: PathBuf,
    router: Router,
    system1: System1Cache,
}

impl Session {
    /// Start a fresh in-memory session rooted at `root`, with nothing
    /// loaded from disk yet.
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        let router = Router::new(config.router.threshold, config.router.adapt_rate);
        Self {
            config,
            root: root.into(),
            router,
            system1: System1Cache::new(),
        }
    }

    /// Load persisted threshold/streak state and the System 1 cache from
    /// `root`, tolerating a fresh install where neither exists yet.
    pub fn load(config: Config, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let router = match Self::load_threshold_state(&root)? {
            Some(state) => Router::restore(state.threshold, state.streak, config.router.adapt_rate),
            None => Router::new(config.router.threshold, config.router.adapt_rate),
        };
        let system1 = System1Cache::load(&crate::system1::default_cache_path(&root))?;
        Ok(Self {
            config,
            root,
            router,
            system1,
        })
    }

    fn load_threshold_state(root: &Path) -> Result<Option<ThresholdState>> {
        let path = thresholds_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Persist threshold/streak and the System 1 cache. Called at session
    /// end, and on whatever checkpoint cadence the host chooses.
    pub fn checkpoint(&self) -> Result<()> {
        fsutil::atomic_write_json(
            &thresholds_path(&self.root),
            &ThresholdState {
                threshold: self.router.threshold(),
                streak: self.router.streak(),
            },
        )?;
        self.system1.persist(&crate::system1::default_cache_path(&self.root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- Router -----------------------------------------------------------

    pub fn route(&mut self, text: &str, ctx: &RequestContext) -> (Classification, DateTime<Utc>) {
        self.router.route(text, ctx)
    }

    pub fn record_duration(&mut self, duration_ms: u64) {
        self.router.record_duration(duration_ms)
    }

    pub fn adapt_threshold(&mut self, outcome: Outcome) -> AdaptResult {
        self.router.adapt(outcome)
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    // --- System 1 -----------------------------------------------------------

    pub fn lookup(&self, request: &str) -> LookupResult {
        self.system1.lookup(request, self.config.system1.min_confidence)
    }

    /// Seed or overwrite a pattern directly, bypassing the promotion path
    /// (used at install time to load the starter cache).
    pub fn seed_pattern(&mut self, pattern: Pattern) {
        self.system1.insert(pattern);
    }

    /// Record a System 1 usage outcome and, if the pattern trips the
    /// demotion rule, run the knowledge-transfer demotion immediately:
    /// remove it from the in-memory cache, flag it in the System 2
    /// registry, and log the transition.
    pub fn record_usage(&mut self, fingerprint: &str, success: bool) -> Result<bool> {
        let Some(flagged) = self.system1.record_usage(fingerprint, success) else {
            return Ok(false);
        };
        if flagged {
            self.system1.remove(fingerprint);
            learning::demote(
                &self.root,
                fingerprint,
                "2 consecutive failures or >20% failure rate over >=10 uses",
            )?;
        }
        Ok(flagged)
    }

    /// Promote a System 2 pattern that has earned its way into System 1,
    /// refreshing the in-memory cache from the committed write.
    pub fn promote(&mut self, fingerprint: &str, suggested_answer: &str) -> Result<()> {
        self.system1 = learning::promote(&self.root, fingerprint, suggested_answer)?;
        Ok(())
    }

    // --- System 2 -----------------------------------------------------------

    /// Run the plan/execute/reflect loop for `task` under this session's
    /// configured retry and sandbox limits. A suspension point per §5: the
    /// loop itself has no internal network I/O to yield on, but it is an
    /// `async fn` so a caller can pass a `CancellationSignal` and have it
    /// checked at each retry's step boundary rather than only before or
    /// after the whole call.
    pub async fn solve(
        &self,
        task: &Task,
        backend: &mut dyn ExecutionBackend,
        on_phase: impl FnMut(&str, u32),
        mut cancel: Option<CancellationSignal>,
    ) -> Result<SolveResult> {
        if let Some(signal) = cancel.as_mut() {
            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    return Err(crate::error::Error::Internal(
                        "solve cancelled before it started".to_string(),
                    ));
                }
                () = std::future::ready(()) => {}
            }
        }
        let options = SolveOptions {
            max_retries: self.config.system2.max_retries,
            sandbox_options: SandboxOptions {
                timeout_ms: self.config.sandbox.timeout_ms,
                lifetime_ms: self.config.sandbox.max_lifetime_ms as i64,
                extra_blocked_patterns: Vec::new(),
            },
            ..SolveOptions::default()
        };
        system2::solve(task, options, backend, on_phase, cancel.as_ref())
    }

    // --- Learning -----------------------------------------------------------

    pub fn record_experience(
        &self,
        domain: &str,
        strategy: StrategyCandidate,
        reward: RewardComponents,
    ) -> Result<()> {
        learning::experience::record(&self.root, domain, strategy, reward)
    }

    /// Fold the last window of experiences into per-domain GRPO weight
    /// updates. Call at session end, or on whatever cadence the host
    /// prefers (the window is bounded, so calling more often just means
    /// smaller, more frequent updates). `async` per §5, for the same
    /// cancellation-boundary reason as `solve`.
    pub async fn batch_learn(&self) -> Result<Vec<DomainWeights>> {
        learning::batch_learn_session_end(&self.root)
    }

    // --- Privacy -----------------------------------------------------------

    /// Scrub text before it leaves the process: swarm uploads, logs shipped
    /// off-host, anything crossing the privacy boundary. Always run this;
    /// there is no configuration flag that disables it.
    pub fn scrub(&self, text: &str) -> privacy::ScrubResult {
        privacy::scrub(text)
    }

    // --- Swarm -----------------------------------------------------------

    pub fn swarm_client(&self) -> SwarmClient {
        SwarmClient::new(self.config.swarm.clone(), self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::RewardComponents;
    use crate::router::System;
    use crate::system1::Origin;
    use tempfile::tempdir;

    #[test]
    fn checkpoint_then_load_restores_threshold_and_streak() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(Config::default(), dir.path());

        for _ in 0..5 {
            session.adapt_threshold(Outcome {
                system: System::One,
                success: true,
            });
        }
        assert!((session.router.threshold() - 0.45).abs() < 1e-9);
        session.checkpoint().unwrap();

        let reloaded = Session::load(Config::default(), dir.path()).unwrap();
        assert!((reloaded.router.threshold() - 0.45).abs() < 1e-9);
        assert_eq!(reloaded.router.streak(), 0);
    }

    #[test]
    fn seeded_pattern_survives_checkpoint_round_trip() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(Config::default(), dir.path());
        session.seed_pattern(Pattern::new("d:v:abc", "apply the obvious fix", Origin::Seeded));
        session.checkpoint().unwrap();

        let reloaded = Session::load(Config::default(), dir.path()).unwrap();
        assert!(reloaded.lookup_pattern_exists("d:v:abc"));
    }

    impl Session {
        fn lookup_pattern_exists(&self, fingerprint: &str) -> bool {
            self.system1.get(fingerprint).is_some()
        }
    }

    #[test]
    fn demotion_flags_the_s2_registry() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(Config::default(), dir.path());
        session.seed_pattern(Pattern::new("d:v:demote-me", "answer", Origin::Seeded));

        session.record_usage("d:v:demote-me", false).unwrap();
        let flagged = session.record_usage("d:v:demote-me", false).unwrap();
        assert!(flagged);
        assert!(!session.lookup_pattern_exists("d:v:demote-me"));

        let registry = learning::System2Registry::load(&learning::default_registry_path(dir.path())).unwrap();
        assert!(registry.contains("d:v:demote-me"));
    }

    #[tokio::test]
    async fn solve_runs_through_the_session_with_default_config() {
        let dir = tempdir().unwrap();
        let session = Session::new(Config::default(), dir.path());
        let task = Task {
            id: "t1".to_string(),
            description: "fix a typo".to_string(),
            ..Default::default()
        };
        let mut backend = crate::system2::DryRunBackend;
        let result = session
            .solve(&task, &mut backend, |_, _| {}, None)
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn solve_honors_cancellation_requested_before_the_call() {
        let dir = tempdir().unwrap();
        let session = Session::new(Config::default(), dir.path());
        let task = Task {
            id: "t1".to_string(),
            description: "fix a typo".to_string(),
            ..Default::default()
        };
        let mut backend = crate::system2::DryRunBackend;
        let (token, signal) = crate::cancel::CancellationToken::new();
        token.cancel();
        let result = session.solve(&task, &mut backend, |_, _| {}, Some(signal)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn record_experience_and_batch_learn_round_trip() {
        let dir = tempdir().unwrap();
        let session = Session::new(Config::default(), dir.path());
        let strategy = StrategyCandidate {
            name: "default".to_string(),
            domain_specific: false,
        };
        let reward = RewardComponents {
            exit_code: 1.0,
            error_free: 1.0,
            speed: 0.8,
            brevity: 0.9,
            side_effects: 1.0,
        };
        session.record_experience("backend", strategy, reward).unwrap();
        let updates = session.batch_learn().await.unwrap();
        assert!(!updates.is_empty());
    }

    #[test]
    fn scrub_redacts_secrets_before_any_swarm_handoff() {
        let dir = tempdir().unwrap();
        let session = Session::new(Config::default(), dir.path());
        let result = session.scrub("api_key=sk-abcdefghijklmnopqrstuvwx1234567890ABCD");
        assert!(result.text.contains("REDACTED"));
    }
}
