//! `solve()`: drive plan -> execute -> reflect through up to `max_retries`
//! attempts, and the standalone `assess_complexity` triage helper.

use super::execute::{execute_plan, Execution, ExecuteOptions, ExecutionBackend};
use super::plan::{plan, Plan, PlanOptions, PlanStep, Task, TeamRecommendation};
use super::reflect::{reflect, Reflection};
use crate::cancel::CancellationSignal;
use crate::error::{Error, Result};
use crate::router::factors::{self, RequestContext};
use crate::sandbox::{Sandbox, SandboxOptions};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    System1,
    System2,
    Team,
}

/// Standalone triage: map a task's weighted factor score onto the three
/// handling tiers, independent of routing/adaptive-threshold state.
pub fn assess_complexity(task: &Task) -> ComplexityTier {
    let ctx = task.context.clone().unwrap_or_default();
    let score = factors::compute_factors(&task.description, &ctx).weighted_score();
    if score < 0.3 {
        ComplexityTier::System1
    } else if score <= 0.7 {
        ComplexityTier::System2
    } else {
        ComplexityTier::Team
    }
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub max_retries: u32,
    pub plan_options: PlanOptions,
    pub execute_options: ExecuteOptions,
    pub sandbox_options: SandboxOptions,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            plan_options: PlanOptions::default(),
            execute_options: ExecuteOptions::default(),
            sandbox_options: SandboxOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_number: u32,
    pub execution: Execution,
    pub reflection: Reflection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    pub task_id: String,
    pub success: bool,
    pub attempts: Vec<Attempt>,
    pub team_recommendation: Option<TeamRecommendation>,
    pub final_execution: Option<Execution>,
    /// Wall-clock time from the first plan call to the final reflection,
    /// across every retry attempt.
    pub duration_ms: u64,
}

/// Run the plan/execute/reflect loop for `task`, retrying up to
/// `options.max_retries` times while `reflect()` keeps recommending it.
///
/// `cancel`, if given, is checked at the top of every retry attempt (the
/// step boundary between one attempt's reflection and the next attempt's
/// plan) and aborts the loop with `Error::Internal` rather than starting
/// another attempt once cancellation has been requested.
pub fn solve(
    task: &Task,
    options: SolveOptions,
    backend: &mut dyn ExecutionBackend,
    mut on_phase: impl FnMut(&str, u32),
    cancel: Option<&CancellationSignal>,
) -> Result<SolveResult> {
    let started_at = Instant::now();
    let initial_plan = plan(task, options.plan_options)?;
    let team_recommendation = initial_plan.team_recommendation.clone();

    let mut current_plan: Plan = initial_plan;
    let mut attempts = Vec::new();
    let mut attempt_number = 1;

    loop {
        if cancel.is_some_and(|signal| signal.is_cancelled()) {
            return Err(Error::Internal(format!(
                "solve cancelled before attempt {attempt_number}"
            )));
        }

        on_phase("plan", attempt_number);
        let mut sandbox = Sandbox::create(options.sandbox_options.clone_opts());

        on_phase("execute", attempt_number);
        let execution = execute_plan(
            &current_plan,
            &mut sandbox,
            backend,
            options.execute_options,
            |_step: &PlanStep| {},
            |_step: &PlanStep, _result| {},
        );

        on_phase("reflect", attempt_number);
        let reflection = reflect(&current_plan, &execution);

        let success = execution.success;
        let should_retry = reflection.should_retry;
        let adjusted = reflection.adjusted_plan.clone();

        attempts.push(Attempt {
            attempt_number,
            execution: execution.clone(),
            reflection,
        });

        if success || !should_retry || attempt_number >= options.max_retries {
            return Ok(SolveResult {
                task_id: task.id.clone(),
                success,
                attempts,
                team_recommendation,
                final_execution: Some(execution),
                duration_ms: started_at.elapsed().as_millis() as u64,
            });
        }

        current_plan = adjusted.unwrap_or(current_plan);
        attempt_number += 1;
    }
}

impl SandboxOptions {
    fn clone_opts(&self) -> SandboxOptions {
        SandboxOptions {
            timeout_ms: self.timeout_ms,
            lifetime_ms: self.lifetime_ms,
            extra_blocked_patterns: self
                .extra_blocked_patterns
                .iter()
                .map(|(label, re)| (label.clone(), re.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::ActualResult;
    use crate::system2::execute::DryRunBackend;

    struct FlakyThenSuccessBackend {
        calls: u32,
    }

    impl ExecutionBackend for FlakyThenSuccessBackend {
        fn run(&mut self, _command: &str) -> ActualResult {
            self.calls += 1;
            if self.calls == 1 {
                ActualResult {
                    stdout: String::new(),
                    stderr: "error: transient failure".to_string(),
                    exit_code: Some(1),
                    duration_ms: 1,
                }
            } else {
                ActualResult {
                    stdout: "ok".to_string(),
                    stderr: String::new(),
                    exit_code: Some(0),
                    duration_ms: 1,
                }
            }
        }
    }

    #[test]
    fn solve_succeeds_immediately_with_dry_run_backend() {
        let task = Task {
            id: "t1".to_string(),
            description: "fix a typo".to_string(),
            ..Default::default()
        };
        let mut backend = DryRunBackend;
        let result = solve(&task, SolveOptions::default(), &mut backend, |_, _| {}, None).unwrap();
        assert!(result.success);
        assert_eq!(result.attempts.len(), 1);
    }

    #[test]
    fn solve_retries_and_recovers() {
        let task = Task {
            id: "t1".to_string(),
            description: "fix the failing test".to_string(),
            ..Default::default()
        };
        let mut backend = FlakyThenSuccessBackend { calls: 0 };
        let result = solve(&task, SolveOptions::default(), &mut backend, |_, _| {}, None).unwrap();
        assert!(result.success);
        assert!(result.attempts.len() >= 2);
    }

    #[test]
    fn solve_gives_up_on_blocked_command() {
        let task = Task {
            id: "t1".to_string(),
            description: "rm -rf /tmp/data".to_string(),
            ..Default::default()
        };
        let mut backend = DryRunBackend;
        let result = solve(&task, SolveOptions::default(), &mut backend, |_, _| {}, None).unwrap();
        assert!(!result.success);
        assert_eq!(result.attempts.len(), 1);
    }

    #[test]
    fn assess_complexity_maps_low_score_to_system1() {
        let task = Task {
            id: "t1".to_string(),
            description: "fix a typo".to_string(),
            ..Default::default()
        };
        assert_eq!(assess_complexity(&task), ComplexityTier::System1);
    }

    #[test]
    fn solve_aborts_before_a_retry_once_cancelled() {
        let task = Task {
            id: "t1".to_string(),
            description: "fix the failing test".to_string(),
            ..Default::default()
        };
        let mut backend = FlakyThenSuccessBackend { calls: 0 };
        let (token, signal) = crate::cancel::CancellationToken::new();
        token.cancel();
        let result = solve(
            &task,
            SolveOptions::default(),
            &mut backend,
            |_, _| {},
            Some(&signal),
        );
        assert!(result.is_err());
    }
}
