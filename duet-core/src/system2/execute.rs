//! `execute()`: resolve a plan's steps into execution order and submit each
//! one to the sandbox, completing it through a pluggable execution backend.

use super::plan::{Plan, PlanStep, StepStatus};
use super::topo::resolve_order;
use crate::sandbox::{self, ActualResult, ExecutionRecord, Sandbox, SandboxStats, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The pluggable execution backend a host integrator provides. The sandbox
/// itself never runs anything (it is a safety gate, not a VM); this trait is
/// the seam where a real child process, container, or dry run plugs in.
pub trait ExecutionBackend {
    fn run(&mut self, command: &str) -> ActualResult;
}

/// The safe default: simulates a successful no-op without running anything.
/// Matches this core's non-goal of never executing user-submitted shell
/// commands in production; integrators who need real execution supply their
/// own `ExecutionBackend`.
#[derive(Debug, Default)]
pub struct DryRunBackend;

impl ExecutionBackend for DryRunBackend {
    fn run(&mut self, _command: &str) -> ActualResult {
        ActualResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    pub stop_on_failure: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            stop_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub action: String,
    pub status: StepStatus,
    pub record: Option<ExecutionRecord>,
    pub validation: Option<ValidationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub task_id: String,
    pub step_results: Vec<StepResult>,
    pub success: bool,
    pub steps_completed: usize,
    pub steps_total: usize,
    pub sandbox_stats: SandboxStats,
    pub cycle_detected: bool,
}

/// Execute a plan's steps in resolved topological order (falling back to
/// insertion order on a cycle), calling `on_step_start`/`on_step_complete`
/// around each one.
pub fn execute_plan(
    plan: &Plan,
    sandbox: &mut Sandbox,
    backend: &mut dyn ExecutionBackend,
    options: ExecuteOptions,
    mut on_step_start: impl FnMut(&PlanStep),
    mut on_step_complete: impl FnMut(&PlanStep, &StepResult),
) -> Execution {
    let (order, cycle_detected) = resolve_order(&plan.steps);
    let by_id: std::collections::HashMap<&str, &PlanStep> =
        plan.steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut step_results = Vec::with_capacity(order.len());
    let mut any_prior_failure = false;

    for step_id in &order {
        let Some(step) = by_id.get(step_id.as_str()).copied() else {
            continue;
        };

        on_step_start(step);

        if step.skip_on_retry {
            let result = StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                status: StepStatus::Completed,
                record: None,
                validation: None,
            };
            on_step_complete(step, &result);
            step_results.push(result);
            continue;
        }

        if options.stop_on_failure && any_prior_failure {
            let result = StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                status: StepStatus::Skipped,
                record: None,
                validation: None,
            };
            on_step_complete(step, &result);
            step_results.push(result);
            continue;
        }

        let record = sandbox::execute(sandbox, &step.action);
        let status;
        let validation;

        if record.blocked {
            status = StepStatus::Blocked;
            validation = Some(sandbox::validate(&record, sandbox.options.timeout_ms));
            any_prior_failure = true;
        } else {
            let started = Instant::now();
            let actual = backend.run(&step.action);
            let duration_ms = if actual.duration_ms == 0 {
                started.elapsed().as_millis() as u64
            } else {
                actual.duration_ms
            };
            let completed = sandbox::record_result(
                sandbox,
                &record.id,
                ActualResult {
                    duration_ms,
                    ..actual
                },
            )
            .unwrap_or(record);
            let verdict = sandbox::validate(&completed, sandbox.options.timeout_ms);
            status = if verdict.success {
                StepStatus::Success
            } else {
                any_prior_failure = true;
                StepStatus::Failed
            };
            validation = Some(verdict);
            let result = StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                status,
                record: Some(completed),
                validation,
            };
            on_step_complete(step, &result);
            step_results.push(result);
            continue;
        }

        let result = StepResult {
            step_id: step.id.clone(),
            action: step.action.clone(),
            status,
            record: Some(record),
            validation,
        };
        on_step_complete(step, &result);
        step_results.push(result);
    }

    let steps_total = step_results.len();
    let steps_completed = step_results
        .iter()
        .filter(|r| matches!(r.status, StepStatus::Success | StepStatus::Completed))
        .count();
    let success = steps_total > 0 && steps_completed == steps_total;

    Execution {
        task_id: plan.task_id.clone(),
        step_results,
        success,
        steps_completed,
        steps_total,
        sandbox_stats: sandbox::stats(sandbox),
        cycle_detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxOptions;
    use crate::system2::plan::{Complexity, Plan, PlanStep};
    use std::collections::HashSet;

    fn make_step(id: &str, action: &str) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            order: 0,
            action: action.to_string(),
            dependencies: HashSet::new(),
            estimated_complexity: Complexity::Low,
            status: StepStatus::Pending,
            skip_on_retry: false,
        }
    }

    #[test]
    fn all_steps_succeed_with_dry_run_backend() {
        let plan = Plan {
            task_id: "t1".to_string(),
            steps: vec![make_step("s1", "echo one"), make_step("s2", "echo two")],
            risks: vec![],
            team_recommendation: None,
            complexity_score: 0.1,
            cycle_detected: false,
        };
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        let mut backend = DryRunBackend;
        let execution = execute_plan(&plan, &mut sandbox, &mut backend, ExecuteOptions::default(), |_| {}, |_, _| {});
        assert!(execution.success);
        assert_eq!(execution.steps_completed, 2);
    }

    #[test]
    fn blocked_command_marks_step_blocked_and_stops_remaining() {
        let plan = Plan {
            task_id: "t1".to_string(),
            steps: vec![make_step("s1", "rm -rf /tmp/test"), make_step("s2", "echo two")],
            risks: vec![],
            team_recommendation: None,
            complexity_score: 0.1,
            cycle_detected: false,
        };
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        let mut backend = DryRunBackend;
        let execution = execute_plan(&plan, &mut sandbox, &mut backend, ExecuteOptions::default(), |_| {}, |_, _| {});
        assert_eq!(execution.step_results[0].status, StepStatus::Blocked);
        assert_eq!(execution.step_results[1].status, StepStatus::Skipped);
        assert!(!execution.success);
    }
}
