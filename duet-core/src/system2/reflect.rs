//! `reflect()`: analyze an Execution, detect patterns, and decide whether
//! System 2 should retry.

use super::execute::Execution;
use super::plan::{Plan, StepStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedPattern {
    AllStepsFailed,
    SafetyBlocked,
    TimeoutFailures,
    PartialSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDiagnosis {
    pub step_id: String,
    pub reason: String,
    pub correction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub completion_rate: f64,
    pub patterns_detected: Vec<DetectedPattern>,
    pub failure_diagnoses: Vec<FailureDiagnosis>,
    pub should_retry: bool,
    pub retry_reason: String,
    pub adjusted_plan: Option<Plan>,
}

fn failure_reason(result: &super::execute::StepResult) -> String {
    if let Some(validation) = &result.validation {
        if !validation.issues.is_empty() {
            return validation.issues.join("; ");
        }
    }
    if let Some(record) = &result.record {
        if let Some(line) = record.stderr.lines().next() {
            if !line.is_empty() {
                return line.to_string();
            }
        }
        if let Some(code) = record.exit_code {
            return format!("Exit code {code}");
        }
    }
    "No execution data".to_string()
}

fn suggest_correction(record_stderr: &str) -> String {
    let lower = record_stderr.to_lowercase();
    if lower.contains("permission") {
        "check file/path permissions and dependencies".to_string()
    } else if lower.contains("syntax") {
        "review the command/code for syntax errors".to_string()
    } else if lower.contains("timeout") {
        "increase the step timeout and retry".to_string()
    } else {
        "retry with adjusted approach".to_string()
    }
}

/// Analyze an Execution and decide the retry policy.
pub fn reflect(plan: &Plan, execution: &Execution) -> Reflection {
    let completion_rate = if execution.steps_total == 0 {
        0.0
    } else {
        execution.steps_completed as f64 / execution.steps_total as f64
    };

    let failed_results: Vec<&super::execute::StepResult> = execution
        .step_results
        .iter()
        .filter(|r| matches!(r.status, StepStatus::Failed | StepStatus::Blocked))
        .collect();

    let all_failed = !execution.step_results.is_empty()
        && execution
            .step_results
            .iter()
            .all(|r| matches!(r.status, StepStatus::Failed | StepStatus::Blocked));
    let any_blocked = execution
        .step_results
        .iter()
        .any(|r| r.status == StepStatus::Blocked);
    let any_timeout = execution.step_results.iter().any(|r| {
        r.record
            .as_ref()
            .map(|rec| rec.stderr.to_lowercase().contains("timeout"))
            .unwrap_or(false)
    });
    let any_success = execution
        .step_results
        .iter()
        .any(|r| matches!(r.status, StepStatus::Success | StepStatus::Completed));
    let any_failure = !failed_results.is_empty();

    let mut patterns_detected = Vec::new();
    if all_failed {
        patterns_detected.push(DetectedPattern::AllStepsFailed);
    }
    if any_blocked {
        patterns_detected.push(DetectedPattern::SafetyBlocked);
    }
    if any_timeout {
        patterns_detected.push(DetectedPattern::TimeoutFailures);
    }
    if any_success && any_failure {
        patterns_detected.push(DetectedPattern::PartialSuccess);
    }

    let failure_diagnoses: Vec<FailureDiagnosis> = failed_results
        .iter()
        .map(|r| {
            let reason = failure_reason(r);
            let stderr = r.record.as_ref().map(|rec| rec.stderr.as_str()).unwrap_or("");
            FailureDiagnosis {
                step_id: r.step_id.clone(),
                correction: suggest_correction(stderr),
                reason,
            }
        })
        .collect();

    let all_failed_blocked = !failed_results.is_empty()
        && failed_results.iter().all(|r| r.status == StepStatus::Blocked);
    let no_progress_possible = execution.steps_completed == 0 && execution.steps_total > 0;

    let (should_retry, retry_reason, adjusted_plan) = if execution.success {
        (false, "execution succeeded".to_string(), None)
    } else if all_failed_blocked {
        (
            false,
            "all failed steps were safety-blocked and cannot be retried".to_string(),
            None,
        )
    } else if no_progress_possible && all_failed_blocked {
        (false, "no progress is possible".to_string(), None)
    } else {
        let mut adjusted = plan.clone();
        for step in adjusted.steps.iter_mut() {
            let result = execution.step_results.iter().find(|r| r.step_id == step.id);
            if let Some(result) = result {
                if matches!(result.status, StepStatus::Success | StepStatus::Completed) {
                    step.skip_on_retry = true;
                    step.status = StepStatus::Completed;
                }
            }
        }
        (true, "retryable failures remain".to_string(), Some(adjusted))
    };

    Reflection {
        completion_rate,
        patterns_detected,
        failure_diagnoses,
        should_retry,
        retry_reason,
        adjusted_plan,
    }
}
