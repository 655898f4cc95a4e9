//! Execution Sandbox: a safety gate, not a VM. Every System 2 action passes
//! through `check_command_safety`/`execute`/`validate` regardless of whether
//! anything is actually run; the integrator supplies the real execution
//! backend and reports it back through `record_result`.

pub mod rules;

pub use rules::BlockedPattern;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LIFETIME_MS: i64 = 300_000;
const MAX_OUTPUT_BYTES: usize = 1_048_576;
const TRUNCATION_MARKER: &str = "[truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Active,
    Expired,
    Cleaned,
}

/// Options a sandbox is created with.
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    pub timeout_ms: u64,
    pub lifetime_ms: i64,
    pub extra_blocked_patterns: Vec<(String, regex::Regex)>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            lifetime_ms: DEFAULT_LIFETIME_MS,
            extra_blocked_patterns: Vec::new(),
        }
    }
}

/// One record of a command submitted to the sandbox. `exit_code` is `None`
/// if and only if `executed == false` — once `record_result` merges an
/// actual outcome, it is always `Some(_)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub sandbox_id: String,
    pub command: String,
    pub executed: bool,
    pub blocked: bool,
    pub blocked_by: Option<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
}

/// A sandbox descriptor: the safety-gate instance System 2 submits actions
/// to. Owns its own execution log; there is no cross-sandbox sharing.
#[derive(Debug, Clone)]
pub struct Sandbox {
    pub id: String,
    pub status: SandboxStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub options: SandboxOptions,
    pub execution_log: Vec<ExecutionRecord>,
}

impl Sandbox {
    pub fn create(options: SandboxOptions) -> Self {
        let created_at = Utc::now();
        let expires_at = created_at + chrono::Duration::milliseconds(options.lifetime_ms);
        Self {
            id: Uuid::new_v4().to_string(),
            status: SandboxStatus::Active,
            created_at,
            expires_at,
            options,
            execution_log: Vec::new(),
        }
    }

    /// Refresh expiry bookkeeping: if still marked active but past
    /// `expires_at`, flip to `Expired`.
    fn refresh_expiry(&mut self) {
        if self.status == SandboxStatus::Active && Utc::now() >= self.expires_at {
            self.status = SandboxStatus::Expired;
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == SandboxStatus::Active && Utc::now() < self.expires_at
    }
}

/// Result of `check_command_safety`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub safe: bool,
    pub blocked_by: Option<String>,
}

/// Check a command against the default deny list plus any sandbox-specific
/// extensions. Empty or whitespace-only commands are never safe.
pub fn check_command_safety(command: &str, sandbox: Option<&Sandbox>) -> SafetyCheck {
    if command.trim().is_empty() {
        return SafetyCheck {
            safe: false,
            blocked_by: Some("empty command".to_string()),
        };
    }

    for pattern in rules::DEFAULT_BLOCKED_PATTERNS.iter() {
        if pattern.regex.is_match(command) {
            return SafetyCheck {
                safe: false,
                blocked_by: Some(pattern.label.to_string()),
            };
        }
    }

    if let Some(sandbox) = sandbox {
        for (label, regex) in &sandbox.options.extra_blocked_patterns {
            if regex.is_match(command) {
                return SafetyCheck {
                    safe: false,
                    blocked_by: Some(label.clone()),
                };
            }
        }
    }

    SafetyCheck {
        safe: true,
        blocked_by: None,
    }
}

fn blocked_record(sandbox_id: &str, command: &str, label: impl Into<String>) -> ExecutionRecord {
    ExecutionRecord {
        id: Uuid::new_v4().to_string(),
        sandbox_id: sandbox_id.to_string(),
        command: command.to_string(),
        executed: false,
        blocked: true,
        blocked_by: Some(label.into()),
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        duration_ms: None,
        started_at: Utc::now(),
    }
}

/// Submit a command to the sandbox. Always appends exactly one record to the
/// sandbox's execution log. Never itself runs anything: a non-blocked,
/// non-expired submission produces an *unexecuted* record template that the
/// caller completes via `record_result`.
pub fn execute(sandbox: &mut Sandbox, command: &str) -> ExecutionRecord {
    sandbox.refresh_expiry();

    if !sandbox.is_usable() {
        let record = blocked_record(&sandbox.id, command, "sandbox expired or cleaned");
        sandbox.execution_log.push(record.clone());
        return record;
    }

    let safety = check_command_safety(command, Some(sandbox));
    if !safety.safe {
        let record = blocked_record(
            &sandbox.id,
            command,
            safety.blocked_by.unwrap_or_else(|| "blocked".to_string()),
        );
        sandbox.execution_log.push(record.clone());
        return record;
    }

    let record = ExecutionRecord {
        id: Uuid::new_v4().to_string(),
        sandbox_id: sandbox.id.clone(),
        command: command.to_string(),
        executed: false,
        blocked: false,
        blocked_by: None,
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        duration_ms: None,
        started_at: Utc::now(),
    };
    sandbox.execution_log.push(record.clone());
    record
}

/// The actual outcome an integrator's execution backend observed.
#[derive(Debug, Clone, Default)]
pub struct ActualResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

fn truncate_output(text: String) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text;
    }
    let mut truncated: String = text.chars().take(MAX_OUTPUT_BYTES).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Merge an actual execution outcome into a previously-unexecuted record,
/// in place in the sandbox's log.
pub fn record_result(sandbox: &mut Sandbox, record_id: &str, actual: ActualResult) -> Option<ExecutionRecord> {
    let record = sandbox
        .execution_log
        .iter_mut()
        .find(|r| r.id == record_id)?;

    record.executed = true;
    record.stdout = truncate_output(actual.stdout);
    record.stderr = truncate_output(actual.stderr);
    record.exit_code = Some(actual.exit_code.unwrap_or(1));
    record.duration_ms = Some(actual.duration_ms);
    Some(record.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Result of validating a (possibly still-unexecuted) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub safe: bool,
    pub success: bool,
    pub severity: Severity,
    pub issues: Vec<String>,
}

/// Derive a validation verdict for a record. `safe = false` only for
/// blocked records (always critical severity).
pub fn validate(record: &ExecutionRecord, timeout_ms: u64) -> ValidationResult {
    if record.blocked {
        return ValidationResult {
            safe: false,
            success: false,
            severity: Severity::Critical,
            issues: vec![format!(
                "blocked by: {}",
                record.blocked_by.as_deref().unwrap_or("unknown rule")
            )],
        };
    }

    let mut issues = Vec::new();
    let stderr_lower = record.stderr.to_lowercase();
    let is_fatal = stderr_lower.contains("fatal error");
    let is_segfault = stderr_lower.contains("segmentation fault");
    let is_timeout = record
        .duration_ms
        .map(|d| d >= timeout_ms)
        .unwrap_or(false);
    let has_error_text = stderr_lower.contains("error");
    let has_permission_denied = stderr_lower.contains("permission denied");

    if is_segfault {
        issues.push("Segmentation fault".to_string());
    }
    if is_fatal {
        issues.push("Fatal error".to_string());
    }
    if has_permission_denied {
        issues.push("Permission denied".to_string());
    } else if has_error_text {
        issues.push("stderr contains error".to_string());
    }
    if is_timeout {
        issues.push("Command timed out".to_string());
    }
    if let Some(code) = record.exit_code {
        if code != 0 {
            issues.push(format!("Non-zero exit code: {code}"));
        }
    }

    let severity = if is_fatal || is_segfault {
        Severity::Critical
    } else if has_error_text && is_timeout {
        Severity::High
    } else if is_timeout {
        Severity::Low
    } else if record.exit_code.map(|c| c != 0).unwrap_or(false) {
        Severity::Medium
    } else {
        Severity::None
    };

    let success = record.exit_code == Some(0) && issues.is_empty();

    ValidationResult {
        safe: true,
        success,
        severity,
        issues,
    }
}

/// Mark a sandbox cleaned, freeze its log, and return summary stats.
pub fn cleanup(sandbox: &mut Sandbox) -> SandboxStats {
    sandbox.status = SandboxStatus::Cleaned;
    stats(sandbox)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxStats {
    pub total_executions: usize,
    pub blocked: usize,
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

pub fn stats(sandbox: &Sandbox) -> SandboxStats {
    let total_executions = sandbox.execution_log.len();
    let blocked = sandbox.execution_log.iter().filter(|r| r.blocked).count();
    let pending = sandbox
        .execution_log
        .iter()
        .filter(|r| !r.executed && !r.blocked)
        .count();
    let succeeded = sandbox
        .execution_log
        .iter()
        .filter(|r| r.exit_code == Some(0))
        .count();
    let failed = sandbox
        .execution_log
        .iter()
        .filter(|r| r.executed && r.exit_code.map(|c| c != 0).unwrap_or(false))
        .count();
    let total_duration_ms = sandbox
        .execution_log
        .iter()
        .filter_map(|r| r.duration_ms)
        .sum();

    SandboxStats {
        total_executions,
        blocked,
        pending,
        succeeded,
        failed,
        total_duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_command_never_executes() {
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        let safety = check_command_safety("rm -rf /tmp/test", None);
        assert!(!safety.safe);
        assert!(safety.blocked_by.unwrap().contains("rm -rf"));

        let record = execute(&mut sandbox, "rm -rf /tmp/test");
        assert!(record.blocked);
        assert!(!record.executed);
        assert_eq!(sandbox.execution_log.len(), 1);

        let validation = validate(&record, sandbox.options.timeout_ms);
        assert_eq!(validation.severity, Severity::Critical);
        assert!(!validation.safe);
    }

    #[test]
    fn empty_command_is_unsafe() {
        let safety = check_command_safety("   ", None);
        assert!(!safety.safe);
    }

    #[test]
    fn unexecuted_record_has_no_exit_code() {
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        let record = execute(&mut sandbox, "echo hello");
        assert!(!record.executed);
        assert_eq!(record.exit_code, None);
    }

    #[test]
    fn record_result_merges_actual_outcome() {
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        let record = execute(&mut sandbox, "echo hello");
        let updated = record_result(
            &mut sandbox,
            &record.id,
            ActualResult {
                stdout: "hello\n".to_string(),
                stderr: String::new(),
                exit_code: Some(0),
                duration_ms: 5,
            },
        )
        .unwrap();
        assert!(updated.executed);
        assert_eq!(updated.exit_code, Some(0));

        let validation = validate(&updated, sandbox.options.timeout_ms);
        assert!(validation.success);
        assert_eq!(validation.severity, Severity::None);
    }

    #[test]
    fn truncates_oversized_output() {
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        let record = execute(&mut sandbox, "yes");
        let huge = "x".repeat(MAX_OUTPUT_BYTES + 10);
        let updated = record_result(
            &mut sandbox,
            &record.id,
            ActualResult {
                stdout: huge,
                stderr: String::new(),
                exit_code: Some(0),
                duration_ms: 1,
            },
        )
        .unwrap();
        assert!(updated.stdout.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn expired_sandbox_blocks_everything() {
        let mut options = SandboxOptions::default();
        options.lifetime_ms = -1;
        let mut sandbox = Sandbox::create(options);
        let record = execute(&mut sandbox, "echo hi");
        assert!(record.blocked);
        assert_eq!(sandbox.status, SandboxStatus::Expired);
    }

    #[test]
    fn cleanup_marks_cleaned_and_returns_stats() {
        let mut sandbox = Sandbox::create(SandboxOptions::default());
        execute(&mut sandbox, "echo hi");
        let stats = cleanup(&mut sandbox);
        assert_eq!(sandbox.status, SandboxStatus::Cleaned);
        assert_eq!(stats.total_executions, 1);
    }
}
