//! `plan()`: turn a task description into an ordered, risk-assessed Plan.

use crate::error::{Error, Result};
use crate::router::factors::{self, RequestContext};
use crate::router::keywords::{self, STEP_CONNECTORS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)[.)]\s*(.+)$").expect("invalid regex"));
static STEP_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)step\s+(\d+)").expect("invalid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Success,
    Failed,
    Blocked,
    Skipped,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub order: usize,
    pub action: String,
    pub dependencies: HashSet<String>,
    pub estimated_complexity: Complexity,
    pub status: StepStatus,
    /// Set by `reflect()` when this step already succeeded in a prior
    /// attempt and should not be re-run on retry.
    pub skip_on_retry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub description: String,
    pub severity: RiskSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamLevel {
    Squad,
    Platoon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecommendation {
    pub level: TeamLevel,
    pub teammates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub task_id: String,
    pub steps: Vec<PlanStep>,
    pub risks: Vec<Risk>,
    pub team_recommendation: Option<TeamRecommendation>,
    pub complexity_score: f64,
    pub cycle_detected: bool,
}

/// A unit of work submitted to `plan()`.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub domain: Option<String>,
    pub context: Option<RequestContext>,
}

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub analyze_dependencies: bool,
    pub assess_risks: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            analyze_dependencies: true,
            assess_risks: true,
        }
    }
}

fn classify_step_complexity(action: &str) -> Complexity {
    let lower = action.to_lowercase();
    const HEAVY: &[&str] = &[
        "migrate", "migration", "deploy", "refactor", "security", "database", "architecture",
    ];
    const MODERATE: &[&str] = &["update", "add", "fix", "test", "install", "configure"];

    if HEAVY.iter().any(|w| lower.contains(w)) {
        Complexity::High
    } else if MODERATE.iter().any(|w| lower.contains(w)) {
        Complexity::Med
    } else {
        Complexity::Low
    }
}

/// Extract ordered action strings from a description, trying in priority
/// order: numbered list items, connector-delimited clauses, then the whole
/// description as one step.
fn extract_steps(description: &str) -> Vec<String> {
    let numbered: Vec<String> = NUMBERED_ITEM
        .captures_iter(description)
        .map(|c| c[2].trim().to_string())
        .collect();
    if !numbered.is_empty() {
        return numbered;
    }

    let mut lower = description.to_string();
    for connector in STEP_CONNECTORS {
        lower = lower.replace(connector, "\u{1}");
    }
    let clauses: Vec<String> = lower
        .split('\u{1}')
        .map(|c| c.trim().trim_matches(',').trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if clauses.len() > 1 {
        return clauses;
    }

    vec![description.trim().to_string()]
}

fn build_steps(description: &str, analyze_dependencies: bool) -> Vec<PlanStep> {
    let actions = extract_steps(description);
    actions
        .into_iter()
        .enumerate()
        .map(|(idx, action)| {
            let id = format!("s{}", idx + 1);
            let mut dependencies = HashSet::new();

            if analyze_dependencies {
                if let Some(caps) = STEP_REFERENCE.captures(&action) {
                    if let Ok(n) = caps[1].parse::<usize>() {
                        if n >= 1 && n <= idx {
                            dependencies.insert(format!("s{n}"));
                        }
                    }
                } else if idx > 0 {
                    dependencies.insert(format!("s{idx}"));
                }
            }

            PlanStep {
                estimated_complexity: classify_step_complexity(&action),
                id,
                order: idx,
                action,
                dependencies,
                status: StepStatus::Pending,
                skip_on_retry: false,
            }
        })
        .collect()
}

fn assess_risks(description: &str, steps: &[PlanStep]) -> Vec<Risk> {
    let lower = description.to_lowercase();
    let mut risks = Vec::new();

    if ["delete", "drop", "truncate"].iter().any(|w| lower.contains(w)) {
        risks.push(Risk {
            description: "destructive operation requested (delete/drop/truncate)".to_string(),
            severity: RiskSeverity::High,
        });
    }

    if ["deploy", "publish"].iter().any(|w| lower.contains(w)) && lower.contains("production") {
        risks.push(Risk {
            description: "production deployment/publish requested".to_string(),
            severity: RiskSeverity::High,
        });
    }

    if ["install", "update"].iter().any(|w| lower.contains(w)) {
        risks.push(Risk {
            description: "dependency or environment modification requested".to_string(),
            severity: RiskSeverity::Medium,
        });
    }

    if risks.is_empty() && steps.iter().any(|s| s.estimated_complexity == Complexity::High) {
        risks.push(Risk {
            description: "plan contains a high-complexity step".to_string(),
            severity: RiskSeverity::Low,
        });
    }

    risks
}

fn team_for_domain(domain: &str) -> Vec<&'static str> {
    match domain {
        "security" => vec!["security-engineer", "backend-engineer"],
        "infrastructure" => vec!["platform-engineer", "backend-engineer"],
        "database" => vec!["data-engineer", "backend-engineer"],
        "frontend" => vec!["frontend-engineer", "designer"],
        _ => vec!["general"],
    }
}

fn recommend_team(description: &str, domain: Option<&str>, complexity_score: f64) -> Option<TeamRecommendation> {
    if complexity_score < 0.6 {
        return None;
    }

    let domain = domain
        .map(|d| d.to_string())
        .or_else(|| keywords::matched_domains(description).into_iter().next().map(String::from))
        .unwrap_or_else(|| "general".to_string());

    let mut teammates: Vec<String> = team_for_domain(&domain).into_iter().map(String::from).collect();
    let level = if complexity_score > 0.85 {
        if !teammates.iter().any(|t| t == "architect") {
            teammates.push("architect".to_string());
        }
        TeamLevel::Platoon
    } else {
        TeamLevel::Squad
    };

    Some(TeamRecommendation { level, teammates })
}

/// Build a Plan from a Task. Missing id or description fails with
/// `InvalidInput`.
pub fn plan(task: &Task, options: PlanOptions) -> Result<Plan> {
    if task.id.trim().is_empty() {
        return Err(Error::invalid_input("task id is required"));
    }
    if task.description.trim().is_empty() {
        return Err(Error::invalid_input("task description is required"));
    }

    let steps = build_steps(&task.description, options.analyze_dependencies);

    let ctx = task.context.clone().unwrap_or_default();
    let factor_vector = factors::compute_factors(&task.description, &ctx);
    let complexity_score = factor_vector.weighted_score();

    let risks = if options.assess_risks {
        assess_risks(&task.description, &steps)
    } else {
        Vec::new()
    };

    let team_recommendation = recommend_team(&task.description, task.domain.as_deref(), complexity_score);

    Ok(Plan {
        task_id: task.id.clone(),
        steps,
        risks,
        team_recommendation,
        complexity_score,
        cycle_detected: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_id_is_invalid_input() {
        let task = Task {
            id: String::new(),
            description: "do something".to_string(),
            ..Default::default()
        };
        assert!(matches!(plan(&task, PlanOptions::default()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn simple_fix_produces_one_step_no_risk_no_team() {
        let task = Task {
            id: "t1".to_string(),
            description: "fix a typo".to_string(),
            ..Default::default()
        };
        let result = plan(&task, PlanOptions::default()).unwrap();
        assert_eq!(result.steps.len(), 1);
        assert!(result.risks.is_empty());
        assert!(result.team_recommendation.is_none());
    }

    #[test]
    fn numbered_list_extraction() {
        let task = Task {
            id: "t1".to_string(),
            description: "1. set up schema\n2. write migration\n3. run tests".to_string(),
            ..Default::default()
        };
        let result = plan(&task, PlanOptions::default()).unwrap();
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.steps[1].dependencies.len(), 1);
    }

    #[test]
    fn multi_domain_complex_request_gets_platoon_with_architect() {
        let task = Task {
            id: "t1".to_string(),
            description: "security audit: migrate the production database, deploy to kubernetes, and fix the authentication vulnerability".to_string(),
            ..Default::default()
        };
        let result = plan(&task, PlanOptions::default()).unwrap();
        assert!(result.complexity_score > 0.6);
        assert!(result.risks.iter().any(|r| r.severity == RiskSeverity::High));
        let team = result.team_recommendation.expect("expected a team recommendation");
        assert!(team.teammates.iter().any(|t| t == "architect"));
    }

    #[test]
    fn analyze_dependencies_false_clears_all_dependencies() {
        let task = Task {
            id: "t1".to_string(),
            description: "1. step one\n2. step two".to_string(),
            ..Default::default()
        };
        let options = PlanOptions {
            analyze_dependencies: false,
            assess_risks: true,
        };
        let result = plan(&task, options).unwrap();
        assert!(result.steps.iter().all(|s| s.dependencies.is_empty()));
    }
}
