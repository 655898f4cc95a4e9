//! System 2: the deliberative plan/execute/reflect/solve path for requests
//! the router judges too complex for System 1's cached fast path.

pub mod execute;
pub mod plan;
pub mod reflect;
pub mod solve;
pub mod topo;

pub use execute::{execute_plan, DryRunBackend, Execution, ExecuteOptions, ExecutionBackend, StepResult};
pub use plan::{plan, Complexity, Plan, PlanOptions, PlanStep, Risk, RiskSeverity, StepStatus, Task, TeamLevel, TeamRecommendation};
pub use reflect::{reflect, DetectedPattern, FailureDiagnosis, Reflection};
pub use solve::{assess_complexity, solve, Attempt, ComplexityTier, SolveOptions, SolveResult};
pub use topo::resolve_order;
