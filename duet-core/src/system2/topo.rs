//! Kahn's-algorithm topological resolution of a plan's step dependency
//! graph, with graceful degradation to insertion order on a detected cycle.

use super::plan::PlanStep;
use std::collections::{HashMap, VecDeque};

/// Resolve `steps` into an execution order. Returns `(order, cycle_detected)`
/// where `order` holds step ids. On a cycle, Kahn's algorithm terminates
/// with nodes still unprocessed; this function detects that and falls back
/// to the steps' original insertion order rather than failing.
pub fn resolve_order(steps: &[PlanStep]) -> (Vec<String>, bool) {
    let mut in_degree: HashMap<&str, usize> = steps.iter().map(|s| (s.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for step in steps {
        for dep in &step.dependencies {
            if in_degree.contains_key(dep.as_str()) {
                *in_degree.get_mut(step.id.as_str()).unwrap() += 1;
                dependents.entry(dep.as_str()).or_default().push(step.id.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut order = Vec::with_capacity(steps.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        if let Some(children) = dependents.get(id) {
            for &child in children {
                let degree = in_degree.get_mut(child).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    if order.len() == steps.len() {
        (order, false)
    } else {
        (steps.iter().map(|s| s.id.clone()).collect(), true)
    }
}
