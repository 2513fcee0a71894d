//! Step dependency graph analysis.
//!
//! Edges run from a step to each entry of its `depends_on`. Dangling
//! dependencies are reported by [`check_graph`] and otherwise ignored, so the
//! measures below stay defined for any plan.

use super::entities::Plan;
use super::value_objects::StepId;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate step id '{0}'")]
    DuplicateStep(StepId),

    #[error("step '{step}' depends on unknown step '{missing}'")]
    DanglingDependency { step: StepId, missing: StepId },

    #[error("dependency cycle: {}", format_cycle(.0))]
    Cycle(Vec<StepId>),
}

pub(crate) fn format_cycle(cycle: &[StepId]) -> String {
    cycle
        .iter()
        .map(StepId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Index of each step id (first occurrence) in plan order.
fn index_of(plan: &Plan) -> HashMap<&StepId, usize> {
    let mut index = HashMap::new();
    for (i, step) in plan.steps.iter().enumerate() {
        index.entry(&step.id).or_insert(i);
    }
    index
}

/// Resolved dependency indices per step, dangling entries dropped.
fn adjacency(plan: &Plan) -> Vec<Vec<usize>> {
    let index = index_of(plan);
    plan.steps
        .iter()
        .map(|step| {
            let mut deps: Vec<usize> = step
                .depends_on
                .iter()
                .filter_map(|dep| index.get(dep).copied())
                .collect();
            deps.dedup();
            deps
        })
        .collect()
}

/// Every structural problem of the dependency graph.
pub fn check_graph(plan: &Plan) -> Vec<GraphError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for step in &plan.steps {
        if !seen.insert(&step.id) {
            errors.push(GraphError::DuplicateStep(step.id.clone()));
        }
    }

    let index = index_of(plan);
    for step in &plan.steps {
        for dep in &step.depends_on {
            if !index.contains_key(dep) {
                errors.push(GraphError::DanglingDependency {
                    step: step.id.clone(),
                    missing: dep.clone(),
                });
            }
        }
    }

    errors.extend(find_cycles(plan).into_iter().map(GraphError::Cycle));
    errors
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Cycles found by depth-first search, each as the closed path of step ids
/// (`a -> b -> a`).
pub fn find_cycles(plan: &Plan) -> Vec<Vec<StepId>> {
    let adjacency = adjacency(plan);
    let mut marks = vec![Mark::Unvisited; plan.steps.len()];
    let mut stack = Vec::new();
    let mut cycles = Vec::new();

    fn visit(
        node: usize,
        plan: &Plan,
        adjacency: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        cycles: &mut Vec<Vec<StepId>>,
    ) {
        marks[node] = Mark::InProgress;
        stack.push(node);
        for &dep in &adjacency[node] {
            match marks[dep] {
                Mark::Unvisited => visit(dep, plan, adjacency, marks, stack, cycles),
                Mark::InProgress => {
                    if let Some(start) = stack.iter().position(|&n| n == dep) {
                        let mut cycle: Vec<StepId> = stack[start..]
                            .iter()
                            .map(|&n| plan.steps[n].id.clone())
                            .collect();
                        cycle.push(plan.steps[dep].id.clone());
                        cycles.push(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
    }

    for node in 0..plan.steps.len() {
        if marks[node] == Mark::Unvisited {
            visit(node, plan, &adjacency, &mut marks, &mut stack, &mut cycles);
        }
    }
    cycles
}

/// Steps ordered so that every step follows its dependencies, ties kept in
/// plan order.
pub fn topological_order(plan: &Plan) -> Result<Vec<StepId>, GraphError> {
    let adjacency = adjacency(plan);
    let mut remaining: Vec<usize> = adjacency.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); plan.steps.len()];
    for (node, deps) in adjacency.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(node);
        }
    }

    let mut order = Vec::with_capacity(plan.steps.len());
    let mut placed = vec![false; plan.steps.len()];
    loop {
        let Some(next) = (0..plan.steps.len()).find(|&n| !placed[n] && remaining[n] == 0) else {
            break;
        };
        placed[next] = true;
        order.push(plan.steps[next].id.clone());
        for &dependent in &dependents[next] {
            remaining[dependent] -= 1;
        }
    }

    if order.len() < plan.steps.len() {
        let cycle = find_cycles(plan).into_iter().next().unwrap_or_default();
        return Err(GraphError::Cycle(cycle));
    }
    Ok(order)
}

/// Longest path through the graph, weighted per step. `None` on a cycle.
fn longest_path(plan: &Plan, weight: impl Fn(usize) -> u64) -> Option<u64> {
    let order = topological_order(plan).ok()?;
    let index = index_of(plan);
    let adjacency = adjacency(plan);
    let mut best = vec![0u64; plan.steps.len()];
    let mut overall = 0;
    for id in &order {
        let node = *index.get(id)?;
        let before = adjacency[node].iter().map(|&d| best[d]).max().unwrap_or(0);
        best[node] = before.saturating_add(weight(node));
        overall = overall.max(best[node]);
    }
    Some(overall)
}

/// Sum of step timeouts along the longest dependency chain.
///
/// A cyclic plan reports the sum over all steps.
pub fn critical_path_ms(plan: &Plan) -> u64 {
    longest_path(plan, |n| plan.steps[n].timeout_ms)
        .unwrap_or_else(|| {
            plan.steps
                .iter()
                .fold(0u64, |total, s| total.saturating_add(s.timeout_ms))
        })
}

/// Number of steps on the longest dependency chain.
pub fn depth(plan: &Plan) -> usize {
    longest_path(plan, |_| 1).map_or(plan.steps.len(), |d| d as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::entities::Step;
    use crate::plan::value_objects::PlanTier;

    fn plan(steps: Vec<Step>) -> Plan {
        steps
            .into_iter()
            .fold(Plan::new("g", PlanTier::Low), |p, s| p.with_step(s))
    }

    #[test]
    fn test_diamond_order_and_measures() {
        let plan = plan(vec![
            Step::new("d", "T").with_dependency("b").with_dependency("c").with_timeout_ms(100),
            Step::new("b", "T").with_dependency("a").with_timeout_ms(300),
            Step::new("c", "T").with_dependency("a").with_timeout_ms(50),
            Step::new("a", "T").with_timeout_ms(1000),
        ]);

        let order = topological_order(&plan).unwrap();
        let names: Vec<&str> = order.iter().map(StepId::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(critical_path_ms(&plan), 1400);
        assert_eq!(depth(&plan), 3);
        assert!(check_graph(&plan).is_empty());
    }

    #[test]
    fn test_critical_path_saturates() {
        let chain = plan(vec![
            Step::new("a", "T").with_timeout_ms(u64::MAX),
            Step::new("b", "T").with_dependency("a").with_timeout_ms(u64::MAX),
        ]);
        assert_eq!(critical_path_ms(&chain), u64::MAX);

        let cyclic = plan(vec![
            Step::new("a", "T").with_dependency("b").with_timeout_ms(u64::MAX),
            Step::new("b", "T").with_dependency("a").with_timeout_ms(u64::MAX),
        ]);
        assert_eq!(critical_path_ms(&cyclic), u64::MAX);
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let plan = plan(vec![
            Step::new("a", "T").with_dependency("c"),
            Step::new("b", "T").with_dependency("a"),
            Step::new("c", "T").with_dependency("b"),
            Step::new("d", "T"),
        ]);

        let cycles = find_cycles(&plan);
        assert_eq!(cycles.len(), 1);
        let path: Vec<&str> = cycles[0].iter().map(StepId::as_str).collect();
        assert_eq!(path, vec!["a", "c", "b", "a"]);
        assert!(matches!(topological_order(&plan), Err(GraphError::Cycle(_))));
        assert_eq!(
            GraphError::Cycle(cycles[0].clone()).to_string(),
            "dependency cycle: a -> c -> b -> a"
        );
        assert_eq!(depth(&plan), 4);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let plan = plan(vec![Step::new("a", "T").with_dependency("a")]);
        assert_eq!(find_cycles(&plan), vec![vec![StepId::new("a"), StepId::new("a")]]);
    }

    #[test]
    fn test_duplicates_and_dangling() {
        let plan = plan(vec![
            Step::new("a", "T"),
            Step::new("a", "T"),
            Step::new("b", "T").with_dependency("ghost"),
        ]);
        let errors = check_graph(&plan);
        assert!(errors.contains(&GraphError::DuplicateStep(StepId::new("a"))));
        assert!(errors.contains(&GraphError::DanglingDependency {
            step: StepId::new("b"),
            missing: StepId::new("ghost"),
        }));
        assert!(topological_order(&plan).is_ok());
    }
}
