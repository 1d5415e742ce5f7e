//! Workflow validator (C6)
//!
//! Runs before execution, never during it. Collects every problem it finds
//! rather than failing fast, so a single validation pass gives the author
//! a complete picture.

use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::config::{WorkflowDefinition, WorkflowStep};

/// One validation problem
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub kind: String,
    pub step_id: Option<String>,
    pub message: String,
}

/// The result of validating a workflow
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

fn error(kind: &str, step_id: Option<&str>, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        kind: kind.to_string(),
        step_id: step_id.map(String::from),
        message: message.into(),
    }
}

/// Flatten a workflow's steps, including parallel children, into a flat list
fn flatten<'a>(steps: &'a [WorkflowStep], out: &mut Vec<&'a WorkflowStep>) {
    for step in steps {
        out.push(step);
        if let WorkflowStep::Parallel { steps: children, .. } = step {
            flatten(children, out);
        }
    }
}

/// Validate `workflow`, collecting every error and warning rather than
/// stopping at the first problem.
#[must_use]
pub fn validate_workflow(workflow: &WorkflowDefinition) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if workflow.id.trim().is_empty() {
        errors.push(error("missing_field", None, "workflow id must be non-empty"));
    }
    if workflow.steps.is_empty() {
        errors.push(error("missing_field", None, "workflow must have at least one step"));
        return ValidationReport {
            valid: false,
            errors,
            warnings,
        };
    }

    let mut all_steps = Vec::new();
    flatten(&workflow.steps, &mut all_steps);

    // unique ids
    let mut seen = HashSet::new();
    for step in &all_steps {
        if !seen.insert(step.id()) {
            errors.push(error(
                "invalid_value",
                Some(step.id()),
                format!("duplicate step id '{}'", step.id()),
            ));
        }
    }

    let known_ids: HashSet<&str> = all_steps.iter().map(|s| s.id()).collect();
    let known_id_list: Vec<String> = known_ids.iter().map(|s| (*s).to_string()).collect();

    // kind-specific required fields
    for step in &all_steps {
        check_required_fields(step, &mut errors);
        if step.kind() == "agent" {
            if let WorkflowStep::Agent { common, .. } = step {
                if common.on_error.is_none() {
                    warnings.push(error(
                        "missing_error_handler",
                        Some(step.id()),
                        format!("agent step '{}' has no on_error handler", step.id()),
                    ));
                }
            }
        }
        if let WorkflowStep::Parallel { steps, min_success, .. } = step {
            if let Some(threshold) = min_success {
                if *threshold > steps.len() {
                    errors.push(error(
                        "invalid_value",
                        Some(step.id()),
                        format!(
                            "min_success ({threshold}) exceeds child count ({})",
                            steps.len()
                        ),
                    ));
                }
            }
        }
    }

    // id-valued field resolution, with "did you mean" suggestions
    for step in &all_steps {
        for reference in step.referenced_ids() {
            if !known_ids.contains(reference) {
                let suggestion = closest_match(reference, &known_id_list);
                let hint = suggestion
                    .map(|s| format!(" (did you mean '{s}'?)"))
                    .unwrap_or_default();
                errors.push(error(
                    "invalid_reference",
                    Some(step.id()),
                    format!("step '{}' references unknown step '{reference}'{hint}", step.id()),
                ));
            }
        }
    }

    // reachability from the entry step via routing edges
    let entry = entry_step_id(&workflow.steps, &all_steps);
    let (graph, index_of) = build_routing_graph(&all_steps);
    if is_cyclic_directed(&graph) {
        // Not a hard gate: a routing cycle is how bounded loops are expressed
        // (e.g. a step whose `next` points back to itself), and the runtime's
        // iteration/duration guards are what actually bound them. This is an
        // additive, stronger-than-runtime guarantee for workflows that aren't
        // meant to loop, not a precondition for execution.
        warnings.push(error("circular_dependency", None, "workflow step graph contains a cycle"));
    }

    if let Some(entry_id) = entry {
        if let Some(&start) = index_of.get(entry_id) {
            let reachable = reachable_from(&graph, start);
            for step in &all_steps {
                if let Some(&idx) = index_of.get(step.id()) {
                    if !reachable.contains(&idx) && step.id() != entry_id {
                        warnings.push(error(
                            "unused_step",
                            Some(step.id()),
                            format!("step '{}' is unreachable from the entry step", step.id()),
                        ));
                    }
                }
            }
        }
    }

    if all_steps.len() > 50 {
        warnings.push(error(
            "long_workflow",
            None,
            format!("workflow has {} steps (>50)", all_steps.len()),
        ));
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_required_fields(step: &WorkflowStep, errors: &mut Vec<ValidationIssue>) {
    match step {
        WorkflowStep::Agent { agent, .. } => {
            if agent.trim().is_empty() {
                errors.push(error(
                    "missing_field",
                    Some(step.id()),
                    format!("agent step '{}' is missing 'agent'", step.id()),
                ));
            }
        }
        WorkflowStep::Transform { transform, .. } => {
            if transform.trim().is_empty() {
                errors.push(error(
                    "missing_field",
                    Some(step.id()),
                    format!("transform step '{}' is missing 'transform'", step.id()),
                ));
            } else if contains_forbidden_identifier(transform) {
                errors.push(error(
                    "invalid_value",
                    Some(step.id()),
                    format!("transform step '{}' references a forbidden identifier", step.id()),
                ));
            }
        }
        WorkflowStep::Condition { condition, .. } => {
            if condition.trim().is_empty() {
                errors.push(error(
                    "missing_field",
                    Some(step.id()),
                    format!("condition step '{}' is missing 'condition'", step.id()),
                ));
            } else if contains_forbidden_identifier(condition) {
                errors.push(error(
                    "invalid_value",
                    Some(step.id()),
                    format!("condition step '{}' references a forbidden identifier", step.id()),
                ));
            }
        }
        WorkflowStep::Approval { message, .. } => {
            if message.trim().is_empty() {
                errors.push(error(
                    "missing_field",
                    Some(step.id()),
                    format!("approval step '{}' is missing 'message'", step.id()),
                ));
            }
        }
        WorkflowStep::Parallel { steps, .. } => {
            if steps.is_empty() {
                errors.push(error(
                    "missing_field",
                    Some(step.id()),
                    format!("parallel step '{}' has no nested steps", step.id()),
                ));
            }
        }
    }
}

fn contains_forbidden_identifier(expr: &str) -> bool {
    crate::expr::FORBIDDEN_IDENTIFIERS.iter().any(|id| expr.contains(id))
}

fn entry_step_id<'a>(top_level: &'a [WorkflowStep], all_steps: &[&'a WorkflowStep]) -> Option<&'a str> {
    let referenced: HashSet<&str> = all_steps.iter().flat_map(|s| s.graph_targets()).collect();
    top_level
        .iter()
        .find(|s| !referenced.contains(s.id()))
        .or_else(|| top_level.first())
        .map(WorkflowStep::id)
}

fn build_routing_graph<'a>(
    all_steps: &[&'a WorkflowStep],
) -> (DiGraph<&'a str, ()>, HashMap<&'a str, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index_of = HashMap::new();
    for step in all_steps {
        let idx = graph.add_node(step.id());
        index_of.insert(step.id(), idx);
    }
    for step in all_steps {
        let Some(&from) = index_of.get(step.id()) else { continue };
        for target in step.graph_targets() {
            if let Some(&to) = index_of.get(target) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, index_of)
}

fn reachable_from(graph: &DiGraph<&str, ()>, start: NodeIndex) -> HashSet<NodeIndex> {
    let mut dfs = petgraph::visit::Dfs::new(graph, start);
    let mut seen = HashSet::new();
    while let Some(node) = dfs.next(graph) {
        seen.insert(node);
    }
    seen
}

/// Suggest the closest known id to `reference` (edit distance <= 3)
fn closest_match(reference: &str, known: &[String]) -> Option<String> {
    known
        .iter()
        .map(|candidate| (candidate, strsim::levenshtein(reference, candidate)))
        .filter(|(_, distance)| *distance <= 3)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepCommon;

    fn common(id: &str) -> StepCommon {
        StepCommon {
            id: id.into(),
            next: None,
            on_error: None,
            input: None,
            max_retries: 1,
            retry_delay_ms: 1_000,
            timeout_ms: 60_000,
        }
    }

    fn workflow(steps: Vec<WorkflowStep>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf".into(),
            description: String::new(),
            steps,
            max_iterations: 100,
            max_duration_ms: 300_000,
            max_context_size: 100,
            context_retention: Default::default(),
            debug: false,
            trace: false,
            initial_context: serde_json::json!(null),
        }
    }

    #[test]
    fn valid_workflow_has_no_errors() {
        let mut first = common("start");
        first.next = Some("end".into());
        let wf = workflow(vec![
            WorkflowStep::Transform {
                common: first,
                transform: "input".to_string(),
            },
            WorkflowStep::Transform {
                common: common("end"),
                transform: "input".to_string(),
            },
        ]);
        let report = validate_workflow(&wf);
        assert!(report.valid, "{report:?}");
    }

    #[test]
    fn dangling_reference_suggests_closest_id() {
        let mut first = common("start");
        first.next = Some("ned".into()); // typo for "end"
        let wf = workflow(vec![
            WorkflowStep::Transform {
                common: first,
                transform: "input".to_string(),
            },
            WorkflowStep::Transform {
                common: common("end"),
                transform: "input".to_string(),
            },
        ]);
        let report = validate_workflow(&wf);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.message.contains("did you mean 'end'")));
    }

    #[test]
    fn unreachable_step_is_a_warning() {
        let wf = workflow(vec![
            WorkflowStep::Transform {
                common: common("start"),
                transform: "input".to_string(),
            },
            WorkflowStep::Transform {
                common: common("orphan"),
                transform: "input".to_string(),
            },
        ]);
        let report = validate_workflow(&wf);
        assert!(report.warnings.iter().any(|w| w.kind == "unused_step"));
    }

    #[test]
    fn self_looping_step_is_valid_with_a_cycle_warning() {
        let mut looped = common("x");
        looped.next = Some("x".into());
        let wf = workflow(vec![WorkflowStep::Transform {
            common: looped,
            transform: "input".to_string(),
        }]);
        let report = validate_workflow(&wf);
        assert!(report.valid, "{report:?}");
        assert!(report.warnings.iter().any(|w| w.kind == "circular_dependency"));
    }

    #[test]
    fn min_success_exceeding_child_count_is_an_error() {
        let wf = workflow(vec![WorkflowStep::Parallel {
            common: common("fanout"),
            steps: vec![WorkflowStep::Transform {
                common: common("a"),
                transform: "input".to_string(),
            }],
            min_success: Some(5),
        }]);
        let report = validate_workflow(&wf);
        assert!(!report.valid);
    }
}
