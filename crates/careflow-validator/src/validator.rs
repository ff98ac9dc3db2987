use std::collections::{BTreeSet, HashSet};

use careflow_condition::Operator;
use careflow_workflow::{
  Branch, Edge, Node, NodeKind, ScheduleFrequency, Schema, TriggerType, Workflow,
};
use serde_json::Value;

use crate::cycle::CycleSearch;
use crate::issue::{Issue, IssueSummary};

/// Validate a workflow graph.
///
/// Issues come out in three sections: per-node checks in ascending node id
/// order, per-edge checks in ascending edge id order, then graph-level checks.
pub fn validate(workflow: &Workflow) -> Vec<Issue> {
  let mut issues = Vec::new();

  for node_id in workflow.sorted_node_ids() {
    if let Some(node) = workflow.get_node(node_id) {
      check_node(workflow, node, &mut issues);
    }
  }

  check_edges(workflow, &mut issues);
  check_graph(workflow, &mut issues);

  issues
}

/// True iff the workflow has no error-severity issue.
pub fn is_valid(workflow: &Workflow) -> bool {
  !validate(workflow).iter().any(Issue::is_error)
}

pub fn summary(workflow: &Workflow) -> IssueSummary {
  IssueSummary::from_issues(&validate(workflow))
}

fn check_node(workflow: &Workflow, node: &Node, issues: &mut Vec<Issue>) {
  for field in Schema::missing_required(&node.kind, &node.config) {
    issues.push(
      Issue::error(
        "missing_field",
        format!("{} node is missing required field '{}'", node.kind, field),
      )
      .at_node(&node.id),
    );
  }

  check_values(node, issues);

  for field in Schema::missing_recommended(&node.kind, &node.config) {
    issues.push(
      Issue::warning(
        "recommended_field",
        format!("{} node should configure '{}'", node.kind, field),
      )
      .at_node(&node.id),
    );
  }

  let outgoing: Vec<&Edge> = workflow.outgoing(&node.id).collect();
  let incoming = workflow.incoming(&node.id).count();

  match node.kind {
    NodeKind::Condition => {
      if !outgoing.is_empty() && !is_exact_branch_pair(&outgoing) {
        let tags: Vec<String> = outgoing
          .iter()
          .map(|e| e.branch.map_or("untagged".to_string(), |b| b.to_string()))
          .collect();
        issues.push(
          Issue::error(
            "branch_set",
            format!(
              "condition outgoing edges must be exactly one 'true' and one 'false' branch, found [{}]",
              tags.join(", ")
            ),
          )
          .at_node(&node.id),
        );
      }
    }
    NodeKind::Split => {
      if outgoing.len() < 2 {
        issues.push(
          Issue::info(
            "narrow_split",
            format!("split has {} outgoing edge(s)", outgoing.len()),
          )
          .at_node(&node.id),
        );
      }
    }
    _ => {
      if outgoing.len() > 1 {
        issues.push(
          Issue::error(
            "multiple_successors",
            format!(
              "{} node has {} outgoing edges; only split and condition nodes may fan out",
              node.kind,
              outgoing.len()
            ),
          )
          .at_node(&node.id),
        );
      }
      if matches!(node.kind, NodeKind::Merge) && incoming < 2 {
        issues.push(
          Issue::info(
            "narrow_merge",
            format!("merge has {} incoming edge(s)", incoming),
          )
          .at_node(&node.id),
        );
      }
    }
  }
}

/// Value checks for fields that are present; absence is reported separately.
fn check_values(node: &Node, issues: &mut Vec<Issue>) {
  let mut invalid = |message: String| {
    issues.push(Issue::error("invalid_value", message).at_node(&node.id));
  };

  match node.kind {
    NodeKind::Trigger => {
      let trigger_type = node.config_value("triggerType").map(|value| {
        value
          .as_str()
          .and_then(|s| s.parse::<TriggerType>().ok())
          .ok_or(value)
      });

      match trigger_type {
        Some(Err(value)) => invalid(format!(
          "triggerType must be 'event' or 'schedule', got {}",
          value
        )),
        Some(Ok(TriggerType::Event)) => {
          if let Some(value) = node.config_value("eventType") {
            if value.as_str().is_none_or(str::is_empty) {
              invalid(format!("eventType must be a non-empty string, got {}", value));
            }
          }
        }
        Some(Ok(TriggerType::Schedule)) => {
          if let Some(value) = node.config_value("hour") {
            if !value.as_u64().is_some_and(|h| h <= 23) {
              invalid(format!("hour must be an integer from 0 to 23, got {}", value));
            }
          }
          if let Some(value) = node.config_value("schedule") {
            let known = value
              .as_str()
              .is_some_and(|s| s.parse::<ScheduleFrequency>().is_ok());
            if !known {
              invalid(format!(
                "schedule must be 'hourly', 'daily' or 'weekly', got {}",
                value
              ));
            }
          }
        }
        None => {}
      }
    }
    NodeKind::Condition => {
      if let Some(value) = node.config_value("field") {
        if value.as_str().is_none_or(str::is_empty) {
          invalid(format!("field must be a non-empty string, got {}", value));
        }
      }
      if let Some(value) = node.config_value("operator") {
        if let Err(err) = parse_operator(value) {
          invalid(err);
        }
      }
    }
    NodeKind::Delay => {
      if let Some(value) = node.config_value("delayMs") {
        if value.as_u64().is_none() {
          invalid(format!(
            "delayMs must be a non-negative integer, got {}",
            value
          ));
        }
      }
    }
    _ => {}
  }
}

fn parse_operator(value: &Value) -> Result<Operator, String> {
  match value.as_str() {
    Some(s) => s.parse::<Operator>().map_err(|err| err.to_string()),
    None => Err(format!("operator must be a string, got {}", value)),
  }
}

fn is_exact_branch_pair(outgoing: &[&Edge]) -> bool {
  if outgoing.len() != 2 {
    return false;
  }
  let tags: BTreeSet<Branch> = outgoing.iter().filter_map(|e| e.branch).collect();
  tags.len() == 2
}

fn check_edges(workflow: &Workflow, issues: &mut Vec<Issue>) {
  let mut edges: Vec<&Edge> = workflow.edges.iter().collect();
  edges.sort_by(|a, b| a.id.cmp(&b.id));

  let mut seen: HashSet<&str> = HashSet::new();
  for edge in edges {
    if !seen.insert(edge.id.as_str()) {
      issues.push(Issue::error("duplicate_edge", "edge id is used more than once").at_edge(&edge.id));
    }

    let source = workflow.get_node(&edge.source);
    if source.is_none() {
      issues.push(
        Issue::error(
          "unknown_source",
          format!("edge source '{}' does not exist", edge.source),
        )
        .at_edge(&edge.id),
      );
    }
    if workflow.get_node(&edge.target).is_none() {
      issues.push(
        Issue::error(
          "unknown_target",
          format!("edge target '{}' does not exist", edge.target),
        )
        .at_edge(&edge.id),
      );
    }

    if let (Some(branch), Some(source)) = (edge.branch, source) {
      if !matches!(source.kind, NodeKind::Condition) {
        issues.push(
          Issue::error(
            "unexpected_branch",
            format!(
              "edge leaving {} node '{}' carries branch tag '{}'",
              source.kind, source.id, branch
            ),
          )
          .at_edge(&edge.id),
        );
      }
    }
  }
}

fn check_graph(workflow: &Workflow, issues: &mut Vec<Issue>) {
  let triggers = workflow.triggers();
  if triggers.is_empty() {
    issues.push(Issue::error("missing_trigger", "workflow has no trigger node"));
  }

  let graph = workflow.graph();
  let reachable = graph.reachable_from(triggers.iter().map(|t| t.id.as_str()));

  if !triggers.is_empty() {
    for node_id in workflow.sorted_node_ids() {
      if !reachable.contains(node_id) {
        issues.push(
          Issue::warning("unreachable_node", "node is not reachable from any trigger")
            .at_node(node_id),
        );
      }
    }
  }

  let node_ids = graph.node_ids();
  let mut search = CycleSearch::new(&graph);
  let from_triggers = node_ids
    .iter()
    .copied()
    .filter(|id| triggers.iter().any(|t| t.id == *id));
  if let Some(node_id) = search.search(from_triggers) {
    issues.push(
      Issue::error(
        "cycle",
        format!("cycle through '{}' is reachable from a trigger", node_id),
      )
      .at_node(node_id),
    );
  } else if let Some(node_id) = search.search(node_ids.iter().copied()) {
    issues.push(
      Issue::warning(
        "cycle",
        format!("cycle through '{}' in a subgraph no trigger reaches", node_id),
      )
      .at_node(node_id),
    );
  }

  let components = graph.connected_components();
  if components.len() > 1 {
    issues.push(Issue::warning(
      "disconnected",
      format!(
        "workflow splits into {} disconnected parts; only one can run",
        components.len()
      ),
    ));
  }
}
