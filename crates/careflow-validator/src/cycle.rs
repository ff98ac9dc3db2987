use std::collections::HashMap;

use careflow_workflow::{Graph, Workflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
  Unvisited,
  InStack,
  Done,
}

/// Depth-first cycle search with three-coloring.
///
/// Colors persist across calls so a second search over the remaining
/// roots skips everything the first one already finished.
pub(crate) struct CycleSearch<'a> {
  graph: &'a Graph,
  color: HashMap<&'a str, Color>,
}

impl<'a> CycleSearch<'a> {
  pub(crate) fn new(graph: &'a Graph) -> Self {
    let color = graph
      .node_ids()
      .into_iter()
      .map(|id| (id, Color::Unvisited))
      .collect();
    Self { graph, color }
  }

  /// Search from each root in order. Returns the node a back edge points to.
  pub(crate) fn search<I>(&mut self, roots: I) -> Option<&'a str>
  where
    I: IntoIterator<Item = &'a str>,
  {
    for root in roots {
      if self.color.get(root) == Some(&Color::Unvisited) {
        if let Some(node) = self.dfs(root) {
          return Some(node);
        }
      }
    }
    None
  }

  /// Explicit-stack DFS from `root`.
  fn dfs(&mut self, root: &'a str) -> Option<&'a str> {
    let graph = self.graph;
    // (node, index of the next downstream edge to follow)
    let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];
    self.color.insert(root, Color::InStack);

    while let Some(frame) = stack.last_mut() {
      let (node, next) = *frame;
      let Some(neighbor) = graph.downstream(node).get(next) else {
        self.color.insert(node, Color::Done);
        stack.pop();
        continue;
      };
      frame.1 += 1;

      let neighbor = neighbor.as_str();
      match self.color.get(neighbor).copied() {
        Some(Color::InStack) => return Some(neighbor),
        Some(Color::Unvisited) => {
          self.color.insert(neighbor, Color::InStack);
          stack.push((neighbor, 0));
        }
        _ => {}
      }
    }

    None
  }
}

/// True iff a non-empty directed path leads from some node back to itself.
///
/// Only edges whose endpoints both exist are considered; self-loops count.
pub fn has_cycle(workflow: &Workflow) -> bool {
  let graph = workflow.graph();
  let roots = graph.node_ids();
  CycleSearch::new(&graph).search(roots).is_some()
}

#[cfg(test)]
mod tests {
  use super::*;
  use careflow_workflow::{Node, NodeKind};

  fn chain(edges: &[(&str, &str)]) -> Workflow {
    let mut workflow = Workflow::new("wf", "cycles");
    for (source, target) in edges {
      for id in [source, target] {
        workflow = workflow.with_node(Node::new(*id, NodeKind::Split));
      }
    }
    for (i, (source, target)) in edges.iter().enumerate() {
      workflow = workflow.connect(format!("e{}", i), *source, *target);
    }
    workflow
  }

  #[test]
  fn test_acyclic_graph() {
    assert!(!has_cycle(&chain(&[("a", "b"), ("b", "c"), ("a", "c")])));
  }

  #[test]
  fn test_simple_cycle() {
    assert!(has_cycle(&chain(&[("a", "b"), ("b", "c"), ("c", "a")])));
  }

  #[test]
  fn test_self_loop() {
    assert!(has_cycle(&chain(&[("a", "a")])));
  }

  #[test]
  fn test_diamond_is_not_a_cycle() {
    assert!(!has_cycle(&chain(&[
      ("a", "b"),
      ("a", "c"),
      ("b", "d"),
      ("c", "d")
    ])));
  }

  #[test]
  fn test_dangling_edges_do_not_form_cycles() {
    let workflow = Workflow::new("wf", "dangling")
      .with_node(Node::new("a", NodeKind::Split))
      .connect("e1", "a", "ghost")
      .connect("e2", "ghost", "a");
    assert!(!has_cycle(&workflow));
  }

  #[test]
  fn test_search_reports_back_edge_target() {
    let workflow = chain(&[("a", "b"), ("b", "c"), ("c", "b")]);
    let graph = workflow.graph();
    assert_eq!(CycleSearch::new(&graph).search(["a"]), Some("b"));
  }

  #[test]
  fn test_long_chain_does_not_exhaust_the_stack() {
    let ids: Vec<String> = (0..100_000).map(|i| format!("n{}", i)).collect();
    let mut workflow = Workflow::new("wf", "long");
    for id in &ids {
      workflow = workflow.with_node(Node::new(id.as_str(), NodeKind::Split));
    }
    for (i, pair) in ids.windows(2).enumerate() {
      workflow = workflow.connect(format!("e{}", i), pair[0].as_str(), pair[1].as_str());
    }
    assert!(!has_cycle(&workflow));

    let last = ids.len() - 1;
    let workflow = workflow.connect("back", ids[last].as_str(), ids[0].as_str());
    assert!(has_cycle(&workflow));
  }
}
