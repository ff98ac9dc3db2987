use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::edge::Edge;
use crate::node::Node;

/// Graph structure for traversal and analysis.
///
/// Only edges whose source and target both exist are part of the graph;
/// dangling edges are reported by the validator instead.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Adjacency list: node_id -> downstream node_ids, in edge order.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> upstream node_ids, in edge order.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  pub fn new(nodes: &HashMap<String, Node>, edges: &[Edge]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node_id in nodes.keys() {
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for edge in edges {
      if !nodes.contains_key(&edge.source) || !nodes.contains_key(&edge.target) {
        continue;
      }
      adjacency
        .entry(edge.source.clone())
        .or_default()
        .push(edge.target.clone());
      reverse_adjacency
        .entry(edge.target.clone())
        .or_default()
        .push(edge.source.clone());
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// All node ids in ascending order.
  pub fn node_ids(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self.adjacency.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
  }

  /// Nodes reachable by following edges forward from any of `seeds`,
  /// seeds included.
  pub fn reachable_from<'a, I>(&self, seeds: I) -> HashSet<String>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let mut reachable = HashSet::new();
    let mut queue = VecDeque::new();

    for seed in seeds {
      if self.adjacency.contains_key(seed) && reachable.insert(seed.to_string()) {
        queue.push_back(seed.to_string());
      }
    }

    while let Some(node_id) = queue.pop_front() {
      for next in self.downstream(&node_id) {
        if reachable.insert(next.clone()) {
          queue.push_back(next.clone());
        }
      }
    }

    reachable
  }

  /// Weakly connected components, each sorted, ordered by smallest member.
  pub fn connected_components(&self) -> Vec<BTreeSet<String>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();

    for start in self.node_ids() {
      if !seen.insert(start) {
        continue;
      }

      let mut component = BTreeSet::new();
      let mut stack = vec![start];
      while let Some(node_id) = stack.pop() {
        component.insert(node_id.to_string());
        let neighbours = self
          .downstream(node_id)
          .iter()
          .chain(self.upstream(node_id));
        for next in neighbours {
          if seen.insert(next.as_str()) {
            stack.push(next.as_str());
          }
        }
      }
      components.push(component);
    }

    components
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::NodeKind;

  fn nodes(ids: &[&str]) -> HashMap<String, Node> {
    ids
      .iter()
      .map(|id| (id.to_string(), Node::new(*id, NodeKind::Split)))
      .collect()
  }

  #[test]
  fn test_adjacency_follows_edge_order() {
    let nodes = nodes(&["a", "b", "c", "d"]);
    let edges = vec![
      Edge::new("e1", "a", "b"),
      Edge::new("e2", "a", "c"),
      Edge::new("e3", "b", "d"),
      Edge::new("e4", "c", "d"),
    ];
    let graph = Graph::new(&nodes, &edges);

    assert_eq!(graph.downstream("a"), &["b".to_string(), "c".to_string()]);
    assert_eq!(graph.upstream("d"), &["b".to_string(), "c".to_string()]);
    assert!(graph.upstream("a").is_empty());
  }

  #[test]
  fn test_dangling_edges_are_ignored() {
    let nodes = nodes(&["a"]);
    let edges = vec![Edge::new("e1", "a", "ghost")];
    let graph = Graph::new(&nodes, &edges);

    assert!(graph.downstream("a").is_empty());
    assert!(graph.upstream("ghost").is_empty());
  }

  #[test]
  fn test_reachable_from() {
    let nodes = nodes(&["a", "b", "c", "x"]);
    let edges = vec![Edge::new("e1", "a", "b"), Edge::new("e2", "b", "c")];
    let graph = Graph::new(&nodes, &edges);

    let reachable = graph.reachable_from(["a"]);
    assert_eq!(reachable.len(), 3);
    assert!(!reachable.contains("x"));
  }

  #[test]
  fn test_connected_components() {
    let nodes = nodes(&["a", "b", "c", "x", "y"]);
    let edges = vec![
      Edge::new("e1", "a", "b"),
      Edge::new("e2", "c", "b"),
      Edge::new("e3", "y", "x"),
    ];
    let graph = Graph::new(&nodes, &edges);

    let components = graph.connected_components();
    assert_eq!(components.len(), 2);
    assert_eq!(
      components[0],
      BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(
      components[1],
      BTreeSet::from(["x".to_string(), "y".to_string()])
    );
  }
}
