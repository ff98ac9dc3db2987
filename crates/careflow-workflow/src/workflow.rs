use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::edge::{Branch, Edge};
use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::node::Node;
use crate::trigger::{IncomingEvent, trigger_matches};

fn default_version() -> u32 {
  1
}

/// A named, versioned automation graph.
///
/// Nodes live in a flat map keyed by id and edges refer to nodes by id only,
/// so the workflow owns its whole graph. On the wire `nodes` is a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
  pub id: String,
  pub name: String,
  #[serde(default = "default_version")]
  pub version: u32,
  #[serde(with = "node_list")]
  pub nodes: HashMap<String, Node>,
  #[serde(default)]
  pub edges: Vec<Edge>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default = "Utc::now")]
  pub created_at: DateTime<Utc>,
  #[serde(default = "Utc::now")]
  pub updated_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl Workflow {
  /// Create an empty, inactive draft at version 1.
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: id.into(),
      name: name.into(),
      version: 1,
      nodes: HashMap::new(),
      edges: Vec::new(),
      is_active: false,
      created_at: now,
      updated_at: now,
      timeout_ms: None,
    }
  }

  pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn to_json_pretty(&self) -> Result<String, WorkflowError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Add a node, replacing any node with the same id.
  pub fn with_node(mut self, node: Node) -> Self {
    self.nodes.insert(node.id.clone(), node);
    self
  }

  pub fn with_edge(mut self, edge: Edge) -> Self {
    self.edges.push(edge);
    self
  }

  pub fn connect(
    self,
    id: impl Into<String>,
    source: impl Into<String>,
    target: impl Into<String>,
  ) -> Self {
    self.with_edge(Edge::new(id, source, target))
  }

  pub fn connect_branch(
    self,
    id: impl Into<String>,
    source: impl Into<String>,
    target: impl Into<String>,
    branch: Branch,
  ) -> Self {
    self.with_edge(Edge::branch(id, source, target, branch))
  }

  pub fn active(mut self) -> Self {
    self.is_active = true;
    self
  }

  /// Insert a node, refusing duplicates.
  pub fn insert_node(&mut self, node: Node) -> Result<(), WorkflowError> {
    if self.nodes.contains_key(&node.id) {
      return Err(WorkflowError::DuplicateNodeId(node.id));
    }
    self.nodes.insert(node.id.clone(), node);
    Ok(())
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.get(node_id)
  }

  /// Node ids in ascending order.
  pub fn sorted_node_ids(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
  }

  /// Trigger nodes in ascending id order.
  pub fn triggers(&self) -> Vec<&Node> {
    let mut triggers: Vec<&Node> = self.nodes.values().filter(|n| n.is_trigger()).collect();
    triggers.sort_by(|a, b| a.id.cmp(&b.id));
    triggers
  }

  /// The first trigger, in id order, that fires for `event`.
  pub fn matching_trigger(&self, event: &IncomingEvent) -> Option<&Node> {
    self
      .triggers()
      .into_iter()
      .find(|trigger| trigger_matches(trigger, event))
  }

  /// Edges leaving `node_id`, in edge order.
  pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
    self.edges.iter().filter(move |e| e.source == node_id)
  }

  /// Edges entering `node_id`, in edge order.
  pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
    self.edges.iter().filter(move |e| e.target == node_id)
  }

  /// Dispatch keys of every action node in the workflow.
  pub fn action_kinds(&self) -> BTreeSet<String> {
    self
      .nodes
      .values()
      .filter(|n| n.kind.is_action())
      .map(|n| n.kind.dispatch_key())
      .collect()
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes, &self.edges)
  }
}

/// Serialize the node map as a list sorted by id; reject duplicate ids on read.
mod node_list {
  use std::collections::HashMap;

  use serde::de::Error as _;
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  use crate::node::Node;

  pub fn serialize<S: Serializer>(
    nodes: &HashMap<String, Node>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    let mut list: Vec<&Node> = nodes.values().collect();
    list.sort_by(|a, b| a.id.cmp(&b.id));
    list.serialize(serializer)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<HashMap<String, Node>, D::Error> {
    let list = Vec::<Node>::deserialize(deserializer)?;
    let mut nodes = HashMap::with_capacity(list.len());
    for node in list {
      let id = node.id.clone();
      if nodes.insert(id.clone(), node).is_some() {
        return Err(D::Error::custom(format!("duplicate node id: {}", id)));
      }
    }
    Ok(nodes)
  }
}
