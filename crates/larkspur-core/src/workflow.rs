//! The virtual workflow synthesized for a dynamic node, and the per-node
//! status records the executor and the handler share.
//!
//! Status records are read and written under the controller's single-writer
//! discipline for a given node; interior mutability keeps the capability
//! surface (`node_execution_status`) free of lifetime plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use larkspur_storage::DataReference;

use crate::identifier::Identifier;
use crate::interface::TypedInterface;
use crate::spec::{Binding, WorkflowTemplate};
use crate::task::TaskTemplate;

/// Reserved id of the synthetic entry node of every workflow.
pub const START_NODE_ID: &str = "start-node";
/// Reserved id of the synthetic exit node; its inputs are the workflow's
/// outputs.
pub const END_NODE_ID: &str = "end-node";
/// Reserved child-status namespace under which a dynamic node's sub-node
/// statuses live.
pub const DYNAMIC_NODE_ID: &str = "dynamic-node";

const OUTPUTS_FILE: &str = "outputs.pb";
const FUTURES_FILE: &str = "futures.pb";

/// The well-known reference of a node's final outputs document.
pub fn outputs_file(data_dir: &DataReference) -> DataReference {
  data_dir.join(&[OUTPUTS_FILE])
}

/// The well-known reference of a node's dynamic job spec side-channel.
pub fn futures_file(output_dir: &DataReference) -> DataReference {
  output_dir.join(&[FUTURES_FILE])
}

/// Mutable execution status of one node: where its data lives and which
/// task spawned it. Child statuses are created on demand, so a dynamic
/// node's sub-nodes all hang off its own record.
#[derive(Default)]
pub struct NodeStatus {
  data_dir: RwLock<DataReference>,
  output_dir: RwLock<DataReference>,
  parent_task_id: RwLock<Option<Identifier>>,
  attempts: RwLock<u32>,
  children: RwLock<HashMap<String, Arc<NodeStatus>>>,
}

impl NodeStatus {
  pub fn new(data_dir: DataReference, output_dir: DataReference) -> Self {
    Self {
      data_dir: RwLock::new(data_dir),
      output_dir: RwLock::new(output_dir),
      ..Default::default()
    }
  }

  pub fn data_dir(&self) -> DataReference {
    self.data_dir.read().clone()
  }

  pub fn set_data_dir(&self, reference: DataReference) {
    *self.data_dir.write() = reference;
  }

  pub fn output_dir(&self) -> DataReference {
    self.output_dir.read().clone()
  }

  pub fn set_output_dir(&self, reference: DataReference) {
    *self.output_dir.write() = reference;
  }

  pub fn parent_task_id(&self) -> Option<Identifier> {
    self.parent_task_id.read().clone()
  }

  pub fn set_parent_task_id(&self, id: Identifier) {
    *self.parent_task_id.write() = Some(id);
  }

  pub fn attempts(&self) -> u32 {
    *self.attempts.read()
  }

  pub fn increment_attempts(&self) -> u32 {
    let mut attempts = self.attempts.write();
    *attempts += 1;
    *attempts
  }

  /// The status record of a child node, created empty on first access.
  pub fn node_execution_status(&self, node_id: &str) -> Arc<NodeStatus> {
    if let Some(child) = self.children.read().get(node_id) {
      return Arc::clone(child);
    }
    let mut children = self.children.write();
    Arc::clone(
      children
        .entry(node_id.to_string())
        .or_insert_with(|| Arc::new(NodeStatus::default())),
    )
  }
}

/// What a compiled node executes.
#[derive(Clone, Debug)]
pub enum CompiledTarget {
  /// Synthetic entry node; its outputs mirror the workflow inputs.
  Start,
  /// Synthetic exit node; its inputs are the workflow outputs.
  End,
  /// An inline task carried by the dynamic job spec.
  Task(TaskTemplate),
  /// A remote launch plan with its resolved interface.
  LaunchPlan {
    id: Identifier,
    interface: TypedInterface,
  },
  /// An embedded sub-workflow template.
  SubWorkflow(WorkflowTemplate),
}

/// One executable node of a virtual workflow.
#[derive(Clone, Debug)]
pub struct CompiledNode {
  pub id: String,
  pub target: CompiledTarget,
  pub inputs: Vec<Binding>,
  pub upstream_node_ids: Vec<String>,
}

impl CompiledNode {
  pub fn is_synthetic(&self) -> bool {
    matches!(self.target, CompiledTarget::Start | CompiledTarget::End)
  }
}

/// A workflow synthesized in memory from a dynamic job spec plus the parent
/// task's declared interface. Handed to the recursive executor as-is.
pub struct VirtualWorkflow {
  id: String,
  min_successes: i64,
  interface: TypedInterface,
  nodes: HashMap<String, CompiledNode>,
  node_order: Vec<String>,
  status: Arc<NodeStatus>,
}

impl VirtualWorkflow {
  pub fn new(
    id: impl Into<String>,
    min_successes: i64,
    interface: TypedInterface,
    nodes: Vec<CompiledNode>,
    status: Arc<NodeStatus>,
  ) -> Self {
    let node_order: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
    Self {
      id: id.into(),
      min_successes,
      interface,
      nodes,
      node_order,
      status,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn min_successes(&self) -> i64 {
    self.min_successes
  }

  /// The parent task's declared interface; the end node's inputs equal its
  /// outputs.
  pub fn interface(&self) -> &TypedInterface {
    &self.interface
  }

  pub fn node(&self, node_id: &str) -> Option<&CompiledNode> {
    self.nodes.get(node_id)
  }

  pub fn start_node(&self) -> &CompiledNode {
    &self.nodes[START_NODE_ID]
  }

  pub fn end_node(&self) -> &CompiledNode {
    &self.nodes[END_NODE_ID]
  }

  /// All nodes in insertion order.
  pub fn nodes(&self) -> impl Iterator<Item = &CompiledNode> {
    self.node_order.iter().map(|id| &self.nodes[id])
  }

  /// The user sub-nodes, skipping the synthetic start and end.
  pub fn sub_nodes(&self) -> impl Iterator<Item = &CompiledNode> {
    self.nodes().filter(|n| !n.is_synthetic())
  }

  /// Status record of one of this workflow's nodes.
  pub fn node_execution_status(&self, node_id: &str) -> Arc<NodeStatus> {
    self.status.node_execution_status(node_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_child_status_is_created_once() {
    let status = NodeStatus::default();
    let a = status.node_execution_status("n");
    a.set_data_dir(DataReference::new("dir"));
    let b = status.node_execution_status("n");
    assert_eq!(b.data_dir(), DataReference::new("dir"));
  }

  #[test]
  fn test_well_known_files() {
    let dir = DataReference::new("base/n1");
    assert_eq!(outputs_file(&dir).as_str(), "base/n1/outputs.pb");
    assert_eq!(futures_file(&dir).as_str(), "base/n1/futures.pb");
  }

  #[test]
  fn test_sub_nodes_skips_synthetic() {
    let nodes = vec![
      CompiledNode {
        id: START_NODE_ID.to_string(),
        target: CompiledTarget::Start,
        inputs: vec![],
        upstream_node_ids: vec![],
      },
      CompiledNode {
        id: "n1-0-child".to_string(),
        target: CompiledTarget::Task(TaskTemplate::default()),
        inputs: vec![],
        upstream_node_ids: vec![START_NODE_ID.to_string()],
      },
      CompiledNode {
        id: END_NODE_ID.to_string(),
        target: CompiledTarget::End,
        inputs: vec![],
        upstream_node_ids: vec!["n1-0-child".to_string()],
      },
    ];
    let workflow = VirtualWorkflow::new(
      "exec",
      0,
      TypedInterface::default(),
      nodes,
      Arc::new(NodeStatus::default()),
    );
    let subs: Vec<&str> = workflow.sub_nodes().map(|n| n.id.as_str()).collect();
    assert_eq!(subs, vec!["n1-0-child"]);
  }
}
