//! The dynamic job specification: the side-channel document a dynamic task
//! writes to `futures.pb` describing the sub-graph it wants executed.

use crate::identifier::Identifier;
use crate::interface::TypedInterface;
use crate::literals::Literal;
use crate::task::TaskTemplate;

/// A reference to one output variable of another node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputReference {
  #[prost(string, tag = "1")]
  pub node_id: String,
  #[prost(string, tag = "2")]
  pub var: String,
}

/// The value side of a binding: a promise on another node's output or an
/// inline literal.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BindingData {
  #[prost(oneof = "binding_data::Value", tags = "1, 2")]
  pub value: Option<binding_data::Value>,
}

pub mod binding_data {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Value {
    #[prost(message, tag = "1")]
    Promise(super::OutputReference),
    #[prost(message, tag = "2")]
    Scalar(super::Literal),
  }
}

/// Binds one named input variable to a value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Binding {
  #[prost(string, tag = "1")]
  pub var: String,
  #[prost(message, optional, tag = "2")]
  pub binding: Option<BindingData>,
}

impl Binding {
  pub fn promise(var: impl Into<String>, node_id: impl Into<String>, source_var: impl Into<String>) -> Self {
    Self {
      var: var.into(),
      binding: Some(BindingData {
        value: Some(binding_data::Value::Promise(OutputReference {
          node_id: node_id.into(),
          var: source_var.into(),
        })),
      }),
    }
  }
}

/// A node targeting an inline task by reference.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskNode {
  #[prost(message, optional, tag = "1")]
  pub reference_id: Option<Identifier>,
}

/// A node targeting a workflow: an embedded sub-workflow or a remote
/// launch plan.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkflowNode {
  #[prost(oneof = "workflow_node::Reference", tags = "1, 2")]
  pub reference: Option<workflow_node::Reference>,
}

pub mod workflow_node {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Reference {
    #[prost(message, tag = "1")]
    LaunchplanRef(super::Identifier),
    #[prost(message, tag = "2")]
    SubWorkflowRef(super::Identifier),
  }
}

/// A sub-node in a dynamic job specification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeSpec {
  #[prost(string, tag = "1")]
  pub id: String,
  #[prost(message, repeated, tag = "2")]
  pub inputs: Vec<Binding>,
  #[prost(string, repeated, tag = "3")]
  pub upstream_node_ids: Vec<String>,
  #[prost(oneof = "node_spec::Target", tags = "4, 5")]
  pub target: Option<node_spec::Target>,
}

pub mod node_spec {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Target {
    #[prost(message, tag = "4")]
    Task(super::TaskNode),
    #[prost(message, tag = "5")]
    Workflow(super::WorkflowNode),
  }
}

/// An embedded workflow template a sub-node may reference.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkflowTemplate {
  #[prost(message, optional, tag = "1")]
  pub id: Option<Identifier>,
  #[prost(message, optional, tag = "2")]
  pub interface: Option<TypedInterface>,
  #[prost(message, repeated, tag = "3")]
  pub nodes: Vec<NodeSpec>,
  #[prost(message, repeated, tag = "4")]
  pub outputs: Vec<Binding>,
}

/// The dynamic job specification written to `futures.pb`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DynamicJobSpec {
  /// Minimum number of sub-nodes that must succeed; enforcement belongs to
  /// the executor.
  #[prost(int64, tag = "1")]
  pub min_successes: i64,
  #[prost(message, repeated, tag = "2")]
  pub tasks: Vec<TaskTemplate>,
  #[prost(message, repeated, tag = "3")]
  pub nodes: Vec<NodeSpec>,
  #[prost(message, repeated, tag = "4")]
  pub outputs: Vec<Binding>,
  #[prost(message, repeated, tag = "5")]
  pub subworkflows: Vec<WorkflowTemplate>,
}

impl DynamicJobSpec {
  /// A spec with no sub-nodes does not describe a sub-graph; the emitting
  /// node stays a plain task.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
