//! Larkspur Core
//!
//! The shared data model for the orchestrator: literal values and their
//! types, typed interfaces, identifiers, task templates, the dynamic job
//! specification emitted by dynamic tasks, and the in-memory virtual
//! workflow the dynamic node handler synthesizes from it.
//!
//! Everything that crosses the blob store or the catalog wire is a prost
//! message; the virtual workflow and its node status records are plain
//! structs owned by the controller side.

mod identifier;
mod interface;
mod literals;
mod spec;
mod task;
mod workflow;

pub use identifier::{
  Identifier, NodeExecutionIdentifier, ResourceType, TaskExecutionIdentifier,
  WorkflowExecutionIdentifier,
};
pub use interface::{Parameter, ParameterMap, TypedInterface, Variable, VariableMap};
pub use literals::{
  literal, literal_type, primitive, Literal, LiteralCollection, LiteralMap, LiteralType,
  Primitive, SimpleType,
};
pub use spec::{
  binding_data, node_spec, workflow_node, Binding, BindingData, DynamicJobSpec, NodeSpec,
  OutputReference, TaskNode, WorkflowNode, WorkflowTemplate,
};
pub use task::{TaskMetadata, TaskTemplate};
pub use workflow::{
  futures_file, outputs_file, CompiledNode, CompiledTarget, NodeStatus, VirtualWorkflow,
  DYNAMIC_NODE_ID, END_NODE_ID, START_NODE_ID,
};
