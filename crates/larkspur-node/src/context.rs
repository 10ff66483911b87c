//! The capability surface a node handler sees for one tick.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use larkspur_core::{Identifier, NodeStatus, TaskTemplate, WorkflowExecutionIdentifier};
use larkspur_storage::ProtobufStore;

use crate::error::HandlerError;
use crate::state::{NodeStateReader, NodeStateWriter};

/// Read access to the node's task template.
#[async_trait]
pub trait TaskReader: Send + Sync {
  fn task_id(&self) -> Option<&Identifier>;

  fn task_type(&self) -> &str;

  /// Fetch the full template. May hit the blob store.
  async fn read(&self, cancel: &CancellationToken) -> Result<TaskTemplate, HandlerError>;
}

/// Everything a handler may touch while handling one node.
///
/// The controller owns the context; handlers never hold it across ticks.
/// All mutation goes through the state writer and the node status records,
/// both serialized by the caller.
pub trait NodeExecutionContext: Send + Sync {
  /// The node's id, unique within its workflow.
  fn node_id(&self) -> &str;

  /// The owning workflow execution.
  fn execution_id(&self) -> &WorkflowExecutionIdentifier;

  /// Zero-based retry counter for this node.
  fn current_attempt(&self) -> u32;

  fn task_reader(&self) -> &dyn TaskReader;

  fn data_store(&self) -> &Arc<dyn ProtobufStore>;

  /// The node's own status record; sub-node statuses hang off it.
  fn node_status(&self) -> Arc<NodeStatus>;

  fn node_state_reader(&self) -> &dyn NodeStateReader;

  fn node_state_writer(&self) -> &dyn NodeStateWriter;
}
