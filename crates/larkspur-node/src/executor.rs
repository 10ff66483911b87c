//! The recursive executor contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use larkspur_core::{CompiledNode, VirtualWorkflow};

use crate::error::HandlerError;
use crate::phase::ExecutionError;

/// Aggregate status of a (sub-)graph execution. The executor guarantees
/// this is monotone across ticks: Queued → Running → a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
  Undefined,
  Queued,
  Running,
  /// All driven nodes finished this tick.
  Success,
  /// The graph is terminally complete and outputs are final.
  Complete,
  Failed(ExecutionError),
}

impl ExecutionStatus {
  /// Terminal-successful: the end node has run and outputs may be
  /// promoted.
  pub fn is_complete(&self) -> bool {
    matches!(self, ExecutionStatus::Success | ExecutionStatus::Complete)
  }
}

/// Drives arbitrary sub-graphs on behalf of a parent node. Owns ordering
/// and concurrency of the graph; the caller only observes the aggregate
/// status.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
  /// Advance the graph from `node` downward by one reconcile step.
  async fn recursive_node_handler(
    &self,
    cancel: &CancellationToken,
    workflow: &VirtualWorkflow,
    node: &CompiledNode,
  ) -> Result<ExecutionStatus, HandlerError>;

  /// Finalize `node` and everything downstream of it.
  async fn finalize_handler(
    &self,
    cancel: &CancellationToken,
    workflow: &VirtualWorkflow,
    node: &CompiledNode,
  ) -> Result<(), HandlerError>;
}
