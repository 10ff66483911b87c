//! The uniform handler capability all node kinds expose.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use larkspur_core::LiteralMap;

use crate::context::NodeExecutionContext;
use crate::error::HandlerError;
use crate::phase::{ExecutionError, Transition};

/// One node kind's handle/finalize capability.
///
/// Handlers compose at construction time: the dynamic node handler wraps a
/// task handler and presents the same surface to the controller.
#[async_trait]
pub trait NodeHandler: Send + Sync {
  /// Drive the node one tick and report the resulting phase.
  async fn handle(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<Transition, HandlerError>;

  /// Release everything the node holds. Must be safe to call more than
  /// once on the same terminal state.
  async fn finalize(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<(), HandlerError>;
}

/// A task-backed node handler.
#[async_trait]
pub trait TaskHandler: NodeHandler {
  /// Validate promoted outputs and, when the task is discoverable, record
  /// them in the catalog cache.
  ///
  /// Returns `Ok(Some(_))` for a validation/cache failure the handler
  /// should absorb into a phase report, `Err` for infrastructure failures
  /// the controller should retry.
  async fn validate_output_and_cache_add(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
    outputs: &LiteralMap,
  ) -> Result<Option<ExecutionError>, HandlerError>;
}
