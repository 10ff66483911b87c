//! Persistent dynamic-node state.
//!
//! The phase must never be cached in memory across ticks: handlers read it
//! through [`NodeStateReader`] at the top of every tick and commit changes
//! through [`NodeStateWriter`], so a restarted controller resumes exactly
//! where the last committed tick left off.

use crate::error::HandlerError;

/// Lifecycle phase of a dynamic node, persisted per attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DynamicNodePhase {
  /// Not (or not yet known to be) dynamic.
  #[default]
  None,
  /// The parent task is still producing its outputs.
  ParentExecuting,
  /// The parent task succeeded and produced a dynamic job spec; its own
  /// resources must be finalized before the sub-graph starts.
  ParentFinalizing,
  /// The sub-graph is being driven by the recursive executor.
  Executing,
  /// The sub-graph or output promotion failed; the node is winding down.
  Failing,
}

/// The persisted state record for a dynamic node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicNodeState {
  pub phase: DynamicNodePhase,
  /// Human-readable cause, set on failure and finalization transitions.
  pub reason: String,
}

impl DynamicNodeState {
  pub fn with_phase(phase: DynamicNodePhase) -> Self {
    Self {
      phase,
      reason: String::new(),
    }
  }

  pub fn failing(reason: impl Into<String>) -> Self {
    Self {
      phase: DynamicNodePhase::Failing,
      reason: reason.into(),
    }
  }
}

/// Read access to the persisted dynamic-node state.
pub trait NodeStateReader: Send + Sync {
  fn dynamic_node_state(&self) -> DynamicNodeState;
}

/// Write access to the persisted dynamic-node state. Serialized by the
/// caller; one writer per node.
pub trait NodeStateWriter: Send + Sync {
  fn put_dynamic_node_state(&self, state: DynamicNodeState) -> Result<(), HandlerError>;
}
