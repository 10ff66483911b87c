//! Larkspur Node
//!
//! Contracts between the controller, the node handlers, and their
//! collaborators. Every seam is a trait so that handlers compose: the
//! dynamic node handler wraps a [`TaskHandler`], drives a [`NodeExecutor`]
//! over the sub-graph, and resolves remote interfaces through a
//! [`LaunchPlanReader`]. State never lives in memory across ticks — it is
//! read through [`NodeStateReader`] and committed through
//! [`NodeStateWriter`] so reconciliation survives restarts.

mod context;
mod error;
mod executor;
mod handler;
mod launchplan;
mod phase;
mod state;

pub use context::{NodeExecutionContext, TaskReader};
pub use error::HandlerError;
pub use executor::{ExecutionStatus, NodeExecutor};
pub use handler::{NodeHandler, TaskHandler};
pub use launchplan::{LaunchPlanClosure, LaunchPlanReader};
pub use phase::{ExecutionError, ExecutionErrorKind, ExecutionInfo, Phase, Transition};
pub use state::{DynamicNodePhase, DynamicNodeState, NodeStateReader, NodeStateWriter};
