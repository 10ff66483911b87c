//! Larkspur Dynamic
//!
//! Handler for dynamic nodes: workflow nodes whose child graph is not known
//! statically but is produced at runtime by the node's own task. The task
//! writes a dynamic job spec to its output directory as a side channel; the
//! handler then synthesizes a virtual workflow from it, drives that
//! workflow through the recursive executor, and promotes the end node's
//! outputs as its own.
//!
//! The handler is a persistent state machine. The phase lives behind the
//! caller's state reader/writer, never in memory, so a controller restart
//! resumes at the last committed tick:
//!
//! ```text
//! None ──futures.pb──▶ ParentFinalizing ──▶ Executing ──▶ (Success)
//!                                              │
//!                                              ▼
//!                                           Failing ──▶ (Failed)
//! ```

mod builder;
mod error;
mod handler;
mod stitch;

pub use builder::{build_contextual_workflow, BuildOutcome};
pub use error::BuildError;
pub use handler::DynamicNodeHandler;
pub use stitch::sub_node_id;
