//! Sub-node identity and output stitching.
//!
//! Sub-nodes live in a namespace derived from the parent: their ids are
//! `<parent_node_id>-<attempt>-<child_id>` and their data directories sit
//! under the parent's data directory, so one dynamic node's attempts never
//! collide with another's. After the sub-graph completes, the end node's
//! outputs become the dynamic node's own outputs.

use tracing::debug;

use larkspur_core::{outputs_file, LiteralMap, VirtualWorkflow, DYNAMIC_NODE_ID, END_NODE_ID};
use larkspur_node::{HandlerError, NodeExecutionContext};
use larkspur_storage::{DataReference, Options, StorageError};

/// The deterministic id of a sub-node for a given parent attempt.
pub fn sub_node_id(parent_node_id: &str, attempt: u32, child_id: &str) -> String {
  format!("{}-{}-{}", parent_node_id, attempt, child_id)
}

/// Point every sub-node status record (and the synthetic end node's) at a
/// directory under the parent's data directory, and record the parent task
/// as their origin. Must run before the executor first sees the workflow.
pub(crate) fn assign_sub_node_directories(
  node_ctx: &dyn NodeExecutionContext,
  workflow: &VirtualWorkflow,
) {
  let store = node_ctx.data_store();
  let parent_status = node_ctx.node_status();
  let parent_task_id = node_ctx.task_reader().task_id().cloned();

  let dynamic_status = parent_status.node_execution_status(DYNAMIC_NODE_ID);
  let dynamic_dir = store.construct_reference(&parent_status.data_dir(), &[DYNAMIC_NODE_ID]);
  dynamic_status.set_data_dir(dynamic_dir.clone());
  dynamic_status.set_output_dir(dynamic_dir.clone());
  if let Some(task_id) = &parent_task_id {
    dynamic_status.set_parent_task_id(task_id.clone());
  }

  let child_ids = workflow
    .sub_nodes()
    .map(|n| n.id.as_str())
    .chain(std::iter::once(END_NODE_ID));
  for child_id in child_ids {
    let status = workflow.node_execution_status(child_id);
    let data_dir = store.construct_reference(&dynamic_dir, &[child_id]);
    let output_dir =
      store.construct_reference(&data_dir, &[status.attempts().to_string().as_str()]);
    status.set_data_dir(data_dir);
    status.set_output_dir(output_dir);
    if let Some(task_id) = &parent_task_id {
      status.set_parent_task_id(task_id.clone());
    }
  }
}

/// Read the end node's fully bound outputs and promote them as the dynamic
/// node's own, updating the parent's output directory.
///
/// Returns `None` when the outputs document does not exist yet — the
/// sub-graph reported complete but storage has nothing to promote, which
/// callers treat as retryable.
pub(crate) async fn promote_outputs(
  node_ctx: &dyn NodeExecutionContext,
  workflow: &VirtualWorkflow,
) -> Result<Option<(LiteralMap, DataReference)>, HandlerError> {
  let store = node_ctx.data_store();
  let end_status = workflow.node_execution_status(END_NODE_ID);
  let source = outputs_file(&end_status.data_dir());

  let outputs: LiteralMap = match store.as_ref().read_protobuf(&source).await {
    Ok(outputs) => outputs,
    Err(StorageError::NotFound { .. }) => return Ok(None),
    Err(e) => return Err(e.into()),
  };

  let destination = outputs_file(&node_ctx.node_status().output_dir());
  store
    .as_ref()
    .write_protobuf(&destination, Options::default(), &outputs)
    .await?;
  debug!(
    node_id = node_ctx.node_id(),
    source = %source,
    destination = %destination,
    outputs = outputs.literals.len(),
    "promoted end-node outputs"
  );
  Ok(Some((outputs, destination)))
}
