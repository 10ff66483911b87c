//! The dynamic node handler.
//!
//! Wraps a task handler and presents the uniform [`NodeHandler`] surface to
//! the controller. Until the parent task reaches terminal success the
//! wrapped handler's transitions pass through untouched; once a dynamic job
//! spec shows up the handler takes over and runs the multi-phase machine
//! over the sub-graph.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use larkspur_node::{
  DynamicNodePhase, DynamicNodeState, ExecutionInfo, ExecutionStatus, HandlerError,
  LaunchPlanReader, NodeExecutionContext, NodeExecutor, NodeHandler, Phase, TaskHandler,
  Transition,
};

use crate::builder::{build_contextual_workflow, read_dynamic_spec, BuildOutcome};
use crate::stitch::{assign_sub_node_directories, promote_outputs};

const ERROR_CODE_OUTPUTS_NOT_FOUND: &str = "DynamicNodeOutputsNotFound";
const ERROR_CODE_DYNAMIC_FAILED: &str = "DynamicNodeFailed";

/// Handler for nodes that may grow a child graph at runtime.
pub struct DynamicNodeHandler {
  task_handler: Arc<dyn TaskHandler>,
  node_executor: Arc<dyn NodeExecutor>,
  launch_plan_reader: Arc<dyn LaunchPlanReader>,
}

impl DynamicNodeHandler {
  pub fn new(
    task_handler: Arc<dyn TaskHandler>,
    node_executor: Arc<dyn NodeExecutor>,
    launch_plan_reader: Arc<dyn LaunchPlanReader>,
  ) -> Self {
    Self {
      task_handler,
      node_executor,
      launch_plan_reader,
    }
  }

  /// Drive the parent task and watch its terminal success for the dynamic
  /// job spec side-channel.
  async fn handle_parent_node(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<Transition, HandlerError> {
    let transition = self.task_handler.handle(cancel, node_ctx).await?;
    if transition.phase() != Phase::Success {
      return Ok(transition);
    }

    match read_dynamic_spec(node_ctx).await? {
      Some(spec) => {
        info!(
          node_id = node_ctx.node_id(),
          sub_nodes = spec.nodes.len(),
          "parent task produced a dynamic job spec"
        );
        node_ctx
          .node_state_writer()
          .put_dynamic_node_state(DynamicNodeState::with_phase(
            DynamicNodePhase::ParentFinalizing,
          ))?;
        Ok(Transition::running(ExecutionInfo::default()))
      }
      // No side-channel: an ordinary task, report it as-is.
      None => Ok(transition),
    }
  }

  /// Finalize the parent task's resources, then hand over to the
  /// sub-graph.
  async fn finalize_parent(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<Transition, HandlerError> {
    self.task_handler.finalize(cancel, node_ctx).await?;
    node_ctx
      .node_state_writer()
      .put_dynamic_node_state(DynamicNodeState::with_phase(DynamicNodePhase::Executing))?;
    Ok(Transition::running(ExecutionInfo::default()))
  }

  /// Advance the sub-graph one reconcile step.
  async fn progress_sub_graph(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<Transition, HandlerError> {
    let workflow =
      match build_contextual_workflow(cancel, node_ctx, self.launch_plan_reader.as_ref()).await? {
        BuildOutcome::Workflow(workflow) => workflow,
        BuildOutcome::Invalid(err) => {
          warn!(node_id = node_ctx.node_id(), error = %err, "dynamic job spec is invalid");
          node_ctx
            .node_state_writer()
            .put_dynamic_node_state(DynamicNodeState::failing(err.to_string()))?;
          return Ok(Transition::running(ExecutionInfo::default()));
        }
        BuildOutcome::NotDynamic => {
          // The persisted phase says a spec was produced; its disappearance
          // is a storage inconsistency worth retrying.
          return Err(HandlerError::State {
            message: "dynamic job spec is no longer readable".to_string(),
          });
        }
      };

    assign_sub_node_directories(node_ctx, &workflow);

    let status = self
      .node_executor
      .recursive_node_handler(cancel, &workflow, workflow.start_node())
      .await?;
    debug!(node_id = node_ctx.node_id(), status = ?status, "sub-workflow progressed");

    match status {
      ExecutionStatus::Undefined | ExecutionStatus::Queued | ExecutionStatus::Running => {
        node_ctx
          .node_state_writer()
          .put_dynamic_node_state(DynamicNodeState::with_phase(DynamicNodePhase::Executing))?;
        Ok(Transition::running(ExecutionInfo::default()))
      }
      ExecutionStatus::Success | ExecutionStatus::Complete => {
        self.finish_sub_graph(cancel, node_ctx, &workflow).await
      }
      ExecutionStatus::Failed(err) => {
        // Report Running; the next tick enters finalization from Failing.
        node_ctx
          .node_state_writer()
          .put_dynamic_node_state(DynamicNodeState::failing(err.to_string()))?;
        Ok(Transition::running(ExecutionInfo::default()))
      }
    }
  }

  /// Promote end-node outputs and, for discoverable tasks, validate and
  /// cache them.
  async fn finish_sub_graph(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
    workflow: &larkspur_core::VirtualWorkflow,
  ) -> Result<Transition, HandlerError> {
    let Some((outputs, reference)) = promote_outputs(node_ctx, workflow).await? else {
      let reason = "sub-workflow completed but end-node outputs were not generated";
      node_ctx
        .node_state_writer()
        .put_dynamic_node_state(DynamicNodeState::failing(reason))?;
      return Ok(Transition::retryable_failure(
        ERROR_CODE_OUTPUTS_NOT_FOUND,
        reason,
      ));
    };

    let task = node_ctx.task_reader().read(cancel).await?;
    if task.is_discoverable() {
      if let Some(err) = self
        .task_handler
        .validate_output_and_cache_add(cancel, node_ctx, &outputs)
        .await?
      {
        warn!(node_id = node_ctx.node_id(), error = %err, "output validation failed");
        node_ctx
          .node_state_writer()
          .put_dynamic_node_state(DynamicNodeState::failing(err.to_string()))?;
        return Ok(Transition::from_execution_error(err));
      }
    }

    node_ctx
      .node_state_writer()
      .put_dynamic_node_state(DynamicNodeState::with_phase(DynamicNodePhase::Executing))?;
    info!(node_id = node_ctx.node_id(), outputs = %reference, "dynamic node succeeded");
    Ok(Transition::success(ExecutionInfo {
      outputs: Some(reference),
    }))
  }

  /// Wind the node down after a sub-graph or promotion failure.
  async fn handle_failing(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
    state: DynamicNodeState,
  ) -> Result<Transition, HandlerError> {
    self.finalize_parent_and_sub_nodes(cancel, node_ctx).await?;
    let reason = if state.reason.is_empty() {
      "dynamic node failed".to_string()
    } else {
      state.reason
    };
    Ok(Transition::failure(ERROR_CODE_DYNAMIC_FAILED, reason))
  }

  /// Finalize the parent task handler and every sub-node. Both paths are
  /// always attempted; errors are joined so neither can leak the other's
  /// resources.
  async fn finalize_parent_and_sub_nodes(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<(), HandlerError> {
    let mut failures: Vec<String> = Vec::new();

    if let Err(e) = self.task_handler.finalize(cancel, node_ctx).await {
      failures.push(format!("parent task finalize: {}", e));
    }

    match build_contextual_workflow(cancel, node_ctx, self.launch_plan_reader.as_ref()).await {
      Ok(BuildOutcome::Workflow(workflow)) => {
        if let Err(e) = self
          .node_executor
          .finalize_handler(cancel, &workflow, workflow.start_node())
          .await
        {
          failures.push(format!("sub-node finalize: {}", e));
        }
      }
      // An invalid or absent spec never started a sub-graph; there is
      // nothing to finalize on that path.
      Ok(BuildOutcome::Invalid(_)) | Ok(BuildOutcome::NotDynamic) => {}
      Err(e) => failures.push(format!("sub-workflow rebuild: {}", e)),
    }

    if failures.is_empty() {
      Ok(())
    } else {
      Err(HandlerError::Finalize {
        message: failures.join("; "),
      })
    }
  }
}

#[async_trait]
impl NodeHandler for DynamicNodeHandler {
  #[instrument(skip_all, fields(node_id = node_ctx.node_id()))]
  async fn handle(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<Transition, HandlerError> {
    if cancel.is_cancelled() {
      return Err(HandlerError::Cancelled);
    }

    let state = node_ctx.node_state_reader().dynamic_node_state();
    debug!(phase = ?state.phase, "handling dynamic node");

    match state.phase {
      DynamicNodePhase::None | DynamicNodePhase::ParentExecuting => {
        self.handle_parent_node(cancel, node_ctx).await
      }
      DynamicNodePhase::ParentFinalizing => self.finalize_parent(cancel, node_ctx).await,
      DynamicNodePhase::Executing => self.progress_sub_graph(cancel, node_ctx).await,
      DynamicNodePhase::Failing => self.handle_failing(cancel, node_ctx, state).await,
    }
  }

  #[instrument(skip_all, fields(node_id = node_ctx.node_id()))]
  async fn finalize(
    &self,
    cancel: &CancellationToken,
    node_ctx: &dyn NodeExecutionContext,
  ) -> Result<(), HandlerError> {
    // Branch on the persisted phase, never on whether a futures document
    // happens to be readable right now.
    let state = node_ctx.node_state_reader().dynamic_node_state();
    match state.phase {
      DynamicNodePhase::None | DynamicNodePhase::ParentExecuting => {
        self.task_handler.finalize(cancel, node_ctx).await
      }
      DynamicNodePhase::ParentFinalizing
      | DynamicNodePhase::Executing
      | DynamicNodePhase::Failing => self.finalize_parent_and_sub_nodes(cancel, node_ctx).await,
    }
  }
}
