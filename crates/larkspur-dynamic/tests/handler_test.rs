//! State machine tests for the dynamic node handler, driven through
//! hand-rolled stubs of the task handler, recursive executor, and launch
//! plan resolver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use larkspur_core::{
  futures_file, node_spec, outputs_file, workflow_node, Binding, CompiledNode, DynamicJobSpec,
  Identifier, Literal, LiteralMap, LiteralType, NodeSpec, NodeStatus, ResourceType, SimpleType,
  TaskMetadata, TaskNode, TaskTemplate, TypedInterface, Variable, VariableMap, VirtualWorkflow,
  WorkflowExecutionIdentifier, WorkflowNode, DYNAMIC_NODE_ID,
};
use larkspur_dynamic::DynamicNodeHandler;
use larkspur_node::{
  DynamicNodePhase, DynamicNodeState, ExecutionError, ExecutionInfo, ExecutionStatus,
  HandlerError, LaunchPlanClosure, LaunchPlanReader, NodeExecutionContext, NodeExecutor,
  NodeHandler, NodeStateReader, NodeStateWriter, Phase, TaskHandler, TaskReader, Transition,
};
use larkspur_storage::{DataReference, MemoryStore, Options, ProtobufStore};

struct StateHolder {
  state: Mutex<DynamicNodeState>,
}

impl NodeStateReader for StateHolder {
  fn dynamic_node_state(&self) -> DynamicNodeState {
    self.state.lock().unwrap().clone()
  }
}

impl NodeStateWriter for StateHolder {
  fn put_dynamic_node_state(&self, state: DynamicNodeState) -> Result<(), HandlerError> {
    *self.state.lock().unwrap() = state;
    Ok(())
  }
}

struct StubTaskReader {
  template: TaskTemplate,
}

#[async_trait]
impl TaskReader for StubTaskReader {
  fn task_id(&self) -> Option<&Identifier> {
    self.template.id.as_ref()
  }

  fn task_type(&self) -> &str {
    &self.template.task_type
  }

  async fn read(&self, _cancel: &CancellationToken) -> Result<TaskTemplate, HandlerError> {
    Ok(self.template.clone())
  }
}

struct TestContext {
  node_id: String,
  execution_id: WorkflowExecutionIdentifier,
  attempt: u32,
  task_reader: StubTaskReader,
  store: Arc<dyn ProtobufStore>,
  status: Arc<NodeStatus>,
  state: StateHolder,
}

impl NodeExecutionContext for TestContext {
  fn node_id(&self) -> &str {
    &self.node_id
  }

  fn execution_id(&self) -> &WorkflowExecutionIdentifier {
    &self.execution_id
  }

  fn current_attempt(&self) -> u32 {
    self.attempt
  }

  fn task_reader(&self) -> &dyn TaskReader {
    &self.task_reader
  }

  fn data_store(&self) -> &Arc<dyn ProtobufStore> {
    &self.store
  }

  fn node_status(&self) -> Arc<NodeStatus> {
    Arc::clone(&self.status)
  }

  fn node_state_reader(&self) -> &dyn NodeStateReader {
    &self.state
  }

  fn node_state_writer(&self) -> &dyn NodeStateWriter {
    &self.state
  }
}

impl TestContext {
  fn dynamic_state(&self) -> DynamicNodeState {
    self.state.dynamic_node_state()
  }
}

#[derive(Default)]
struct StubTaskHandler {
  /// Transition returned from handle; `None` makes handle fail.
  transition: Option<Transition>,
  finalize_error: Option<String>,
  validate_error: Option<ExecutionError>,
  finalize_calls: AtomicU32,
  validate_calls: AtomicU32,
}

#[async_trait]
impl NodeHandler for StubTaskHandler {
  async fn handle(
    &self,
    _cancel: &CancellationToken,
    _node_ctx: &dyn NodeExecutionContext,
  ) -> Result<Transition, HandlerError> {
    self.transition.clone().ok_or(HandlerError::Task {
      message: "task handle failed".to_string(),
    })
  }

  async fn finalize(
    &self,
    _cancel: &CancellationToken,
    _node_ctx: &dyn NodeExecutionContext,
  ) -> Result<(), HandlerError> {
    self.finalize_calls.fetch_add(1, Ordering::SeqCst);
    match &self.finalize_error {
      Some(message) => Err(HandlerError::Task {
        message: message.clone(),
      }),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl TaskHandler for StubTaskHandler {
  async fn validate_output_and_cache_add(
    &self,
    _cancel: &CancellationToken,
    _node_ctx: &dyn NodeExecutionContext,
    _outputs: &LiteralMap,
  ) -> Result<Option<ExecutionError>, HandlerError> {
    self.validate_calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.validate_error.clone())
  }
}

#[derive(Default)]
struct StubExecutor {
  /// Status returned from recursive_node_handler; `None` makes it fail.
  status: Option<ExecutionStatus>,
  finalize_error: Option<String>,
  recursive_calls: AtomicU32,
  finalize_calls: AtomicU32,
  seen_sub_nodes: Mutex<Vec<String>>,
  seen_interface: Mutex<Option<TypedInterface>>,
}

#[async_trait]
impl NodeExecutor for StubExecutor {
  async fn recursive_node_handler(
    &self,
    _cancel: &CancellationToken,
    workflow: &VirtualWorkflow,
    node: &CompiledNode,
  ) -> Result<ExecutionStatus, HandlerError> {
    assert_eq!(node.id, larkspur_core::START_NODE_ID);
    self.recursive_calls.fetch_add(1, Ordering::SeqCst);
    *self.seen_sub_nodes.lock().unwrap() =
      workflow.sub_nodes().map(|n| n.id.clone()).collect();
    *self.seen_interface.lock().unwrap() = Some(workflow.interface().clone());
    self.status.clone().ok_or(HandlerError::Executor {
      message: "executor failed".to_string(),
    })
  }

  async fn finalize_handler(
    &self,
    _cancel: &CancellationToken,
    _workflow: &VirtualWorkflow,
    _node: &CompiledNode,
  ) -> Result<(), HandlerError> {
    self.finalize_calls.fetch_add(1, Ordering::SeqCst);
    match &self.finalize_error {
      Some(message) => Err(HandlerError::Executor {
        message: message.clone(),
      }),
      None => Ok(()),
    }
  }
}

#[derive(Default)]
struct StubLaunchPlans {
  closures: HashMap<Identifier, LaunchPlanClosure>,
  calls: AtomicU32,
}

#[async_trait]
impl LaunchPlanReader for StubLaunchPlans {
  async fn get_launch_plan(
    &self,
    _cancel: &CancellationToken,
    id: &Identifier,
  ) -> Result<LaunchPlanClosure, HandlerError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .closures
      .get(id)
      .cloned()
      .ok_or_else(|| HandlerError::LaunchPlan {
        id: id.to_string(),
        message: "unknown launch plan".to_string(),
      })
  }
}

fn integer_var() -> Variable {
  Variable::new(LiteralType::simple(SimpleType::Integer))
}

fn parent_task() -> TaskTemplate {
  TaskTemplate {
    id: Some(Identifier::new(ResourceType::Task, "project", "domain", "parent", "v1")),
    task_type: "test".to_string(),
    metadata: Some(TaskMetadata {
      discoverable: true,
      discovery_version: "1".to_string(),
    }),
    interface: Some(TypedInterface {
      inputs: None,
      outputs: Some(VariableMap::new([("x".to_string(), integer_var())].into())),
    }),
  }
}

fn test_context(phase: DynamicNodePhase) -> TestContext {
  TestContext {
    node_id: "n1".to_string(),
    execution_id: WorkflowExecutionIdentifier {
      project: "project".to_string(),
      domain: "domain".to_string(),
      name: "name".to_string(),
    },
    attempt: 1,
    task_reader: StubTaskReader {
      template: parent_task(),
    },
    store: Arc::new(MemoryStore::new()),
    status: Arc::new(NodeStatus::new(
      DataReference::new("data-dir"),
      DataReference::new("output-dir"),
    )),
    state: StateHolder {
      state: Mutex::new(DynamicNodeState::with_phase(phase)),
    },
  }
}

fn task_ref(name: &str) -> Identifier {
  Identifier {
    name: name.to_string(),
    ..Default::default()
  }
}

fn job_spec() -> DynamicJobSpec {
  let task_node = |id: &str, task: &str| NodeSpec {
    id: id.to_string(),
    target: Some(node_spec::Target::Task(TaskNode {
      reference_id: Some(task_ref(task)),
    })),
    ..Default::default()
  };
  DynamicJobSpec {
    min_successes: 2,
    tasks: vec![
      TaskTemplate {
        id: Some(task_ref("task_1")),
        task_type: "container".to_string(),
        interface: Some(TypedInterface {
          inputs: None,
          outputs: Some(VariableMap::new([("x".to_string(), integer_var())].into())),
        }),
        ..Default::default()
      },
      TaskTemplate {
        id: Some(task_ref("task_2")),
        task_type: "container".to_string(),
        ..Default::default()
      },
    ],
    nodes: vec![
      task_node("Node_1", "task_1"),
      task_node("Node_2", "task_1"),
      task_node("Node_3", "task_2"),
    ],
    outputs: vec![Binding::promise("x", "Node_1", "x")],
    subworkflows: vec![],
  }
}

fn launch_plan_id() -> Identifier {
  Identifier::new(ResourceType::LaunchPlan, "p", "d", "my_plan", "")
}

fn launch_plan_spec() -> DynamicJobSpec {
  DynamicJobSpec {
    min_successes: 1,
    tasks: vec![],
    nodes: vec![
      NodeSpec {
        id: "Node_1".to_string(),
        target: Some(node_spec::Target::Workflow(WorkflowNode {
          reference: Some(workflow_node::Reference::LaunchplanRef(launch_plan_id())),
        })),
        ..Default::default()
      },
      NodeSpec {
        id: "Node_2".to_string(),
        target: Some(node_spec::Target::Workflow(WorkflowNode {
          reference: Some(workflow_node::Reference::LaunchplanRef(launch_plan_id())),
        })),
        ..Default::default()
      },
    ],
    outputs: vec![Binding::promise("x", "Node_1", "x")],
    subworkflows: vec![],
  }
}

async fn write_futures(ctx: &TestContext, spec: &DynamicJobSpec) {
  let reference = futures_file(&ctx.status.output_dir());
  ctx
    .store
    .as_ref()
    .write_protobuf(&reference, Options::default(), spec)
    .await
    .unwrap();
}

async fn write_end_node_outputs(ctx: &TestContext, outputs: &LiteralMap) {
  // Directory layout the stitcher derives: the end node's data dir lives
  // under <parent-data-dir>/dynamic-node/end-node.
  let reference = DataReference::new("data-dir/dynamic-node/end-node/outputs.pb");
  ctx
    .store
    .as_ref()
    .write_protobuf(&reference, Options::default(), outputs)
    .await
    .unwrap();
}

fn build_handler(
  task: StubTaskHandler,
  executor: StubExecutor,
  launch_plans: StubLaunchPlans,
) -> (
  DynamicNodeHandler,
  Arc<StubTaskHandler>,
  Arc<StubExecutor>,
  Arc<StubLaunchPlans>,
) {
  let task = Arc::new(task);
  let executor = Arc::new(executor);
  let launch_plans = Arc::new(launch_plans);
  let handler = DynamicNodeHandler::new(
    Arc::clone(&task) as Arc<dyn TaskHandler>,
    Arc::clone(&executor) as Arc<dyn NodeExecutor>,
    Arc::clone(&launch_plans) as Arc<dyn LaunchPlanReader>,
  );
  (handler, task, executor, launch_plans)
}

// --- parent phase -----------------------------------------------------------

#[tokio::test]
async fn test_cancelled_handle_commits_nothing() {
  let ctx = test_context(DynamicNodePhase::None);
  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      transition: Some(Transition::success(ExecutionInfo::default())),
      ..Default::default()
    },
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let cancel = CancellationToken::new();
  cancel.cancel();
  let err = handler.handle(&cancel, &ctx).await.unwrap_err();
  assert!(matches!(err, HandlerError::Cancelled));
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::None);
}

#[tokio::test]
async fn test_parent_success_without_futures_stays_plain() {
  let ctx = test_context(DynamicNodePhase::None);
  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      transition: Some(Transition::success(ExecutionInfo::default())),
      ..Default::default()
    },
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Success);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::None);
}

#[tokio::test]
async fn test_parent_success_with_futures_promotes_to_parent_finalizing() {
  let ctx = test_context(DynamicNodePhase::None);
  write_futures(&ctx, &job_spec()).await;
  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      transition: Some(Transition::success(ExecutionInfo::default())),
      ..Default::default()
    },
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Running);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::ParentFinalizing);
}

#[tokio::test]
async fn test_parent_success_with_empty_futures_stays_plain() {
  let ctx = test_context(DynamicNodePhase::None);
  write_futures(&ctx, &DynamicJobSpec::default()).await;
  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      transition: Some(Transition::success(ExecutionInfo::default())),
      ..Default::default()
    },
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Success);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::None);
}

#[tokio::test]
async fn test_parent_non_terminal_transitions_pass_through() {
  for transition in [
    Transition::running(ExecutionInfo::default()),
    Transition::retryable_failure("x", "y"),
    Transition::failure("x", "y"),
  ] {
    let ctx = test_context(DynamicNodePhase::None);
    write_futures(&ctx, &job_spec()).await;
    let (handler, _, _, _) = build_handler(
      StubTaskHandler {
        transition: Some(transition.clone()),
        ..Default::default()
      },
      StubExecutor::default(),
      StubLaunchPlans::default(),
    );

    let got = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
    assert_eq!(got, transition);
    assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::None);
  }
}

#[tokio::test]
async fn test_parent_handle_error_propagates() {
  let ctx = test_context(DynamicNodePhase::None);
  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let err = handler.handle(&CancellationToken::new(), &ctx).await.unwrap_err();
  assert!(matches!(err, HandlerError::Task { .. }));
}

// --- parent finalizing ------------------------------------------------------

#[tokio::test]
async fn test_parent_finalize_success_moves_to_executing() {
  let ctx = test_context(DynamicNodePhase::ParentFinalizing);
  write_futures(&ctx, &job_spec()).await;
  let (handler, task, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Running);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Executing);
  assert_eq!(task.finalize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parent_finalize_error_surfaces_and_phase_holds() {
  let ctx = test_context(DynamicNodePhase::ParentFinalizing);
  write_futures(&ctx, &job_spec()).await;
  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      transition: None,
      finalize_error: Some("finalize exploded".to_string()),
      ..Default::default()
    },
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let err = handler.handle(&CancellationToken::new(), &ctx).await.unwrap_err();
  assert!(matches!(err, HandlerError::Task { .. }));
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::ParentFinalizing);
}

// --- executing --------------------------------------------------------------

#[tokio::test]
async fn test_executing_running_statuses_report_running() {
  for status in [
    ExecutionStatus::Undefined,
    ExecutionStatus::Queued,
    ExecutionStatus::Running,
  ] {
    let ctx = test_context(DynamicNodePhase::Executing);
    write_futures(&ctx, &job_spec()).await;
    let (handler, _, executor, _) = build_handler(
      StubTaskHandler::default(),
      StubExecutor {
        status: Some(status),
        ..Default::default()
      },
      StubLaunchPlans::default(),
    );

    let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
    assert_eq!(transition.phase(), Phase::Running);
    assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Executing);
    assert_eq!(
      executor.seen_sub_nodes.lock().unwrap().as_slice(),
      ["n1-1-Node_1", "n1-1-Node_2", "n1-1-Node_3"]
    );
  }
}

#[tokio::test]
async fn test_executing_complete_with_outputs_succeeds() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  let outputs = LiteralMap::new([("x".to_string(), Literal::integer(42))].into());
  write_end_node_outputs(&ctx, &outputs).await;

  let (handler, task, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Complete),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Success);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Executing);
  // The parent task is discoverable, so the validate/cache hook ran.
  assert_eq!(task.validate_calls.load(Ordering::SeqCst), 1);

  // The outputs were promoted into the parent's output directory.
  let promoted: LiteralMap = ctx
    .store
    .as_ref()
    .read_protobuf(&outputs_file(&DataReference::new("output-dir")))
    .await
    .unwrap();
  assert_eq!(promoted, outputs);
  assert_eq!(
    transition.info().outputs,
    Some(DataReference::new("output-dir/outputs.pb"))
  );
}

#[tokio::test]
async fn test_executing_success_status_also_promotes() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  let outputs = LiteralMap::new([("x".to_string(), Literal::integer(7))].into());
  write_end_node_outputs(&ctx, &outputs).await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Success),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Success);
}

#[tokio::test]
async fn test_executing_complete_without_outputs_is_retryable() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Complete),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::RetryableFailure);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Failing);
}

#[tokio::test]
async fn test_executing_recoverable_validation_error_is_retryable() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  write_end_node_outputs(&ctx, &LiteralMap::new([("x".to_string(), Literal::integer(1))].into()))
    .await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      validate_error: Some(ExecutionError::recoverable("CacheError", "cache hiccup")),
      ..Default::default()
    },
    StubExecutor {
      status: Some(ExecutionStatus::Complete),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::RetryableFailure);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Failing);
}

#[tokio::test]
async fn test_executing_fatal_validation_error_fails() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  write_end_node_outputs(&ctx, &LiteralMap::new([("x".to_string(), Literal::integer(1))].into()))
    .await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler {
      validate_error: Some(ExecutionError::non_recoverable("BadOutputs", "wrong shape")),
      ..Default::default()
    },
    StubExecutor {
      status: Some(ExecutionStatus::Complete),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Failed);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Failing);
}

#[tokio::test]
async fn test_executing_sub_graph_failure_reports_running_then_fails() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Failed(ExecutionError::non_recoverable(
        "SubNodeFailed",
        "Node_2 exploded",
      ))),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Running);
  let state = ctx.dynamic_state();
  assert_eq!(state.phase, DynamicNodePhase::Failing);
  assert!(state.reason.contains("Node_2 exploded"));
}

#[tokio::test]
async fn test_executing_executor_error_propagates() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let err = handler.handle(&CancellationToken::new(), &ctx).await.unwrap_err();
  assert!(matches!(err, HandlerError::Executor { .. }));
}

#[tokio::test]
async fn test_executing_assigns_sub_node_directories() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Running),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  handler.handle(&CancellationToken::new(), &ctx).await.unwrap();

  let dynamic_status = ctx.status.node_execution_status(DYNAMIC_NODE_ID);
  assert_eq!(
    dynamic_status.data_dir(),
    DataReference::new("data-dir/dynamic-node")
  );
  let sub = dynamic_status.node_execution_status("n1-1-Node_1");
  assert_eq!(
    sub.data_dir(),
    DataReference::new("data-dir/dynamic-node/n1-1-Node_1")
  );
  assert_eq!(
    sub.output_dir(),
    DataReference::new("data-dir/dynamic-node/n1-1-Node_1/0")
  );
  assert_eq!(
    sub.parent_task_id().map(|id| id.name),
    Some("parent".to_string())
  );
}

#[tokio::test]
async fn test_virtual_workflow_carries_the_parent_interface() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;

  let (handler, _, executor, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Running),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  handler.handle(&CancellationToken::new(), &ctx).await.unwrap();

  // The end node's input interface is the parent task's declared output
  // interface, carried verbatim on the virtual workflow.
  let seen = executor.seen_interface.lock().unwrap().clone().unwrap();
  assert_eq!(seen, parent_task().interface.unwrap());
}

// --- launch plans -----------------------------------------------------------

#[tokio::test]
async fn test_launch_plan_resolved_once_per_unique_id() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &launch_plan_spec()).await;

  let (handler, _, _, launch_plans) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Running),
      ..Default::default()
    },
    StubLaunchPlans {
      closures: [(
        launch_plan_id(),
        LaunchPlanClosure {
          expected_inputs: Default::default(),
          expected_outputs: VariableMap::new(
            [(
              "x".to_string(),
              Variable::new(LiteralType::simple(SimpleType::Integer)),
            )]
            .into(),
          ),
        },
      )]
      .into(),
      ..Default::default()
    },
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Running);
  // Two sub-nodes reference the same plan; one fetch.
  assert_eq!(launch_plans.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_launch_plan_interface_mismatch_moves_to_failing() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &launch_plan_spec()).await;

  let (handler, _, executor, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Running),
      ..Default::default()
    },
    StubLaunchPlans {
      closures: [(
        launch_plan_id(),
        LaunchPlanClosure {
          expected_inputs: Default::default(),
          expected_outputs: VariableMap::new(
            [(
              "d".to_string(),
              Variable::new(LiteralType::simple(SimpleType::String)),
            )]
            .into(),
          ),
        },
      )]
      .into(),
      ..Default::default()
    },
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Running);
  assert_eq!(ctx.dynamic_state().phase, DynamicNodePhase::Failing);
  // Nothing was executed.
  assert_eq!(executor.recursive_calls.load(Ordering::SeqCst), 0);

  // The next tick reports the terminal failure.
  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Failed);
}

#[tokio::test]
async fn test_launch_plan_resolver_error_propagates() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &launch_plan_spec()).await;

  let (handler, _, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      status: Some(ExecutionStatus::Running),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let err = handler.handle(&CancellationToken::new(), &ctx).await.unwrap_err();
  assert!(matches!(err, HandlerError::LaunchPlan { .. }));
}

// --- failing ----------------------------------------------------------------

#[tokio::test]
async fn test_failing_finalizes_both_paths_and_reports_failure() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  ctx
    .state
    .put_dynamic_node_state(DynamicNodeState::failing("sub-graph failed"))
    .unwrap();

  let (handler, task, executor, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let transition = handler.handle(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(transition.phase(), Phase::Failed);
  assert!(transition.error().unwrap().message.contains("sub-graph failed"));
  assert_eq!(task.finalize_calls.load(Ordering::SeqCst), 1);
  assert_eq!(executor.finalize_calls.load(Ordering::SeqCst), 1);
}

// --- finalize ---------------------------------------------------------------

#[tokio::test]
async fn test_finalize_in_none_only_touches_the_task_handler() {
  let ctx = test_context(DynamicNodePhase::None);
  let (handler, task, executor, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  handler.finalize(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(task.finalize_calls.load(Ordering::SeqCst), 1);
  assert_eq!(executor.finalize_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_finalize_in_executing_finalizes_both() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  let (handler, task, executor, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  handler.finalize(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(task.finalize_calls.load(Ordering::SeqCst), 1);
  assert_eq!(executor.finalize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_finalize_joins_errors_from_both_paths() {
  // Parent errors, sub-nodes are still finalized.
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  let (handler, _, executor, _) = build_handler(
    StubTaskHandler {
      finalize_error: Some("parent failed".to_string()),
      ..Default::default()
    },
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  let err = handler.finalize(&CancellationToken::new(), &ctx).await.unwrap_err();
  assert!(matches!(err, HandlerError::Finalize { .. }));
  assert!(err.to_string().contains("parent failed"));
  assert_eq!(executor.finalize_calls.load(Ordering::SeqCst), 1);

  // Sub-nodes error, parent was still finalized.
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  let (handler, task, _, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor {
      finalize_error: Some("child failed".to_string()),
      ..Default::default()
    },
    StubLaunchPlans::default(),
  );

  let err = handler.finalize(&CancellationToken::new(), &ctx).await.unwrap_err();
  assert!(err.to_string().contains("child failed"));
  assert_eq!(task.finalize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_finalize_is_idempotent_on_terminal_state() {
  let ctx = test_context(DynamicNodePhase::Executing);
  write_futures(&ctx, &job_spec()).await;
  let (handler, task, executor, _) = build_handler(
    StubTaskHandler::default(),
    StubExecutor::default(),
    StubLaunchPlans::default(),
  );

  handler.finalize(&CancellationToken::new(), &ctx).await.unwrap();
  handler.finalize(&CancellationToken::new(), &ctx).await.unwrap();
  assert_eq!(task.finalize_calls.load(Ordering::SeqCst), 2);
  assert_eq!(executor.finalize_calls.load(Ordering::SeqCst), 2);
}
