//! Assembles a virtual workflow from a dynamic job spec and the parent
//! task's declared interface.
//!
//! The synthesized workflow has a synthetic start node mirroring the
//! parent's inputs, the user sub-nodes renamed into the parent's namespace,
//! and a synthetic end node whose inputs are exactly the parent's declared
//! outputs. Every binding is type-checked before anything executes.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use larkspur_core::{
  binding_data, futures_file, literal, node_spec, primitive, workflow_node, Binding, BindingData,
  CompiledNode, CompiledTarget, DynamicJobSpec, Identifier, Literal, LiteralType, SimpleType,
  TaskTemplate, TypedInterface, VariableMap, VirtualWorkflow, WorkflowTemplate, DYNAMIC_NODE_ID,
  END_NODE_ID, START_NODE_ID,
};
use larkspur_node::{HandlerError, LaunchPlanClosure, LaunchPlanReader, NodeExecutionContext};
use larkspur_storage::StorageError;

use crate::error::BuildError;
use crate::stitch::sub_node_id;

/// Result of attempting to build the contextual sub-workflow.
pub enum BuildOutcome {
  /// No (or an empty) dynamic job spec: the node is a plain task.
  NotDynamic,
  /// The spec assembled and type-checked.
  Workflow(VirtualWorkflow),
  /// The spec decoded but is semantically invalid; not retryable on the
  /// same spec.
  Invalid(BuildError),
}

/// Read the dynamic job spec side-channel, if the parent task produced one.
///
/// Not-found means the node is not dynamic. Any other storage failure is
/// surfaced so the controller retries the tick.
pub(crate) async fn read_dynamic_spec(
  node_ctx: &dyn NodeExecutionContext,
) -> Result<Option<DynamicJobSpec>, HandlerError> {
  let futures = futures_file(&node_ctx.node_status().output_dir());
  match node_ctx
    .data_store()
    .as_ref()
    .read_protobuf::<DynamicJobSpec>(&futures)
    .await
  {
    Ok(spec) if spec.is_empty() => Ok(None),
    Ok(spec) => Ok(Some(spec)),
    Err(StorageError::NotFound { .. }) => Ok(None),
    Err(e) => Err(e.into()),
  }
}

/// Build the executable sub-workflow for the node's current attempt.
///
/// Launch plans are resolved through `launch_plans` at most once per unique
/// id per invocation.
pub async fn build_contextual_workflow(
  cancel: &CancellationToken,
  node_ctx: &dyn NodeExecutionContext,
  launch_plans: &dyn LaunchPlanReader,
) -> Result<BuildOutcome, HandlerError> {
  let Some(spec) = read_dynamic_spec(node_ctx).await? else {
    return Ok(BuildOutcome::NotDynamic);
  };

  let parent_task = node_ctx.task_reader().read(cancel).await?;

  let mut closures: HashMap<Identifier, LaunchPlanClosure> = HashMap::new();
  for node in &spec.nodes {
    if let Some(node_spec::Target::Workflow(wf)) = &node.target {
      if let Some(workflow_node::Reference::LaunchplanRef(id)) = &wf.reference {
        if !closures.contains_key(id) {
          let closure = launch_plans.get_launch_plan(cancel, id).await?;
          closures.insert(id.clone(), closure);
        }
      }
    }
  }

  let nodes = match assemble(
    &spec,
    &parent_task,
    node_ctx.node_id(),
    node_ctx.current_attempt(),
    &closures,
  ) {
    Ok(nodes) => nodes,
    Err(err) => return Ok(BuildOutcome::Invalid(err)),
  };

  let workflow = VirtualWorkflow::new(
    format!("{}-{}", node_ctx.node_id(), node_ctx.current_attempt()),
    spec.min_successes,
    parent_task.interface.clone().unwrap_or_default(),
    nodes,
    node_ctx.node_status().node_execution_status(DYNAMIC_NODE_ID),
  );
  debug!(
    node_id = node_ctx.node_id(),
    nodes = workflow.nodes().count(),
    "assembled contextual sub-workflow"
  );
  Ok(BuildOutcome::Workflow(workflow))
}

/// Pure assembly: rename, synthesize start/end, type-check.
fn assemble(
  spec: &DynamicJobSpec,
  parent_task: &TaskTemplate,
  parent_node_id: &str,
  attempt: u32,
  launch_plans: &HashMap<Identifier, LaunchPlanClosure>,
) -> Result<Vec<CompiledNode>, BuildError> {
  let tasks: HashMap<&Identifier, &TaskTemplate> = spec
    .tasks
    .iter()
    .filter_map(|t| t.id.as_ref().map(|id| (id, t)))
    .collect();
  let subworkflows: HashMap<&Identifier, &WorkflowTemplate> = spec
    .subworkflows
    .iter()
    .filter_map(|w| w.id.as_ref().map(|id| (id, w)))
    .collect();

  let rename = |id: &str| -> String {
    if id == START_NODE_ID || id == END_NODE_ID {
      id.to_string()
    } else {
      sub_node_id(parent_node_id, attempt, id)
    }
  };

  let mut nodes: Vec<CompiledNode> = Vec::with_capacity(spec.nodes.len() + 2);
  nodes.push(CompiledNode {
    id: START_NODE_ID.to_string(),
    target: CompiledTarget::Start,
    inputs: vec![],
    upstream_node_ids: vec![],
  });

  for node in &spec.nodes {
    let target = compile_target(node.id.as_str(), node, &tasks, &subworkflows, launch_plans)?;

    let inputs: Vec<Binding> = node.inputs.iter().map(|b| rename_binding(b, &rename)).collect();
    let mut upstream: Vec<String> = node.upstream_node_ids.iter().map(|id| rename(id)).collect();
    if upstream.is_empty() {
      upstream = promise_sources(&inputs);
    }
    if upstream.is_empty() {
      upstream.push(START_NODE_ID.to_string());
    }

    nodes.push(CompiledNode {
      id: rename(&node.id),
      target,
      inputs,
      upstream_node_ids: upstream,
    });
  }

  let end_inputs: Vec<Binding> = spec
    .outputs
    .iter()
    .map(|b| rename_binding(b, &rename))
    .collect();
  let end_upstream = promise_sources(&end_inputs);
  nodes.push(CompiledNode {
    id: END_NODE_ID.to_string(),
    target: CompiledTarget::End,
    inputs: end_inputs,
    upstream_node_ids: end_upstream,
  });

  type_check(&nodes, parent_task)?;
  Ok(nodes)
}

fn compile_target(
  node_id: &str,
  node: &larkspur_core::NodeSpec,
  tasks: &HashMap<&Identifier, &TaskTemplate>,
  subworkflows: &HashMap<&Identifier, &WorkflowTemplate>,
  launch_plans: &HashMap<Identifier, LaunchPlanClosure>,
) -> Result<CompiledTarget, BuildError> {
  match &node.target {
    Some(node_spec::Target::Task(task_node)) => {
      let reference = task_node
        .reference_id
        .as_ref()
        .ok_or_else(|| BuildError::MissingTarget {
          node_id: node_id.to_string(),
        })?;
      let template = tasks.get(reference).ok_or_else(|| BuildError::UnknownTask {
        node_id: node_id.to_string(),
        task_id: reference.to_string(),
      })?;
      Ok(CompiledTarget::Task((*template).clone()))
    }
    Some(node_spec::Target::Workflow(wf)) => match &wf.reference {
      Some(workflow_node::Reference::LaunchplanRef(id)) => {
        let closure =
          launch_plans
            .get(id)
            .ok_or_else(|| BuildError::UnresolvedLaunchPlan {
              node_id: node_id.to_string(),
              launch_plan_id: id.to_string(),
            })?;
        Ok(CompiledTarget::LaunchPlan {
          id: id.clone(),
          interface: interface_from_closure(closure),
        })
      }
      Some(workflow_node::Reference::SubWorkflowRef(id)) => {
        let template =
          subworkflows
            .get(id)
            .ok_or_else(|| BuildError::UnknownSubWorkflow {
              node_id: node_id.to_string(),
              workflow_id: id.to_string(),
            })?;
        Ok(CompiledTarget::SubWorkflow((*template).clone()))
      }
      None => Err(BuildError::MissingTarget {
        node_id: node_id.to_string(),
      }),
    },
    None => Err(BuildError::MissingTarget {
      node_id: node_id.to_string(),
    }),
  }
}

/// A launch plan's closure expressed as a plain typed interface.
fn interface_from_closure(closure: &LaunchPlanClosure) -> TypedInterface {
  let inputs = closure
    .expected_inputs
    .parameters
    .iter()
    .filter_map(|(name, p)| p.var.clone().map(|v| (name.clone(), v)))
    .collect();
  TypedInterface {
    inputs: Some(VariableMap::new(inputs)),
    outputs: Some(closure.expected_outputs.clone()),
  }
}

fn rename_binding(binding: &Binding, rename: &dyn Fn(&str) -> String) -> Binding {
  let mut renamed = binding.clone();
  if let Some(BindingData {
    value: Some(binding_data::Value::Promise(promise)),
  }) = &mut renamed.binding
  {
    promise.node_id = rename(&promise.node_id);
  }
  renamed
}

/// Distinct promise-source node ids, in binding order.
fn promise_sources(bindings: &[Binding]) -> Vec<String> {
  let mut sources: Vec<String> = Vec::new();
  for binding in bindings {
    if let Some(BindingData {
      value: Some(binding_data::Value::Promise(promise)),
    }) = &binding.binding
    {
      if !sources.contains(&promise.node_id) {
        sources.push(promise.node_id.clone());
      }
    }
  }
  sources
}

/// Verify every binding in the graph: the source variable's literal type
/// must equal the target variable's declared type. The end node's targets
/// are the parent task's declared outputs, so launch-plan outputs bound
/// into the end node are checked against the parent interface here.
fn type_check(nodes: &[CompiledNode], parent_task: &TaskTemplate) -> Result<(), BuildError> {
  let by_id: HashMap<&str, &CompiledNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
  let parent_interface = parent_task.interface.clone().unwrap_or_default();

  for node in nodes {
    for binding in &node.inputs {
      let expected = target_var_type(node, &binding.var, &parent_interface)?;
      let found = source_var_type(binding, &by_id, &parent_interface)?;
      if let (Some(expected), Some(found)) = (expected, found) {
        if expected != found {
          return Err(BuildError::TypeMismatch {
            var: binding.var.clone(),
            node_id: node.id.clone(),
            expected: expected.to_string(),
            found: found.to_string(),
          });
        }
      }
    }
  }
  Ok(())
}

fn target_var_type(
  node: &CompiledNode,
  var: &str,
  parent_interface: &TypedInterface,
) -> Result<Option<LiteralType>, BuildError> {
  let declared = match &node.target {
    CompiledTarget::End => parent_interface.output_variables(),
    CompiledTarget::Task(template) => template.declared_inputs(),
    CompiledTarget::LaunchPlan { interface, .. } => interface.input_variables(),
    CompiledTarget::SubWorkflow(template) => {
      template.interface.as_ref().and_then(|i| i.input_variables())
    }
    CompiledTarget::Start => None,
  };

  let variable = declared.and_then(|vars| vars.get(var));
  match variable {
    Some(variable) => Ok(variable.literal_type.clone()),
    None if matches!(node.target, CompiledTarget::End) => Err(BuildError::UnknownOutput {
      var: var.to_string(),
    }),
    None => Err(BuildError::UnknownInputVar {
      var: var.to_string(),
      node_id: node.id.clone(),
    }),
  }
}

fn source_var_type(
  binding: &Binding,
  by_id: &HashMap<&str, &CompiledNode>,
  parent_interface: &TypedInterface,
) -> Result<Option<LiteralType>, BuildError> {
  match &binding.binding {
    Some(BindingData {
      value: Some(binding_data::Value::Promise(promise)),
    }) => {
      if promise.node_id == START_NODE_ID {
        return parent_interface
          .input_variables()
          .and_then(|vars| vars.get(&promise.var))
          .map(|v| v.literal_type.clone())
          .ok_or_else(|| BuildError::UnknownSourceVar {
            var: binding.var.clone(),
            node_id: START_NODE_ID.to_string(),
            source_var: promise.var.clone(),
          });
      }

      let source = by_id
        .get(promise.node_id.as_str())
        .ok_or_else(|| BuildError::UnknownSourceNode {
          var: binding.var.clone(),
          node_id: promise.node_id.clone(),
        })?;

      let outputs = match &source.target {
        CompiledTarget::Task(template) => template.declared_outputs(),
        CompiledTarget::LaunchPlan { interface, .. } => interface.output_variables(),
        CompiledTarget::SubWorkflow(template) => {
          template.interface.as_ref().and_then(|i| i.output_variables())
        }
        CompiledTarget::Start | CompiledTarget::End => None,
      };

      outputs
        .and_then(|vars| vars.get(&promise.var))
        .map(|v| v.literal_type.clone())
        .ok_or_else(|| BuildError::UnknownSourceVar {
          var: binding.var.clone(),
          node_id: promise.node_id.clone(),
          source_var: promise.var.clone(),
        })
    }
    Some(BindingData {
      value: Some(binding_data::Value::Scalar(value)),
    }) => Ok(primitive_type_of(value)),
    _ => Ok(None),
  }
}

/// The literal type of a scalar literal, when it can be told from the
/// value alone.
fn primitive_type_of(value: &Literal) -> Option<LiteralType> {
  if let Some(literal::Value::Primitive(p)) = &value.value {
    let simple = match p.value.as_ref()? {
      primitive::Value::Integer(_) => SimpleType::Integer,
      primitive::Value::FloatValue(_) => SimpleType::Float,
      primitive::Value::StringValue(_) => SimpleType::String,
      primitive::Value::Boolean(_) => SimpleType::Boolean,
    };
    return Some(LiteralType::simple(simple));
  }
  None
}
