/// A dynamic job spec that decoded but cannot be assembled into an
/// executable workflow. These are not retried on the same spec: the
/// handler transitions the node to `Failing` with the error as reason.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  #[error("sub-node '{node_id}' has no executable target")]
  MissingTarget { node_id: String },

  #[error("sub-node '{node_id}' references unknown task {task_id}")]
  UnknownTask { node_id: String, task_id: String },

  #[error("sub-node '{node_id}' references unknown sub-workflow {workflow_id}")]
  UnknownSubWorkflow {
    node_id: String,
    workflow_id: String,
  },

  #[error("sub-node '{node_id}' references launch plan {launch_plan_id} with no resolved closure")]
  UnresolvedLaunchPlan {
    node_id: String,
    launch_plan_id: String,
  },

  #[error("binding for '{var}' references unknown node '{node_id}'")]
  UnknownSourceNode { var: String, node_id: String },

  #[error("binding for '{var}' references unknown output '{source_var}' of node '{node_id}'")]
  UnknownSourceVar {
    var: String,
    node_id: String,
    source_var: String,
  },

  #[error("'{var}' is not a declared output of the parent task")]
  UnknownOutput { var: String },

  #[error("'{var}' is not a declared input of sub-node '{node_id}'")]
  UnknownInputVar { var: String, node_id: String },

  #[error("type mismatch binding '{var}' of '{node_id}': expected {expected}, found {found}")]
  TypeMismatch {
    var: String,
    node_id: String,
    expected: String,
    found: String,
  },
}
