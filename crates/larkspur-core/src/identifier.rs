//! Identifiers for tasks, workflows, launch plans, and executions.

use std::fmt;

/// What kind of resource an [`Identifier`] names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ResourceType {
  Unspecified = 0,
  Task = 1,
  Workflow = 2,
  LaunchPlan = 3,
}

/// A fully qualified, versioned resource name.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Identifier {
  #[prost(enumeration = "ResourceType", tag = "1")]
  pub resource_type: i32,
  #[prost(string, tag = "2")]
  pub project: String,
  #[prost(string, tag = "3")]
  pub domain: String,
  #[prost(string, tag = "4")]
  pub name: String,
  #[prost(string, tag = "5")]
  pub version: String,
}

impl Identifier {
  pub fn new(
    resource_type: ResourceType,
    project: impl Into<String>,
    domain: impl Into<String>,
    name: impl Into<String>,
    version: impl Into<String>,
  ) -> Self {
    Self {
      resource_type: resource_type as i32,
      project: project.into(),
      domain: domain.into(),
      name: name.into(),
      version: version.into(),
    }
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}/{}/{}:{}",
      self.project, self.domain, self.name, self.version
    )
  }
}

/// Names one execution of a workflow.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct WorkflowExecutionIdentifier {
  #[prost(string, tag = "1")]
  pub project: String,
  #[prost(string, tag = "2")]
  pub domain: String,
  #[prost(string, tag = "3")]
  pub name: String,
}

/// Names one node within one workflow execution.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeExecutionIdentifier {
  #[prost(string, tag = "1")]
  pub node_id: String,
  #[prost(message, optional, tag = "2")]
  pub execution_id: Option<WorkflowExecutionIdentifier>,
}

/// Names one attempt of one task under one node execution. Keys catalog
/// artifacts and their metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskExecutionIdentifier {
  #[prost(message, optional, tag = "1")]
  pub task_id: Option<Identifier>,
  #[prost(message, optional, tag = "2")]
  pub node_execution_id: Option<NodeExecutionIdentifier>,
  #[prost(uint32, tag = "3")]
  pub retry_attempt: u32,
}
