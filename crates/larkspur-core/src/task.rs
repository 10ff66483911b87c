//! Task templates: the versioned, typed definition of a unit of work.

use std::collections::HashMap;

use crate::identifier::Identifier;
use crate::interface::{TypedInterface, Variable};

/// Execution metadata attached to a task template.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskMetadata {
  /// Whether outputs of this task may be served from the catalog cache.
  #[prost(bool, tag = "1")]
  pub discoverable: bool,
  /// Cache version; bumping it invalidates previously cached outputs.
  #[prost(string, tag = "2")]
  pub discovery_version: String,
}

/// The full definition of a task as shipped to plugins and the catalog.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskTemplate {
  #[prost(message, optional, tag = "1")]
  pub id: Option<Identifier>,
  #[prost(string, tag = "2")]
  pub task_type: String,
  #[prost(message, optional, tag = "3")]
  pub metadata: Option<TaskMetadata>,
  #[prost(message, optional, tag = "4")]
  pub interface: Option<TypedInterface>,
}

impl TaskTemplate {
  /// Declared input variables, or `None` when the task takes no inputs.
  pub fn declared_inputs(&self) -> Option<&HashMap<String, Variable>> {
    self.interface.as_ref().and_then(|i| i.input_variables())
  }

  /// Declared output variables, or `None` when the task produces none.
  pub fn declared_outputs(&self) -> Option<&HashMap<String, Variable>> {
    self.interface.as_ref().and_then(|i| i.output_variables())
  }

  /// Whether the task advertises catalog caching.
  pub fn is_discoverable(&self) -> bool {
    self.metadata.as_ref().is_some_and(|m| m.discoverable)
  }
}
