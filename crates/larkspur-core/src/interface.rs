//! Typed interfaces: the named, typed variables a task or workflow
//! declares as its inputs and outputs.

use std::collections::HashMap;

use crate::literals::LiteralType;

/// A named variable declaration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Variable {
  #[prost(message, optional, tag = "1")]
  pub literal_type: Option<LiteralType>,
  #[prost(string, tag = "2")]
  pub description: String,
}

impl Variable {
  pub fn new(literal_type: LiteralType) -> Self {
    Self {
      literal_type: Some(literal_type),
      description: String::new(),
    }
  }
}

/// A map of variable name to declaration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VariableMap {
  #[prost(map = "string, message", tag = "1")]
  pub variables: HashMap<String, Variable>,
}

impl VariableMap {
  pub fn new(variables: HashMap<String, Variable>) -> Self {
    Self { variables }
  }

  pub fn is_empty(&self) -> bool {
    self.variables.is_empty()
  }
}

/// An input parameter: a variable plus whether a caller must bind it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Parameter {
  #[prost(message, optional, tag = "1")]
  pub var: Option<Variable>,
  #[prost(bool, tag = "2")]
  pub required: bool,
}

/// A map of parameter name to declaration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParameterMap {
  #[prost(map = "string, message", tag = "1")]
  pub parameters: HashMap<String, Parameter>,
}

/// The declared inputs and outputs of a task or workflow.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypedInterface {
  #[prost(message, optional, tag = "1")]
  pub inputs: Option<VariableMap>,
  #[prost(message, optional, tag = "2")]
  pub outputs: Option<VariableMap>,
}

impl TypedInterface {
  /// Declared input variables, if any.
  pub fn input_variables(&self) -> Option<&HashMap<String, Variable>> {
    self.inputs.as_ref().map(|m| &m.variables)
  }

  /// Declared output variables, if any.
  pub fn output_variables(&self) -> Option<&HashMap<String, Variable>> {
    self.outputs.as_ref().map(|m| &m.variables)
  }
}
