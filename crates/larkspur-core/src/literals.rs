//! Literal values and literal types.
//!
//! These are the protobuf wire shapes for everything a task consumes or
//! produces. A [`LiteralMap`] is the unit of exchange: task inputs, task
//! outputs, and catalog artifact data are all literal maps.

use std::collections::HashMap;
use std::fmt;

/// Scalar value kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SimpleType {
  None = 0,
  Integer = 1,
  Float = 2,
  String = 3,
  Boolean = 4,
}

/// A single scalar value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Primitive {
  #[prost(oneof = "primitive::Value", tags = "1, 2, 3, 4")]
  pub value: Option<primitive::Value>,
}

pub mod primitive {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Value {
    #[prost(int64, tag = "1")]
    Integer(i64),
    #[prost(double, tag = "2")]
    FloatValue(f64),
    #[prost(string, tag = "3")]
    StringValue(String),
    #[prost(bool, tag = "4")]
    Boolean(bool),
  }
}

/// A literal value: a scalar, a collection, or a map.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Literal {
  #[prost(oneof = "literal::Value", tags = "1, 2, 3")]
  pub value: Option<literal::Value>,
}

pub mod literal {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Value {
    #[prost(message, tag = "1")]
    Primitive(super::Primitive),
    #[prost(message, tag = "2")]
    Collection(super::LiteralCollection),
    #[prost(message, tag = "3")]
    Map(super::LiteralMap),
  }
}

/// An ordered list of literals.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralCollection {
  #[prost(message, repeated, tag = "1")]
  pub literals: Vec<Literal>,
}

/// Named literals. The unit of exchange between tasks, nodes, and the
/// catalog.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralMap {
  #[prost(map = "string, message", tag = "1")]
  pub literals: HashMap<String, Literal>,
}

/// The type of a literal.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiteralType {
  #[prost(oneof = "literal_type::Type", tags = "1, 2, 3")]
  pub r#type: Option<literal_type::Type>,
}

pub mod literal_type {
  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Type {
    #[prost(enumeration = "super::SimpleType", tag = "1")]
    Simple(i32),
    /// Element type of a homogeneous collection.
    #[prost(message, tag = "2")]
    CollectionType(Box<super::LiteralType>),
    /// Value type of a string-keyed map.
    #[prost(message, tag = "3")]
    MapValueType(Box<super::LiteralType>),
  }
}

impl Literal {
  pub fn integer(value: i64) -> Self {
    Self::primitive(primitive::Value::Integer(value))
  }

  pub fn float(value: f64) -> Self {
    Self::primitive(primitive::Value::FloatValue(value))
  }

  pub fn string(value: impl Into<String>) -> Self {
    Self::primitive(primitive::Value::StringValue(value.into()))
  }

  pub fn boolean(value: bool) -> Self {
    Self::primitive(primitive::Value::Boolean(value))
  }

  fn primitive(value: primitive::Value) -> Self {
    Self {
      value: Some(literal::Value::Primitive(Primitive { value: Some(value) })),
    }
  }
}

impl LiteralMap {
  pub fn new(literals: HashMap<String, Literal>) -> Self {
    Self { literals }
  }

  pub fn is_empty(&self) -> bool {
    self.literals.is_empty()
  }
}

impl LiteralType {
  pub fn simple(simple: SimpleType) -> Self {
    Self {
      r#type: Some(literal_type::Type::Simple(simple as i32)),
    }
  }

  pub fn collection(element: LiteralType) -> Self {
    Self {
      r#type: Some(literal_type::Type::CollectionType(Box::new(element))),
    }
  }

  pub fn map_value(value: LiteralType) -> Self {
    Self {
      r#type: Some(literal_type::Type::MapValueType(Box::new(value))),
    }
  }
}

impl fmt::Display for LiteralType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.r#type {
      Some(literal_type::Type::Simple(simple)) => {
        match SimpleType::try_from(*simple) {
          Ok(SimpleType::None) => write!(f, "none"),
          Ok(SimpleType::Integer) => write!(f, "integer"),
          Ok(SimpleType::Float) => write!(f, "float"),
          Ok(SimpleType::String) => write!(f, "string"),
          Ok(SimpleType::Boolean) => write!(f, "boolean"),
          Err(_) => write!(f, "simple({})", simple),
        }
      }
      Some(literal_type::Type::CollectionType(element)) => write!(f, "collection<{}>", element),
      Some(literal_type::Type::MapValueType(value)) => write!(f, "map<string, {}>", value),
      None => write!(f, "unspecified"),
    }
  }
}
