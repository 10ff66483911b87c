//! Wire entities of the catalog service.

use std::collections::HashMap;

use larkspur_core::Literal;

/// Identifies a dataset: one version of one task.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DatasetId {
  #[prost(string, tag = "1")]
  pub project: String,
  #[prost(string, tag = "2")]
  pub domain: String,
  #[prost(string, tag = "3")]
  pub name: String,
  #[prost(string, tag = "4")]
  pub version: String,
}

/// Free-form key/value annotations on datasets and artifacts.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
  #[prost(map = "string, string", tag = "1")]
  pub key_map: HashMap<String, String>,
}

/// A dataset shared by all executions of a task version.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Dataset {
  #[prost(message, optional, tag = "1")]
  pub id: Option<DatasetId>,
  #[prost(message, optional, tag = "2")]
  pub metadata: Option<Metadata>,
}

/// One named output literal inside an artifact.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArtifactData {
  #[prost(string, tag = "1")]
  pub name: String,
  #[prost(message, optional, tag = "2")]
  pub value: Option<Literal>,
}

/// The cached outputs of one task execution. Immutable once created.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Artifact {
  #[prost(string, tag = "1")]
  pub id: String,
  #[prost(message, optional, tag = "2")]
  pub dataset: Option<DatasetId>,
  #[prost(message, repeated, tag = "3")]
  pub data: Vec<ArtifactData>,
  #[prost(message, optional, tag = "4")]
  pub metadata: Option<Metadata>,
  /// RFC 3339 creation time, stamped by the service.
  #[prost(string, tag = "5")]
  pub created_at: String,
}

/// Binds an input-hash tag name to one artifact within a dataset.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tag {
  #[prost(string, tag = "1")]
  pub name: String,
  #[prost(string, tag = "2")]
  pub artifact_id: String,
  #[prost(message, optional, tag = "3")]
  pub dataset: Option<DatasetId>,
}
