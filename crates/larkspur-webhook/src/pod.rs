//! A minimal Kubernetes pod manifest model.
//!
//! Only the fields the transformers touch are modeled; serialization
//! follows the Kubernetes JSON conventions (camelCase, empty collections
//! omitted) so manifests survive a round trip through the webhook.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub name: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub namespace: String,
  #[serde(skip_serializing_if = "HashMap::is_empty")]
  pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pod {
  pub metadata: ObjectMeta,
  pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub init_containers: Vec<Container>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub containers: Vec<Container>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
  pub name: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<EnvVar>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvVar {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeMount {
  pub name: String,
  pub mount_path: String,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret: Option<SecretVolumeSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretVolumeSource {
  pub secret_name: String,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub optional: bool,
}
