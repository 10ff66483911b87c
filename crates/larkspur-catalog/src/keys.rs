//! Key derivation: dataset ids from task templates and tag names from
//! input literal maps.

use std::collections::HashMap;

use prost::Message;
use sha2::{Digest, Sha256};

use larkspur_core::{LiteralMap, TaskTemplate};

use crate::entities::{Artifact, ArtifactData, DatasetId};
use crate::error::CatalogError;

/// Derive the dataset identity for a task: one dataset per
/// `(project, domain, name, version)`.
pub fn dataset_id_for_task(task: &TaskTemplate) -> Result<DatasetId, CatalogError> {
  let id = task.id.as_ref().ok_or_else(|| CatalogError::InvalidTask {
    message: "task id is required to derive a dataset".to_string(),
  })?;
  Ok(DatasetId {
    project: id.project.clone(),
    domain: id.domain.clone(),
    name: id.name.clone(),
    version: id.version.clone(),
  })
}

/// Derive the tag name for an input literal map.
///
/// The serialization is canonical: variables are hashed in sorted name
/// order with framing bytes between name and value, so logically equal
/// maps always produce the same tag. An empty map still produces a tag, so
/// zero-input tasks remain cacheable.
pub fn tag_name(inputs: &LiteralMap) -> String {
  let mut names: Vec<&String> = inputs.literals.keys().collect();
  names.sort();

  let mut hasher = Sha256::new();
  for name in names {
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(inputs.literals[name].encode_to_vec());
    hasher.update([0xffu8]);
  }
  format!("cached-{:x}", hasher.finalize())
}

/// Rebuild a task's declared outputs from an artifact's data list,
/// preserving variable names. Every declared output must be present.
pub fn outputs_from_artifact(
  task: &TaskTemplate,
  artifact: &Artifact,
) -> Result<LiteralMap, CatalogError> {
  let declared = match task.declared_outputs() {
    Some(declared) if !declared.is_empty() => declared,
    _ => return Ok(LiteralMap::default()),
  };

  let by_name: HashMap<&str, &ArtifactData> =
    artifact.data.iter().map(|d| (d.name.as_str(), d)).collect();

  let mut literals = HashMap::with_capacity(declared.len());
  for name in declared.keys() {
    let data = by_name
      .get(name.as_str())
      .and_then(|d| d.value.clone())
      .ok_or_else(|| CatalogError::MissingOutput {
        artifact_id: artifact.id.clone(),
        name: name.clone(),
      })?;
    literals.insert(name.clone(), data);
  }
  Ok(LiteralMap::new(literals))
}
