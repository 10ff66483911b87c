//! The caching client: `get` resolves cached outputs for a task + inputs,
//! `put` records an execution's outputs as the canonical cache entry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tonic::Code;
use tracing::{debug, warn};
use uuid::Uuid;

use larkspur_core::{LiteralMap, TaskExecutionIdentifier, TaskTemplate};
use larkspur_storage::{DataReference, ProtobufStore};

use crate::entities::{Artifact, ArtifactData, Dataset, Metadata, Tag};
use crate::error::CatalogError;
use crate::keys::{dataset_id_for_task, outputs_from_artifact, tag_name};
use crate::retry::with_retries;
use crate::service::CatalogService;

const TASK_VERSION_KEY: &str = "task-version";
const TASK_EXEC_KEY: &str = "execution-name";

/// Client-side retry knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
  pub max_attempts: u32,
  pub backoff_base_ms: u64,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      backoff_base_ms: 100,
    }
  }
}

/// Result of a cache lookup. A miss is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
  Cached(LiteralMap),
  Miss,
}

/// Caches task executions to the catalog service.
pub struct CatalogClient {
  service: Arc<dyn CatalogService>,
  store: Arc<dyn ProtobufStore>,
  config: CatalogConfig,
}

impl CatalogClient {
  pub fn new(service: Arc<dyn CatalogService>, store: Arc<dyn ProtobufStore>) -> Self {
    Self::with_config(service, store, CatalogConfig::default())
  }

  pub fn with_config(
    service: Arc<dyn CatalogService>,
    store: Arc<dyn ProtobufStore>,
    config: CatalogConfig,
  ) -> Self {
    Self {
      service,
      store,
      config,
    }
  }

  fn backoff_base(&self) -> Duration {
    Duration::from_millis(self.config.backoff_base_ms)
  }

  fn validate_task(task: &TaskTemplate) -> Result<(), CatalogError> {
    if task.interface.is_none() {
      return Err(CatalogError::InvalidTask {
        message: "task interface cannot be empty".to_string(),
      });
    }
    if task.id.is_none() {
      return Err(CatalogError::InvalidTask {
        message: "task id cannot be empty".to_string(),
      });
    }
    if task.metadata.is_none() {
      return Err(CatalogError::InvalidTask {
        message: "task metadata cannot be empty".to_string(),
      });
    }
    Ok(())
  }

  async fn read_literal_map(
    &self,
    declared: bool,
    path: &DataReference,
  ) -> Result<LiteralMap, CatalogError> {
    if !declared {
      return Ok(LiteralMap::default());
    }
    Ok(self.store.as_ref().read_protobuf(path).await?)
  }

  /// Look up the cached outputs for a task and the inputs at `input_path`.
  ///
  /// A missing dataset, tag, or artifact is a [`CatalogEntry::Miss`];
  /// everything else surfaces as an error.
  pub async fn get(
    &self,
    cancel: &CancellationToken,
    task: &TaskTemplate,
    input_path: &DataReference,
  ) -> Result<CatalogEntry, CatalogError> {
    Self::validate_task(task)?;

    let has_inputs = task.declared_inputs().is_some_and(|v| !v.is_empty());
    let inputs = self.read_literal_map(has_inputs, input_path).await?;

    let dataset_id = dataset_id_for_task(task)?;
    let dataset = match with_retries(self.config.max_attempts, self.backoff_base(), cancel, || {
      self.service.get_dataset(&dataset_id)
    })
    .await
    {
      Ok(dataset) => dataset,
      Err(status) if status.code() == Code::NotFound => {
        debug!(
          dataset = %dataset_id.name,
          version = %dataset_id.version,
          "cache miss: no dataset"
        );
        return Ok(CatalogEntry::Miss);
      }
      Err(status) => return Err(status.into()),
    };

    let tag = tag_name(&inputs);
    let dataset_id = dataset.id.unwrap_or(dataset_id);
    let artifact = match with_retries(self.config.max_attempts, self.backoff_base(), cancel, || {
      self.service.get_artifact(&dataset_id, &tag)
    })
    .await
    {
      Ok(artifact) => artifact,
      Err(status) if status.code() == Code::NotFound => {
        debug!(%tag, "cache miss: no artifact for tag");
        return Ok(CatalogEntry::Miss);
      }
      Err(status) => return Err(status.into()),
    };

    let outputs = outputs_from_artifact(task, &artifact)?;
    debug!(artifact_id = %artifact.id, outputs = outputs.literals.len(), "cache hit");
    Ok(CatalogEntry::Cached(outputs))
  }

  /// Record the execution's outputs as the cached artifact for its inputs.
  ///
  /// Creates the dataset if needed, creates a fresh artifact, then tags it
  /// with the input hash. `ALREADY_EXISTS` is success for both the dataset
  /// and the tag. Artifact creation and tagging are not atomic; a crash in
  /// between leaves an untagged artifact for out-of-band collection.
  pub async fn put(
    &self,
    cancel: &CancellationToken,
    task: &TaskTemplate,
    exec_id: &TaskExecutionIdentifier,
    input_path: &DataReference,
    output_path: &DataReference,
  ) -> Result<(), CatalogError> {
    Self::validate_task(task)?;

    let has_inputs = task.declared_inputs().is_some_and(|v| !v.is_empty());
    let inputs = self.read_literal_map(has_inputs, input_path).await?;

    let has_outputs = task.declared_outputs().is_some_and(|v| !v.is_empty());
    let outputs = self.read_literal_map(has_outputs, output_path).await?;

    let dataset_id = dataset_id_for_task(task)?;

    let execution_node = exec_id
      .node_execution_id
      .as_ref()
      .map(|n| n.node_id.clone())
      .unwrap_or_default();
    let task_version = task.id.as_ref().map(|id| id.version.clone()).unwrap_or_default();
    let metadata = Metadata {
      key_map: [
        (TASK_VERSION_KEY.to_string(), task_version),
        (TASK_EXEC_KEY.to_string(), execution_node),
      ]
      .into(),
    };

    let dataset = Dataset {
      id: Some(dataset_id.clone()),
      metadata: Some(metadata.clone()),
    };
    match with_retries(self.config.max_attempts, self.backoff_base(), cancel, || {
      self.service.create_dataset(dataset.clone())
    })
    .await
    {
      Ok(()) => {}
      Err(status) if status.code() == Code::AlreadyExists => {
        debug!(dataset = %dataset_id.name, "dataset already exists");
      }
      Err(status) => return Err(status.into()),
    }

    let mut data: Vec<ArtifactData> = outputs
      .literals
      .iter()
      .map(|(name, value)| ArtifactData {
        name: name.clone(),
        value: Some(value.clone()),
      })
      .collect();
    data.sort_by(|a, b| a.name.cmp(&b.name));

    let artifact = Artifact {
      id: Uuid::new_v4().to_string(),
      dataset: Some(dataset_id.clone()),
      data,
      metadata: Some(metadata),
      created_at: String::new(),
    };
    with_retries(self.config.max_attempts, self.backoff_base(), cancel, || {
      self.service.create_artifact(artifact.clone())
    })
    .await?;
    debug!(artifact_id = %artifact.id, outputs = artifact.data.len(), "created artifact");

    let tag = Tag {
      name: tag_name(&inputs),
      artifact_id: artifact.id.clone(),
      dataset: Some(dataset_id),
    };
    match with_retries(self.config.max_attempts, self.backoff_base(), cancel, || {
      self.service.add_tag(tag.clone())
    })
    .await
    {
      Ok(()) => Ok(()),
      Err(status) if status.code() == Code::AlreadyExists => {
        // Another attempt already tagged these inputs; the cache entry is
        // in place, which is all put promises.
        warn!(tag = %tag.name, artifact_id = %artifact.id, "tag already exists (idempotent)");
        Ok(())
      }
      Err(status) => Err(status.into()),
    }
  }
}
