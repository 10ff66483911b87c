//! The catalog service seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tonic::Status;

use crate::entities::{Artifact, Dataset, DatasetId, Tag};

/// The RPC surface of the remote catalog service.
///
/// Transport setup (gRPC channel, credentials) is owned by the process
/// bootstrap; handlers only see this trait. Errors use standard status
/// codes; `ALREADY_EXISTS` is semantically idempotent for creates and tags.
#[async_trait]
pub trait CatalogService: Send + Sync {
  async fn get_dataset(&self, id: &DatasetId) -> Result<Dataset, Status>;

  async fn create_dataset(&self, dataset: Dataset) -> Result<(), Status>;

  /// Resolve the artifact a tag points to within a dataset.
  async fn get_artifact(&self, dataset: &DatasetId, tag_name: &str) -> Result<Artifact, Status>;

  async fn create_artifact(&self, artifact: Artifact) -> Result<(), Status>;

  async fn add_tag(&self, tag: Tag) -> Result<(), Status>;
}

fn dataset_key(id: &DatasetId) -> String {
  format!("{}/{}/{}/{}", id.project, id.domain, id.name, id.version)
}

#[derive(Default)]
struct MemoryCatalogState {
  datasets: HashMap<String, Dataset>,
  artifacts: HashMap<(String, String), Artifact>,
  tags: HashMap<(String, String), String>,
}

/// In-memory catalog service.
///
/// Backs tests; mirrors the remote service's conflict semantics, including
/// tag uniqueness within a dataset.
#[derive(Default)]
pub struct MemoryCatalog {
  state: Mutex<MemoryCatalogState>,
}

impl MemoryCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryCatalogState>, Status> {
    self
      .state
      .lock()
      .map_err(|e| Status::internal(format!("memory catalog lock poisoned: {}", e)))
  }
}

#[async_trait]
impl CatalogService for MemoryCatalog {
  async fn get_dataset(&self, id: &DatasetId) -> Result<Dataset, Status> {
    let state = self.lock()?;
    state
      .datasets
      .get(&dataset_key(id))
      .cloned()
      .ok_or_else(|| Status::not_found(format!("dataset {} not found", dataset_key(id))))
  }

  async fn create_dataset(&self, dataset: Dataset) -> Result<(), Status> {
    let id = dataset
      .id
      .as_ref()
      .ok_or_else(|| Status::invalid_argument("dataset id is required"))?;
    let key = dataset_key(id);

    let mut state = self.lock()?;
    if state.datasets.contains_key(&key) {
      return Err(Status::already_exists(format!(
        "dataset {} already exists",
        key
      )));
    }
    state.datasets.insert(key, dataset);
    Ok(())
  }

  async fn get_artifact(&self, dataset: &DatasetId, tag_name: &str) -> Result<Artifact, Status> {
    let key = dataset_key(dataset);
    let state = self.lock()?;
    let artifact_id = state
      .tags
      .get(&(key.clone(), tag_name.to_string()))
      .ok_or_else(|| Status::not_found(format!("tag {} not found in dataset {}", tag_name, key)))?;
    state
      .artifacts
      .get(&(key.clone(), artifact_id.clone()))
      .cloned()
      .ok_or_else(|| Status::not_found(format!("artifact {} not found", artifact_id)))
  }

  async fn create_artifact(&self, mut artifact: Artifact) -> Result<(), Status> {
    let dataset = artifact
      .dataset
      .as_ref()
      .ok_or_else(|| Status::invalid_argument("artifact dataset is required"))?;
    let key = (dataset_key(dataset), artifact.id.clone());

    let mut state = self.lock()?;
    if !state.datasets.contains_key(&key.0) {
      return Err(Status::not_found(format!("dataset {} not found", key.0)));
    }
    if state.artifacts.contains_key(&key) {
      return Err(Status::already_exists(format!(
        "artifact {} already exists",
        artifact.id
      )));
    }
    if artifact.created_at.is_empty() {
      artifact.created_at = chrono::Utc::now().to_rfc3339();
    }
    state.artifacts.insert(key, artifact);
    Ok(())
  }

  async fn add_tag(&self, tag: Tag) -> Result<(), Status> {
    let dataset = tag
      .dataset
      .as_ref()
      .ok_or_else(|| Status::invalid_argument("tag dataset is required"))?;
    let key = (dataset_key(dataset), tag.name.clone());

    let mut state = self.lock()?;
    if state.tags.contains_key(&key) {
      return Err(Status::already_exists(format!(
        "tag {} already exists in dataset {}",
        tag.name, key.0
      )));
    }
    state.tags.insert(key, tag.artifact_id);
    Ok(())
  }
}
