use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::reference::DataReference;
use crate::store::{Options, ProtobufStore, StorageError};

/// In-memory blob store.
///
/// Backs tests and local runs; everything is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
  blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ProtobufStore for MemoryStore {
  async fn read_raw(&self, reference: &DataReference) -> Result<Vec<u8>, StorageError> {
    let blobs = self.blobs.read().map_err(|e| StorageError::Backend {
      message: format!("memory store lock poisoned: {}", e),
    })?;
    blobs
      .get(reference.as_str())
      .cloned()
      .ok_or_else(|| StorageError::NotFound {
        reference: reference.clone(),
      })
  }

  async fn write_raw(
    &self,
    reference: &DataReference,
    options: Options,
    data: Vec<u8>,
  ) -> Result<(), StorageError> {
    let mut blobs = self.blobs.write().map_err(|e| StorageError::Backend {
      message: format!("memory store lock poisoned: {}", e),
    })?;
    if !options.overwrite && blobs.contains_key(reference.as_str()) {
      return Err(StorageError::AlreadyExists {
        reference: reference.clone(),
      });
    }
    blobs.insert(reference.as_str().to_string(), data);
    Ok(())
  }
}
