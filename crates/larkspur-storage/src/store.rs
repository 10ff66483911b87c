use async_trait::async_trait;
use prost::Message;

use crate::reference::DataReference;

/// Error type for data store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  /// No blob exists at the requested reference.
  #[error("reference not found: {reference}")]
  NotFound { reference: DataReference },

  /// A blob already exists and the write did not permit overwriting.
  #[error("reference already exists: {reference}")]
  AlreadyExists { reference: DataReference },

  /// The blob exists but does not decode as the requested message.
  #[error("failed to decode protobuf at {reference}: {source}")]
  Decode {
    reference: DataReference,
    source: prost::DecodeError,
  },

  /// The backend failed in a way that may succeed on retry.
  #[error("storage backend error: {message}")]
  Backend { message: String },
}

impl StorageError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, StorageError::NotFound { .. })
  }
}

/// Write behavior options.
#[derive(Debug, Clone)]
pub struct Options {
  /// Replace an existing blob at the target reference.
  pub overwrite: bool,
}

impl Default for Options {
  fn default() -> Self {
    Self { overwrite: true }
  }
}

/// Blob store trait over raw bytes.
///
/// Implementations provide the actual backend. Callers should prefer the
/// typed `read_protobuf`/`write_protobuf` helpers on `dyn ProtobufStore`.
#[async_trait]
pub trait ProtobufStore: Send + Sync {
  /// Read the raw bytes at a reference.
  async fn read_raw(&self, reference: &DataReference) -> Result<Vec<u8>, StorageError>;

  /// Write raw bytes to a reference.
  async fn write_raw(
    &self,
    reference: &DataReference,
    options: Options,
    data: Vec<u8>,
  ) -> Result<(), StorageError>;

  /// Build a reference by joining segments onto a base directory.
  fn construct_reference(&self, base: &DataReference, segments: &[&str]) -> DataReference {
    base.join(segments)
  }
}

impl<'a> dyn ProtobufStore + 'a {
  /// Read and decode a protobuf message at a reference.
  pub async fn read_protobuf<M: Message + Default>(
    &self,
    reference: &DataReference,
  ) -> Result<M, StorageError> {
    let bytes = self.read_raw(reference).await?;
    M::decode(bytes.as_slice()).map_err(|source| StorageError::Decode {
      reference: reference.clone(),
      source,
    })
  }

  /// Encode and write a protobuf message to a reference.
  pub async fn write_protobuf<M: Message>(
    &self,
    reference: &DataReference,
    options: Options,
    message: &M,
  ) -> Result<(), StorageError> {
    self
      .write_raw(reference, options, message.encode_to_vec())
      .await
  }
}
