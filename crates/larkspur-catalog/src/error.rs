use larkspur_storage::StorageError;

/// Error type for catalog operations. A cache miss is not an error; see
/// [`CatalogEntry`](crate::CatalogEntry).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
  /// The task template is missing fields the catalog keys on.
  #[error("invalid task template: {message}")]
  InvalidTask { message: String },

  /// Reading inputs or outputs from the data store failed.
  #[error(transparent)]
  Storage(#[from] StorageError),

  /// The catalog service failed after the retry budget was exhausted.
  #[error("catalog rpc failed: {0}")]
  Rpc(#[from] tonic::Status),

  /// A tagged artifact does not carry a declared output.
  #[error("artifact {artifact_id} is missing declared output '{name}'")]
  MissingOutput { artifact_id: String, name: String },
}
