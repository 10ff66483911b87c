use larkspur_storage::StorageError;

/// Error type for node handler operations.
///
/// A returned `HandlerError` means the tick failed and the controller
/// should retry the reconcile; handled failures are reported through
/// [`Transition`](crate::Transition) phases instead.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
  /// The data store failed underneath the handler.
  #[error(transparent)]
  Storage(#[from] StorageError),

  /// The wrapped task handler failed.
  #[error("task handler error: {message}")]
  Task { message: String },

  /// The node state could not be persisted.
  #[error("failed to persist node state: {message}")]
  State { message: String },

  /// A launch plan could not be resolved.
  #[error("failed to resolve launch plan {id}: {message}")]
  LaunchPlan { id: String, message: String },

  /// The recursive executor failed.
  #[error("node executor error: {message}")]
  Executor { message: String },

  /// Finalization failed on one or both of the parent / sub-node paths.
  #[error("finalize failed: {message}")]
  Finalize { message: String },

  /// The caller's cancellation token fired.
  #[error("operation cancelled")]
  Cancelled,
}
