//! Phases and transitions a handler reports back to the controller.

use std::fmt;

use larkspur_storage::DataReference;

/// The phase a handler reports for a node after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Queued,
  Running,
  Success,
  RetryableFailure,
  Failed,
}

impl Phase {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Phase::Success | Phase::RetryableFailure | Phase::Failed)
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Phase::Queued => "Queued",
      Phase::Running => "Running",
      Phase::Success => "Success",
      Phase::RetryableFailure => "RetryableFailure",
      Phase::Failed => "Failed",
    };
    f.write_str(s)
  }
}

/// How a handled failure should be treated by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorKind {
  /// The attempt may be retried.
  Recoverable,
  /// The node is permanently failed.
  NonRecoverable,
}

/// A failure a handler observed and absorbed into a phase report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
  pub kind: ExecutionErrorKind,
  pub code: String,
  pub message: String,
}

impl ExecutionError {
  pub fn recoverable(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind: ExecutionErrorKind::Recoverable,
      code: code.into(),
      message: message.into(),
    }
  }

  pub fn non_recoverable(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      kind: ExecutionErrorKind::NonRecoverable,
      code: code.into(),
      message: message.into(),
    }
  }

  pub fn is_recoverable(&self) -> bool {
    self.kind == ExecutionErrorKind::Recoverable
  }
}

impl fmt::Display for ExecutionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] {}", self.code, self.message)
  }
}

/// Additional data accompanying a phase report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionInfo {
  /// Where the node's promoted outputs live, when terminal-successful.
  pub outputs: Option<DataReference>,
}

/// The result of one handler tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
  phase: Phase,
  info: ExecutionInfo,
  error: Option<ExecutionError>,
}

impl Transition {
  pub fn queued() -> Self {
    Self {
      phase: Phase::Queued,
      info: ExecutionInfo::default(),
      error: None,
    }
  }

  pub fn running(info: ExecutionInfo) -> Self {
    Self {
      phase: Phase::Running,
      info,
      error: None,
    }
  }

  pub fn success(info: ExecutionInfo) -> Self {
    Self {
      phase: Phase::Success,
      info,
      error: None,
    }
  }

  pub fn retryable_failure(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      phase: Phase::RetryableFailure,
      info: ExecutionInfo::default(),
      error: Some(ExecutionError::recoverable(code, message)),
    }
  }

  pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      phase: Phase::Failed,
      info: ExecutionInfo::default(),
      error: Some(ExecutionError::non_recoverable(code, message)),
    }
  }

  /// A failure transition whose retryability follows the error's kind.
  pub fn from_execution_error(error: ExecutionError) -> Self {
    let phase = if error.is_recoverable() {
      Phase::RetryableFailure
    } else {
      Phase::Failed
    };
    Self {
      phase,
      info: ExecutionInfo::default(),
      error: Some(error),
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn info(&self) -> &ExecutionInfo {
    &self.info
  }

  pub fn error(&self) -> Option<&ExecutionError> {
    self.error.as_ref()
  }
}
