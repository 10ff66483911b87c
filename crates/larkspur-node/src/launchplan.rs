//! The launch-plan resolver contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use larkspur_core::{Identifier, ParameterMap, VariableMap};

use crate::error::HandlerError;

/// The interface contract of a resolved launch plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchPlanClosure {
  pub expected_inputs: ParameterMap,
  pub expected_outputs: VariableMap,
}

/// Resolves launch plan references against the remote registry.
#[async_trait]
pub trait LaunchPlanReader: Send + Sync {
  /// Fetch the closure for a launch plan id. Callers cache per handle
  /// invocation so each unique id is fetched at most once.
  async fn get_launch_plan(
    &self,
    cancel: &CancellationToken,
    id: &Identifier,
  ) -> Result<LaunchPlanClosure, HandlerError>;
}
