//! Linear-backoff retry for catalog RPCs.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};
use tracing::debug;

/// Codes worth retrying: the call may never have reached the service, or
/// the service was momentarily overloaded.
fn is_retryable(code: Code) -> bool {
  matches!(
    code,
    Code::DeadlineExceeded | Code::Unavailable | Code::Cancelled
  )
}

/// Run `call` up to `max_attempts` times, sleeping `base_delay * attempt`
/// between retryable failures. Non-retryable codes propagate immediately.
pub(crate) async fn with_retries<T, F, Fut>(
  max_attempts: u32,
  base_delay: Duration,
  cancel: &CancellationToken,
  mut call: F,
) -> Result<T, Status>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, Status>>,
{
  let mut attempt: u32 = 1;
  loop {
    match call().await {
      Ok(value) => return Ok(value),
      Err(status) if is_retryable(status.code()) && attempt < max_attempts => {
        let delay = base_delay * attempt;
        debug!(
          code = ?status.code(),
          attempt,
          delay_ms = delay.as_millis() as u64,
          "retrying catalog rpc"
        );
        tokio::select! {
          _ = tokio::time::sleep(delay) => {}
          _ = cancel.cancelled() => return Err(Status::cancelled("retry aborted by caller")),
        }
        attempt += 1;
      }
      Err(status) => return Err(status),
    }
  }
}
