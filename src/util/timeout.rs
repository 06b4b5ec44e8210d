//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::AgentError;

/// Wrap a future with a wall-clock timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, AgentError>>,
) -> Result<T, AgentError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_future_maps_to_timeout() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(AgentError::Timeout(250))));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            Err(AgentError::Decode("bad".into()))
        })
        .await;

        assert!(matches!(result, Err(AgentError::Decode(_))));
    }
}
