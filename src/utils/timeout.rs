//! Async timeout helpers.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// Default timeout for connection attempts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut`, mapping an elapsed deadline to `ProtocolError::Timeout`.
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => {
            debug!(timeout_ms = duration.as_millis() as u64, "operation timed out");
            Err(ProtocolError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_future_maps_to_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> =
            with_timeout_error(async { Err(ProtocolError::ConnectionClosed) }, DEFAULT_TIMEOUT)
                .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }
}
