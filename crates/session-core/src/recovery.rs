//! Deadline helper for transport operations

use std::future::Future;
use std::time::Duration;

use tracing::error;

use crate::transport::{TransportError, TransportResult};

/// Run a transport future with a deadline
///
/// An elapsed deadline is reported as [`TransportError::Timeout`]; the inner
/// future is dropped.
pub async fn with_timeout<T, F>(
    operation_name: &str,
    timeout: Duration,
    future: F,
) -> TransportResult<T>
where
    F: Future<Output = TransportResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            let duration_ms = millis(timeout);
            error!(operation = operation_name, timeout_ms = duration_ms, "Operation timed out");
            Err(TransportError::Timeout { duration_ms })
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let result: TransportResult<()> = with_timeout(
            "negotiate",
            Duration::from_millis(50),
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .await;

        assert_eq!(result, Err(TransportError::Timeout { duration_ms: 50 }));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout("open", Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result, Ok(42));

        let failed: TransportResult<u8> = with_timeout("open", Duration::from_secs(1), async {
            Err(TransportError::OpenFailed {
                reason: "no codec".to_string(),
            })
        })
        .await;
        assert!(matches!(failed, Err(TransportError::OpenFailed { .. })));
    }
}
