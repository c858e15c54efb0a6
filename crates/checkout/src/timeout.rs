use std::future::Future;
use std::time::Duration;

use gateway::GatewayError;

/// Runs a gateway call, failing with [`GatewayError::Timeout`] if it takes
/// longer than `after`.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> gateway::Result<T>
where
    F: Future<Output = gateway::Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => {
            metrics::counter!("gateway_call_timeouts_total", "operation" => operation)
                .increment(1);
            tracing::warn!(operation, ?after, "gateway call timed out");
            Err(GatewayError::Timeout { operation, after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let result: gateway::Result<()> = bounded("commit", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(GatewayError::Timeout {
                operation: "commit",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = bounded("begin_transaction", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
