use crate::core::{classifier, ResponseOutcome, Result, TransportResponse};
use crate::utils::error::XdsError;
use std::future::Future;
use std::time::Duration;

/// Runs `fut`, giving up after `deadline` when one is set.
pub(crate) async fn within<F, T>(
    deadline: Option<Duration>,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| XdsError::DeadlineExceeded { operation, after })?,
        None => fut.await,
    }
}

/// Issues one transport call and classifies what came back.
///
/// Configuration problems surfaced by the transport are raised; every other failure to get
/// a response becomes an `Unavailable` outcome. No retries.
pub(crate) async fn classified<F>(
    deadline: Option<Duration>,
    operation: &'static str,
    fut: F,
) -> Result<ResponseOutcome>
where
    F: Future<Output = Result<TransportResponse>>,
{
    match within(deadline, operation, fut).await {
        Ok(response) => Ok(classifier::classify(response)),
        Err(e) if e.is_configuration() => Err(e),
        Err(e) => {
            tracing::warn!("{} failed without a response: {}", operation, e);
            Ok(classifier::unavailable(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResponseStatus;

    #[tokio::test]
    async fn test_within_without_deadline() {
        let value = within(None, "noop", async { Ok::<_, XdsError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_within_deadline_exceeded() {
        let err = within(Some(Duration::from_millis(10)), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, XdsError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            XdsError::DeadlineExceeded {
                operation: "slow",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_classified_timeout_is_unavailable() {
        let outcome = classified(Some(Duration::from_millis(10)), "query", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TransportResponse::default())
        })
        .await
        .unwrap();
        assert_eq!(outcome.status, ResponseStatus::Unavailable);
        assert!(outcome.transport_error.is_some());
    }

    #[tokio::test]
    async fn test_classified_raises_configuration_errors() {
        let result = classified(None, "query", async {
            Err::<TransportResponse, _>(XdsError::config("unsupported keystore type"))
        })
        .await;
        assert!(matches!(result, Err(XdsError::ConfigError { .. })));
    }
}
