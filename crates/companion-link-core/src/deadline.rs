//! Optional per-stage deadlines.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{LinkError, Result, Stage};

/// Run `fut`, failing with [`LinkError::StageTimedOut`] if `limit` elapses first.
///
/// With no limit the platform is trusted to finish on its own. On timeout
/// the future is dropped, which only detaches the waiter; the platform call
/// is not re-issued.
pub(crate) async fn within<T, F>(stage: Stage, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(after) = limit else {
        return fut.await;
    };
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%stage, after_ms = after.as_millis(), "Stage timed out");
            Err(LinkError::StageTimedOut { stage, after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_limit_waits() {
        let value = within(Stage::Liveness, None, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_elapses() {
        let err = within::<(), _>(
            Stage::Dispatch,
            Some(Duration::from_secs(2)),
            std::future::pending(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            LinkError::StageTimedOut {
                stage: Stage::Dispatch,
                after: Duration::from_secs(2),
            }
        );
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let err = within::<(), _>(
            Stage::Permission,
            Some(Duration::from_secs(5)),
            async { Err(LinkError::PermissionDenied) },
        )
        .await
        .unwrap_err();
        assert_eq!(err, LinkError::PermissionDenied);
    }
}
