// ABOUTME: CertificateIssuer trait and the cancellable issuance helper.
// ABOUTME: Races one issuance round-trip against a cancellation token and optional deadline.

use crate::error::{IssuanceError, Result};
use crate::request::{Certificate, IssueRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Something that can sign a public key into a time-bounded SSH certificate.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Perform one issuance round-trip.
    async fn issue(&self, request: &IssueRequest) -> Result<Certificate>;
}

#[async_trait]
impl<T: CertificateIssuer + ?Sized> CertificateIssuer for Arc<T> {
    async fn issue(&self, request: &IssueRequest) -> Result<Certificate> {
        (**self).issue(request).await
    }
}

/// Issue a certificate, giving up when `cancel` fires or `timeout` elapses.
///
/// The in-flight call is dropped on cancellation, so no certificate is
/// returned once either signal wins.
///
/// # Errors
/// Returns `IssuanceError::Cancelled` or `IssuanceError::TimedOut`, or
/// whatever the issuer itself reports.
pub async fn issue_cancellable<I: CertificateIssuer + ?Sized>(
    issuer: &I,
    request: &IssueRequest,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<Certificate> {
    if cancel.is_cancelled() {
        return Err(IssuanceError::Cancelled);
    }

    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, issuer.issue(request)).await {
                Ok(result) => result,
                Err(_) => Err(IssuanceError::TimedOut(limit)),
            },
            None => issuer.issue(request).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(organization = %request.context, "certificate issuance cancelled");
            Err(IssuanceError::Cancelled)
        }
        result = bounded => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::AuthorityContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CERT_LINE: &str = "ssh-ed25519-cert-v01@openssh.com AAAAtest single-use";

    /// Issuer that waits before answering.
    struct SlowIssuer {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowIssuer {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CertificateIssuer for SlowIssuer {
        async fn issue(&self, _request: &IssueRequest) -> Result<Certificate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Certificate::from_openssh(CERT_LINE)
        }
    }

    fn request() -> IssueRequest {
        let ctx = AuthorityContext::new("acme").expect("should accept organization");
        IssueRequest::single_use(ctx, [1u8; 32])
    }

    #[tokio::test]
    async fn test_completes_without_signals() {
        let issuer = SlowIssuer::new(Duration::from_millis(1));
        let cancel = CancellationToken::new();

        let cert = issue_cancellable(&issuer, &request(), &cancel, None)
            .await
            .expect("should issue");
        assert_eq!(cert.as_str(), CERT_LINE);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_call() {
        let issuer = SlowIssuer::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = issue_cancellable(&issuer, &request(), &cancel, None).await;
        assert!(matches!(result, Err(IssuanceError::Cancelled)));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls_issuer() {
        let issuer = SlowIssuer::new(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = issue_cancellable(&issuer, &request(), &cancel, None).await;
        assert!(matches!(result, Err(IssuanceError::Cancelled)));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deadline_yields_timed_out() {
        let issuer = SlowIssuer::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let limit = Duration::from_millis(20);

        let result = issue_cancellable(&issuer, &request(), &cancel, Some(limit)).await;
        match result {
            Err(IssuanceError::TimedOut(elapsed)) => assert_eq!(elapsed, limit),
            other => panic!("expected TimedOut, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_arc_issuer_delegates() {
        let issuer: Arc<dyn CertificateIssuer> =
            Arc::new(SlowIssuer::new(Duration::from_millis(1)));
        let cancel = CancellationToken::new();

        let cert = issue_cancellable(&issuer, &request(), &cancel, None)
            .await
            .expect("should issue through Arc");
        assert_eq!(cert.as_str(), CERT_LINE);
    }
}
