// ABOUTME: Produces a single-use SSH credential: generate, issue, encode.
// ABOUTME: All-or-nothing; any failure is tagged with its phase and nothing partial is returned.

use ember_ca::{issue_cancellable, AuthorityContext, Certificate, CertificateIssuer, IssueRequest};
use ember_ssh::{
    compute_fingerprint, encode_private_key, generate_keypair, EncodedPrivateKey, DEFAULT_COMMENT,
    PUBLIC_KEY_LEN,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CredentialError;

/// Certificate and matching private key for exactly one session.
#[derive(Debug, Clone)]
pub struct SingleUseCredential {
    certificate: Certificate,
    private_key: EncodedPrivateKey,
    public_key: [u8; PUBLIC_KEY_LEN],
    fingerprint: String,
}

impl SingleUseCredential {
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn private_key(&self) -> &EncodedPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    /// Hex SHA-256 of the public key's wire form.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Serializes the fingerprint, certificate and PEM private key for handoff.
impl Serialize for SingleUseCredential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SingleUseCredential", 3)?;
        state.serialize_field("fingerprint", &self.fingerprint)?;
        state.serialize_field("certificate", self.certificate.as_str())?;
        state.serialize_field("private_key", self.private_key.as_str())?;
        state.end()
    }
}

/// Runs the single-use credential flow against a certificate issuer.
///
/// The RNG is shared by every call and advanced under a lock, so no two
/// calls see the same random stream. With the default `OsRng` every call
/// draws fresh entropy from the operating system.
pub struct CredentialOrchestrator<I, R = OsRng> {
    issuer: I,
    rng: Mutex<R>,
    timeout: Option<Duration>,
    comment: String,
}

impl<I: CertificateIssuer> CredentialOrchestrator<I> {
    pub fn new(issuer: I) -> Self {
        Self::with_rng(issuer, OsRng)
    }
}

impl<I, R> CredentialOrchestrator<I, R>
where
    I: CertificateIssuer,
    R: RngCore + CryptoRng + Send,
{
    pub fn with_rng(issuer: I, rng: R) -> Self {
        Self {
            issuer,
            rng: Mutex::new(rng),
            timeout: None,
            comment: DEFAULT_COMMENT.to_string(),
        }
    }

    /// Give up on the authority after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Comment stored inside the encoded private key.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    // A poisoned lock still holds an advanced RNG state.
    fn rng(&self) -> MutexGuard<'_, R> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate a keypair, have `context`'s authority sign it, and encode it.
    ///
    /// The certificate always carries the fixed administrative and service
    /// principals and a one-hour window. The only I/O is the authority call,
    /// which `cancel` interrupts. The RNG lock is never held across it.
    ///
    /// # Errors
    /// Returns a [`CredentialError`] naming the failing phase. No certificate
    /// or key is returned on any failure.
    pub async fn issue_single_use_credential(
        &self,
        context: &AuthorityContext,
        cancel: &CancellationToken,
    ) -> Result<SingleUseCredential, CredentialError> {
        let keypair = {
            let mut rng = self.rng();
            generate_keypair(&mut *rng).map_err(CredentialError::KeyGeneration)?
        };
        let public_key = *keypair.public_key();
        let fingerprint =
            compute_fingerprint(&public_key).map_err(CredentialError::KeyGeneration)?;
        debug!(organization = %context, fingerprint = %fingerprint, "generated ephemeral key");

        let request = IssueRequest::single_use(context.clone(), public_key);
        let certificate = issue_cancellable(&self.issuer, &request, cancel, self.timeout).await?;
        debug!(organization = %context, fingerprint = %fingerprint, "certificate issued");

        let private_key = {
            let mut rng = self.rng();
            encode_private_key(&keypair, &self.comment, &mut *rng)
                .map_err(CredentialError::Encoding)?
        };

        Ok(SingleUseCredential {
            certificate,
            private_key,
            public_key,
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ember_ca::IssuanceError;
    use ember_ssh::{WireReader, AUTH_MAGIC};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const CERT_LINE: &str = "ssh-ed25519-cert-v01@openssh.com AAAAtest single-use";

    #[derive(Default)]
    struct RecordingIssuer {
        requests: Mutex<Vec<IssueRequest>>,
    }

    #[async_trait]
    impl CertificateIssuer for RecordingIssuer {
        async fn issue(&self, request: &IssueRequest) -> ember_ca::Result<Certificate> {
            self.requests
                .lock()
                .expect("lock should not be poisoned")
                .push(request.clone());
            Certificate::from_openssh(CERT_LINE)
        }
    }

    struct FailingIssuer;

    #[async_trait]
    impl CertificateIssuer for FailingIssuer {
        async fn issue(&self, _request: &IssueRequest) -> ember_ca::Result<Certificate> {
            Err(IssuanceError::Rejected {
                code: "PermissionDenied".to_string(),
                message: "not a member".to_string(),
            })
        }
    }

    struct HangingIssuer;

    #[async_trait]
    impl CertificateIssuer for HangingIssuer {
        async fn issue(&self, _request: &IssueRequest) -> ember_ca::Result<Certificate> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Certificate::from_openssh(CERT_LINE)
        }
    }

    #[derive(Default)]
    struct CountingIssuer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CertificateIssuer for CountingIssuer {
        async fn issue(&self, _request: &IssueRequest) -> ember_ca::Result<Certificate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Certificate::from_openssh(CERT_LINE)
        }
    }

    /// RNG whose source is always unavailable.
    #[derive(Clone)]
    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy source closed"))
        }
    }

    impl CryptoRng for BrokenRng {}

    fn acme() -> AuthorityContext {
        AuthorityContext::new("acme").expect("should accept organization")
    }

    #[tokio::test]
    async fn test_issues_with_fixed_principals_and_one_hour() {
        let orchestrator = CredentialOrchestrator::new(RecordingIssuer::default());

        let credential = orchestrator
            .issue_single_use_credential(&acme(), &CancellationToken::new())
            .await
            .expect("should issue credential");

        let requests = orchestrator
            .issuer()
            .requests
            .lock()
            .expect("lock should not be poisoned")
            .clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].principals.as_slice(), &["root", "ember"]);
        assert_eq!(requests[0].validity.hours(), 1);
        assert_eq!(requests[0].context.organization(), "acme");
        assert_eq!(&requests[0].public_key, credential.public_key());
        assert_eq!(credential.certificate().as_str(), CERT_LINE);
    }

    #[tokio::test]
    async fn test_private_key_matches_signed_public_key() {
        let orchestrator = CredentialOrchestrator::new(RecordingIssuer::default());
        let credential = orchestrator
            .issue_single_use_credential(&acme(), &CancellationToken::new())
            .await
            .expect("should issue credential");

        let container = credential
            .private_key()
            .to_container_bytes()
            .expect("should decode container");
        let mut reader = WireReader::new(&container);
        assert_eq!(reader.read_raw(AUTH_MAGIC.len()).expect("magic"), AUTH_MAGIC);
        reader.read_string().expect("cipher");
        reader.read_string().expect("kdf");
        reader.read_string().expect("kdf options");
        assert_eq!(reader.read_u32().expect("key count"), 1);

        let mut public = WireReader::new(reader.read_string().expect("public record"));
        assert_eq!(public.read_string().expect("key type"), b"ssh-ed25519");
        assert_eq!(public.read_string().expect("key"), credential.public_key());

        assert_eq!(
            credential.fingerprint(),
            compute_fingerprint(credential.public_key()).expect("should fingerprint")
        );
    }

    #[tokio::test]
    async fn test_issuer_failure_returns_no_credential() {
        let orchestrator = CredentialOrchestrator::new(FailingIssuer);

        let err = orchestrator
            .issue_single_use_credential(&acme(), &CancellationToken::new())
            .await
            .expect_err("should fail");

        assert!(matches!(
            err,
            CredentialError::Issuance(IssuanceError::Rejected { .. })
        ));
        assert_eq!(err.phase(), crate::error::CredentialPhase::Issuance);
    }

    #[tokio::test]
    async fn test_random_source_failure_skips_issuance() {
        let orchestrator = CredentialOrchestrator::with_rng(CountingIssuer::default(), BrokenRng);

        let err = orchestrator
            .issue_single_use_credential(&acme(), &CancellationToken::new())
            .await
            .expect_err("should fail");

        assert_eq!(err.phase(), crate::error::CredentialPhase::KeyGeneration);
        assert_eq!(orchestrator.issuer().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_yields_cancelled() {
        let orchestrator = CredentialOrchestrator::new(HangingIssuer);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = orchestrator
            .issue_single_use_credential(&acme(), &cancel)
            .await
            .expect_err("should be cancelled");
        assert!(matches!(err, CredentialError::Cancelled));
    }

    #[tokio::test]
    async fn test_timeout_is_an_issuance_error() {
        let orchestrator =
            CredentialOrchestrator::new(HangingIssuer).with_timeout(Duration::from_millis(20));

        let err = orchestrator
            .issue_single_use_credential(&acme(), &CancellationToken::new())
            .await
            .expect_err("should time out");
        assert!(matches!(
            err,
            CredentialError::Issuance(IssuanceError::TimedOut(_))
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let orchestrator = Arc::new(CredentialOrchestrator::new(RecordingIssuer::default()));
        let cancel = CancellationToken::new();
        let ctx = acme();

        let (first, second) = tokio::join!(
            orchestrator.issue_single_use_credential(&ctx, &cancel),
            orchestrator.issue_single_use_credential(&ctx, &cancel),
        );
        let first = first.expect("first should issue");
        let second = second.expect("second should issue");

        assert_ne!(first.public_key(), second.public_key());
        assert_ne!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.private_key(), second.private_key());
    }

    fn seeded(seed: u64) -> CredentialOrchestrator<RecordingIssuer, StdRng> {
        CredentialOrchestrator::with_rng(RecordingIssuer::default(), StdRng::seed_from_u64(seed))
    }

    async fn issue_twice<R>(
        orchestrator: &CredentialOrchestrator<RecordingIssuer, R>,
    ) -> (SingleUseCredential, SingleUseCredential)
    where
        R: RngCore + CryptoRng + Send,
    {
        let ctx = acme();
        let cancel = CancellationToken::new();
        let first = orchestrator
            .issue_single_use_credential(&ctx, &cancel)
            .await
            .expect("first should issue");
        let second = orchestrator
            .issue_single_use_credential(&ctx, &cancel)
            .await
            .expect("second should issue");
        (first, second)
    }

    #[tokio::test]
    async fn test_seeded_rng_yields_fresh_key_per_call() {
        let (first, second) = issue_twice(&seeded(7)).await;

        assert_ne!(first.public_key(), second.public_key());
        assert_ne!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.private_key(), second.private_key());
    }

    #[tokio::test]
    async fn test_entropy_seeded_rng_yields_fresh_key_per_call() {
        let orchestrator =
            CredentialOrchestrator::with_rng(RecordingIssuer::default(), StdRng::from_entropy());

        let (first, second) = issue_twice(&orchestrator).await;

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[tokio::test]
    async fn test_same_seed_reproduces_same_sequence() {
        let a = seeded(7).with_comment("test");
        let b = seeded(7).with_comment("test");

        let (a_first, a_second) = issue_twice(&a).await;
        let (b_first, b_second) = issue_twice(&b).await;

        assert_eq!(a_first.public_key(), b_first.public_key());
        assert_eq!(a_first.private_key(), b_first.private_key());
        assert_eq!(a_second.public_key(), b_second.public_key());
        assert_eq!(a_second.private_key(), b_second.private_key());
        assert_ne!(a_first.public_key(), a_second.public_key());
    }

    #[tokio::test]
    async fn test_credential_serializes_for_handoff() {
        let credential = CredentialOrchestrator::new(RecordingIssuer::default())
            .issue_single_use_credential(&acme(), &CancellationToken::new())
            .await
            .expect("should issue credential");

        let value = serde_json::to_value(&credential).expect("should serialize");
        assert_eq!(value["fingerprint"], credential.fingerprint());
        assert_eq!(value["certificate"], CERT_LINE);
        assert_eq!(value["private_key"], credential.private_key().as_str());
        assert!(value.get("public_key").is_none());
    }

    #[tokio::test]
    async fn test_spawned_issuance_is_send() {
        let orchestrator = Arc::new(CredentialOrchestrator::new(RecordingIssuer::default()));

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .issue_single_use_credential(&acme(), &CancellationToken::new())
                    .await
            })
        };

        let credential = task
            .await
            .expect("task should join")
            .expect("should issue credential");
        assert_eq!(credential.fingerprint().len(), 64);
    }
}
