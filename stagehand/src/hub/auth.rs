//! Handshake credential verification.

use std::future::Future;

use dashmap::DashMap;
use thiserror::Error;

/// Handshake rejection.
///
/// Never mapped to another error type: the hub closes the channel with
/// the rejection code and surfaces this to the transport as-is.
#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    /// No credential supplied.
    #[error("credential missing from handshake")]
    MissingCredential,

    /// Credential supplied but not recognized.
    #[error("credential rejected")]
    InvalidCredential,

    /// The verifier backend could not be consulted.
    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(String),
}

/// Resolves a handshake credential to a subject id.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verifies the credential and returns the subject it belongs to.
    fn verify(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<String, HandshakeError>> + Send;
}

/// Token-table verifier for tests and single-node embedders.
///
/// Maps opaque bearer tokens to subject ids. Production deployments
/// implement [`CredentialVerifier`] against their session backend
/// instead.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: DashMap<String, String>,
}

impl StaticTokenVerifier {
    /// Creates an empty verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for the given subject.
    pub fn insert(&self, token: impl Into<String>, subject_id: impl Into<String>) {
        self.tokens.insert(token.into(), subject_id.into());
    }
}

impl CredentialVerifier for StaticTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<String, HandshakeError> {
        if credential.is_empty() {
            return Err(HandshakeError::MissingCredential);
        }
        self.tokens
            .get(credential)
            .map(|entry| entry.value().clone())
            .ok_or(HandshakeError::InvalidCredential)
    }
}
