//! Error types for threshold Schnorr signing

use thiserror::Error;

use crate::types::IdentityKey;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during protocol execution
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent construction input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A round method was called out of sequence
    #[error("Invalid round: expected {expected}, but participant is at {actual}")]
    InvalidRound {
        expected: &'static str,
        actual: &'static str,
    },

    /// A remote party sent a message that failed verification, or sent nothing
    #[error("Identifiable abort by party {party}: {reason}")]
    IdentifiableAbort { party: IdentityKey, reason: String },

    /// Cryptographic check failed without a party to blame
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Local computation step could not be carried out
    #[error("Failed: {0}")]
    Failed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),
}

impl Error {
    pub(crate) fn abort(party: &IdentityKey, reason: impl Into<String>) -> Self {
        Error::IdentifiableAbort {
            party: party.clone(),
            reason: reason.into(),
        }
    }

    /// Party blamed by this error, if any
    pub fn culprit(&self) -> Option<&IdentityKey> {
        match self {
            Error::IdentifiableAbort { party, .. } => Some(party),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
