use crate::{store::StoreError, BoxError};
use shomei_db::InvalidKeyId;
use thiserror::Error;

/// Signature manager error
///
/// The variants stay distinguishable on purpose: callers map them to
/// different HTTP status codes and must be able to branch on kind.
#[derive(Debug, Error)]
pub enum Error {
    /// Blocking pool communication failure
    #[error(transparent)]
    Blocking(#[from] tokio::task::JoinError),

    /// Key id that doesn't resolve into a host identity
    #[error(transparent)]
    IdentityNotFound(#[from] InvalidKeyId),

    /// Request-level rejection before any cryptographic work
    #[error("rejected incoming request: {0}")]
    IncomingRequest(String),

    /// Cryptographic verification failed
    #[error("invalid signature")]
    InvalidSignature,

    /// A fetched signatory vouches for a different key id than the request claims
    #[error("remote signatory key id \"{fetched}\" does not match requested \"{requested}\"")]
    InvalidKeyOrigin { requested: String, fetched: String },

    /// Malformed signature elements or unsatisfiable signed header set
    #[error("invalid signature data: {0}")]
    Signature(#[source] BoxError),

    /// `Signature` header absent from the request
    #[error("signature header not found")]
    SignatureHeaderNotFound,

    /// Local signing preconditions unmet
    #[error("signatory unusable for signing: {0}")]
    Signatory(String),

    /// Conflict the trust policy declines to auto-resolve
    #[error("signatory conflict for key id \"{key_id}\"")]
    SignatoryConflict { key_id: String },

    /// No stored record and the remote fetch yielded nothing
    #[error("no signatory found for key id \"{key_id}\"")]
    SignatoryNotFound { key_id: String },

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
