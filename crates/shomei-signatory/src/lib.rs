//!
//! Signature manager for server-to-server trust
//!
//! Verifies incoming signed requests against a trust-on-first-use signatory
//! cache and signs outgoing ones with the local instance key. Remote key
//! discovery is injected through [`SignatoryProvider`]; persistence through
//! [`SignatoryStore`].
//!

#[macro_use]
extern crate tracing;

mod error;
mod manager;
mod policy;
mod request;
mod store;
mod traits;

pub use self::error::Error;
pub use self::manager::SignatureManager;
pub use self::policy::{reconcile, ConflictSituation, Reconciliation};
pub use self::request::{IncomingSignedRequest, OutgoingSignedRequest};
pub use self::store::{PgSignatoryStore, SignatoryStore, StoreError};
pub use self::traits::{LocalSignatory, ProviderOptions, SignatoryProvider};

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type Result<T, E = Error> = std::result::Result<T, E>;
