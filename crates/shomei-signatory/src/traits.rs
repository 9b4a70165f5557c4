use crate::BoxError;
use async_trait::async_trait;
use shomei_db::model::signatory::Signatory;
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// Per-provider verification requirements
#[derive(Clone, Debug, Default, TypedBuilder)]
pub struct ProviderOptions {
    /// Headers the provider requires inside the signed set, on top of the
    /// protocol-mandatory date/host/content-length/digest
    #[builder(default)]
    pub extra_signature_headers: Vec<String>,
}

/// The local instance's own signing identity
///
/// This is the only place a private key appears; remote signatories are
/// persisted without one.
#[derive(Clone)]
pub struct LocalSignatory {
    pub key_id: String,
    pub public_key: String,
    pub private_key: String,
}

/// Feature-side collaborator supplying signatories
///
/// Implemented once per feature that wants signed requests (federation and
/// friends); the manager never learns how the keys are discovered.
#[async_trait]
pub trait SignatoryProvider: Send + Sync + 'static {
    /// Identifier persisted with every signatory this provider registers
    fn provider_id(&self) -> &str;

    fn options(&self) -> ProviderOptions {
        ProviderOptions::default()
    }

    /// The signatory used for outgoing signing
    fn local_signatory(&self) -> Result<LocalSignatory, BoxError>;

    /// Discover the signatory of a remote origin
    ///
    /// Called on cache miss or staleness only; `Ok(None)` means the origin
    /// doesn't expose a signatory (any network timeout policy lives with the
    /// implementation).
    async fn fetch_signatory(&self, origin: &str) -> Result<Option<Signatory>, BoxError>;
}

#[async_trait]
impl SignatoryProvider for Arc<dyn SignatoryProvider> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn options(&self) -> ProviderOptions {
        (**self).options()
    }

    fn local_signatory(&self) -> Result<LocalSignatory, BoxError> {
        (**self).local_signatory()
    }

    async fn fetch_signatory(&self, origin: &str) -> Result<Option<Signatory>, BoxError> {
        (**self).fetch_signatory(origin).await
    }
}
