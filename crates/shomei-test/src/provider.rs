use async_trait::async_trait;
use shomei_db::model::signatory::Signatory;
use shomei_signatory::{LocalSignatory, ProviderOptions, SignatoryProvider};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canned [`SignatoryProvider`]
///
/// Serves a preset local signatory and a switchable remote one, counting
/// fetches so tests can assert how often discovery actually ran.
pub struct StaticProvider {
    local: Option<LocalSignatory>,
    remote: Mutex<Option<Signatory>>,
    options: ProviderOptions,
    fetch_calls: AtomicUsize,
}

impl StaticProvider {
    #[must_use]
    pub fn new(local: Option<LocalSignatory>, remote: Option<Signatory>) -> Self {
        Self {
            local,
            remote: Mutex::new(remote),
            options: ProviderOptions::default(),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    /// Swap what the remote side currently serves (`None` = vanished)
    pub fn set_remote(&self, remote: Option<Signatory>) {
        *self.remote.lock().unwrap() = remote;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignatoryProvider for StaticProvider {
    fn provider_id(&self) -> &str {
        "test"
    }

    fn options(&self) -> ProviderOptions {
        self.options.clone()
    }

    fn local_signatory(&self) -> Result<LocalSignatory, BoxError> {
        self.local
            .clone()
            .ok_or_else(|| BoxError::from("no local signatory configured"))
    }

    async fn fetch_signatory(&self, _origin: &str) -> Result<Option<Signatory>, BoxError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.remote.lock().unwrap().clone())
    }
}
