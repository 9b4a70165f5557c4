use async_trait::async_trait;
use bytes::Bytes;
use http::{request::Parts, HeaderValue, Method, Uri};
use shomei_config::signature::Configuration as SignatureConfig;
use shomei_db::{
    model::signatory::Signatory,
    types::SignatoryType,
};
use shomei_signatory::{
    Error, LocalSignatory, ProviderOptions, SignatureManager, SignatoryStore, StoreError,
};
use shomei_test::{backdate, keys, replay_as_incoming, InMemorySignatoryStore, StaticProvider};
use std::sync::Arc;

const BODY: &[u8] = br#"{"hello": "world"}"#;
const KEY_ID: &str = "https://signer.example/key";
const TARGET: &str = "https://target.example/inbox";

fn manager_with(store: Arc<InMemorySignatoryStore>, body_max_size: usize) -> SignatureManager {
    let config = SignatureConfig {
        identity: "target.example".into(),
        body_max_size,
        signatory_ttl_secs: 604_800,
    };

    SignatureManager::builder().config(config).store(store).build()
}

fn local_signatory() -> LocalSignatory {
    LocalSignatory {
        key_id: KEY_ID.to_string(),
        public_key: keys::RSA_PUBLIC_KEY.to_string(),
        private_key: keys::RSA_PRIVATE_KEY.to_string(),
    }
}

fn remote_signatory(public_key: &str, signatory_type: SignatoryType) -> Signatory {
    Signatory::new("test", KEY_ID, public_key, signatory_type).unwrap()
}

/// Sign a request exactly like the remote instance would
async fn signed_request() -> (Parts, Bytes) {
    let signer = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(Some(local_signatory()), None);

    let outgoing = signer
        .outgoing_signed_request(
            &provider,
            Bytes::from_static(BODY),
            Method::POST,
            Uri::from_static(TARGET),
        )
        .await
        .unwrap();

    replay_as_incoming(&outgoing)
}

#[tokio::test]
async fn unknown_signatory_first_contact() {
    let store = Arc::new(InMemorySignatoryStore::new());
    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(
            keys::RSA_PUBLIC_KEY,
            SignatoryType::Refreshable,
        )),
    );

    let (parts, body) = signed_request().await;
    let incoming = manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    assert_eq!(incoming.origin(), "signer.example");
    assert_eq!(incoming.key_id(), KEY_ID);
    assert_eq!(incoming.signatory().public_key, keys::RSA_PUBLIC_KEY);

    // Exactly one discovery round-trip and one persisted record
    assert_eq!(provider.fetch_count(), 1);
    assert_eq!(store.insert_count(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn unknown_signatory_with_vanished_remote() {
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(None, None);

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::SignatoryNotFound { .. })));
}

#[tokio::test]
async fn known_fresh_signatory_skips_discovery() {
    let store = Arc::new(InMemorySignatoryStore::new());
    store
        .insert(&remote_signatory(
            keys::RSA_PUBLIC_KEY,
            SignatoryType::Refreshable,
        ))
        .await
        .unwrap();

    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(None, None);

    let (parts, body) = signed_request().await;
    manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    assert_eq!(provider.fetch_count(), 0);
}

#[tokio::test]
async fn body_size_boundary() {
    // Exactly at the cap passes every request-level check
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), BODY.len());
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(
            keys::RSA_PUBLIC_KEY,
            SignatoryType::Refreshable,
        )),
    );

    let (parts, body) = signed_request().await;
    manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    // One byte over is rejected before any cryptographic work
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), BODY.len() - 1);
    let provider = StaticProvider::new(None, None);

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::IncomingRequest(_))));
    assert_eq!(provider.fetch_count(), 0);
}

#[tokio::test]
async fn missing_signature_header() {
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(None, None);

    let (mut parts, body) = signed_request().await;
    parts.headers.remove("signature");

    let result = manager.incoming_signed_request(&provider, parts, body).await;
    assert!(matches!(result, Err(Error::SignatureHeaderNotFound)));
}

#[tokio::test]
async fn tampered_body_fails_the_digest_check() {
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(None, None);

    let (parts, _body) = signed_request().await;
    let result = manager
        .incoming_signed_request(&provider, parts, Bytes::from_static(b"something else"))
        .await;

    assert!(matches!(result, Err(Error::IncomingRequest(_))));
}

#[tokio::test]
async fn mandatory_header_missing_from_signed_set() {
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(None, None);

    let (mut parts, body) = signed_request().await;
    let header = parts.headers.get("signature").unwrap().to_str().unwrap();
    let weakened = header.replace("digest ", "");
    parts
        .headers
        .insert("signature", HeaderValue::from_str(&weakened).unwrap());

    let result = manager.incoming_signed_request(&provider, parts, body).await;
    assert!(matches!(result, Err(Error::Signature(_))));
    assert_eq!(provider.fetch_count(), 0);
}

#[tokio::test]
async fn provider_extra_headers_are_mandatory_too() {
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(None, None).with_options(
        ProviderOptions::builder()
            .extra_signature_headers(vec!["x-instance".to_string()])
            .build(),
    );

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::Signature(_))));
}

#[tokio::test]
async fn stale_refreshable_signatory_is_refreshed() {
    let store = Arc::new(InMemorySignatoryStore::new());
    let mut outdated = remote_signatory(keys::OTHER_RSA_PUBLIC_KEY, SignatoryType::Refreshable);
    backdate(&mut outdated, 1_000_000);
    store.insert(&outdated).await.unwrap();

    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(
            keys::RSA_PUBLIC_KEY,
            SignatoryType::Refreshable,
        )),
    );

    let (parts, body) = signed_request().await;
    let incoming = manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    assert_eq!(incoming.signatory().public_key, keys::RSA_PUBLIC_KEY);
    assert_eq!(provider.fetch_count(), 1);

    let stored = store.get_by_key_id(KEY_ID).await.unwrap().unwrap();
    assert_eq!(stored.public_key, keys::RSA_PUBLIC_KEY);
}

#[tokio::test]
async fn stale_refresh_fetch_failure_uses_cached_key() {
    // Deliberate availability-over-freshness tradeoff: when the refresh
    // fetch fails, the last-known key still authenticates the request
    let store = Arc::new(InMemorySignatoryStore::new());
    let mut cached = remote_signatory(keys::RSA_PUBLIC_KEY, SignatoryType::Refreshable);
    backdate(&mut cached, 1_000_000);
    store.insert(&cached).await.unwrap();

    let manager = manager_with(store, 50_000);
    let provider = StaticProvider::new(None, None);

    let (parts, body) = signed_request().await;
    manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    assert_eq!(provider.fetch_count(), 1);
}

#[tokio::test]
async fn forgivable_rotation_is_silently_replaced() {
    let store = Arc::new(InMemorySignatoryStore::new());
    store
        .insert(&remote_signatory(
            keys::OTHER_RSA_PUBLIC_KEY,
            SignatoryType::Forgivable,
        ))
        .await
        .unwrap();

    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(
            keys::RSA_PUBLIC_KEY,
            SignatoryType::Forgivable,
        )),
    );

    let (parts, body) = signed_request().await;
    let incoming = manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    assert_eq!(incoming.signatory().public_key, keys::RSA_PUBLIC_KEY);

    let stored = store.get_by_key_id(KEY_ID).await.unwrap().unwrap();
    assert_eq!(stored.public_key, keys::RSA_PUBLIC_KEY);
}

#[tokio::test]
async fn static_rotation_is_a_conflict_and_leaves_the_record_alone() {
    let store = Arc::new(InMemorySignatoryStore::new());
    store
        .insert(&remote_signatory(
            keys::OTHER_RSA_PUBLIC_KEY,
            SignatoryType::Static,
        ))
        .await
        .unwrap();

    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(keys::RSA_PUBLIC_KEY, SignatoryType::Static)),
    );

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::SignatoryConflict { .. })));

    let stored = store.get_by_key_id(KEY_ID).await.unwrap().unwrap();
    assert_eq!(stored.public_key, keys::OTHER_RSA_PUBLIC_KEY);
}

#[tokio::test]
async fn forgivable_vanished_remote_drops_the_record() {
    let store = Arc::new(InMemorySignatoryStore::new());
    store
        .insert(&remote_signatory(
            keys::OTHER_RSA_PUBLIC_KEY,
            SignatoryType::Forgivable,
        ))
        .await
        .unwrap();

    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(None, None);

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::SignatoryNotFound { .. })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn trusted_vanished_remote_is_a_conflict() {
    let store = Arc::new(InMemorySignatoryStore::new());
    store
        .insert(&remote_signatory(
            keys::OTHER_RSA_PUBLIC_KEY,
            SignatoryType::Trusted,
        ))
        .await
        .unwrap();

    let manager = manager_with(store.clone(), 50_000);
    let provider = StaticProvider::new(None, None);

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::SignatoryConflict { .. })));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn fetched_signatory_must_vouch_for_the_claimed_key_id() {
    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(
        None,
        Some(
            Signatory::new(
                "test",
                "https://imposter.example/key",
                keys::RSA_PUBLIC_KEY,
                SignatoryType::Refreshable,
            )
            .unwrap(),
        ),
    );

    let (parts, body) = signed_request().await;
    let result = manager.incoming_signed_request(&provider, parts, body).await;

    assert!(matches!(result, Err(Error::InvalidKeyOrigin { .. })));
}

/// Store that simulates losing the first-contact insert race: the lookup
/// misses but the insert hits the unique constraint
struct RacyStore {
    inner: InMemorySignatoryStore,
}

#[async_trait]
impl SignatoryStore for RacyStore {
    async fn get_by_key_id(&self, _key_id: &str) -> Result<Option<Signatory>, StoreError> {
        Ok(None)
    }

    async fn get_by_host_account(
        &self,
        host: &str,
        account: &str,
    ) -> Result<Option<Signatory>, StoreError> {
        self.inner.get_by_host_account(host, account).await
    }

    async fn insert(&self, signatory: &Signatory) -> Result<(), StoreError> {
        self.inner.insert(signatory).await
    }

    async fn update_public_key(&self, signatory: &Signatory) -> Result<(), StoreError> {
        self.inner.update_public_key(signatory).await
    }

    async fn update_metadata(&self, signatory: &Signatory) -> Result<(), StoreError> {
        self.inner.update_metadata(signatory).await
    }

    async fn delete(&self, key_id: &str) -> Result<(), StoreError> {
        self.inner.delete(key_id).await
    }
}

#[tokio::test]
async fn lost_insert_race_falls_back_to_update() {
    let inner = InMemorySignatoryStore::new();
    inner
        .insert(&remote_signatory(
            keys::OTHER_RSA_PUBLIC_KEY,
            SignatoryType::Refreshable,
        ))
        .await
        .unwrap();

    let store = Arc::new(RacyStore { inner });
    let manager = manager_with_store(store.clone());
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(
            keys::RSA_PUBLIC_KEY,
            SignatoryType::Refreshable,
        )),
    );

    let (parts, body) = signed_request().await;
    manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    let stored = store
        .inner
        .get_by_key_id(KEY_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.public_key, keys::RSA_PUBLIC_KEY);
}

fn manager_with_store(store: Arc<RacyStore>) -> SignatureManager {
    let config = SignatureConfig {
        identity: "target.example".into(),
        body_max_size: 50_000,
        signatory_ttl_secs: 604_800,
    };

    SignatureManager::builder().config(config).store(store).build()
}

#[tokio::test]
async fn ed25519_end_to_end() {
    let (private_pem, public_pem) = keys::generate_ed25519_pair();

    let signer = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let signing_provider = StaticProvider::new(
        Some(LocalSignatory {
            key_id: KEY_ID.to_string(),
            public_key: public_pem.clone(),
            private_key: private_pem,
        }),
        None,
    );

    let outgoing = signer
        .outgoing_signed_request(
            &signing_provider,
            Bytes::from_static(BODY),
            Method::POST,
            Uri::from_static(TARGET),
        )
        .await
        .unwrap();
    let (parts, body) = replay_as_incoming(&outgoing);

    let manager = manager_with(Arc::new(InMemorySignatoryStore::new()), 50_000);
    let provider = StaticProvider::new(
        None,
        Some(remote_signatory(&public_pem, SignatoryType::Refreshable)),
    );

    let incoming = manager
        .incoming_signed_request(&provider, parts, body)
        .await
        .unwrap();

    assert_eq!(incoming.origin(), "signer.example");
}
