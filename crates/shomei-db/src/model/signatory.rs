use crate::{
    error::InvalidKeyId,
    json::Json,
    schema::signatories,
    types::{SignatoryStatus, SignatoryType},
};
use diesel::{Identifiable, Insertable, Queryable, Selectable};
use iso8601_timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

/// Open key-value map of remote-declared attributes
pub type Metadata = Json<HashMap<String, serde_json::Value>>;

/// A remote party's public-key identity
///
/// The private half of the local instance's key never lands here; it lives
/// with the signature manager's `LocalSignatory` and is never persisted.
#[derive(
    Clone, Debug, Deserialize, Serialize, Identifiable, Insertable, Selectable, Queryable,
)]
#[diesel(table_name = signatories)]
pub struct Signatory {
    pub id: Uuid,
    pub provider_id: String,
    pub host: String,
    pub account: String,
    pub key_id: String,
    pub key_id_sum: String,
    pub public_key: String,
    pub metadata: Metadata,
    pub signatory_type: SignatoryType,
    pub status: SignatoryStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Signatory {
    /// Build a signatory for a remote key
    ///
    /// Host is derived from the key id; the account stays empty (host-wide
    /// identity) unless the caller knows better.
    pub fn new(
        provider_id: &str,
        key_id: &str,
        public_key: &str,
        signatory_type: SignatoryType,
    ) -> Result<Self, InvalidKeyId> {
        let host = key_id_origin(key_id)?;
        let now = Timestamp::now_utc();

        Ok(Self {
            id: Uuid::now_v7(),
            provider_id: provider_id.to_string(),
            host,
            account: String::new(),
            key_id: key_id.to_string(),
            key_id_sum: hash_key_id(key_id),
            public_key: public_key.to_string(),
            metadata: Json(HashMap::new()),
            signatory_type,
            status: SignatoryStatus::Synced,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn with_account(mut self, account: &str) -> Self {
        self.account = account.to_string();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Json(metadata);
        self
    }

    /// Whether the cached public key is old enough to be refreshed
    #[must_use]
    pub fn is_stale(&self, ttl_secs: u64) -> bool {
        let age = Timestamp::now_utc()
            .duration_since(self.updated_at)
            .whole_seconds();

        age >= i64::try_from(ttl_secs).unwrap_or(i64::MAX)
    }
}

/// Stable lookup key for a signatory
///
/// Key ids are arbitrary-length attacker-influenced URIs, so the indexed
/// column stores their SHA-256 instead.
#[must_use]
pub fn hash_key_id(key_id: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, key_id.as_bytes());
    hex::encode(digest)
}

/// Derive the `host[:port]` origin from a key id URL
pub fn key_id_origin(key_id: &str) -> Result<String, InvalidKeyId> {
    let url = Url::parse(key_id).map_err(|_| InvalidKeyId(key_id.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| InvalidKeyId(key_id.to_string()))?;

    let origin = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(origin)
}
