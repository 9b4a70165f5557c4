use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

const fn default_body_max_size() -> usize {
    50_000
}

const fn default_signatory_ttl_secs() -> u64 {
    // 7 days
    60 * 60 * 24 * 7
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// Hostname of this instance, used to mint local key ids
    pub identity: SmolStr,

    /// Requests with a larger body are rejected before any signature work
    #[serde(default = "default_body_max_size")]
    pub body_max_size: usize,

    /// Age after which a cached remote public key is eligible for refresh
    #[serde(default = "default_signatory_ttl_secs")]
    pub signatory_ttl_secs: u64,
}
