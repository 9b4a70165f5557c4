//!
//! Helpers for exercising the signature pipelines without a database or a
//! network: embedded keypairs, an in-memory signatory store and a canned
//! provider.
//!

use bytes::Bytes;
use http::{header::HOST, request::Parts, HeaderValue, Request};
use iso8601_timestamp::Timestamp;
use shomei_db::model::signatory::Signatory;
use shomei_signatory::OutgoingSignedRequest;
use std::time::Duration;

mod provider;
mod store;

pub mod keys;

pub use self::provider::StaticProvider;
pub use self::store::InMemorySignatoryStore;

/// Replay an outgoing signed request as the receiving server would see it
///
/// The URI collapses to origin-form and the authority moves into the `Host`
/// header, which is what the signing string's `host` line resolves from on
/// the incoming side.
#[must_use]
pub fn replay_as_incoming(outgoing: &OutgoingSignedRequest) -> (Parts, Bytes) {
    let uri = outgoing.uri();
    let path = uri
        .path_and_query()
        .map_or("/", http::uri::PathAndQuery::as_str);

    let host = match (uri.host(), uri.port_u16()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => panic!("outgoing request must have an absolute URI"),
    };

    let mut request = Request::builder()
        .method(outgoing.method().clone())
        .uri(path)
        .body(())
        .unwrap();

    request.headers_mut().extend(outgoing.headers().clone());
    request
        .headers_mut()
        .insert(HOST, HeaderValue::from_str(&host).unwrap());

    let (parts, ()) = request.into_parts();
    (parts, outgoing.body().clone())
}

/// Age a signatory so TTL-based refresh paths trigger
pub fn backdate(signatory: &mut Signatory, secs: u64) {
    signatory.updated_at = Timestamp::now_utc() - Duration::from_secs(secs);
}
