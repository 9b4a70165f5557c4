use bytes::Bytes;
use http::{request::Parts, HeaderMap, Method, Uri};
use shomei_db::model::signatory::Signatory;
use shomei_http_signatures::SignatureElements;

/// A verified incoming request
///
/// Only ever handed out by the manager after the full verification pipeline
/// succeeded; callers read the origin and signatory off it. Lives for one
/// request and is never persisted.
pub struct IncomingSignedRequest {
    pub(crate) parts: Parts,
    pub(crate) body: Bytes,
    pub(crate) elements: SignatureElements,
    pub(crate) origin: String,
    pub(crate) signatory: Signatory,
    pub(crate) signing_string: String,
}

impl IncomingSignedRequest {
    /// `host[:port]` the key id resolves to
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.elements.key_id
    }

    #[must_use]
    pub fn signatory(&self) -> &Signatory {
        &self.signatory
    }

    /// The reconstructed string the signature was checked against
    #[must_use]
    pub fn signing_string(&self) -> &str {
        &self.signing_string
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Hand the request back for further processing
    #[must_use]
    pub fn into_parts(self) -> (Parts, Bytes) {
        (self.parts, self.body)
    }
}

/// A request signed with the local instance key, ready for transmission
///
/// The HTTP client collaborator attaches [`Self::headers`] and sends; the
/// value is consumed right after.
pub struct OutgoingSignedRequest {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) body: Bytes,
    pub(crate) headers: HeaderMap,
    pub(crate) elements: SignatureElements,
    pub(crate) signing_string: String,
}

impl OutgoingSignedRequest {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Full header set to attach, `Signature` included
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The Base64 signature placed into the `Signature` header
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.elements.signature
    }

    #[must_use]
    pub fn signing_string(&self) -> &str {
        &self.signing_string
    }
}
