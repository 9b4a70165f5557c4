use crate::{
    error::Error,
    policy::{reconcile, ConflictSituation, Reconciliation},
    request::{IncomingSignedRequest, OutgoingSignedRequest},
    store::{SignatoryStore, StoreError},
    traits::SignatoryProvider,
    Result,
};
use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, DATE},
    request::Parts,
    HeaderMap, HeaderName, HeaderValue, Method, Uri,
};
use shomei_config::signature::Configuration as SignatureConfig;
use shomei_db::model::signatory::{key_id_origin, Signatory};
use shomei_http_signatures::{
    crypto::{self, SignatureAlgorithm},
    digest, parse, serialise, signing_string, ParseError, SignatureElements, SIGNATURE_HEADER,
};
use std::{sync::Arc, time::SystemTime};
use typed_builder::TypedBuilder;

static DIGEST_HEADER: HeaderName = HeaderName::from_static("digest");

/// Header names signed on every outgoing request, in signing order
const OUTGOING_SIGNED_HEADERS: &[&str] = &["content-length", "date", "digest", "host"];

/// Signs outgoing requests and verifies incoming ones
///
/// Holds the trust-on-first-use signatory cache; remote key discovery is
/// delegated to the per-feature [`SignatoryProvider`] passed into each call.
#[derive(Clone, TypedBuilder)]
pub struct SignatureManager {
    config: SignatureConfig,
    store: Arc<dyn SignatoryStore>,
}

impl SignatureManager {
    /// Key id minted for this instance: `https://<identity>/<path>`
    #[must_use]
    pub fn local_key_id(&self, path: &str) -> String {
        format!(
            "https://{}/{}",
            self.config.identity,
            path.trim_start_matches('/')
        )
    }

    /// Resolve the `host[:port]` origin of a key id
    pub fn key_id_origin(&self, key_id: &str) -> Result<String> {
        key_id_origin(key_id).map_err(Error::IdentityNotFound)
    }

    /// Verify an incoming signed request
    ///
    /// Runs the whole pipeline: body cap, signature header parsing, body
    /// digest, signed-set enforcement, signing-string reconstruction and
    /// signatory resolution with TTL refresh and conflict handling. On
    /// success the returned request carries the resolved origin/signatory.
    #[instrument(skip_all, fields(method = %parts.method, uri = %parts.uri))]
    pub async fn incoming_signed_request(
        &self,
        provider: &dyn SignatoryProvider,
        parts: Parts,
        body: Bytes,
    ) -> Result<IncomingSignedRequest> {
        if body.len() > self.config.body_max_size {
            warn!(
                size = body.len(),
                limit = self.config.body_max_size,
                "Rejecting oversized request body"
            );
            return Err(Error::IncomingRequest(format!(
                "body exceeds {} bytes",
                self.config.body_max_size
            )));
        }

        let Some(header) = parts.headers.get(&SIGNATURE_HEADER) else {
            debug!("Missing 'Signature' header");
            return Err(Error::SignatureHeaderNotFound);
        };
        let header_str = header.to_str().map_err(|err| Error::Signature(err.into()))?;

        let elements = match parse(header_str) {
            Ok(elements) => elements,
            Err(ParseError::MissingAttribute("keyId")) => {
                debug!("Signature header without a key id");
                return Err(Error::IncomingRequest(
                    "identity not resolvable from signature header".to_string(),
                ));
            }
            Err(err) => {
                debug!(error = %err, "Malformed 'Signature' header");
                return Err(Error::Signature(err.into()));
            }
        };

        // The signature only covers the digest header, so tie it to the
        // actual body before trusting anything else
        let digest_matches = parts
            .headers
            .get(&DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| digest::matches_body(value, &body));
        if !digest_matches {
            warn!(key_id = %elements.key_id, "Digest header missing or not matching the body");
            return Err(Error::IncomingRequest(
                "digest does not match body".to_string(),
            ));
        }

        let origin = match key_id_origin(&elements.key_id) {
            Ok(origin) => origin,
            Err(err) => {
                debug!(key_id = %elements.key_id, error = %err, "Unresolvable key id origin");
                return Err(Error::IncomingRequest(err.to_string()));
            }
        };

        let options = provider.options();
        signing_string::enforce_signed_set(&elements.headers, &options.extra_signature_headers)
            .map_err(|err| {
                warn!(key_id = %elements.key_id, %origin, error = %err, "Unsafe signed header set");
                Error::Signature(err.into())
            })?;

        let signing_string =
            signing_string::construct(&parts.method, &parts.uri, &parts.headers, &elements.headers)
                .map_err(|err| {
                    warn!(key_id = %elements.key_id, %origin, error = %err, "Signing string reconstruction failed");
                    Error::Signature(err.into())
                })?;

        let signatory = self
            .confirm_authenticity(provider, &elements, &origin, &signing_string)
            .await?;

        Ok(IncomingSignedRequest {
            parts,
            body,
            elements,
            origin,
            signatory,
            signing_string,
        })
    }

    /// Sign a request about to be sent
    ///
    /// Stamps `Date`, `Digest` and `Content-Length`, signs the canonical
    /// string with the provider's local key and assembles the `Signature`
    /// header. The URI must be absolute; its authority becomes the signed
    /// `host` line.
    #[instrument(skip_all, fields(%method, %uri))]
    pub async fn outgoing_signed_request(
        &self,
        provider: &dyn SignatoryProvider,
        body: Bytes,
        method: Method,
        uri: Uri,
    ) -> Result<OutgoingSignedRequest> {
        let local = provider
            .local_signatory()
            .map_err(|err| Error::Signatory(err.to_string()))?;
        if local.private_key.is_empty() {
            return Err(Error::Signatory("empty private key".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            DATE,
            HeaderValue::from_str(&httpdate::fmt_http_date(SystemTime::now()))
                .map_err(|err| Error::Signature(err.into()))?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(
            &DIGEST_HEADER,
            HeaderValue::from_str(&digest::body_digest(&body))
                .map_err(|err| Error::Signature(err.into()))?,
        );

        let signed_headers: Vec<String> = std::iter::once("(request-target)")
            .chain(OUTGOING_SIGNED_HEADERS.iter().copied())
            .map(str::to_string)
            .collect();

        let signing_string = signing_string::construct(&method, &uri, &headers, &signed_headers)
            .map_err(|err| Error::Signature(err.into()))?;

        let algorithm = SignatureAlgorithm::default();
        let signature = {
            let signing_string = signing_string.clone();
            let private_key = local.private_key.clone();

            tokio::task::spawn_blocking(move || {
                let key = crypto::private_key(&private_key)?;
                crypto::sign(signing_string.as_bytes(), &key, algorithm)
            })
            .await?
            .map_err(|err| {
                debug!(key_id = %local.key_id, error = %err, "Signing failed");
                Error::Signatory(err.to_string())
            })?
        };

        let elements = SignatureElements {
            key_id: local.key_id,
            algorithm: Some(algorithm.as_str().to_string()),
            headers: signed_headers,
            signature,
        };
        headers.insert(
            &SIGNATURE_HEADER,
            HeaderValue::from_str(&serialise(&elements))
                .map_err(|err| Error::Signature(err.into()))?,
        );

        Ok(OutgoingSignedRequest {
            method,
            uri,
            body,
            headers,
            elements,
            signing_string,
        })
    }

    async fn confirm_authenticity(
        &self,
        provider: &dyn SignatoryProvider,
        elements: &SignatureElements,
        origin: &str,
        signing_string: &str,
    ) -> Result<Signatory> {
        let algorithm = elements
            .algorithm
            .as_deref()
            .map(SignatureAlgorithm::from_header)
            .unwrap_or_default();

        match self.store.get_by_key_id(&elements.key_id).await? {
            Some(known) => {
                self.verify_known(provider, elements, origin, signing_string, algorithm, known)
                    .await
            }
            None => {
                self.verify_unknown(provider, elements, origin, signing_string, algorithm)
                    .await
            }
        }
    }

    /// First contact: fetch, verify, then remember on success
    async fn verify_unknown(
        &self,
        provider: &dyn SignatoryProvider,
        elements: &SignatureElements,
        origin: &str,
        signing_string: &str,
        algorithm: SignatureAlgorithm,
    ) -> Result<Signatory> {
        let Some(fetched) = self.fetch_remote_signatory(provider, origin).await else {
            warn!(key_id = %elements.key_id, %origin, "Unknown signatory and remote fetch yielded nothing");
            return Err(Error::SignatoryNotFound {
                key_id: elements.key_id.clone(),
            });
        };
        ensure_key_origin(elements, &fetched)?;

        self.verify_signature(signing_string, elements, &fetched.public_key, algorithm)
            .await?;

        self.persist_fetched(&fetched).await?;

        Ok(fetched)
    }

    async fn verify_known(
        &self,
        provider: &dyn SignatoryProvider,
        elements: &SignatureElements,
        origin: &str,
        signing_string: &str,
        algorithm: SignatureAlgorithm,
        known: Signatory,
    ) -> Result<Signatory> {
        if known.is_stale(self.config.signatory_ttl_secs) {
            if let Some(fetched) = self.fetch_remote_signatory(provider, origin).await {
                ensure_key_origin(elements, &fetched)?;
                let refreshed = self.reconcile_refresh(&known, fetched).await?;

                self.verify_signature(signing_string, elements, &refreshed.public_key, algorithm)
                    .await?;

                return Ok(refreshed);
            }

            // Refresh failed: fall back to the last-known key. Losing
            // connectivity to the remote must not turn into a denial of
            // service on existing trust.
            debug!(key_id = %known.key_id, "Refresh fetch failed, verifying against the cached key");
            match self
                .verify_signature(signing_string, elements, &known.public_key, algorithm)
                .await
            {
                Ok(()) => return Ok(known),
                Err(Error::InvalidSignature) => return self.handle_vanished(&known).await,
                Err(err) => return Err(err),
            }
        }

        match self
            .verify_signature(signing_string, elements, &known.public_key, algorithm)
            .await
        {
            Ok(()) => Ok(known),
            Err(Error::InvalidSignature) => {
                // The remote may have rotated its key; one bounded re-fetch
                debug!(key_id = %known.key_id, "Verification failed for a known signatory, re-fetching");
                match self.fetch_remote_signatory(provider, origin).await {
                    Some(fetched) => {
                        ensure_key_origin(elements, &fetched)?;
                        let refreshed = self.reconcile_refresh(&known, fetched).await?;

                        self.verify_signature(
                            signing_string,
                            elements,
                            &refreshed.public_key,
                            algorithm,
                        )
                        .await?;

                        Ok(refreshed)
                    }
                    None => self.handle_vanished(&known).await,
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Fold a freshly fetched signatory into the stored record
    ///
    /// A changed public key goes through the trust policy; an unchanged one
    /// only refreshes metadata and the update timestamp.
    async fn reconcile_refresh(&self, known: &Signatory, fetched: Signatory) -> Result<Signatory> {
        if fetched.public_key == known.public_key {
            self.store.update_metadata(&fetched).await?;
            return Ok(fetched);
        }

        match reconcile(known.signatory_type, ConflictSituation::KeyRotated) {
            Reconciliation::Replace => {
                debug!(key_id = %known.key_id, "Replacing forgivable signatory with rotated key");
                self.store.delete(&known.key_id).await?;
                self.persist_fetched(&fetched).await?;
                Ok(fetched)
            }
            Reconciliation::Update => {
                debug!(key_id = %known.key_id, "Updating refreshable signatory in place");
                self.store.update_public_key(&fetched).await?;
                self.store.update_metadata(&fetched).await?;
                Ok(fetched)
            }
            Reconciliation::NotFound | Reconciliation::Conflict => {
                warn!(
                    key_id = %known.key_id,
                    signatory_type = ?known.signatory_type,
                    "Remote key rotated under a trust level that forbids auto-resolution"
                );
                Err(Error::SignatoryConflict {
                    key_id: known.key_id.clone(),
                })
            }
        }
    }

    /// Stored signatory whose remote counterpart is gone or unreachable
    async fn handle_vanished(&self, known: &Signatory) -> Result<Signatory> {
        match reconcile(known.signatory_type, ConflictSituation::Vanished) {
            Reconciliation::NotFound => {
                warn!(key_id = %known.key_id, "Forgivable signatory vanished, dropping the local record");
                self.store.delete(&known.key_id).await?;
                Err(Error::SignatoryNotFound {
                    key_id: known.key_id.clone(),
                })
            }
            _ => {
                warn!(
                    key_id = %known.key_id,
                    signatory_type = ?known.signatory_type,
                    "Signatory vanished, refusing to auto-resolve"
                );
                Err(Error::SignatoryConflict {
                    key_id: known.key_id.clone(),
                })
            }
        }
    }

    /// Insert a fetched signatory; a lost insert race becomes an update
    async fn persist_fetched(&self, fetched: &Signatory) -> Result<()> {
        match self.store.insert(fetched).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate) => {
                debug!(key_id = %fetched.key_id, "Signatory inserted concurrently, updating instead");
                self.store.update_public_key(fetched).await?;
                self.store.update_metadata(fetched).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch_remote_signatory(
        &self,
        provider: &dyn SignatoryProvider,
        origin: &str,
    ) -> Option<Signatory> {
        match provider.fetch_signatory(origin).await {
            Ok(signatory) => signatory,
            Err(error) => {
                debug!(%origin, %error, "Remote signatory fetch failed");
                None
            }
        }
    }

    async fn verify_signature(
        &self,
        signing_string: &str,
        elements: &SignatureElements,
        public_key: &str,
        algorithm: SignatureAlgorithm,
    ) -> Result<()> {
        let signing_string = signing_string.to_string();
        let signature = elements.signature.clone();
        let public_key = public_key.to_string();

        let result = tokio::task::spawn_blocking(move || {
            crypto::verify(signing_string.as_bytes(), &signature, &public_key, algorithm)
        })
        .await?;

        result.map_err(|err| {
            debug!(error = %err, "Signature verification failed");
            Error::InvalidSignature
        })
    }
}

fn ensure_key_origin(elements: &SignatureElements, fetched: &Signatory) -> Result<()> {
    if fetched.key_id == elements.key_id {
        return Ok(());
    }

    warn!(
        requested = %elements.key_id,
        fetched = %fetched.key_id,
        "Remote signatory vouches for a different key id"
    );
    Err(Error::InvalidKeyOrigin {
        requested: elements.key_id.clone(),
        fetched: fetched.key_id.clone(),
    })
}
