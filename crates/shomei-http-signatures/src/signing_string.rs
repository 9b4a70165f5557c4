//!
//! Construction of the string that actually gets signed
//!

use http::{header::HOST, uri::PathAndQuery, HeaderMap, Method, Uri};
use miette::Diagnostic;
use std::fmt::Write;
use thiserror::Error;

/// Headers every incoming signature must cover, no matter what the remote
/// declared. Leaving any of them out of the signed set would let an attacker
/// strip the corresponding protection, so the check fails closed.
pub const MANDATORY_HEADERS: &[&str] = &["content-length", "date", "digest", "host"];

/// Signing string error
#[derive(Debug, Diagnostic, Error)]
pub enum Error {
    /// Header had a non-UTF8 value
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::ToStrError),

    /// A listed header is absent or empty on the actual request
    #[error("missing value for signed header \"{0}\"")]
    MissingHeaderValue(String),

    /// A mandatory header is not part of the declared signed set
    #[error("header \"{0}\" must be part of the signed header set")]
    MissingMandatoryHeader(String),
}

/// Check that the declared signed set covers every mandatory header
///
/// `extra` carries additional names the calling provider requires on top of
/// [`MANDATORY_HEADERS`].
pub fn enforce_signed_set(signed_headers: &[String], extra: &[String]) -> Result<(), Error> {
    let required = MANDATORY_HEADERS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str));

    for name in required {
        if !signed_headers
            .iter()
            .any(|signed| signed.eq_ignore_ascii_case(name))
        {
            return Err(Error::MissingMandatoryHeader(name.to_string()));
        }
    }

    Ok(())
}

/// Construct the signing string for a request
///
/// The synthetic `(request-target)` line always comes first; a literal
/// `(request-target)` entry in `signed_headers` is skipped so it never
/// appears twice. `host` resolves from the request target, falling back to
/// the `Host` header. Lines are newline-joined without a trailing newline.
pub fn construct(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    signed_headers: &[String],
) -> Result<String, Error> {
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), PathAndQuery::as_str);

    let mut signing_string = String::new();
    let _ = writeln!(
        signing_string,
        "(request-target): {} {}",
        method.as_str().to_lowercase(),
        path_and_query
    );

    for name in signed_headers {
        if name == "(request-target)" {
            continue;
        }

        let name = name.to_lowercase();
        let value = if name == "host" {
            host_value(uri, headers)?
        } else {
            headers
                .get(name.as_str())
                .ok_or_else(|| Error::MissingHeaderValue(name.clone()))?
                .to_str()?
                .to_string()
        };

        if value.is_empty() {
            return Err(Error::MissingHeaderValue(name));
        }

        let _ = writeln!(signing_string, "{name}: {value}");
    }

    // Remove the last new-line
    signing_string.pop();

    Ok(signing_string)
}

fn host_value(uri: &Uri, headers: &HeaderMap) -> Result<String, Error> {
    if let Some(host) = uri.host() {
        let value = match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        return Ok(value);
    }

    headers
        .get(HOST)
        .ok_or_else(|| Error::MissingHeaderValue("host".to_string()))?
        .to_str()
        .map(str::to_string)
        .map_err(Error::from)
}
