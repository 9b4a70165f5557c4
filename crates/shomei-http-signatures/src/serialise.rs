use crate::parse::SignatureElements;
use std::fmt::Write;

/// Serialise signature elements into a `Signature` header value
///
/// Attribute order is fixed (keyId, algorithm, headers, signature) and every
/// value is double-quoted; remote implementations are picky about both.
#[must_use]
pub fn serialise(elements: &SignatureElements) -> String {
    let mut buffer = String::new();

    let _ = write!(buffer, "keyId=\"{}\"", elements.key_id);

    if let Some(algorithm) = &elements.algorithm {
        let _ = write!(buffer, ",algorithm=\"{algorithm}\"");
    }

    let _ = write!(buffer, ",headers=\"{}\"", elements.headers.join(" "));
    let _ = write!(buffer, ",signature=\"{}\"", elements.signature);

    buffer
}
