//!
//! Asymmetric sign/verify primitives
//!
//! No knowledge of HTTP lives here; inputs are the signing string, PEM keys
//! and the (untrusted) algorithm hint from the `Signature` header.
//!

use const_oid::db::{rfc5912::RSA_ENCRYPTION, rfc8410::ID_ED_25519};
use miette::Diagnostic;
use pkcs8::{Document, PrivateKeyInfo, SecretDocument, SubjectPublicKeyInfoRef};
use ring::{
    rand::SystemRandom,
    signature::{
        Ed25519KeyPair, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm, ED25519,
        RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA512, RSA_PKCS1_SHA256, RSA_PKCS1_SHA512,
    },
};
use thiserror::Error;

/// Digest/signature scheme selection
///
/// Parsed from the `algorithm` attribute of the `Signature` header. That
/// attribute is attacker-controlled and only a hint; the verification
/// strength is pinned by the stored public key, so unknown values fall back
/// to the SHA-256 default instead of failing the request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 over SHA-256 (the default)
    #[default]
    RsaSha256,

    /// RSASSA-PKCS1-v1_5 over SHA-512
    RsaSha512,

    /// Ed25519 (digest choice is part of the scheme)
    Ed25519,
}

impl SignatureAlgorithm {
    /// Lenient interpretation of the header-declared algorithm
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        match value {
            "rsa-sha512" => Self::RsaSha512,
            "ed25519" => Self::Ed25519,
            _ => Self::RsaSha256,
        }
    }

    /// Identifier emitted into outgoing `Signature` headers
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa-sha256",
            Self::RsaSha512 => "rsa-sha512",
            Self::Ed25519 => "ed25519",
        }
    }
}

/// Key parsing error
#[derive(Debug, Diagnostic, Error)]
pub enum KeyError {
    /// Malformed DER structure
    #[error(transparent)]
    Der(#[from] pkcs8::der::Error),

    /// Key rejected by the signature backend
    #[error(transparent)]
    KeyRejected(#[from] ring::error::KeyRejected),

    /// Structurally valid document without usable key material
    #[error("malformed key")]
    MalformedKey,

    /// Malformed PKCS#8 document
    #[error(transparent)]
    Pkcs8(#[from] pkcs8::Error),

    /// Key algorithm this implementation doesn't speak
    #[error("unknown key type")]
    UnknownKeyType,
}

/// Signing error
#[derive(Debug, Diagnostic, Error)]
pub enum SignError {
    /// Private key failed to parse
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Signature computation failed
    #[error("signing failed")]
    Signing,
}

/// Verification error
///
/// Every failure mode on attacker-supplied input (bad base64, garbage key,
/// wrong signature) surfaces here; nothing panics.
#[derive(Debug, Diagnostic, Error)]
pub enum VerifyError {
    /// Signature value wasn't valid Base64
    #[error(transparent)]
    Base64(#[from] base64_simd::Error),

    /// Public key failed to parse
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Signature doesn't match the signing string
    #[error("verification failed")]
    Verification,
}

/// Private key, dispatched on the PKCS#8 algorithm identifier
#[non_exhaustive]
pub enum SigningKey {
    /// Ed25519
    Ed25519(Ed25519KeyPair),

    /// RSA
    Rsa(RsaKeyPair),
}

/// Parse a private key from its PKCS#8 PEM form
pub fn private_key(pem: &str) -> Result<SigningKey, KeyError> {
    let (_tag, document) = SecretDocument::from_pem(pem)?;
    let info: PrivateKeyInfo<'_> = document.decode_msg()?;

    let signing_key = if info.algorithm.oid == RSA_ENCRYPTION {
        SigningKey::Rsa(RsaKeyPair::from_pkcs8(document.as_bytes())?)
    } else if info.algorithm.oid == ID_ED_25519 {
        SigningKey::Ed25519(Ed25519KeyPair::from_pkcs8_maybe_unchecked(
            document.as_bytes(),
        )?)
    } else {
        return Err(KeyError::UnknownKeyType);
    };

    Ok(signing_key)
}

/// Parse a public key from its SPKI PEM form
///
/// The verification algorithm is pinned by the key's OID; the hint only
/// selects the digest width for RSA keys.
pub fn public_key(
    pem: &str,
    algorithm: SignatureAlgorithm,
) -> Result<UnparsedPublicKey<Vec<u8>>, KeyError> {
    let (_tag, document) = Document::from_pem(pem)?;
    let spki: SubjectPublicKeyInfoRef<'_> = document.decode_msg()?;

    let verify_algo: &dyn VerificationAlgorithm = if spki.algorithm.oid == RSA_ENCRYPTION {
        match algorithm {
            SignatureAlgorithm::RsaSha512 => &RSA_PKCS1_2048_8192_SHA512,
            _ => &RSA_PKCS1_2048_8192_SHA256,
        }
    } else if spki.algorithm.oid == ID_ED_25519 {
        &ED25519
    } else {
        return Err(KeyError::UnknownKeyType);
    };

    let raw_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or(KeyError::MalformedKey)?
        .to_vec();

    Ok(UnparsedPublicKey::new(verify_algo, raw_bytes))
}

/// Sign a message and return the signature in Base64
pub fn sign(
    msg: &[u8],
    key: &SigningKey,
    algorithm: SignatureAlgorithm,
) -> Result<String, SignError> {
    let signature = match key {
        SigningKey::Ed25519(key) => key.sign(msg).as_ref().to_vec(),
        SigningKey::Rsa(key) => {
            let padding = match algorithm {
                SignatureAlgorithm::RsaSha512 => &RSA_PKCS1_SHA512,
                _ => &RSA_PKCS1_SHA256,
            };

            let mut buf = vec![0; key.public().modulus_len()];
            let rng = SystemRandom::new();
            key.sign(padding, &rng, msg, &mut buf)
                .map_err(|_| SignError::Signing)?;

            buf
        }
    };

    Ok(base64_simd::STANDARD.encode_to_string(signature))
}

/// Verify a Base64 signature over a message with a PEM public key
pub fn verify(
    msg: &[u8],
    encoded_signature: &str,
    public_key_pem: &str,
    algorithm: SignatureAlgorithm,
) -> Result<(), VerifyError> {
    let signature = base64_simd::STANDARD.decode_to_vec(encoded_signature)?;
    let key = public_key(public_key_pem, algorithm)?;

    key.verify(msg, &signature)
        .map_err(|_| VerifyError::Verification)
}
