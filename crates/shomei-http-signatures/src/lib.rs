//!
//! Wire-level handling of the `Signature` HTTP header
//!
//! Parses and serialises the header, reconstructs the string that gets
//! signed, and wraps the asymmetric sign/verify primitives. Everything in
//! here is synchronous and free of I/O; the signatory manager layers
//! persistence and key discovery on top.
//!

use http::HeaderName;

pub mod crypto;
pub mod digest;
pub mod parse;
pub mod serialise;
pub mod signing_string;

pub use self::parse::{parse, ParseError, SignatureElements};
pub use self::serialise::serialise;

/// Name of the header carrying the signature elements
pub static SIGNATURE_HEADER: HeaderName = HeaderName::from_static("signature");
