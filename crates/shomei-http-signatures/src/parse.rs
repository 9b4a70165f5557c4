use logos::Logos;
use miette::Diagnostic;
use thiserror::Error;

/// Parsed contents of a `Signature` header
///
/// `algorithm` is kept verbatim; it is only a hint and gets interpreted
/// leniently by [`crate::crypto::SignatureAlgorithm::from_header`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureElements {
    pub key_id: String,
    pub algorithm: Option<String>,
    pub headers: Vec<String>,
    pub signature: String,
}

/// Signature header parsing error
#[derive(Debug, Diagnostic, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Attribute required by the wire format is absent
    #[error("missing attribute \"{0}\"")]
    MissingAttribute(&'static str),

    /// Input doesn't lex into `name="value"` pairs
    #[error("malformed signature header")]
    Malformed,

    /// Attribute outside the fixed keyId/algorithm/headers/signature set
    #[error("unexpected attribute \"{0}\"")]
    UnexpectedAttribute(String),
}

#[derive(Debug, Logos)]
#[logos(skip r"[ \t]+")]
enum Token {
    #[regex(r"[A-Za-z][A-Za-z0-9]*")]
    Name,

    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#)]
    Quoted,

    #[token(",")]
    Comma,
}

/// Parse a `Signature` header value into its elements
///
/// The recognised attributes are `keyId`, `algorithm`, `headers` and
/// `signature`; `keyId` and `signature` are mandatory. An absent `headers`
/// attribute defaults to `date`, mirroring the cavage draft.
pub fn parse(input: &str) -> Result<SignatureElements, ParseError> {
    let mut tokens = Token::lexer(input).spanned();

    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    loop {
        let name = match tokens.next() {
            None => break,
            Some((Ok(Token::Name), span)) => &input[span],
            Some(_) => return Err(ParseError::Malformed),
        };

        let Some((Ok(Token::Equals), _)) = tokens.next() else {
            return Err(ParseError::Malformed);
        };

        let value = match tokens.next() {
            Some((Ok(Token::Quoted), span)) => input[span].trim_matches('"'),
            _ => return Err(ParseError::Malformed),
        };

        match name {
            "keyId" => key_id = Some(value.to_string()),
            "algorithm" => algorithm = Some(value.to_string()),
            "headers" => {
                headers = Some(value.split_whitespace().map(str::to_string).collect());
            }
            "signature" => signature = Some(value.to_string()),
            other => return Err(ParseError::UnexpectedAttribute(other.to_string())),
        }

        match tokens.next() {
            None => break,
            Some((Ok(Token::Comma), _)) => (),
            Some(_) => return Err(ParseError::Malformed),
        }
    }

    Ok(SignatureElements {
        key_id: key_id.ok_or(ParseError::MissingAttribute("keyId"))?,
        algorithm,
        headers: headers.unwrap_or_else(|| vec!["date".to_string()]),
        signature: signature.ok_or(ParseError::MissingAttribute("signature"))?,
    })
}
