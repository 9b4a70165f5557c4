use core::fmt;
use std::error::Error as StdError;

/// Key id that doesn't parse into an `https://host[:port]/…` identity
#[derive(Debug, thiserror::Error)]
#[error("no identity in key id \"{0}\"")]
pub struct InvalidKeyId(pub String);

#[derive(Debug)]
pub struct EnumConversionError<T>(pub T);

impl<T> fmt::Display for EnumConversionError<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value \"{}\" is outside the enum's discriminants", self.0)
    }
}

impl<T> StdError for EnumConversionError<T> where T: fmt::Debug + fmt::Display {}
