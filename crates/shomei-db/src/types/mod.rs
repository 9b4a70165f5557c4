mod signatory;

pub use self::signatory::{SignatoryStatus, SignatoryType};
