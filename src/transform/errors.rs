use crate::jvm;
use crate::jvm::{BinaryName, Name};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Jvm(jvm::Error),

    /// Class inside a graded package that is neither a submission nor a reference class
    MissingTypeMapping(BinaryName),

    /// Two input classes share a name
    DuplicateClass(BinaryName),

    MalformedName(String),

    /// Similarity threshold outside `[0, 1]`
    InvalidThreshold(f64),
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Jvm(jvm::Error::IoError(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Jvm(err) => err.fmt(f),
            Error::MissingTypeMapping(name) => write!(
                f,
                "'{}' is in a graded package but matches no submission or reference class",
                name.as_str()
            ),
            Error::DuplicateClass(name) => write!(f, "Class '{}' was supplied twice", name.as_str()),
            Error::MalformedName(msg) => write!(f, "Malformed name: {}", msg),
            Error::InvalidThreshold(threshold) => write!(
                f,
                "Similarity threshold must be between 0 and 1, got {}",
                threshold
            ),
        }
    }
}

impl std::error::Error for Error {}
