use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Every error the query engine can produce, per the component design's
/// error handling table. Hand-rolled rather than derived, matching the
/// facade's own `Error` type.
#[derive(Debug)]
pub enum Error {
    Syntax {
        offset: usize,
        message: String,
    },
    UnknownFunction(String),
    UnknownProcedure(String),
    MissingParameter(String),
    TypeError {
        expected: String,
        got: String,
    },
    ConstraintViolation {
        label: String,
        property: String,
    },
    NotFound {
        kind: &'static str,
        id: String,
    },
    CancelledOrTimedOut,
    Storage(nornicdb_api::Error),
    Internal(String),
}

impl Error {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeError {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax { offset, message } => {
                write!(f, "syntax error at byte {offset}: {message}")
            }
            Error::UnknownFunction(name) => write!(f, "unknown function: {name}"),
            Error::UnknownProcedure(name) => write!(f, "unknown procedure: {name}"),
            Error::MissingParameter(name) => write!(f, "missing parameter: ${name}"),
            Error::TypeError { expected, got } => {
                write!(f, "type error: expected {expected}, got {got}")
            }
            Error::ConstraintViolation { label, property } => write!(
                f,
                "constraint violation: :{label}({property}) must be unique"
            ),
            Error::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Error::CancelledOrTimedOut => write!(f, "query cancelled or timed out"),
            Error::Storage(e) => write!(f, "storage error: {e}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<nornicdb_api::Error> for Error {
    fn from(e: nornicdb_api::Error) -> Self {
        Error::Storage(e)
    }
}
