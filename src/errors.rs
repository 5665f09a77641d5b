use std::error;
use std::fmt;

/// Builds an [`Error`] variant carrying a formatted message.
///
/// ```ignore
/// return Err(err!(Storage, "Tried to flush null page"));
/// ```
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        crate::errors::Error::$variant(format!($($arg)*))
    };
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Storage-layer condition the engine cannot recover from: corrupt
    /// file length, page number past the cap, flushing a page that was
    /// never cached. The REPL dies on these.
    Storage(String),
    /// Row bytes that cannot be packed or unpacked.
    Encoding(String),
    /// Statement recognized but its arguments do not match the grammar.
    SyntaxError,
    NegativeId,
    StringTooLong,
    /// First word of the input is not a known statement keyword.
    UnrecognizedStatement(String),
    /// Insert with a key that is already present.
    DuplicateKey,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error. {}", e),
            Error::Storage(msg) => write!(f, "{}", msg),
            Error::Encoding(msg) => write!(f, "{}", msg),
            Error::SyntaxError => write!(f, "Syntax error. Could not parse statement."),
            Error::NegativeId => write!(f, "ID must be positive."),
            Error::StringTooLong => write!(f, "String is too long."),
            Error::UnrecognizedStatement(input) => {
                write!(f, "Unrecognized keyword at start of '{}'.", input)
            }
            Error::DuplicateKey => write!(f, "Duplicate key."),
        }
    }
}

impl error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    /// Whether the REPL reports this error on stdout and returns to the
    /// prompt. Everything else is treated as fatal.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            Error::SyntaxError
                | Error::NegativeId
                | Error::StringTooLong
                | Error::UnrecognizedStatement(_)
                | Error::DuplicateKey
        )
    }
}
