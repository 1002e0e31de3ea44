use std::fmt::{self, Display};
use std::io;

use serde::{de, ser};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error at byte {offset}: {kind}")]
    Syntax { kind: SyntaxError, offset: usize },
    #[error("input is empty")]
    EmptyInput,
    #[error("duplicate top-level tag: {key:?}")]
    DuplicateKey { key: String },
    /// Part of the error taxonomy only; allocation failure aborts in Rust.
    #[error("unable to allocate memory for the parse tree")]
    Allocation,
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Serialization(String),
    #[error("{0}")]
    Deserialization(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyntaxError {
    /// End of input reached with lists still open.
    UnclosedList,
    UnexpectedCloseParen,
    /// A top-level list with no elements, e.g. `()`.
    MissingTag,
    TagNotAtom,
    AtomAtTopLevel,
    UnterminatedString,
    UnterminatedQuote,
    /// A `'` followed by whitespace, `)`, or end of input.
    DanglingQuote,
    InvalidUtf8,
    /// More than one expression where exactly one was expected.
    TrailingInput,
    /// Lists nested deeper than `ParseOptions::max_depth`.
    TooDeep,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            SyntaxError::UnclosedList => "unclosed list at end of input",
            SyntaxError::UnexpectedCloseParen => "unexpected `)`",
            SyntaxError::MissingTag => "top-level list has no tag",
            SyntaxError::TagNotAtom => "top-level tag must be an atom",
            SyntaxError::AtomAtTopLevel => "atom outside of any list",
            SyntaxError::UnterminatedString => "unterminated string",
            SyntaxError::UnterminatedQuote => "unterminated quoted form",
            SyntaxError::DanglingQuote => "`'` not followed by an atom or list",
            SyntaxError::InvalidUtf8 => "atom is not valid UTF-8",
            SyntaxError::TrailingInput => "unexpected input after expression",
            SyntaxError::TooDeep => "lists nested too deeply",
        };
        f.write_str(msg)
    }
}

impl Error {
    pub fn syntax(kind: SyntaxError, offset: usize) -> Error {
        Error::Syntax { kind, offset }
    }

    /// Returns the syntax error kind, if this is a syntax error.
    pub fn syntax_kind(&self) -> Option<SyntaxError> {
        match self {
            Error::Syntax { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// `io::Error` isn't `Clone`, but a failed `StreamParser` reports its error
// again on every later call.
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Syntax { kind, offset } => Error::syntax(*kind, *offset),
            Error::EmptyInput => Error::EmptyInput,
            Error::DuplicateKey { key } => Error::DuplicateKey { key: key.clone() },
            Error::Allocation => Error::Allocation,
            Error::Io(io_err) => Error::Io(io::Error::new(io_err.kind(), io_err.to_string())),
            Error::Serialization(msg) => Error::Serialization(msg.clone()),
            Error::Deserialization(msg) => Error::Deserialization(msg.clone()),
        }
    }
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Serialization(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Deserialization(msg.to_string())
    }
}
