//! `postro` error types.
use std::{backtrace::Backtrace, fmt, io, str::Utf8Error};

use crate::{
    auth::AuthError,
    connection::ParseError,
    postgres::{DatabaseError, ProtocolError},
    row::DecodeError,
};

/// A specialized [`Result`] type for `postro` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `postro` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// All possible error kind from `postro` library.
pub enum ErrorKind {
    Io(io::Error),
    Protocol(ProtocolError),
    Auth(AuthError),
    Database(DatabaseError),
    Usage(UsageError),
    Decode(DecodeError),
    Config(ParseError),
    Utf8(Utf8Error),
}

/// A misuse of the API surfaced as an error rather than a panic: a query
/// that returned no row where one was required, an empty SQL string, or an
/// `@name` in the query text with no matching bound parameter.
pub enum UsageError {
    /// [`fetch_one`][crate::query::Query::fetch_one] returned no row.
    RowNotFound,
    /// The query string was empty.
    EmptyQuery,
    /// An `@name` occurrence in the query text had no matching bound parameter.
    MissingParameter(String),
}

impl std::error::Error for UsageError {}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowNotFound => f.write_str("row not found"),
            Self::EmptyQuery => f.write_str("empty query"),
            Self::MissingParameter(name) => write!(f, "no parameter bound for `@{name}` in query"),
        }
    }
}

impl fmt::Debug for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<io::Error>e => ErrorKind::Io(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<AuthError>e => ErrorKind::Auth(e));
from!(<UsageError>e => ErrorKind::Usage(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<ParseError>e => ErrorKind::Config(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));

impl From<crate::postgres::ErrorResponse> for Error {
    fn from(err: crate::postgres::ErrorResponse) -> Self {
        ErrorKind::Database(DatabaseError::new(err)).into()
    }
}

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Auth(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Usage(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::Config(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
