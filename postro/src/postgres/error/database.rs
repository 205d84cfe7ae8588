//! Server-reported error, parsed from `ErrorResponse`'s field list.
//!
//! <https://www.postgresql.org/docs/current/protocol-error-fields.html>
use crate::postgres::backend::ErrorResponse;

/// A `ServerError` as reported by an `ErrorResponse` message.
///
/// The raw field list is `(Byte1 code, String value)*` terminated by a zero byte;
/// this type exposes the two fields every caller cares about, `'M'` (message)
/// and `'C'` (SQLSTATE code), plus `'S'` (severity) for diagnostics.
pub struct DatabaseError {
    body: bytes::Bytes,
}

impl DatabaseError {
    pub(crate) fn new(err: ErrorResponse) -> Self {
        Self { body: err.body }
    }

    fn field(&self, code: u8) -> Option<&str> {
        let mut b = &self.body[..];
        loop {
            let &c = b.first()?;
            if c == 0 {
                return None;
            }
            b = &b[1..];
            let end = b.iter().position(|&x| x == 0)?;
            let value = &b[..end];
            b = &b[end + 1..];
            if c == code {
                return std::str::from_utf8(value).ok();
            }
        }
    }

    /// The primary human-readable error message (`'M'`). Falls back to
    /// `"Unknown error"` if the server omitted the field.
    pub fn message(&self) -> &str {
        self.field(b'M').unwrap_or("Unknown error")
    }

    /// SQLSTATE error code (`'C'`).
    pub fn code(&self) -> Option<&str> {
        self.field(b'C')
    }

    /// Error severity (`'S'`), e.g. `ERROR`, `FATAL`, `PANIC`.
    pub fn severity(&self) -> Option<&str> {
        self.field(b'S')
    }
}

impl std::error::Error for DatabaseError {}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{} ({code})", self.message()),
            None => f.write_str(self.message()),
        }
    }
}

impl std::fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{self}\"")
    }
}
