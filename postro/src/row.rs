//! Postgres row operation.
//!
//! - [`Row`]
//! - [`Column`]
//! - [`FromRow`]
//! - [`Decode`]
//!
//! - [`Index`]
//! - [`DecodeError`]
use bytes::{Buf, Bytes};
use std::{borrow::Cow, fmt, str::Utf8Error, string::FromUtf8Error};

use crate::{
    common::ByteStr,
    ext::{BytesExt, FmtExt},
    postgres::{Oid, PgType},
};

// <https://www.postgresql.org/docs/current/protocol-message-formats.html#PROTOCOL-MESSAGE-FORMATS-ROWDESCRIPTION>
// table_oid
// attribute_len
// oid
// data_type_size
// type_modifier
// format_code
const SUFFIX: usize = size_of::<u32>()
    + size_of::<u16>()
    + size_of::<u32>()
    + size_of::<i16>()
    + size_of::<i32>()
    + size_of::<u16>();

const OID_OFFSET: usize = size_of::<u32>() + size_of::<u16>();

/// Postgres row.
pub struct Row {
    field_len: u16,
    body: Bytes,
    values: Bytes,
}

impl Row {
    /// `RowDescription` message
    pub(crate) fn new(mut bytes: Bytes) -> Self {
        Self {
            field_len: bytes.get_u16(),
            body: bytes,
            values: Bytes::new(),
        }
    }

    /// `DataRow` message
    pub(crate) fn inner_clone(&self, mut bytes: Bytes) -> Row {
        assert_eq!(
            self.field_len, bytes.get_u16(),
            "RowDescription len missmatch with DataRow len"
        );
        Self {
            field_len: self.field_len,
            body: self.body.clone(),
            values: bytes,
        }
    }

    /// Returns `true` if row contains no columns.
    pub const fn is_empty(&self) -> bool {
        self.field_len == 0
    }

    /// Returns the number of fields/column.
    pub const fn len(&self) -> u16 {
        self.field_len
    }

    /// Try get and decode column.
    pub fn try_get<I: Index, R: Decode>(&self, idx: I) -> Result<R, DecodeError> {
        let (offset,nul,nth) = idx.position(&self.body, self.field_len)?;

        let name = ByteStr::from_utf8(self.body.slice(offset..nul))?;

        let mut i = 0;
        let mut values = self.values.clone();
        let value = loop {
            let len = values.get_i32();
            let value = match len {
                -1 => None,
                _ => Some(values.split_to(len as _)),
            };
            if i == nth {
                break value;
            }
            i += 1;
        };

        R::decode(Column::new(name, &self.body[nul + 1..], value))
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }
}

impl IntoIterator for Row {
    type Item = Result<Column, DecodeError>;

    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            field_len: self.field_len,
            body: self.body,
            values: self.values,
            iter_n: 0,
        }
    }
}

/// [`IntoIterator`] implementation from [`Row`].
#[derive(Debug)]
pub struct IntoIter {
    field_len: u16,
    body: Bytes,
    values: Bytes,

    iter_n: u16,
}

impl IntoIter {
    /// Same as [`Iterator::next`] but returns [`Result`] instead.
    pub fn try_next(&mut self) -> Result<Column, DecodeError> {
        match self.next() {
            Some(ok) => ok,
            None => Err(DecodeError::IndexOutOfBounds(self.iter_n as _)),
        }
    }
}

impl Iterator for IntoIter {
    type Item = Result<Column, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter_n == self.field_len {
            return None
        }

        let field_name = match self.body.get_nul_bytestr() {
            Ok(ok) => ok,
            Err(err) => {
                self.iter_n = self.field_len;
                return Some(Err(err.into()))
            },
        };
        let column = self.body.split_to(SUFFIX);
        let len = self.values.get_i32();
        let value = match len {
            -1 => None,
            _ => Some(self.values.split_to(len as _)),
        };
        self.iter_n += 1;

        Some(Ok(Column::new(field_name, &column, value)))
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        let mut b = self.body.clone();
        let mut v = self.values.clone();
        for _ in 0..self.field_len {
            let Ok(key) = b.get_nul_bytestr() else { break };
            b.advance(SUFFIX);
            let len = v.get_i32();
            dbg.key(&key);
            match len {
                -1 => dbg.value(&format_args!("NULL")),
                len => dbg.value(&v.split_to(len as _).lossy()),
            };
        }
        dbg.finish()
    }
}

/// Postgres column.
#[derive(Debug, Clone)]
pub struct Column {
    oid: Oid,
    value: Option<Bytes>,
    name: ByteStr,
}

impl Column {
    /// `body` is start of data **after** field name
    fn new(name: ByteStr, body: &[u8], value: Option<Bytes>) -> Self {
        Self {
            name,
            oid: (&mut &body[OID_OFFSET..]).get_u32(),
            value
        }
    }

    /// Returns column [`Oid`].
    pub const fn oid(&self) -> Oid {
        self.oid
    }

    /// Returns column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return `true` if value is NULL.
    pub const fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Extract the inner bytes as slice.
    ///
    /// Returns [`None`] if value is `NULL`.
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Clone the inner [`Bytes`].
    ///
    /// Returns [`None`] if value is `NULL`.
    pub fn value(&self) -> Option<Bytes> {
        self.value.as_ref().cloned()
    }

    /// Consume self into the inner [`Bytes`].
    ///
    /// Returns empty [`Bytes`] if value is `NULL`.
    pub fn into_value(self) -> Option<Bytes> {
        self.value
    }

    /// Try consume self into the inner [`Bytes`].
    ///
    /// Return [`DecodeError::Null`] if value is `NULL`.
    pub fn try_into_value(self) -> Result<Bytes, DecodeError> {
        self.value.ok_or(DecodeError::Null)
    }

    /// Try decode type using [`Decode`] implementation.
    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }
}

/// Query result with its rows affected.
#[derive(Debug)]
pub struct RowResult {
    pub rows_affected: u64,
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok((
                    $(row.try_get($i)?),*,
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);

/// A type that can be constructed from [`Column`].
pub trait Decode: Sized {
    /// Try decode self from column.
    fn decode(column: Column) -> Result<Self, DecodeError>;
}

impl Decode for Column {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl Decode for () {
    fn decode(_: Column) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl Decode for bool {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        if col.oid() != Self::OID {
            return Err(DecodeError::OidMissmatch);
        }
        Ok(col.try_into_value()?[0] != 0)
    }
}

macro_rules! decode_int {
    ($ty:ty) => {
        impl Decode for $ty {
            fn decode(col: Column) -> Result<Self, DecodeError> {
                if col.oid() != Self::OID {
                    return Err(DecodeError::OidMissmatch);
                }
                let value = col.try_into_value()?;
                let mut be = [0u8; size_of::<Self>()];
                be.copy_from_slice(&value[..size_of::<Self>()]);
                Ok(<$ty>::from_be_bytes(be))
            }
        }
    };
}

decode_int!(i16);
decode_int!(i32);
decode_int!(i64);
decode_int!(f32);

/// `float8`, binary. `numeric` (oid 1700) falls back to its textual form,
/// since this crate never produces postgres's binary numeric layout.
impl Decode for f64 {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        let oid = col.oid();
        let value = col.try_into_value()?;
        match oid {
            701 => {
                let mut be = [0u8; size_of::<f64>()];
                be.copy_from_slice(&value[..size_of::<f64>()]);
                Ok(f64::from_be_bytes(be))
            }
            1700 => std::str::from_utf8(&value)?
                .parse()
                .map_err(|_| DecodeError::OidMissmatch),
            _ => Err(DecodeError::OidMissmatch),
        }
    }
}

impl Decode for String {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        // `char`, `varchar` and `text` are all wire-compatible text.
        if !matches!(col.oid(), 25 | 1042 | 1043) {
            return Err(DecodeError::OidMissmatch);
        }
        Ok(String::from_utf8(col.try_into_value().map(Into::into)?)?)
    }
}

impl Decode for Vec<u8> {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        if col.oid() != <[u8] as PgType>::OID {
            return Err(DecodeError::OidMissmatch);
        }
        Ok(col.try_into_value()?.into())
    }
}

/// `oid`, decoded the same as `int4`.
impl Decode for Oid {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        if col.oid() != 26 {
            return Err(DecodeError::OidMissmatch);
        }
        let value = col.try_into_value()?;
        let mut be = [0u8; size_of::<u32>()];
        be.copy_from_slice(&value[..size_of::<u32>()]);
        Ok(u32::from_be_bytes(be))
    }
}

#[cfg(feature = "uuid")]
impl Decode for uuid::Uuid {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        if col.oid() != <uuid::Uuid as PgType>::OID {
            return Err(DecodeError::OidMissmatch);
        }
        let value = col.try_into_value()?;
        uuid::Uuid::from_slice(&value).map_err(|_| DecodeError::OidMissmatch)
    }
}

/// Type that can be used for indexing column.
pub trait Index: Sized + sealed::Sealed {
    /// Returns (bytes start offset, nul string index, nth column).
    fn position(self, body: &[u8], len: u16) -> Result<(usize,usize,u16), DecodeError>;
}

macro_rules! position {
    (
        $self:pat, $body:ident, $len:ident,
        ($offset:ident,$i_nul:ident,$nth:ident) => $test:expr,
        () => $into:expr
    ) => {
        let mut iter = $body.iter().copied().enumerate();
        let mut $offset = 0;

        for $nth in 0..$len {
            let Some(($i_nul, _)) = iter.find(|(_, e)| matches!(e, b'\0')) else {
                break;
            };

            if $test {
                return Ok(($offset,$i_nul,$nth));
            }

            match iter.$nth(SUFFIX) {
                Some((i,_)) => {
                    $offset = i;
                },
                None => break,
            }
        }

        Err(DecodeError::ColumnNotFound($into))
    };
}

impl Index for usize {
    fn position(self, body: &[u8], len: u16) -> Result<(usize,usize,u16), DecodeError> {
        position! {
            self, body, len,
            (off,i_nul,nth) => self == nth as usize,
            () => String::from(itoa::Buffer::new().format(self)).into()
        }
    }
}

impl Index for &str {
    fn position(self, body: &[u8], len: u16) -> Result<(usize,usize,u16), DecodeError> {
        position! {
            self, body, len,
            (off,i_nul,nth) => self.as_bytes() == &body[off..i_nul],
            () => String::from(self).into()
        }
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error when decoding row value.
pub enum DecodeError {
    /// Postgres return non utf8 string.
    Utf8(Utf8Error),
    /// Column requested not found.
    ColumnNotFound(Cow<'static,str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Oid requested missmatch.
    OidMissmatch,
    /// Row is null.
    Null,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::OidMissmatch => write!(f, "data type missmatch"),
            Self::Null => write!(f, "unexpected NULL value"),
        }
    }
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(oid: u32, value: Option<&[u8]>) -> Column {
        let mut body = [0u8; SUFFIX];
        body[OID_OFFSET..OID_OFFSET + 4].copy_from_slice(&oid.to_be_bytes());
        Column::new(ByteStr::from_static("col"), &body, value.map(Bytes::copy_from_slice))
    }

    #[test]
    fn decode_bool_true_and_false() {
        assert!(column(16, Some(&[1])).decode::<bool>().unwrap());
        assert!(!column(16, Some(&[0])).decode::<bool>().unwrap());
    }

    #[test]
    fn decode_int4_roundtrip() {
        let col = column(23, Some(&42_i32.to_be_bytes()));
        assert_eq!(col.decode::<i32>().unwrap(), 42);
    }

    #[test]
    fn decode_int8_roundtrip() {
        let col = column(20, Some(&(-7_i64).to_be_bytes()));
        assert_eq!(col.decode::<i64>().unwrap(), -7);
    }

    #[test]
    fn decode_oid_mismatch_errors() {
        let col = column(23, Some(&0_i32.to_be_bytes()));
        assert!(matches!(col.decode::<bool>(), Err(DecodeError::OidMissmatch)));
    }

    #[test]
    fn decode_null_into_option_is_none() {
        let col = column(23, None);
        assert_eq!(col.decode::<Option<i32>>().unwrap(), None);
    }

    #[test]
    fn decode_null_into_required_errors() {
        let col = column(23, None);
        assert!(matches!(col.decode::<i32>(), Err(DecodeError::Null)));
    }

    #[test]
    fn decode_float8_binary() {
        let col = column(701, Some(&3.5_f64.to_be_bytes()));
        assert_eq!(col.decode::<f64>().unwrap(), 3.5);
    }

    #[test]
    fn decode_numeric_falls_back_to_text() {
        let col = column(1700, Some(b"3.14"));
        assert_eq!(col.decode::<f64>().unwrap(), 3.14);
    }

    #[test]
    fn decode_text_oid_variants() {
        for oid in [25u32, 1042, 1043] {
            let col = column(oid, Some(b"hello"));
            assert_eq!(col.decode::<String>().unwrap(), "hello");
        }
    }

    #[test]
    fn decode_bytea() {
        let col = column(17, Some(&[1, 2, 3]));
        assert_eq!(col.decode::<Vec<u8>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn decode_oid_type() {
        let col = column(26, Some(&100_u32.to_be_bytes()));
        assert_eq!(col.decode::<Oid>().unwrap(), 100);
    }
}

