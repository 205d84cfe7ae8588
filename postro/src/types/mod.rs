//! Type integration with external types
//!
//! Implementation of [`Decode`][d] and [`Encode`][e] for external types.
//!
//! Available for:
//!
//! - [`time`][::time]'s [`PrimitiveDateTime`][tp], [`UtcDateTime`][tu], [`Date`][td], requires `time` feature
//! - [`uuid`][::uuid]'s [`Uuid`][tu2], requires `uuid` feature
//!
//! [d]: crate::Decode
//! [e]: crate::Encode
//! [tp]: ::time::PrimitiveDateTime
//! [tu]: ::time::UtcDateTime
//! [td]: ::time::Date
//! [tu2]: ::uuid::Uuid

#[cfg(feature = "time")]
pub(crate) mod time;

