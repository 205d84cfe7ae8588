//! Postgres Driver
//!
//! A client that speaks the PostgreSQL v3 frontend/backend wire protocol
//! directly: startup and authentication (cleartext, MD5, SCRAM-SHA-256),
//! the Extended Query protocol with binary parameters and results, and a
//! forward-only streaming row reader.
//!
//! # Examples
//!
//! ```no_run
//! use postro::Connection;
//!
//! # async fn app() -> postro::Result<()> {
//! let mut conn = Connection::connect_env().await?;
//!
//! let res = postro::query::<_, _, (i32,String)>("SELECT 420,$1", &mut conn)
//!     .bind("Foo")
//!     .fetch_one()
//!     .await?;
//!
//! assert_eq!(res.0,420);
//! assert_eq!(res.1.as_str(),"Foo");
//! # Ok(())
//! # }
//! ```
//!
//! Transactions:
//!
//! ```no_run
//! # async fn app() -> postro::Result<()> {
//! let mut conn = postro::Connection::connect_env().await?;
//! let mut tx = postro::begin(&mut conn).await?;
//!
//! postro::execute("INSERT INTO foo(id) VALUES(1)", &mut tx)
//!     .execute()
//!     .await?;
//!
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod common;
mod auth;
mod io;
mod net;
mod ext;

// Protocol
pub mod postgres;

// Encoding
mod value;
pub mod encode;
pub mod types;

// Component
pub mod sql;
pub mod row;
mod phase;

// Operation
pub mod transport;
pub mod executor;
pub mod query;
mod fetch;
pub mod transaction;

// Connection
pub mod connection;

mod error;


pub use encode::Encode;
pub use row::{Row, FromRow, Column, DecodeError};

pub use executor::Executor;
pub use connection::{Connection, Config};
#[doc(inline)]
pub use query::{query, query_as, query_scalar, execute};
pub use transaction::{begin, begin_with, Transaction, IsolationLevel};
pub use error::{Error, Result};

#[cfg(feature = "macros")]
pub use postro_macros::FromRow;

