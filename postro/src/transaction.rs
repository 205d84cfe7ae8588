//! The [`Transaction`] type.
use std::io;

use crate::{
    Result,
    executor::Executor,
    postgres::{
        BackendProtocol, backend,
        frontend::{self, FrontendProtocol},
    },
    transport::{PgTransport, PgTransportExt},
};

/// Transaction isolation level.
///
/// <https://www.postgresql.org/docs/current/sql-set-transaction.html>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Begin a transaction with the default isolation level (`READ COMMITTED`).
pub async fn begin<Exec: Executor>(exec: Exec) -> Result<Transaction<Exec::Transport>> {
    begin_with(exec, IsolationLevel::default()).await
}

/// Begin a transaction with an explicit isolation level.
pub async fn begin_with<Exec: Executor>(
    exec: Exec,
    isolation: IsolationLevel,
) -> Result<Transaction<Exec::Transport>> {
    let mut io = exec.connection().await?;
    let begin_sql = format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql());
    io.send(frontend::Query { sql: &begin_sql });
    io.flush().await?;
    io.recv::<backend::CommandComplete>().await?;
    let r = io.recv::<backend::ReadyForQuery>().await?;
    assert_eq!(r.tx_status, b'T');

    Ok(Transaction::new(io))
}

/// An RAII implementation of transaction scope.
///
/// To begin a transaction, use [`begin`] or [`begin_with`].
///
/// To commit transaction, use [`Transaction::commit`].
///
/// If not commited, when this structure is dropped, transaction will be rolled back.
///
/// # Example
///
/// ```no_run
/// # async fn test(mut conn: postro::Connection) -> postro::Result<()> {
/// let mut tx = postro::query::begin(&mut conn).await?;
///
/// postro::execute("insert into post(name) values('foo')", &mut tx)
///     .execute()
///     .await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<IO: PgTransport> {
    io: IO,
    commited: bool,
}

impl<IO> Transaction<IO>
where
    IO: PgTransport
{
    pub(crate) fn new(io: IO) -> Self {
        Self { io, commited: false }
    }

    /// Commit transaction.
    pub async fn commit(mut self) -> Result<()> {
        self.io.send(frontend::Query { sql: "COMMIT" });
        self.io.flush().await?;
        self.io.recv::<backend::CommandComplete>().await?;
        let r = self.io.recv::<backend::ReadyForQuery>().await?;
        assert_eq!(r.tx_status,b'I');
        self.commited = true;
        Ok(())
    }

    /// Roll back transaction explicitly.
    ///
    /// Equivalent to dropping the transaction without committing, except
    /// errors from the `ROLLBACK` round-trip are surfaced to the caller
    /// instead of being discarded.
    pub async fn rollback(mut self) -> Result<()> {
        self.io.send(frontend::Query { sql: "ROLLBACK" });
        self.io.flush().await?;
        self.io.recv::<backend::CommandComplete>().await?;
        let r = self.io.recv::<backend::ReadyForQuery>().await?;
        assert_eq!(r.tx_status,b'I');
        self.commited = true;
        Ok(())
    }
}

impl<IO> Drop for Transaction<IO>
where
    IO: PgTransport
{
    fn drop(&mut self) {
        if !self.commited {
            self.io.send(frontend::Query { sql: "ROLLBACK" });
            self.io.ready_request();
        }
    }
}

impl<IO> PgTransport for Transaction<IO>
where
    IO: PgTransport
{
    fn poll_flush(&mut self, cx: &mut std::task::Context) -> std::task::Poll<io::Result<()>> {
        IO::poll_flush(&mut self.io, cx)
    }

    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut std::task::Context) -> std::task::Poll<Result<B>> {
        IO::poll_recv(&mut self.io, cx)
    }

    fn ready_request(&mut self) {
        IO::ready_request(&mut self.io)
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        IO::send(&mut self.io, message)
    }

    fn send_startup(&mut self, startup: frontend::Startup) {
        IO::send_startup(&mut self.io, startup)
    }
}
