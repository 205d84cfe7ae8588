//! Extended query protocol execution: prepare, bind, execute.
//!
//! Every statement and portal used here is unnamed: this driver never caches
//! prepared statements, so each execution reparses its SQL text from scratch.
//!
//! <https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-EXT-QUERY>
use futures_core::Stream;
use std::{
    borrow::Cow,
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll, ready},
};

use crate::{
    Error, Result, Row,
    encode::Encoded,
    ext::UsizeExt,
    postgres::{PgFormat, backend, frontend},
    transport::PgTransport,
};

/// Maps a decoded [`Row`] into the type yielded by a query's stream.
pub trait StreamMap {
    /// The mapped output type.
    type Output;

    /// Map a single row.
    fn map(row: Row) -> Result<Self::Output>;
}

/// Accumulates the rows yielded by [`Fetch`] into its final output.
pub trait FetchCollect<R> {
    /// The collected output type.
    type Output;

    /// Fold a single row into this collector.
    fn value(&mut self, input: R);

    /// Finish collecting, given the last `CommandComplete` observed (if any).
    fn finish(&mut self, cmd: Option<backend::CommandComplete>) -> Result<Self::Output>;
}

/// Decode the affected-row count from a `CommandComplete` tag.
///
/// e.g. `"INSERT 0 3"` -> `3`, `"SELECT 14"` -> `14`.
pub(crate) fn command_complete(cmd: backend::CommandComplete) -> u64 {
    let mut whs = cmd.tag.split_whitespace();
    let Some(tag) = whs.next() else { return 0 };
    let Some(rows) = whs.next() else { return 0 };
    match tag {
        "INSERT" => whs.next().unwrap_or_default(),
        "SELECT" | "UPDATE" | "DELETE" | "MERGE" | "FETCH" | "MOVE" | "COPY" => rows,
        _ => return 0,
    }
    .parse()
    .unwrap_or_default()
}

/// Send `Parse` + `Bind` + `Describe` + `Execute` + `Sync` for the unnamed
/// statement/portal, all in one contiguous write, then a single flush.
///
/// Packing the five messages into one send lets the server pipeline them
/// and reply with a single stream, avoiding the extra round-trip a
/// Parse-then-wait split would cost. Responses possible, in order:
/// - `ParseComplete` from `Parse`
/// - `BindComplete` from `Bind`
/// - `RowDescription` or `NoData` from `Describe`
/// - `DataRow` from `Execute`
/// - The `Execute` phase is always terminated by exactly one of: `CommandComplete`,
///   `EmptyQueryResponse`, `ErrorResponse`, `PortalSuspended`
/// - `ReadyForQuery` from `Sync`
fn burst(sql: &str, params: &mut Vec<Encoded>, max_row: u32, mut io: impl PgTransport) {
    io.send(frontend::Parse {
        prepare_name: "",
        sql,
        oids_len: params.len().to_u16(),
        oids: params.iter().map(Encoded::oid),
    });
    io.send(frontend::Bind {
        portal_name: "",
        stmt_name: "",
        param_formats_len: 1,
        param_formats: [PgFormat::Binary],
        params_len: params.len().to_u16(),
        params_size_hint: params.iter().fold(0, |acc, n| acc + 4 + n.value().len().to_u32()),
        params: std::mem::take(params).into_iter(),
        result_formats_len: 1,
        result_formats: [PgFormat::Binary],
    });
    io.send(frontend::Describe { kind: b'P', name: "" });
    io.send(frontend::Execute { portal_name: "", max_row });
    io.send(frontend::Sync);
}

/// Rows fetched through the extended query protocol, as a [`Stream`].
///
/// Must be polled/awaited to completion, otherwise it will disturb any
/// subsequent query on the same connection.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct FetchStream<'val, ExeFut, IO, M> {
    sql: Cow<'val, str>,
    io: Option<IO>,
    phase: Phase<ExeFut>,
    params: Vec<Encoded<'val>>,
    max_row: u32,
    cmd: Option<backend::CommandComplete>,
    err: Option<Error>,
    _p: PhantomData<M>,
}

#[derive(Debug)]
enum Phase<ExeFut> {
    Connect { f: ExeFut },
    Burst,
    ParseComplete,
    BindComplete,
    RowDescription,
    DataRow(Row),
    ReadyForQuery,
    Complete,
}

impl<'val, ExeFut, IO, M> FetchStream<'val, ExeFut, IO, M> {
    pub(crate) fn new(
        sql: Cow<'val, str>,
        exe: ExeFut,
        params: Vec<Encoded<'val>>,
        max_row: u32,
        err: Option<Error>,
    ) -> Self {
        Self {
            sql,
            io: None,
            phase: Phase::Connect { f: exe },
            params,
            max_row,
            cmd: None,
            err,
            _p: PhantomData,
        }
    }

    /// Take the `CommandComplete` tag observed on this connection, if any.
    pub(crate) fn take_cmd(&mut self) -> Option<backend::CommandComplete> {
        self.cmd.take()
    }
}

impl<ExeFut, IO, M> Stream for FetchStream<'_, ExeFut, IO, M>
where
    ExeFut: Future<Output = Result<IO>> + Unpin,
    IO: PgTransport + Unpin,
    M: StreamMap,
{
    type Item = Result<M::Output>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.get_mut();

        if let Some(err) = me.err.take() {
            me.phase = Phase::Complete;
            return Poll::Ready(Some(Err(err)));
        }

        loop {
            match &mut me.phase {
                Phase::Connect { f } => {
                    let io = ready!(Pin::new(f).poll(cx)?);
                    me.io = Some(io);
                    me.phase = Phase::Burst;
                },
                Phase::Burst => {
                    burst(&me.sql, &mut me.params, me.max_row, me.io.as_mut().unwrap());
                    me.phase = Phase::ParseComplete;
                },
                Phase::ParseComplete => {
                    let io = me.io.as_mut().unwrap();
                    ready!(io.poll_flush(cx)?);
                    ready!(io.poll_recv::<backend::ParseComplete>(cx)?);
                    me.phase = Phase::BindComplete;
                },
                Phase::BindComplete => {
                    let io = me.io.as_mut().unwrap();
                    ready!(io.poll_recv::<backend::BindComplete>(cx)?);
                    me.phase = Phase::RowDescription;
                },
                Phase::RowDescription => {
                    use backend::BackendMessage::*;
                    match ready!(me.io.as_mut().unwrap().poll_recv(cx)?) {
                        // received right before `CommandComplete` for statements with no result columns
                        NoData(_) => {},
                        CommandComplete(cmd) => {
                            me.cmd = Some(cmd);
                            me.phase = Phase::ReadyForQuery;
                        },
                        RowDescription(rd) => {
                            me.phase = Phase::DataRow(Row::new(rd.body));
                        },
                        f => {
                            let err = f.unexpected("extended query row description");
                            me.phase = Phase::Complete;
                            return Poll::Ready(Some(Err(err.into())));
                        },
                    }
                },
                Phase::DataRow(row) => {
                    use backend::BackendMessage::*;
                    match ready!(me.io.as_mut().unwrap().poll_recv(cx)?) {
                        DataRow(dr) => {
                            let row = row.inner_clone(dr.body);
                            let result = M::map(row);
                            if result.is_err() {
                                me.io.as_mut().unwrap().ready_request();
                                me.phase = Phase::Complete;
                            }
                            return Poll::Ready(Some(result));
                        },

                        // `Execute` phase terminations:
                        CommandComplete(cmd) => {
                            me.cmd = Some(cmd);
                        },
                        PortalSuspended(_) => {},
                        EmptyQueryResponse(_) => {
                            me.phase = Phase::Complete;
                            return Poll::Ready(Some(Err(crate::error::UsageError::EmptyQuery.into())));
                        },
                        f => {
                            let err = f.unexpected("fetching data rows");
                            me.phase = Phase::Complete;
                            return Poll::Ready(Some(Err(err.into())));
                        },
                    }
                    me.phase = Phase::ReadyForQuery;
                },
                Phase::ReadyForQuery => {
                    ready!(me.io.as_mut().unwrap().poll_recv::<backend::ReadyForQuery>(cx)?);
                    me.phase = Phase::Complete;
                },
                Phase::Complete => return Poll::Ready(None),
            }
        }
    }
}

/// Fetch rows and fold them into a final output via [`FetchCollect`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Fetch<'val, ExeFut, IO, M, C> {
    fetch: FetchStream<'val, ExeFut, IO, M>,
    collect: C,
}

impl<'val, ExeFut, IO, M, C> Fetch<'val, ExeFut, IO, M, C> {
    pub(crate) fn new(
        sql: Cow<'val, str>,
        exe: ExeFut,
        params: Vec<Encoded<'val>>,
        collect: C,
        max_row: u32,
        err: Option<Error>,
    ) -> Self {
        Self {
            fetch: FetchStream::new(sql, exe, params, max_row, err),
            collect,
        }
    }
}

impl<ExeFut, IO, M, C> Future for Fetch<'_, ExeFut, IO, M, C>
where
    ExeFut: Future<Output = Result<IO>> + Unpin,
    IO: PgTransport + Unpin,
    M: StreamMap,
    C: FetchCollect<M::Output>,
{
    type Output = Result<C::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let me = self.get_mut();

        loop {
            match ready!(Pin::new(&mut me.fetch).poll_next(cx)) {
                Some(Ok(row)) => me.collect.value(row),
                Some(Err(e)) => return Poll::Ready(Err(e)),
                None => break,
            }
        }

        Poll::Ready(me.collect.finish(me.fetch.take_cmd()))
    }
}
