//! Query API types.
use std::{borrow::Cow, marker::PhantomData};

use crate::{
    Decode, FromRow, Result, Row,
    encode::{Encode, Encoded},
    error::UsageError,
    executor::Executor,
    fetch::{Fetch, FetchCollect, FetchStream, StreamMap, command_complete},
    postgres::backend,
    row::RowResult,
    sql,
};

/// Entrypoint of the query API.
///
/// `sql` may contain `@name` placeholders bound via [`Query::bind_named`], in
/// addition to or instead of positional `$n` placeholders bound via
/// [`Query::bind`].
#[inline]
pub fn query<'val, Sql, Exe>(sql: Sql, exe: Exe) -> Query<'val, Exe, StreamRow<Row>>
where
    Sql: Into<Cow<'val, str>>,
{
    Query::new(sql, exe)
}

/// Entrypoint of the query API, mapping each row through [`FromRow`].
#[inline]
pub fn query_as<'val, Sql, Exe, R>(sql: Sql, exe: Exe) -> Query<'val, Exe, StreamRow<R>>
where
    Sql: Into<Cow<'val, str>>,
{
    Query::new(sql, exe)
}

/// Entrypoint of the query API, decoding the query's single column.
#[inline]
pub fn query_scalar<'val, Sql, Exe, D>(sql: Sql, exe: Exe) -> Query<'val, Exe, StreamScalar<D>>
where
    Sql: Into<Cow<'val, str>>,
{
    Query::new(sql, exe)
}

/// Entrypoint of the query API for statements that return no rows.
#[inline]
pub fn execute<'val, Sql, Exe>(sql: Sql, exe: Exe) -> Query<'val, Exe, StreamRow<Row>>
where
    Sql: Into<Cow<'val, str>>,
{
    Query::new(sql, exe)
}

/// The query API.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Query<'val, Exe, M> {
    sql: Cow<'val, str>,
    exe: Exe,
    params: Vec<Encoded<'val>>,
    named: Vec<(Cow<'val, str>, Encoded<'val>)>,
    _p: PhantomData<M>,
}

impl<'val, Exe, M> Query<'val, Exe, M> {
    fn new<Sql: Into<Cow<'val, str>>>(sql: Sql, exe: Exe) -> Self {
        Self {
            sql: sql.into(),
            exe,
            params: Vec::new(),
            named: Vec::new(),
            _p: PhantomData,
        }
    }

    /// Bind a positional (`$n`) query parameter.
    #[inline]
    pub fn bind<V: Encode<'val>>(mut self, value: V) -> Self {
        self.params.push(value.encode());
        self
    }

    /// Bind a named (`@name`) query parameter.
    #[inline]
    pub fn bind_named<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<Cow<'val, str>>,
        V: Encode<'val>,
    {
        self.named.push((name.into(), value.encode()));
        self
    }

}

/// Resolve `@name` placeholders into positional parameters.
///
/// Any failure (an unmatched name) is captured rather than returned, so it
/// can be surfaced on first poll without disturbing the manual state machine
/// driving the wire protocol.
fn resolve<'val>(
    sql: Cow<'val, str>,
    params: Vec<Encoded<'val>>,
    named: Vec<(Cow<'val, str>, Encoded<'val>)>,
) -> (Cow<'val, str>, Vec<Encoded<'val>>, Option<crate::Error>) {
    if named.is_empty() {
        return (sql, params, None);
    }

    let names: Vec<Cow<str>> = named.iter().map(|(n, _)| n.clone()).collect();
    match sql::substitute_named(&sql, &names, params.len()) {
        Ok((resolved, order)) => {
            let mut named_values: Vec<Option<Encoded>> = named.into_iter().map(|(_, v)| Some(v)).collect();
            let mut params = params;
            for idx in order {
                params.push(named_values[idx].take().expect("each index placed once"));
            }
            (Cow::Owned(resolved), params, None)
        },
        Err(err) => (sql, params, Some(crate::Error::from(err))),
    }
}

impl<'val, Exe, M> Query<'val, Exe, M> {
    /// Fetch rows using [`Stream`][futures_core::Stream] api.
    ///
    /// The returned `Stream` must be polled/awaited until completion,
    /// otherwise it will disturb subsequent query.
    ///
    /// Also if [`FromRow`][crate::FromRow] implementation returns error,
    /// stream is suspended.
    #[inline]
    pub fn fetch(self) -> FetchStream<'val, Exe::Future, Exe::Transport, M>
    where
        Exe: Executor,
        M: StreamMap,
    {
        let (sql, params, err) = resolve(self.sql, self.params, self.named);
        FetchStream::new(sql, self.exe.connection(), params, 0, err)
    }

    /// Fetch all rows into [`Vec`].
    #[inline]
    pub fn fetch_all(self) -> Fetch<'val, Exe::Future, Exe::Transport, M, CollectAll<M::Output>>
    where
        Exe: Executor,
        M: StreamMap,
    {
        let (sql, params, err) = resolve(self.sql, self.params, self.named);
        Fetch::new(sql, self.exe.connection(), params, CollectAll(Vec::new()), 0, err)
    }

    /// Fetch one row.
    #[inline]
    pub fn fetch_one(self) -> Fetch<'val, Exe::Future, Exe::Transport, M, CollectOne<M::Output>>
    where
        Exe: Executor,
        M: StreamMap,
    {
        let (sql, params, err) = resolve(self.sql, self.params, self.named);
        Fetch::new(sql, self.exe.connection(), params, CollectOne(None), 1, err)
    }

    /// Optionally fetch one row.
    #[inline]
    pub fn fetch_optional(self) -> Fetch<'val, Exe::Future, Exe::Transport, M, CollectOpt<M::Output>>
    where
        Exe: Executor,
        M: StreamMap,
    {
        let (sql, params, err) = resolve(self.sql, self.params, self.named);
        Fetch::new(sql, self.exe.connection(), params, CollectOpt(None), 1, err)
    }

    /// Execute statement and return number of rows affected.
    #[inline]
    pub fn execute(self) -> Fetch<'val, Exe::Future, Exe::Transport, M, CollectCmd>
    where
        Exe: Executor,
    {
        let (sql, params, err) = resolve(self.sql, self.params, self.named);
        Fetch::new(sql, self.exe.connection(), params, CollectCmd, 0, err)
    }
}

impl<'val, Exe, M> IntoFuture for Query<'val, Exe, M>
where
    Exe: Executor + Unpin,
    M: StreamMap<Output = Row> + Unpin,
{
    type Output = Result<RowResult>;

    type IntoFuture = Fetch<'val, Exe::Future, Exe::Transport, M, CollectCmd>;

    #[inline]
    fn into_future(self) -> Self::IntoFuture {
        self.execute()
    }
}


// ===== Stream Adapters =====

pub struct StreamRow<R>(PhantomData<R>);

pub struct StreamScalar<D>(PhantomData<D>);

impl<R> StreamMap for StreamRow<R>
where
    R: FromRow,
{
    type Output = R;

    #[inline]
    fn map(row: Row) -> Result<Self::Output> {
        R::from_row(row).map_err(Into::into)
    }
}

impl<D> StreamMap for StreamScalar<D>
where
    D: Decode,
{
    type Output = D;

    #[inline]
    fn map(row: Row) -> Result<Self::Output> {
        match <(D,)>::from_row(row) {
            Ok(ok) => Ok(ok.0),
            Err(err) => Err(err.into()),
        }
    }
}

// ===== Fetch Adapters =====

/// [`FetchCollect`] adapter used by [`fetch_all`][Query::fetch_all].
#[derive(Debug)]
pub struct CollectAll<R>(pub Vec<R>);

/// [`FetchCollect`] adapter used by [`fetch_one`][Query::fetch_one].
#[derive(Debug)]
pub struct CollectOne<R>(pub Option<R>);

/// [`FetchCollect`] adapter used by [`fetch_optional`][Query::fetch_optional].
#[derive(Debug)]
pub struct CollectOpt<R>(pub Option<R>);

/// [`FetchCollect`] adapter used by [`execute`][Query::execute].
#[derive(Debug)]
pub struct CollectCmd;

impl<R> FetchCollect<R> for CollectAll<R> {
    type Output = Vec<R>;

    #[inline]
    fn value(&mut self, input: R) {
        self.0.push(input);
    }

    #[inline]
    fn finish(&mut self, _: Option<backend::CommandComplete>) -> Result<Self::Output> {
        Ok(std::mem::take(&mut self.0))
    }
}

impl<R> FetchCollect<R> for CollectOpt<R> {
    type Output = Option<R>;

    #[inline]
    fn value(&mut self, input: R) {
        self.0 = Some(input);
    }

    #[inline]
    fn finish(&mut self, _: Option<backend::CommandComplete>) -> Result<Self::Output> {
        Ok(self.0.take())
    }
}

impl<R> FetchCollect<R> for CollectOne<R> {
    type Output = R;

    #[inline]
    fn value(&mut self, input: R) {
        self.0 = Some(input);
    }

    #[inline]
    fn finish(&mut self, _: Option<backend::CommandComplete>) -> Result<Self::Output> {
        match self.0.take() {
            Some(ok) => Ok(ok),
            None => Err(UsageError::RowNotFound.into()),
        }
    }
}

impl FetchCollect<Row> for CollectCmd {
    type Output = RowResult;

    #[inline]
    fn value(&mut self, _: Row) {}

    #[inline]
    fn finish(&mut self, cmd: Option<backend::CommandComplete>) -> Result<Self::Output> {
        Ok(RowResult {
            rows_affected: cmd.map(command_complete).unwrap_or_default(),
        })
    }
}
