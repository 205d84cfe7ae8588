//! Postgres Connection.
use bytes::{Buf, BytesMut};
use std::{
    future::Ready,
    io,
    task::{Context, Poll, ready},
    time::Instant,
};

use crate::{
    Result,
    common::verbose,
    executor::Executor,
    net::Socket,
    phase::{self, StartupResponse},
    postgres::{BackendProtocol, ErrorResponse, FrontendProtocol, NoticeResponse, backend, frontend},
    transport::{PgTransport, PgTransportExt},
};

mod config;

pub use config::{Config, ParseError};

const DEFAULT_WRITE_CAPACITY: usize = 8 * 1024;
const DEFAULT_READ_CAPACITY: usize = 64 * 1024;

/// Postgres connection.
///
/// # Features
///
/// Every statement is parsed and bound unnamed: nothing is cached across
/// calls, so each execution reparses its sql text.
///
/// Connection handles `NoticeResponse` messages. If the `log` feature is
/// enabled, `NoticeResponse` is logged, otherwise it is ignored.
///
/// Connection handles sending `Sync` after receiving an `ErrorResponse`
/// message. This is postgres specific and happens transparently, most users
/// do not need to worry about this.
///
/// # Pending Messages
///
/// All RAII guard API drop behavior is sync, so to perform an async
/// operation, like sending a transaction rollback, it can only be queued.
/// Queued actions are sent on the next asynchronous operation. This is
/// crucial for things like a failed transaction, where the rollback can
/// possibly be delayed.
///
/// # Runtime
///
/// All constructors will panic if the `tokio` feature is not enabled.
#[derive(Debug)]
pub struct Connection {
    // io
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,

    // diagnostic
    connected_at: Instant,
    sync_pending: usize,
}

impl Connection {
    /// Connect to postgres server via environment variables.
    ///
    /// See [`Config::from_env`] for more details.
    ///
    /// # Panics
    ///
    /// Panics if the `tokio` feature is not enabled.
    pub fn connect_env() -> impl Future<Output = Result<Connection>> {
        Self::connect_with(Config::from_env())
    }

    /// Connect to postgres server via url.
    ///
    /// # Panics
    ///
    /// Panics if the `tokio` feature is not enabled.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(Config::parse(url)?).await
    }

    /// Connect to postgres server with the provided config.
    ///
    /// # Panics
    ///
    /// Panics if the `tokio` feature is not enabled.
    pub async fn connect_with(config: Config) -> Result<Self> {
        let socket = Socket::connect_tcp(&config.host, config.port).await?;

        let mut me = Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_READ_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_WRITE_CAPACITY),
            connected_at: Instant::now(),
            sync_pending: 0,
        };

        let StartupResponse { backend_key_data: _ } = phase::startup(&config, &mut me).await?;

        Ok(me)
    }
}

impl Connection {
    /// Get the [`Instant`] value of when the socket connected to the postgres server.
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }
}

impl Connection {
    /// Initiates or attempts to shut down the socket, returning success when
    /// the I/O connection has completely shut down.
    pub fn poll_shutdown(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        self.socket.poll_shutdown(cx)
    }

    /// Close connection cleanly.
    pub async fn close(mut self) -> io::Result<()> {
        self.send(frontend::Terminate);
        self.flush().await?;
        self.socket.shutdown().await
    }
}

macro_rules! poll_message {
    (
        poll($io:ident, $cx:ident);
        let $msgtype:ident;
        let $body:ident;
    ) => {
        let Some(mut header) = $io.read_buf.get(..5) else {
            $io.read_buf.reserve(1024);
            ready!(crate::io::poll_read(&mut $io.socket, &mut $io.read_buf, $cx)?);
            continue;
        };

        let $msgtype = header.get_u8();
        let len = header.get_i32() as usize;

        if $io.read_buf.len() - 1/*msgtype*/ < len {
            $io.read_buf.reserve(1 + len);
            ready!(crate::io::poll_read(&mut $io.socket, &mut $io.read_buf, $cx)?);
            continue;
        }

        $io.read_buf.advance(5);
        let $body = $io.read_buf.split_to(len - 4).freeze();

        // Message fully acquired
        verbose!("(B){:?}", backend::BackendMessage::decode($msgtype, $body.clone()).unwrap());
    };
}

impl Connection {
    /// Execute all queued actions.
    ///
    /// See the struct's module for [more details][1].
    ///
    /// [1]: Connection#pending-messages
    pub fn ready(&mut self) -> impl Future<Output = Result<()>> {
        std::future::poll_fn(|cx| self.poll_ready(cx))
    }

    /// Attempt to execute all queued actions.
    ///
    /// See the struct's module for [more details][1].
    ///
    /// [1]: Connection#pending-messages
    pub(crate) fn poll_ready(&mut self, cx: &mut Context) -> Poll<Result<()>> {
        if !self.write_buf.is_empty() {
            ready!(self.poll_flush(cx)?)
        }

        while self.sync_pending != 0 {
            verbose!("healthcheck: {{sync_pending: {}}}", self.sync_pending);

            poll_message! {
                poll(self, cx);
                let msgtype;
                let _body;
            }

            match msgtype {
                ErrorResponse::MSGTYPE => {
                    self.send(frontend::Sync);
                    // `Sync` here gets eaten by `ErrorResponse` as currently happening
                    self.ready_request();
                    #[cfg(feature = "log")]
                    log::error!("{}", ErrorResponse::new(_body));
                },
                NoticeResponse::MSGTYPE => {
                    #[cfg(feature = "log")]
                    log::warn!("{}", NoticeResponse::new(_body));
                },
                backend::ReadyForQuery::MSGTYPE => {
                    self.sync_pending -= 1;
                },
                _ => {}, // ignore all messages until `ReadyForQuery` is received
            }
        }

        Poll::Ready(Ok(()))
    }
}

impl PgTransport for Connection {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        crate::io::poll_write_all(&mut self.socket, &mut self.write_buf, cx)
    }

    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut Context) -> Poll<Result<B>> {
        ready!(self.poll_ready(cx)?);

        loop {
            poll_message! {
                poll(self, cx);
                let msgtype;
                let body;
            }

            match msgtype {
                ErrorResponse::MSGTYPE => {
                    self.send(frontend::Sync);
                    self.ready_request();
                    Err(ErrorResponse::new(body))?
                },
                NoticeResponse::MSGTYPE => {
                    #[cfg(feature = "log")]
                    log::warn!("{}", NoticeResponse::new(body));
                    continue;
                },
                _ => return Poll::Ready(Ok(B::decode(msgtype, body)?)),
            }
        }
    }

    fn ready_request(&mut self) {
        self.sync_pending += 1;
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        verbose!("(F){message:?}");
        frontend::write(message, &mut self.write_buf);
    }

    fn send_startup(&mut self, startup: frontend::Startup) {
        verbose!("(F){startup:?}");
        startup.write(&mut self.write_buf);
    }
}

impl Executor for Connection {
    type Transport = Self;

    type Future = Ready<Result<Self::Transport>>;

    fn connection(self) -> Self::Future {
        std::future::ready(Ok(self))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::Socket;

    /// A `ReadyForQuery('I')` message, delivered over a duplex stream whose
    /// internal buffer caps every read at 2 bytes, so neither the 5-byte
    /// header nor the full 6-byte message arrives in a single `poll_read`.
    /// Exercises the `poll_message!` reserve-and-retry loop in
    /// `Connection::poll_recv`.
    #[tokio::test]
    async fn poll_recv_reassembles_a_fragmented_message() {
        use tokio::io::AsyncWriteExt;

        let (client_end, mut server_end) = tokio::io::duplex(2);

        tokio::spawn(async move {
            let msg: [u8; 6] = [b'Z', 0, 0, 0, 5, b'I'];
            server_end.write_all(&msg).await.unwrap();
            server_end.flush().await.unwrap();
        });

        let mut conn = Connection {
            socket: Socket::mock(client_end),
            read_buf: BytesMut::with_capacity(DEFAULT_READ_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_WRITE_CAPACITY),
            connected_at: Instant::now(),
            sync_pending: 0,
        };

        let msg: backend::ReadyForQuery =
            std::future::poll_fn(|cx| conn.poll_recv(cx)).await.unwrap();
        assert_eq!(msg.tx_status, b'I');
    }

    /// Two messages written back-to-back in one chunk must still decode as
    /// two separate reads, with `read_buf` left positioned at the second
    /// message's type byte after the first is consumed.
    #[tokio::test]
    async fn poll_recv_splits_two_messages_from_one_read() {
        use tokio::io::AsyncWriteExt;

        let (client_end, mut server_end) = tokio::io::duplex(64);

        tokio::spawn(async move {
            let mut msg = Vec::new();
            msg.extend_from_slice(&[b'Z', 0, 0, 0, 5, b'I']);
            msg.extend_from_slice(&[b'Z', 0, 0, 0, 5, b'T']);
            server_end.write_all(&msg).await.unwrap();
            server_end.flush().await.unwrap();
        });

        let mut conn = Connection {
            socket: Socket::mock(client_end),
            read_buf: BytesMut::with_capacity(DEFAULT_READ_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_WRITE_CAPACITY),
            connected_at: Instant::now(),
            sync_pending: 0,
        };

        let first: backend::ReadyForQuery =
            std::future::poll_fn(|cx| conn.poll_recv(cx)).await.unwrap();
        let second: backend::ReadyForQuery =
            std::future::poll_fn(|cx| conn.poll_recv(cx)).await.unwrap();

        assert_eq!(first.tx_status, b'I');
        assert_eq!(second.tx_status, b'T');
    }
}
