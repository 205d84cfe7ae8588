use std::io;

/// A `TcpStream` which implements `AsyncRead` and `AsyncWrite` transparently.
///
/// Requires the `tokio` feature, otherwise panics at runtime.
pub struct Socket {
    kind: Kind,
}

enum Kind {
    #[cfg(feature = "tokio")]
    TokioTcp(tokio::net::TcpStream),
    #[cfg(test)]
    Mock(tokio::io::DuplexStream),
}

impl Socket {
    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        #[cfg(feature = "tokio")]
        {
            let socket = tokio::net::TcpStream::connect((host, port)).await?;
            socket.set_nodelay(true)?;
            #[cfg(feature = "log")]
            log::debug!("connected via TCP to {host}:{port}");
            Ok(Socket { kind: Kind::TokioTcp(socket) })
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = (host, port);
            panic!("runtime disabled")
        }
    }

    pub fn poll_shutdown(&mut self, cx: &mut std::task::Context) -> std::task::Poll<io::Result<()>> {
        #[cfg(feature = "tokio")]
        {
            tokio::io::AsyncWrite::poll_shutdown(std::pin::Pin::new(self), cx)
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = cx;
            panic!("runtime disabled")
        }
    }

    /// Wrap an in-memory duplex stream for framing/fragmentation tests,
    /// bypassing TCP entirely.
    #[cfg(test)]
    pub(crate) fn mock(stream: tokio::io::DuplexStream) -> Socket {
        Socket { kind: Kind::Mock(stream) }
    }

    pub fn shutdown(&mut self) -> impl Future<Output = io::Result<()>> {
        #[cfg(feature = "tokio")]
        {
            tokio::io::AsyncWriteExt::shutdown(self)
        }

        #[cfg(not(feature = "tokio"))]
        {
            std::future::ready(Ok(()))
        }
    }
}

#[cfg(feature = "tokio")]
impl tokio::io::AsyncRead for Socket {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::TokioTcp(t) => Pin::new(t).poll_read(cx, buf),
            #[cfg(test)]
            Kind::Mock(t) => Pin::new(t).poll_read(cx, buf),
        }
    }
}

#[cfg(feature = "tokio")]
impl tokio::io::AsyncWrite for Socket {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::TokioTcp(t) => Pin::new(t).poll_write(cx, buf),
            #[cfg(test)]
            Kind::Mock(t) => Pin::new(t).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> std::task::Poll<io::Result<usize>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::TokioTcp(t) => Pin::new(t).poll_write_vectored(cx, bufs),
            #[cfg(test)]
            Kind::Mock(t) => Pin::new(t).poll_write_vectored(cx, bufs),
        }
    }

    #[inline]
    fn is_write_vectored(&self) -> bool {
        true
    }

    #[inline]
    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::TokioTcp(t) => Pin::new(t).poll_shutdown(cx),
            #[cfg(test)]
            Kind::Mock(t) => Pin::new(t).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            #[cfg(feature = "tokio")]
            Kind::TokioTcp(ref tcp) => std::fmt::Debug::fmt(tcp, f),
            #[cfg(test)]
            Kind::Mock(ref m) => std::fmt::Debug::fmt(m, f),
        }
    }
}
