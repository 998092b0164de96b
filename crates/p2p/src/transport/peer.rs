//! TCP peer.
//!
//! The socket is split into halves so the connection task can sit in a read
//! while the application sends from another task. Each half lives behind its
//! own lock; the connection task only holds the read lock for the duration of
//! one decode, which is what lets the application take over the read side
//! while the connection is in stream mode.

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::message::Rpc;
use crate::peer::Peer;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, Notify};

/// A peer connected over TCP.
pub struct TcpPeer {
    remote_addr: String,
    outbound: bool,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    streams: StreamGate,
    closed: watch::Sender<bool>,
}

impl TcpPeer {
    /// Wrap an established connection.
    pub fn new(stream: TcpStream, outbound: bool) -> io::Result<Self> {
        let remote_addr = stream.peer_addr()?.to_string();
        let (reader, writer) = stream.into_split();
        let (closed, _) = watch::channel(false);

        Ok(Self {
            remote_addr,
            outbound,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            streams: StreamGate::default(),
            closed,
        })
    }

    /// Number of stream sessions waiting for [`Peer::close_stream`].
    pub fn pending_streams(&self) -> usize {
        self.streams.pending()
    }

    async fn wait_closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Run one decode pass over the read half.
    ///
    /// Returns `None` if the peer was closed before or during the decode.
    /// Otherwise returns the decoder's result and whether the socket hit EOF
    /// or an I/O error while decoding.
    pub(crate) async fn decode_next(
        &self,
        decoder: &dyn Decoder,
    ) -> Option<(Result<Option<Rpc>>, bool)> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut()?;
        let mut tracked = TrackedRead::new(reader);

        let result = tokio::select! {
            result = decoder.decode(&mut tracked) => result,
            _ = self.wait_closed() => return None,
        };
        Some((result, tracked.exhausted))
    }

    /// Register a stream session opened by the remote side.
    pub(crate) fn open_stream(&self) {
        self.streams.open();
    }

    /// Wait until every open stream session was closed.
    ///
    /// Returns false if the peer was closed first.
    pub(crate) async fn wait_streams_closed(&self) -> bool {
        tokio::select! {
            _ = self.streams.wait_idle() => true,
            _ = self.wait_closed() => false,
        }
    }

    /// Drop the read half. Together with [`Peer::close`] this releases the
    /// socket even if the application still holds the peer.
    pub(crate) async fn release(&self) {
        self.reader.lock().await.take();
    }
}

#[async_trait]
impl Peer for TcpPeer {
    fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    fn is_outbound(&self) -> bool {
        self.outbound
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            Error::Transmission(io::Error::new(io::ErrorKind::NotConnected, "peer closed"))
        })?;
        writer.write_all(data).await?;
        Ok(())
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(Error::PeerClosed)?;
        tokio::select! {
            n = reader.read(buf) => Ok(n?),
            _ = self.wait_closed() => Err(Error::PeerClosed),
        }
    }

    async fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(Error::PeerClosed)?;
        tokio::select! {
            res = reader.read_exact(buf) => {
                res?;
                Ok(())
            }
            _ = self.wait_closed() => Err(Error::PeerClosed),
        }
    }

    fn close_stream(&self) {
        if !self.streams.close() {
            tracing::warn!(peer = %self.remote_addr, "close_stream called without an open stream");
        }
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn closed(&self) {
        self.wait_closed().await;
    }
}

impl std::fmt::Debug for TcpPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpPeer")
            .field("remote_addr", &self.remote_addr)
            .field("outbound", &self.outbound)
            .field("pending_streams", &self.streams.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Completion counter for stream sessions.
#[derive(Default)]
struct StreamGate {
    pending: AtomicUsize,
    idle: Notify,
}

impl StreamGate {
    fn open(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns false if no session was open.
    fn close(&self) -> bool {
        match self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => {
                self.idle.notify_waiters();
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    async fn wait_idle(&self) {
        loop {
            // Registered before the check so a close in between is not missed.
            let notified = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Read adapter recording whether the inner reader reached EOF or failed.
struct TrackedRead<'a, R> {
    inner: &'a mut R,
    exhausted: bool,
}

impl<'a, R> TrackedRead<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TrackedRead<'_, R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let wanted = buf.remaining() > 0;
        let before = buf.filled().len();

        match Pin::new(&mut *this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if wanted && buf.filled().len() == before {
                    this.exhausted = true;
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => {
                this.exhausted = true;
                Poll::Ready(Err(err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DefaultDecoder;
    use crate::message::{message_frame, INCOMING_STREAM};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpPeer, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (TcpPeer::new(server, false).unwrap(), client)
    }

    #[test]
    fn test_stream_gate_counts() {
        let gate = StreamGate::default();
        assert!(!gate.close(), "closing without an open stream is refused");
        assert_eq!(gate.pending(), 0);

        gate.open();
        gate.open();
        assert_eq!(gate.pending(), 2);
        assert!(gate.close());
        assert!(gate.close());
        assert_eq!(gate.pending(), 0);
        assert!(!gate.close());
    }

    #[tokio::test]
    async fn test_stream_gate_wakes_waiter() {
        let peer = Arc::new(connected_pair().await.0);
        peer.open_stream();

        let waiter = {
            let peer = peer.clone();
            tokio::spawn(async move { peer.wait_streams_closed().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        peer.close_stream();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_send_and_raw_read() {
        let (peer, mut client) = connected_pair().await;
        assert!(!peer.is_outbound());

        peer.send(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        client.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_decode_next_reports_exhaustion() {
        let (peer, mut client) = connected_pair().await;

        client.write_all(&message_frame(b"abc")).await.unwrap();
        let (result, exhausted) = peer.decode_next(&DefaultDecoder).await.unwrap();
        assert_eq!(&result.unwrap().unwrap().payload[..], b"abc");
        assert!(!exhausted);

        client.write_all(&[INCOMING_STREAM]).await.unwrap();
        let (result, _) = peer.decode_next(&DefaultDecoder).await.unwrap();
        assert!(result.unwrap().unwrap().stream);

        drop(client);
        let (result, exhausted) = peer.decode_next(&DefaultDecoder).await.unwrap();
        assert!(result.unwrap().is_none());
        assert!(exhausted);
    }

    #[tokio::test]
    async fn test_close_fails_later_io() {
        let (peer, _client) = connected_pair().await;
        peer.close().await;
        assert!(peer.is_closed());
        peer.closed().await;

        match peer.send(b"x").await {
            Err(Error::Transmission(err)) => assert_eq!(err.kind(), io::ErrorKind::NotConnected),
            other => panic!("unexpected send result: {other:?}"),
        }
        let mut buf = [0u8; 1];
        assert!(matches!(peer.read(&mut buf).await, Err(Error::PeerClosed)));
        assert!(peer.decode_next(&DefaultDecoder).await.is_none());
    }
}
