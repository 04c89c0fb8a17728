//! Reliable framed transport over a TCP stream (C8).
//!
//! Built on `tokio::net::TcpStream` rather than a blocking socket: the
//! server needs one concurrent task per client connection (§5), and an
//! async runtime is the idiomatic-Rust way to express that, in contrast to
//! the source's raw thread-per-client sockets.

use std::io;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::protocol::FrameHeader;
use crate::protocol::Message;
use crate::protocol::MessageType;
use crate::protocol::ProtocolError;
use crate::protocol::SessionKey;
use crate::protocol::crypto::CryptoError;
use crate::protocol::decrypt;
use crate::protocol::encrypt;
use crate::protocol::frame::FrameError;
use crate::protocol::frame::HEADER_LEN;

/// Per-syscall chunk cap (§4.8).
const CHUNK_CAP: usize = 64 * 1024;
/// Transient-failure retry budget for `send_all`/`recv_exact` (§4.8).
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    PeerClosed,
    #[error("operation timed out")]
    Timeout,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// A bidirectional byte conduit over a connected `TcpStream`.
pub struct TransportLink {
    stream: TcpStream,
    timeout: Duration,
}

impl TransportLink {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            timeout: Duration::from_secs(30),
        }
    }

    pub async fn connect(addr: &str) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Sets the send/receive deadline applied to every subsequent
    /// operation.
    pub fn set_timeouts(&mut self, seconds: u64) {
        self.timeout = Duration::from_secs(seconds);
    }

    /// Writes all of `bytes`, retrying transient write failures up to
    /// [`RETRY_ATTEMPTS`] times with a brief backoff, in chunks capped at
    /// [`CHUNK_CAP`] per syscall.
    pub async fn send_all(&mut self, bytes: &[u8]) -> TransportResult<()> {
        let mut offset = 0;
        let mut attempt = 0;
        while offset < bytes.len() {
            let end = (offset + CHUNK_CAP).min(bytes.len());
            match timeout(self.timeout, self.stream.write_all(&bytes[offset..end])).await {
                Ok(Ok(())) => {
                    offset = end;
                    attempt = 0;
                }
                Ok(Err(err)) if is_transient(&err) && attempt < RETRY_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(TransportError::Timeout),
            }
        }
        Ok(())
    }

    /// Reads exactly `n` bytes, retrying transient read failures up to
    /// [`RETRY_ATTEMPTS`] times; a clean peer close is reported as
    /// [`TransportError::PeerClosed`] rather than a short read.
    pub async fn recv_exact(&mut self, n: usize) -> TransportResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        let mut attempt = 0;
        while filled < n {
            let end = (filled + CHUNK_CAP).min(n);
            match timeout(self.timeout, self.stream.read(&mut buf[filled..end])).await {
                Ok(Ok(0)) => return Err(TransportError::PeerClosed),
                Ok(Ok(read)) => {
                    filled += read;
                    attempt = 0;
                }
                Ok(Err(err)) if is_transient(&err) && attempt < RETRY_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(TransportError::Timeout),
            }
        }
        Ok(buf)
    }

    /// Distinguishes a live peer from a half-closed socket by peeking the
    /// socket non-destructively — never by injecting a heartbeat frame,
    /// which would confuse the peer's parser (spec §9's required fix).
    pub async fn is_alive(&self) -> bool {
        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe).await {
            Ok(0) => false,
            Ok(_) => true,
            Err(err) => err.kind() == io::ErrorKind::WouldBlock,
        }
    }

    /// Sends one message, applying the AES-CBC envelope iff `key` is
    /// `Some` — the caller (client engine / session) is responsible for
    /// only passing a key once its own `encrypted` flag has flipped to
    /// true after a successful `AUTH_RESPONSE`.
    pub async fn send_message(&mut self, msg: &Message, key: Option<&SessionKey>) -> TransportResult<()> {
        let body = msg.encode_body();
        let payload = match key {
            Some(key) => encrypt(key, &body),
            None => body,
        };
        let header = FrameHeader::new(msg.message_type() as u8, payload.len() as u32);
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&payload);
        self.send_all(&frame).await
    }

    /// Reads frames until a non-heartbeat message is decoded, silently
    /// discarding any `HEARTBEAT` frames interleaved in the stream.
    pub async fn recv_message(&mut self, key: Option<&SessionKey>) -> TransportResult<Message> {
        loop {
            let header_bytes = self.recv_exact(HEADER_LEN).await?;
            let header = FrameHeader::decode(&header_bytes)?;
            let payload = self.recv_exact(header.payload_size as usize).await?;
            let body = match key {
                Some(key) => decrypt(key, &payload)?,
                None => payload,
            };
            let msg = Message::decode(header.msg_type, &body)?;
            if msg.message_type() == MessageType::Heartbeat {
                continue;
            }
            return Ok(msg);
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::protocol::message::AuthType;

    #[tokio::test]
    async fn send_and_recv_message_round_trips_in_the_clear() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut link = TransportLink::new(stream);
            link.recv_message(None).await.unwrap()
        });

        let mut client = TransportLink::connect(&addr.to_string()).await.unwrap();
        let msg = Message::LoginRequest("alice".to_owned());
        client.send_message(&msg, None).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn heartbeats_are_skipped_silently() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut link = TransportLink::new(stream);
            link.recv_message(None).await.unwrap()
        });

        let mut client = TransportLink::connect(&addr.to_string()).await.unwrap();
        client.send_message(&Message::Heartbeat, None).await.unwrap();
        let real = Message::AuthRequest {
            auth_type: AuthType::Password,
            data: b"pw".to_vec(),
        };
        client.send_message(&real, None).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, real);
    }

    #[tokio::test]
    async fn send_and_recv_message_round_trips_encrypted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let key = SessionKey::derive("pw");
        let server_key = key.clone();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut link = TransportLink::new(stream);
            link.recv_message(Some(&server_key)).await.unwrap()
        });

        let mut client = TransportLink::connect(&addr.to_string()).await.unwrap();
        let msg = Message::PullResponse("up to date".to_owned());
        client.send_message(&msg, Some(&key)).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, msg);
    }
}
