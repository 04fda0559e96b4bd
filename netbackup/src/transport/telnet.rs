//! Plaintext Telnet transport over tokio's `TcpStream`.
//!
//! Option negotiation is refused wholesale: every `DO` is answered with
//! `WONT` and every `WILL` with `DONT`, so the device falls back to a plain
//! NVT byte stream. Login is left to the session driver.

use std::io;
use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::TransportConfig;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Incremental Telnet command stripper.
///
/// Keeps its state between calls so that a command split across two reads
/// is still recognised.
#[derive(Debug, Default)]
pub struct TelnetCodec {
    state: State,
}

impl TelnetCodec {
    /// Create a codec in the data state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split raw input into application data and negotiation replies.
    pub fn decode(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = Vec::new();

        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, 0) => State::Data,
                (State::Data, b) => {
                    data.push(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    data.push(IAC);
                    State::Data
                }
                (State::Iac, verb @ (DO | DONT | WILL | WONT)) => State::Negotiate(verb),
                (State::Iac, SB) => State::Subnegotiation,
                // NOP, GA, AYT and friends carry no payload.
                (State::Iac, _) => State::Data,
                (State::Negotiate(verb), option) => {
                    match verb {
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    State::Data
                }
                (State::Subnegotiation, IAC) => State::SubnegotiationIac,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationIac, SE) => State::Data,
                (State::SubnegotiationIac, _) => State::Subnegotiation,
            };
        }

        (data, replies)
    }

    /// Escape outgoing data (IAC bytes are doubled).
    pub fn encode(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for &b in data {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out
    }
}

/// Telnet transport.
pub struct TelnetTransport {
    stream: Option<TcpStream>,
    codec: TelnetCodec,
    timeout: Duration,
    buf: Box<[u8]>,
}

impl TelnetTransport {
    /// Open a TCP connection to the device.
    pub async fn connect(
        host: &str,
        port: u16,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        debug!("telnet: connecting to {}:{}", host, port);

        let stream = tokio::time::timeout(config.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))?
            .map_err(|e| match e.kind() {
                io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused {
                    host: host.to_string(),
                    port,
                },
                _ => TransportError::ConnectionFailed {
                    host: host.to_string(),
                    port,
                    source: e,
                },
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("telnet: failed to set TCP_NODELAY: {}", e);
        }

        Ok(Self {
            stream: Some(stream),
            codec: TelnetCodec::new(),
            timeout: config.timeout,
            buf: vec![0u8; 16 * 1024].into_boxed_slice(),
        })
    }
}

impl Transport for TelnetTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;
        let encoded = TelnetCodec::encode(data);
        tokio::time::timeout(self.timeout, stream.write_all(&encoded))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(TransportError::from_stream_io)?;
        trace!("telnet: wrote {} bytes", data.len());
        Ok(())
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;
        let deadline = tokio::time::Instant::now() + max_wait;

        // Negotiation-only reads yield no data; keep going until real bytes
        // arrive or the wait is over.
        loop {
            let n = match tokio::time::timeout_at(deadline, stream.read(&mut self.buf)).await {
                Err(_) => return Ok(Vec::new()),
                Ok(Ok(0)) => {
                    self.stream = None;
                    return Err(TransportError::Disconnected);
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(TransportError::from_stream_io(e)),
            };

            let (data, replies) = self.codec.decode(&self.buf[..n]);
            if !replies.is_empty() {
                trace!("telnet: refusing {} option(s)", replies.len() / 3);
                tokio::time::timeout(self.timeout, stream.write_all(&replies))
                    .await
                    .map_err(|_| TransportError::Timeout(self.timeout))?
                    .map_err(TransportError::from_stream_io)?;
            }
            if !data.is_empty() {
                trace!("telnet: read {} bytes", data.len());
                return Ok(data);
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("telnet: shutdown failed: {}", e);
            }
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_passes_through() {
        let mut codec = TelnetCodec::new();
        let (data, replies) = codec.decode(b"Username: ");
        assert_eq!(data, b"Username: ");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_options_are_refused() {
        let mut codec = TelnetCodec::new();
        // IAC WILL ECHO, IAC DO TERMINAL-TYPE, then data
        let (data, replies) = codec.decode(&[IAC, WILL, 1, IAC, DO, 24, b'o', b'k']);
        assert_eq!(data, b"ok");
        assert_eq!(replies, vec![IAC, DONT, 1, IAC, WONT, 24]);
    }

    #[test]
    fn test_dont_and_wont_need_no_reply() {
        let mut codec = TelnetCodec::new();
        let (data, replies) = codec.decode(&[IAC, DONT, 1, IAC, WONT, 3]);
        assert!(data.is_empty());
        assert!(replies.is_empty());
    }

    #[test]
    fn test_command_split_across_reads() {
        let mut codec = TelnetCodec::new();
        let (data, replies) = codec.decode(&[b'a', IAC]);
        assert_eq!(data, b"a");
        assert!(replies.is_empty());

        let (data, replies) = codec.decode(&[DO, 31, b'b']);
        assert_eq!(data, b"b");
        assert_eq!(replies, vec![IAC, WONT, 31]);
    }

    #[test]
    fn test_subnegotiation_is_discarded() {
        let mut codec = TelnetCodec::new();
        let (data, _) = codec.decode(&[b'x', IAC, SB, 24, 1, IAC, SE, b'y']);
        assert_eq!(data, b"xy");
    }

    #[test]
    fn test_escaped_iac_and_nul() {
        let mut codec = TelnetCodec::new();
        let (data, _) = codec.decode(&[b'a', IAC, IAC, b'\r', 0, b'b']);
        assert_eq!(data, vec![b'a', IAC, b'\r', b'b']);
    }

    #[test]
    fn test_encode_doubles_iac() {
        assert_eq!(TelnetCodec::encode(&[1, IAC, 2]), vec![1, IAC, IAC, 2]);
        assert_eq!(TelnetCodec::encode(b"enable\n"), b"enable\n");
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // Bind then drop to find a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TelnetTransport::connect("127.0.0.1", port, &TransportConfig::default()).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionRefused { .. })
        ));
    }

    #[tokio::test]
    async fn test_unread_negotiation_replies_time_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Floods option requests and never reads the refusals.
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let block: Vec<u8> = [IAC, DO, 24].repeat(16 * 1024);
            while sock.write_all(&block).await.is_ok() {}
        });

        let config = TransportConfig {
            timeout: Duration::from_secs(1),
            ..TransportConfig::default()
        };
        let mut transport = TelnetTransport::connect("127.0.0.1", port, &config)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let result = transport.read_available(Duration::from_secs(60)).await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(30));

        transport.close().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn test_round_trip_over_loopback() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[IAC, DO, 24]).await.unwrap();
            sock.write_all(b"login: ").await.unwrap();
            let mut reply = [0u8; 3];
            sock.read_exact(&mut reply).await.unwrap();
            assert_eq!(reply, [IAC, WONT, 24]);
            let mut line = vec![0u8; 6];
            sock.read_exact(&mut line).await.unwrap();
            assert_eq!(line, b"admin\n");
        });

        let mut transport = TelnetTransport::connect("127.0.0.1", port, &TransportConfig::default())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while !seen.ends_with(b"login: ") {
            seen.extend(transport.read_available(Duration::from_secs(5)).await.unwrap());
        }
        transport.write(b"admin\n").await.unwrap();
        server.await.unwrap();

        let closed = transport.read_available(Duration::from_secs(5)).await;
        assert!(matches!(closed, Err(TransportError::Disconnected)));
        assert!(transport.is_closed());
        transport.close().await.unwrap();
    }
}
