//! Telnet transport over a plain TCP stream.
//!
//! Only the bits of RFC 854 a CLI scraper needs: option negotiation is
//! answered (echo and suppress-go-ahead accepted, everything else refused),
//! subnegotiations are skipped, and `IAC IAC` is unescaped in both
//! directions.

use bytes::BytesMut;
use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::config::TransportConfig;
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Telnet command parser state, kept across reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IacState {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Telnet transport.
pub struct TelnetTransport {
    stream: TcpStream,
    state: IacState,
    read_buf: BytesMut,
}

impl TelnetTransport {
    /// Open the TCP connection.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let stream = tokio::time::timeout(
            config.timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout,
        })?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("{}: could not disable Nagle: {}", config.socket_addr(), e);
        }
        debug!("telnet connected to {}", config.socket_addr());

        Ok(Self {
            stream,
            state: IacState::Data,
            read_buf: BytesMut::with_capacity(4096),
        })
    }

    /// Write data, escaping literal 0xFF bytes.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut out = Vec::with_capacity(data.len());
        for &b in data {
            if b == IAC {
                out.push(IAC);
            }
            out.push(b);
        }
        self.stream
            .write_all(&out)
            .await
            .map_err(TransportError::Io)?;
        Ok(())
    }

    /// Read the next chunk of data with telnet commands removed.
    ///
    /// Returns `None` once the peer closed the connection. May return an
    /// empty chunk when a read contained only negotiation.
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_buf.clear();
        let n = self
            .stream
            .read_buf(&mut self.read_buf)
            .await
            .map_err(TransportError::Io)?;
        if n == 0 {
            return Ok(None);
        }

        let raw = self.read_buf.split().freeze();
        let (data, replies) = self.filter(&raw);
        if !replies.is_empty() {
            self.stream
                .write_all(&replies)
                .await
                .map_err(TransportError::Io)?;
        }
        Ok(Some(data))
    }

    /// Split telnet commands out of `raw`; returns payload and negotiation replies.
    fn filter(&mut self, raw: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(raw.len());
        let mut replies = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            if self.state == IacState::Data {
                // Fast path: copy everything up to the next IAC
                match memchr::memchr(IAC, rest) {
                    Some(pos) => {
                        data.extend_from_slice(&rest[..pos]);
                        self.state = IacState::Iac;
                        rest = &rest[pos + 1..];
                    }
                    None => {
                        data.extend_from_slice(rest);
                        rest = &[];
                    }
                }
                continue;
            }

            let b = rest[0];
            rest = &rest[1..];
            self.state = match self.state {
                IacState::Data => IacState::Data,
                IacState::Iac => match b {
                    IAC => {
                        data.push(IAC);
                        IacState::Data
                    }
                    DO | DONT | WILL | WONT => IacState::Negotiate(b),
                    SB => IacState::Sub,
                    _ => IacState::Data,
                },
                IacState::Negotiate(verb) => {
                    if let Some(reply) = negotiation_reply(verb, b) {
                        trace!("telnet option {b}: verb {verb} -> {reply}");
                        replies.extend_from_slice(&[IAC, reply, b]);
                    }
                    IacState::Data
                }
                IacState::Sub => {
                    if b == IAC {
                        IacState::SubIac
                    } else {
                        IacState::Sub
                    }
                }
                IacState::SubIac => {
                    if b == SE {
                        IacState::Data
                    } else {
                        IacState::Sub
                    }
                }
            };
        }

        (data, replies)
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

/// Answer to a peer negotiation, or `None` when no answer is due.
fn negotiation_reply(verb: u8, option: u8) -> Option<u8> {
    let accepted = matches!(option, OPT_ECHO | OPT_SGA);
    match verb {
        WILL if accepted => Some(DO),
        WILL => Some(DONT),
        // We only perform suppress-go-ahead ourselves
        DO if option == OPT_SGA => Some(WILL),
        DO => Some(WONT),
        // Acknowledgements of refusals need no reply
        WONT | DONT => None,
        _ => None,
    }
}
