//! Connectionless challenge/response transport.
//!
//! Probes talk to a host through [`ProbeTransport`]; each call to `open`
//! yields an independent [`ProbeSession`] that is used for one exchange and
//! then terminated. [`UdpTransport`] is the real network implementation.

use crate::error::ProbeError;
use crate::types::{Target, Userinfo};
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{self, UdpSocket};
use tokio::time;

/// Header prefixed to every out-of-band packet, in both directions.
pub const OOB_HEADER: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF];

/// First payload byte of a proxy `pingstatus` reply.
pub const PROXY_SENTINEL: u8 = b'n';

const INFO_CHALLENGE: &str = "q3scan";
const INFO_RESPONSE: &str = "infoResponse";
const MAX_DATAGRAM: usize = 16 * 1024;

/// A query sent to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Full server info query.
    GetInfo,
    /// Bare out-of-band command, e.g. `pingstatus`.
    Command(String),
}

impl Request {
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = OOB_HEADER.to_vec();
        match self {
            Request::GetInfo => {
                packet.extend_from_slice(format!("getinfo {INFO_CHALLENGE}\n").as_bytes())
            }
            Request::Command(cmd) => packet.extend_from_slice(cmd.as_bytes()),
        }
        packet
    }
}

/// Reply payload with the out-of-band header already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub data: Vec<u8>,
}

impl Response {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Strip the out-of-band header from a raw datagram.
    pub fn decode(packet: &[u8]) -> Result<Self, ProbeError> {
        packet
            .strip_prefix(OOB_HEADER)
            .map(Self::new)
            .ok_or_else(|| ProbeError::Malformed("missing out-of-band header".into()))
    }

    pub fn first_byte(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Interpret the payload as an `infoResponse` and return its key/value pairs verbatim.
    ///
    /// Bytes are mapped one-to-one onto chars (Latin-1), so high-ASCII names survive.
    pub fn userinfo(&self) -> Result<Userinfo, ProbeError> {
        let text: String = self.data.iter().map(|&b| b as char).collect();
        let (command, info) = text
            .split_once('\n')
            .ok_or_else(|| ProbeError::Malformed("no command line".into()))?;
        if command.trim_end() != INFO_RESPONSE {
            return Err(ProbeError::Malformed(format!("unexpected command {command:?}")));
        }
        parse_info_string(info.trim_end_matches(['\n', '\0']))
    }
}

/// Parse a `\key\value\key\value` string.
pub fn parse_info_string(info: &str) -> Result<Userinfo, ProbeError> {
    let body = info.strip_prefix('\\').unwrap_or(info);
    if body.is_empty() {
        return Ok(Userinfo::default());
    }
    let mut parts: Vec<&str> = body.split('\\').collect();
    // Tolerate a single trailing separator.
    if parts.len() % 2 != 0 && parts.last() == Some(&"") {
        parts.pop();
    }
    if parts.len() % 2 != 0 {
        return Err(ProbeError::Malformed(format!(
            "info string has a key without a value: {info:?}"
        )));
    }
    Ok(parts
        .chunks_exact(2)
        .map(|kv| (kv[0], kv[1]))
        .collect())
}

/// Opens per-probe sessions. Implementations must be shareable across pool workers.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn open(&self, target: &Target) -> Result<Box<dyn ProbeSession>, ProbeError>;
}

/// One exclusive conversation with a target.
#[async_trait]
pub trait ProbeSession: Send {
    /// Send `request` and wait up to `timeout` for one reply.
    async fn request(&mut self, request: &Request, timeout: Duration)
        -> Result<Response, ProbeError>;

    /// Release the session. Must be idempotent and safe after a failed request.
    fn terminate(&mut self);
}

/// UDP implementation of [`ProbeTransport`].
#[derive(Debug, Clone, Default)]
pub struct UdpTransport;

#[async_trait]
impl ProbeTransport for UdpTransport {
    async fn open(&self, target: &Target) -> Result<Box<dyn ProbeSession>, ProbeError> {
        let addr = net::lookup_host((target.host.as_str(), target.port))
            .await?
            .next()
            .ok_or_else(|| ProbeError::Unresolved(target.host.clone()))?;
        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        Ok(Box::new(UdpSession {
            socket: Some(socket),
        }))
    }
}

struct UdpSession {
    socket: Option<UdpSocket>,
}

#[async_trait]
impl ProbeSession for UdpSession {
    async fn request(
        &mut self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Response, ProbeError> {
        let socket = self.socket.as_ref().ok_or_else(|| {
            ProbeError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "session terminated",
            ))
        })?;
        socket.send(&request.encode()).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let n = time::timeout(timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ProbeError::Timeout)??;
        Response::decode(&buf[..n])
    }

    fn terminate(&mut self) {
        self.socket.take();
    }
}
