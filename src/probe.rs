//! Single-port probes.
//!
//! Each probe opens its own session, performs exactly one exchange and
//! classifies the reply. Every failure mode collapses into
//! [`ProbeOutcome::None`] here; nothing above this module sees a `ProbeError`.

use crate::error::ProbeError;
use crate::transport::{ProbeSession, ProbeTransport, Request, Response, PROXY_SENTINEL};
use crate::types::{ProbeOutcome, Target};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::time;

/// Status command answered cheaply by QWFWD proxies.
pub const PROXY_COMMAND: &str = "pingstatus";

/// Query a game server for its userinfo.
pub async fn probe_server(
    transport: &dyn ProbeTransport,
    target: &Target,
    timeout: Duration,
) -> ProbeOutcome {
    let result = bounded(timeout, query_server(transport, target, timeout)).await;
    settle(target, "server", result)
}

/// Ping a proxy. Only the first payload byte is checked.
pub async fn probe_proxy(
    transport: &dyn ProbeTransport,
    target: &Target,
    timeout: Duration,
) -> ProbeOutcome {
    let result = bounded(timeout, query_proxy(transport, target, timeout)).await;
    settle(target, "proxy", result)
}

async fn query_server(
    transport: &dyn ProbeTransport,
    target: &Target,
    timeout: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let response = exchange(transport, target, &Request::GetInfo, timeout).await?;
    Ok(ProbeOutcome::ServerInfo(response.userinfo()?))
}

async fn query_proxy(
    transport: &dyn ProbeTransport,
    target: &Target,
    timeout: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let request = Request::Command(PROXY_COMMAND.to_string());
    let response = exchange(transport, target, &request, timeout).await?;
    match response.first_byte() {
        Some(PROXY_SENTINEL) => Ok(ProbeOutcome::ProxyAlive),
        Some(other) => Err(ProbeError::Malformed(format!(
            "unexpected proxy header byte {other:#04x}"
        ))),
        None => Err(ProbeError::Malformed("empty proxy reply".into())),
    }
}

/// Open a session, send one request, and release the session on every path.
async fn exchange(
    transport: &dyn ProbeTransport,
    target: &Target,
    request: &Request,
    timeout: Duration,
) -> Result<Response, ProbeError> {
    let mut session = SessionGuard::new(transport.open(target).await?);
    session.request(request, timeout).await
}

/// Cap the whole probe, including session setup, at `timeout`.
async fn bounded<F>(timeout: Duration, fut: F) -> Result<ProbeOutcome, ProbeError>
where
    F: Future<Output = Result<ProbeOutcome, ProbeError>>,
{
    time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(ProbeError::Timeout))
}

fn settle(target: &Target, kind: &str, result: Result<ProbeOutcome, ProbeError>) -> ProbeOutcome {
    result.unwrap_or_else(|e| {
        log::trace!("{kind} probe {target}: {e}");
        ProbeOutcome::None
    })
}

/// Terminates the wrapped session when dropped, including on timeout
/// cancellation and unwinding.
struct SessionGuard(Box<dyn ProbeSession>);

impl SessionGuard {
    fn new(session: Box<dyn ProbeSession>) -> Self {
        Self(session)
    }
}

impl Deref for SessionGuard {
    type Target = dyn ProbeSession;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.terminate();
    }
}
