//! The transport boundary.
//!
//! The scheduler never speaks HTTP on the wire itself. It hands a fully
//! configured [`TransportRequest`] to a [`Transport`], drives the
//! transport's progress with [`Transport::step`] and [`Transport::wait`],
//! and demultiplexes [`Completion`]s back to their exchanges by
//! [`Handle`]. Two engines ship:
//!
//! - [`HyperEngine`]: real network I/O over hyper on a private tokio
//!   runtime.
//! - [`ScriptedTransport`]: deterministic in-memory completions for tests.

pub mod engine;
pub mod scripted;

use bytes::Bytes;
use std::time::Duration;
use url::Url;

use crate::auth::Credentials;
use crate::base::{Error, TransportError};
use crate::http::HeaderSet;
use crate::proxy::ProxySettings;

pub use engine::{EngineConfig, HyperEngine};
pub use scripted::{Plan, ScriptedTransport};

/// HTTP method of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque per-exchange token assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A finalized exchange, ready for the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Effective URL including any encoded query string.
    pub url: Url,
    /// Headers in send order; duplicates allowed.
    pub headers: HeaderSet,
    /// Body bytes; empty for GET.
    pub body: Bytes,
    pub credentials: Option<Credentials>,
    pub proxy: Option<ProxySettings>,
}

/// Raw result of a successful exchange, as produced by a transport.
///
/// `bytes` is the combined header block and body; `header_len` is the
/// split offset. Effective URL and status come from transport metadata,
/// never from re-parsing the payload.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub bytes: Bytes,
    pub header_len: usize,
    pub effective_url: Url,
    pub status: u16,
}

/// One finished exchange reported by a progress step.
#[derive(Debug)]
pub struct Completion {
    pub handle: Handle,
    pub result: Result<RawOutput, TransportError>,
}

/// An engine that performs network I/O for submitted exchanges.
///
/// Errors returned from [`submit`](Transport::submit),
/// [`step`](Transport::step) or [`wait`](Transport::wait) are
/// multiplexer-level faults and abort a whole run; a single exchange's
/// network failure travels inside its [`Completion`] instead.
pub trait Transport {
    /// Hand an exchange to the engine, receiving its handle.
    fn submit(&mut self, request: TransportRequest) -> Result<Handle, Error>;

    /// Advance all in-flight exchanges, returning those finished since the
    /// last step.
    fn step(&mut self) -> Result<Vec<Completion>, Error>;

    /// Block until at least one exchange is likely to have progressed, or
    /// the timeout elapses.
    fn wait(&mut self, timeout: Duration) -> Result<(), Error>;

    /// Abort an in-flight exchange. No completion will be reported for it.
    fn cancel(&mut self, handle: Handle);

    /// Release bookkeeping for a handle. Safe to call more than once or
    /// for a handle already gone.
    fn remove(&mut self, handle: Handle);
}
