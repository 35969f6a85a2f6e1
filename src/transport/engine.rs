//! The shipped transport engine, backed by hyper.
//!
//! The engine owns a private tokio runtime and a completion channel. Each
//! submitted exchange becomes one task performing the wire work (connect,
//! send, redirects, auth); the scheduler thread observes progress only
//! through [`Transport::step`] and [`Transport::wait`], so the core stays
//! single-threaded cooperative multiplexing over many open connections.
//!
//! Engine policy, where the scheduler has none: redirects are followed up
//! to a configurable cap with 303 (and POST on 301/302) demoted to GET;
//! Basic credentials are sent preemptively; Digest credentials answer one
//! 401 challenge; plain `http` only - `https` and SOCKS proxies surface as
//! typed per-exchange errors.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST, LOCATION, PROXY_AUTHORIZATION, WWW_AUTHENTICATE};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::sync::mpsc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::{debug, trace};
use url::Url;

use crate::auth::digest::DigestChallenge;
use crate::auth::{AuthScheme, Credentials};
use crate::base::{Error, TransportError};
use crate::http::HeaderSet;
use crate::proxy::{ProxyKind, ProxySettings};
use crate::transport::{Completion, Handle, Method, RawOutput, Transport, TransportRequest};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Redirect hops before giving up.
    pub max_redirects: usize,
    /// Wall-clock budget for one exchange, redirects included.
    pub request_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            request_timeout: None,
        }
    }
}

/// hyper-backed [`Transport`] implementation.
#[derive(Debug)]
pub struct HyperEngine {
    runtime: Runtime,
    config: EngineConfig,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    /// Completions received by wait(), handed out by the next step().
    ready: Vec<Completion>,
    tasks: HashMap<Handle, tokio::task::JoinHandle<()>>,
    next_handle: u64,
}

impl HyperEngine {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("volley-engine")
            .enable_all()
            .build()
            .map_err(|err| Error::fault(format!("failed to start engine runtime: {err}")))?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            runtime,
            config,
            tx,
            rx,
            ready: Vec::new(),
            tasks: HashMap::new(),
            next_handle: 1,
        })
    }
}

impl Transport for HyperEngine {
    fn submit(&mut self, request: TransportRequest) -> Result<Handle, Error> {
        let handle = Handle::new(self.next_handle);
        self.next_handle += 1;

        let tx = self.tx.clone();
        let config = self.config.clone();
        let task = self.runtime.spawn(async move {
            let result = perform(request, &config).await;
            // the receiver lives as long as the engine; a send can only
            // fail during teardown, when nobody is listening anyway
            let _ = tx.send(Completion { handle, result });
        });
        self.tasks.insert(handle, task);
        Ok(handle)
    }

    fn step(&mut self) -> Result<Vec<Completion>, Error> {
        let mut finished = std::mem::take(&mut self.ready);
        while let Ok(completion) = self.rx.try_recv() {
            finished.push(completion);
        }
        Ok(finished)
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), Error> {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.ready.push(completion);
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::fault("engine completion channel closed"))
            }
        }
    }

    fn cancel(&mut self, handle: Handle) {
        if let Some(task) = self.tasks.get(&handle) {
            task.abort();
        }
    }

    fn remove(&mut self, handle: Handle) {
        self.tasks.remove(&handle);
    }
}

async fn perform(
    request: TransportRequest,
    config: &EngineConfig,
) -> Result<RawOutput, TransportError> {
    match config.request_timeout {
        Some(limit) => tokio::time::timeout(limit, drive(request, config))
            .await
            .map_err(|_| TransportError::ConnectionTimedOut)?,
        None => drive(request, config).await,
    }
}

async fn drive(
    request: TransportRequest,
    config: &EngineConfig,
) -> Result<RawOutput, TransportError> {
    let mut url = request.url.clone();
    url.set_fragment(None);
    let mut method = request.method;
    let mut headers = request.headers.clone();
    let mut body = request.body.clone();

    let mut digest_header: Option<String> = None;
    let mut digest_tried = false;
    let mut redirects = 0;

    loop {
        let (parts, payload) = send_once(
            &url,
            method,
            &headers,
            &body,
            request.credentials.as_ref(),
            request.proxy.as_ref(),
            digest_header.as_deref(),
        )
        .await?;

        // answer a digest challenge once, then replay
        if parts.status == StatusCode::UNAUTHORIZED && !digest_tried {
            let digest_creds = request
                .credentials
                .as_ref()
                .filter(|c| c.scheme() == AuthScheme::Digest);
            if let (Some(creds), Some(challenge_text)) =
                (digest_creds, challenge_value(&parts.headers))
            {
                if let Ok(mut challenge) = DigestChallenge::parse(challenge_text) {
                    let uri = origin_form(&url);
                    digest_header = Some(challenge.authorization(
                        creds.username(),
                        creds.password(),
                        method.as_str(),
                        &uri,
                    ));
                    digest_tried = true;
                    debug!(%url, "answering digest challenge");
                    continue;
                }
                // unparseable challenge: surface the 401 as-is
            }
        }

        if parts.status.is_redirection() {
            if let Some(location) = parts
                .headers
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                redirects += 1;
                if redirects > config.max_redirects {
                    return Err(TransportError::TooManyRedirects);
                }
                url = url
                    .join(location)
                    .map_err(|_| TransportError::InvalidUrl)?;
                url.set_fragment(None);

                let status = parts.status.as_u16();
                if status == 303 || ((status == 301 || status == 302) && method == Method::Post) {
                    method = Method::Get;
                    body = Bytes::new();
                    headers.remove("Content-Type");
                    headers.remove("Content-Length");
                }
                trace!(%url, status, "following redirect");
                continue;
            }
        }

        return Ok(serialize_raw(url, parts, payload));
    }
}

/// One request/response round trip on a fresh connection.
async fn send_once(
    url: &Url,
    method: Method,
    headers: &HeaderSet,
    body: &Bytes,
    credentials: Option<&Credentials>,
    proxy: Option<&ProxySettings>,
    digest_header: Option<&str>,
) -> Result<(http::response::Parts, Bytes), TransportError> {
    match url.scheme() {
        "http" => {}
        "https" => return Err(TransportError::TlsUnsupported),
        _ => return Err(TransportError::DisallowedUrlScheme),
    }
    let host = url.host_str().ok_or(TransportError::InvalidUrl)?;
    let port = url.port_or_known_default().unwrap_or(80);

    if let Some(proxy) = proxy {
        if proxy.kind() == ProxyKind::Socks5 {
            return Err(TransportError::SocksUnsupported);
        }
    }
    let (connect_host, connect_port) = match proxy {
        Some(proxy) => {
            let (proxy_host, proxy_port) = proxy.host_port();
            (proxy_host.to_string(), proxy_port)
        }
        None => (host.to_string(), port),
    };

    let stream = TcpStream::connect((connect_host.as_str(), connect_port))
        .await
        .map_err(TransportError::from)?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(map_hyper_error)?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            trace!(error = %err, "connection task ended with error");
        }
    });

    // absolute-form through a proxy, origin-form otherwise
    let uri = if proxy.is_some() {
        url.as_str().to_string()
    } else {
        origin_form(url)
    };

    let mut req = http::Request::builder()
        .method(method.as_str())
        .uri(uri)
        .body(Full::new(body.clone()))
        .map_err(|_| TransportError::InvalidUrl)?;
    let header_map = req.headers_mut();

    // conn-level hyper does not add Host itself
    if !headers.contains("Host") {
        let host_value = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        header_map.insert(
            HOST,
            HeaderValue::from_str(&host_value).map_err(|_| TransportError::InvalidUrl)?,
        );
    }
    for (name, value) in headers.iter() {
        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| TransportError::InvalidUrl)?;
        let value = HeaderValue::from_str(value).map_err(|_| TransportError::InvalidUrl)?;
        header_map.append(name, value);
    }

    if let Some(value) = digest_header {
        header_map.insert(
            AUTHORIZATION,
            HeaderValue::from_str(value).map_err(|_| TransportError::InvalidUrl)?,
        );
    } else if let Some(value) = credentials.and_then(Credentials::basic_header) {
        if !header_map.contains_key(AUTHORIZATION) {
            header_map.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|_| TransportError::InvalidUrl)?,
            );
        }
    }
    if let Some(value) = proxy.and_then(ProxySettings::auth_header) {
        header_map.insert(
            PROXY_AUTHORIZATION,
            HeaderValue::from_str(&value).map_err(|_| TransportError::InvalidUrl)?,
        );
    }

    let response = sender.send_request(req).await.map_err(map_hyper_error)?;
    let (parts, incoming) = response.into_parts();
    let payload = incoming
        .collect()
        .await
        .map_err(map_hyper_error)?
        .to_bytes();
    Ok((parts, payload))
}

/// Re-serialize the response so the parser boundary sees one combined
/// byte block with a header/body split offset, as the transport contract
/// requires.
fn serialize_raw(url: Url, parts: http::response::Parts, payload: Bytes) -> RawOutput {
    let status = parts.status;
    let mut raw = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .into_bytes();
    for (name, value) in parts.headers.iter() {
        raw.extend_from_slice(name.as_str().as_bytes());
        raw.extend_from_slice(b": ");
        raw.extend_from_slice(value.as_bytes());
        raw.extend_from_slice(b"\r\n");
    }
    raw.extend_from_slice(b"\r\n");
    let header_len = raw.len();
    raw.extend_from_slice(&payload);

    RawOutput {
        bytes: Bytes::from(raw),
        header_len,
        effective_url: url,
        status: status.as_u16(),
    }
}

fn challenge_value(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            value
                .strip_prefix("Digest ")
                .or_else(|| value.strip_prefix("digest "))
        })
}

fn origin_form(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn map_hyper_error(err: hyper::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::ConnectionTimedOut
    } else if err.is_incomplete_message() {
        TransportError::ConnectionClosed
    } else if err.is_parse() || err.is_parse_status() {
        TransportError::InvalidResponse
    } else if err.is_canceled() || err.is_closed() {
        TransportError::ConnectionClosed
    } else {
        TransportError::ConnectionFailed
    }
}
