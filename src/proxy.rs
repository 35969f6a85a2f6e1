//! Proxy server descriptors.
//!
//! [`ProxySettings`] is configuration only; the transport engine performs
//! the actual proxy handshake. HTTP proxies are spoken by the shipped
//! engine; a SOCKS5 descriptor is carried through and surfaced by engines
//! that cannot speak it.

use base64::{engine::general_purpose, Engine as _};
use url::Url;
use zeroize::Zeroizing;

use crate::base::Error;

/// Proxy protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// HTTP proxy (absolute-form requests, CONNECT for tunnelling)
    Http,
    /// SOCKS5 proxy
    Socks5,
}

/// Proxy configuration attached to an exchange.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    url: Url,
    username: Option<String>,
    /// Zeroized on drop.
    password: Option<Zeroizing<String>>,
    tunnel: bool,
}

impl ProxySettings {
    /// Create proxy settings from a URL string such as
    /// `http://proxy.example:8080` or `socks5://proxy.example:1080`.
    pub fn new(url_str: &str) -> Result<Self, Error> {
        let url = Url::parse(url_str).map_err(|_| Error::InvalidUrl {
            url: url_str.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" | "socks5" | "socks5h" => {}
            _ => {
                return Err(Error::InvalidUrl {
                    url: url_str.to_string(),
                })
            }
        }
        if url.host_str().is_none() {
            return Err(Error::InvalidUrl {
                url: url_str.to_string(),
            });
        }
        Ok(Self {
            url,
            username: None,
            password: None,
            tunnel: false,
        })
    }

    /// Create proxy settings from environment variables.
    ///
    /// Checks `HTTPS_PROXY`/`https_proxy` and `HTTP_PROXY`/`http_proxy`.
    pub fn from_env() -> Option<Self> {
        let url_str = std::env::var("HTTPS_PROXY")
            .or_else(|_| std::env::var("https_proxy"))
            .or_else(|_| std::env::var("HTTP_PROXY"))
            .or_else(|_| std::env::var("http_proxy"))
            .ok()?;
        Self::new(&url_str).ok()
    }

    /// Add authentication credentials.
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(Zeroizing::new(password.to_string()));
        self
    }

    /// Tunnel through the proxy with CONNECT instead of absolute-form
    /// forwarding. Defaults to false.
    pub fn with_tunnel(mut self, tunnel: bool) -> Self {
        self.tunnel = tunnel;
        self
    }

    pub fn kind(&self) -> ProxyKind {
        match self.url.scheme() {
            "socks5" | "socks5h" => ProxyKind::Socks5,
            _ => ProxyKind::Http,
        }
    }

    pub fn is_tunnel(&self) -> bool {
        self.tunnel
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Proxy host and port (default port by kind when absent).
    pub fn host_port(&self) -> (&str, u16) {
        let host = self.url.host_str().unwrap_or_default();
        let port = self.url.port().unwrap_or(match self.kind() {
            ProxyKind::Http => 8080,
            ProxyKind::Socks5 => 1080,
        });
        (host, port)
    }

    pub fn requires_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// `Proxy-Authorization` header value for HTTP proxies.
    pub fn auth_header(&self) -> Option<String> {
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            let pair = format!("{}:{}", user, pass.as_str());
            Some(format!("Basic {}", general_purpose::STANDARD.encode(pair)))
        } else {
            None
        }
    }
}
