//! Request authentication descriptors.
//!
//! [`Credentials`] is a thin value object attached to an exchange; the
//! transport engine decides how to apply it (preemptive `Authorization`
//! header for Basic, challenge/response for Digest).

pub mod digest;

use base64::{engine::general_purpose, Engine as _};
use zeroize::Zeroizing;

/// Authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

/// Username/password credentials tied to an exchange.
#[derive(Debug, Clone)]
pub struct Credentials {
    scheme: AuthScheme,
    username: String,
    /// Zeroized on drop.
    password: Zeroizing<String>,
}

impl Credentials {
    /// Basic credentials, sent preemptively.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Basic,
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Digest credentials, applied in answer to a server challenge.
    pub fn digest(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Digest,
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `Authorization` header value for Basic credentials.
    pub fn basic_header(&self) -> Option<String> {
        if self.scheme != AuthScheme::Basic {
            return None;
        }
        let pair = format!("{}:{}", self.username, self.password.as_str());
        Some(format!("Basic {}", general_purpose::STANDARD.encode(pair)))
    }
}
