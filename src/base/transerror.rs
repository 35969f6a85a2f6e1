use thiserror::Error;

/// A single exchange's transport-level failure.
///
/// Recorded on the owning exchange and delivered through its callback;
/// never raised as an `Err` from a batch run, because in a batch there is
/// no single call site to raise it to. Each variant carries a stable
/// negative code so outcomes can be logged and compared numerically.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Connection reset")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,

    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,

    #[error("TLS is not supported by this transport engine")]
    TlsUnsupported,
    #[error("SOCKS proxies are not supported by this transport engine")]
    SocksUnsupported,
    #[error("Exchange was cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl TransportError {
    pub fn as_i32(&self) -> i32 {
        match self {
            TransportError::ConnectionClosed => -100,
            TransportError::ConnectionReset => -101,
            TransportError::ConnectionRefused => -102,
            TransportError::ConnectionAborted => -103,
            TransportError::ConnectionFailed => -104,
            TransportError::NameNotResolved => -105,
            TransportError::AddressUnreachable => -109,
            TransportError::ConnectionTimedOut => -118,

            TransportError::InvalidUrl => -300,
            TransportError::DisallowedUrlScheme => -301,
            TransportError::TooManyRedirects => -310,
            TransportError::InvalidResponse => -320,
            TransportError::EmptyResponse => -324,

            // Engine-specific codes start at -900
            TransportError::TlsUnsupported => -900,
            TransportError::SocksUnsupported => -901,
            TransportError::Cancelled => -902,
            TransportError::Unknown(code) => *code,
        }
    }
}

impl From<i32> for TransportError {
    fn from(code: i32) -> Self {
        match code {
            -100 => TransportError::ConnectionClosed,
            -101 => TransportError::ConnectionReset,
            -102 => TransportError::ConnectionRefused,
            -103 => TransportError::ConnectionAborted,
            -104 => TransportError::ConnectionFailed,
            -105 => TransportError::NameNotResolved,
            -109 => TransportError::AddressUnreachable,
            -118 => TransportError::ConnectionTimedOut,

            -300 => TransportError::InvalidUrl,
            -301 => TransportError::DisallowedUrlScheme,
            -310 => TransportError::TooManyRedirects,
            -320 => TransportError::InvalidResponse,
            -324 => TransportError::EmptyResponse,

            -900 => TransportError::TlsUnsupported,
            -901 => TransportError::SocksUnsupported,
            -902 => TransportError::Cancelled,
            _ => TransportError::Unknown(code),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused => TransportError::ConnectionRefused,
            ErrorKind::ConnectionReset => TransportError::ConnectionReset,
            ErrorKind::ConnectionAborted => TransportError::ConnectionAborted,
            ErrorKind::TimedOut => TransportError::ConnectionTimedOut,
            ErrorKind::AddrNotAvailable => TransportError::AddressUnreachable,
            ErrorKind::NotConnected | ErrorKind::BrokenPipe => TransportError::ConnectionClosed,
            _ => TransportError::ConnectionFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for err in [
            TransportError::ConnectionRefused,
            TransportError::ConnectionTimedOut,
            TransportError::TooManyRedirects,
            TransportError::TlsUnsupported,
            TransportError::Cancelled,
        ] {
            assert_eq!(TransportError::from(err.as_i32()), err);
        }
    }

    #[test]
    fn unknown_codes_survive() {
        let err = TransportError::from(-12345);
        assert_eq!(err, TransportError::Unknown(-12345));
        assert_eq!(err.as_i32(), -12345);
    }

    #[test]
    fn io_kind_mapping() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(TransportError::from(io), TransportError::ConnectionRefused);
    }
}
