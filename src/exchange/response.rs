use bytes::Bytes;
use std::path::Path;
use tracing::trace;
use url::Url;

use crate::base::{Error, TransportError};
use crate::http::HeaderSet;
use crate::transport::RawOutput;

/// The data returned by a completed exchange.
///
/// Immutable once constructed, except that the body may be released to
/// bound memory when downloading many large payloads; releasing it does
/// not invalidate the URL, status or headers.
#[derive(Debug)]
pub struct Response {
    url: Url,
    status: u16,
    headers: HeaderSet,
    body: Option<Bytes>,
}

impl Response {
    /// Build a response from a transport's raw combined output.
    ///
    /// The header region is parsed line-wise: a line starting `HTTP/`
    /// resets the map, so intermediate redirect header blocks are
    /// discarded; a duplicated header name resolves to its last value.
    /// The remainder past the split offset is the body, sliced without
    /// copying.
    pub fn parse(raw: RawOutput) -> Result<Self, TransportError> {
        if raw.header_len > raw.bytes.len() {
            return Err(TransportError::InvalidResponse);
        }
        if raw.bytes.is_empty() {
            return Err(TransportError::EmptyResponse);
        }

        let mut headers = HeaderSet::new();
        let header_text = String::from_utf8_lossy(&raw.bytes[..raw.header_len]);
        for line in header_text.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if line.starts_with("HTTP/") {
                headers.clear();
                continue;
            }
            let Some(colon) = line.find(':') else {
                continue;
            };
            let name = line[..colon].trim();
            let value = line[colon + 1..].trim();
            if headers.set(name, value).is_err() {
                trace!(header = name, "skipping unparseable response header");
            }
        }

        Ok(Self {
            url: raw.effective_url,
            status: raw.status,
            headers,
            body: Some(raw.bytes.slice(raw.header_len..)),
        })
    }

    /// The final URL reached, after any redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The HTTP status code returned by the server.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// First value of a response header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The response body, unless it has been released.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Forget the body to free memory; headers, status and URL survive.
    pub fn release_body(&mut self) {
        self.body = None;
    }

    /// The resource name taken from the effective URL's path.
    pub fn file_name(&self) -> Option<&str> {
        self.url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
    }

    /// Write the body to `directory` under the URL's resource name.
    pub fn write_to(&self, directory: impl AsRef<Path>) -> Result<(), Error> {
        let name = self
            .file_name()
            .ok_or_else(|| Error::Validation("response URL carries no file name".to_string()))?
            .to_string();
        self.write_to_as(directory, &name)
    }

    /// Write the body to `directory` under an explicit name.
    pub fn write_to_as(&self, directory: impl AsRef<Path>, name: &str) -> Result<(), Error> {
        let body = self.body.as_ref().ok_or(Error::BodyReleased)?;
        std::fs::write(directory.as_ref().join(name), body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str, header_len: usize, url: &str, status: u16) -> RawOutput {
        RawOutput {
            bytes: Bytes::copy_from_slice(text.as_bytes()),
            header_len,
            effective_url: Url::parse(url).unwrap(),
            status,
        }
    }

    #[test]
    fn splits_headers_and_body() {
        let text = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Tag: a\r\n\r\nhello";
        let response =
            Response::parse(raw(text, text.len() - 5, "http://example.com/a.txt", 200)).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.body().unwrap().as_ref(), b"hello");
        assert_eq!(response.file_name(), Some("a.txt"));
    }

    #[test]
    fn duplicate_headers_last_value_wins() {
        let text = "HTTP/1.1 200 OK\r\nX-Tag: first\r\nX-Tag: second\r\n\r\n";
        let response = Response::parse(raw(text, text.len(), "http://example.com/", 200)).unwrap();
        assert_eq!(response.header("x-tag"), Some("second"));
        // position of the first occurrence is kept
        assert_eq!(response.headers().iter().next().unwrap().0, "X-Tag");
    }

    #[test]
    fn intermediate_redirect_blocks_discarded() {
        let text = concat!(
            "HTTP/1.1 302 Found\r\nLocation: /next\r\n\r\n",
            "HTTP/1.1 200 OK\r\nX-Final: yes\r\n\r\n",
        );
        let response = Response::parse(raw(text, text.len(), "http://example.com/next", 200)).unwrap();
        assert_eq!(response.header("X-Final"), Some("yes"));
        assert!(response.header("Location").is_none());
    }

    #[test]
    fn release_body_keeps_metadata() {
        let text = "HTTP/1.1 200 OK\r\n\r\nbody";
        let mut response =
            Response::parse(raw(text, text.len() - 4, "http://example.com/f", 200)).unwrap();
        response.release_body();
        assert!(response.body().is_none());
        assert_eq!(response.status(), 200);
        assert!(matches!(
            response.write_to_as("/tmp", "f"),
            Err(Error::BodyReleased)
        ));
    }

    #[test]
    fn bad_split_offset_rejected() {
        let out = raw("HTTP/1.1 200 OK\r\n\r\n", 999, "http://example.com/", 200);
        assert_eq!(
            Response::parse(out).unwrap_err(),
            TransportError::InvalidResponse
        );
    }

    #[test]
    fn writes_body_to_disk() {
        let text = "HTTP/1.1 200 OK\r\n\r\npayload";
        let response =
            Response::parse(raw(text, text.len() - 7, "http://example.com/out.bin", 200)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        response.write_to(dir.path()).unwrap();
        let written = std::fs::read(dir.path().join("out.bin")).unwrap();
        assert_eq!(written, b"payload");
    }
}
