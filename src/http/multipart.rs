//! Multipart form data encoding.
//!
//! Builds an RFC 2046 `multipart/form-data` body from a variable field set
//! and a file field set. Variables are emitted before files, each group in
//! field enumeration order, so output is deterministic apart from the
//! boundary token.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::base::Error;
use crate::fields::FieldSet;
use crate::http::filepart::FilePart;

/// An encoded multipart body with the headers the request must carry.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: Bytes,
}

impl MultipartBody {
    /// Encode variables and files into a multipart body.
    ///
    /// A base name used by both a variable and a file is rejected before any
    /// bytes are produced; the error names every conflicting key.
    pub fn encode(
        variables: &FieldSet<String>,
        files: &FieldSet<FilePart>,
    ) -> Result<Self, Error> {
        let conflicts: Vec<String> = variables
            .bases()
            .filter(|base| files.contains_base(base))
            .map(str::to_string)
            .collect();
        if !conflicts.is_empty() {
            return Err(Error::DuplicateFieldName { names: conflicts });
        }

        let boundary = generate_boundary();
        let mut output = Vec::new();

        for (key, value) in variables.pairs() {
            output.extend_from_slice(b"--");
            output.extend_from_slice(boundary.as_bytes());
            output.extend_from_slice(b"\r\n");
            output.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"",
                    escape_quotes(&key)
                )
                .as_bytes(),
            );
            output.extend_from_slice(b"\r\n\r\n");
            output.extend_from_slice(value.as_bytes());
            output.extend_from_slice(b"\r\n");
        }

        for (key, file) in files.pairs() {
            output.extend_from_slice(b"--");
            output.extend_from_slice(boundary.as_bytes());
            output.extend_from_slice(b"\r\n");
            output.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                    escape_quotes(&key),
                    escape_quotes(file.file_name())
                )
                .as_bytes(),
            );
            output.extend_from_slice(b"\r\n");
            output.extend_from_slice(format!("Content-Type: {}", file.mime_type()).as_bytes());
            output.extend_from_slice(b"\r\n\r\n");
            output.extend_from_slice(file.content());
            output.extend_from_slice(b"\r\n");
        }

        // Final boundary
        output.extend_from_slice(b"--");
        output.extend_from_slice(boundary.as_bytes());
        output.extend_from_slice(b"--\r\n");

        Ok(Self {
            boundary,
            body: Bytes::from(output),
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Value for the request's `Content-Length` header.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Escape quotes, backslashes and line breaks in a disposition parameter.
fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

static BOUNDARY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a boundary token unique per call.
///
/// 16 digest bytes of timestamp, process id and a monotonic counter; long
/// and random enough that colliding with payload content is not a practical
/// concern.
fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = BOUNDARY_SEQ.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();

    format!("----volley{}", hex::encode(&digest[..16]))
}
