use bytes::Bytes;
use std::path::Path;

use crate::base::Error;

/// A file to send with a request, either as one part of a multipart POST
/// body or as the raw payload of a PUT.
#[derive(Debug, Clone)]
pub struct FilePart {
    file_name: String,
    mime_type: String,
    content: Bytes,
}

impl FilePart {
    /// Build a part from in-memory bytes.
    pub fn from_bytes(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "application/octet-stream".to_string(),
            content: content.into(),
        }
    }

    /// Read a part from disk; the file name is the path's final component.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_bytes(file_name, content))
    }

    /// Override the MIME type (defaults to `application/octet-stream`).
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_bytes_defaults_mime() {
        let part = FilePart::from_bytes("doc.txt", b"hello".as_slice());
        assert_eq!(part.file_name(), "doc.txt");
        assert_eq!(part.mime_type(), "application/octet-stream");
        assert_eq!(part.len(), 5);
    }

    #[test]
    fn from_path_reads_content() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"on disk").unwrap();

        let part = FilePart::from_path(tmp.path()).unwrap();
        assert_eq!(part.content().as_ref(), b"on disk");
        assert!(!part.file_name().is_empty());
    }

    #[test]
    fn missing_path_is_io_error() {
        let err = FilePart::from_path("/nonexistent/volley-part").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn mime_override() {
        let part = FilePart::from_bytes("a.png", b"".as_slice()).with_mime_type("image/png");
        assert_eq!(part.mime_type(), "image/png");
    }
}
