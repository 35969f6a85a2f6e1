//! One HTTP request/response unit managed by the scheduler.
//!
//! An [`Exchange`] is built up (fields, headers, credentials, proxy,
//! callback), finalized into a [`TransportRequest`], submitted, and
//! eventually terminated by exactly one outcome: completed, failed or
//! cancelled. The callback, if any, fires exactly once, synchronously,
//! after the outcome is set.

pub mod response;

use bytes::Bytes;
use url::Url;

use crate::auth::Credentials;
use crate::base::{Error, TransportError};
use crate::fields::FieldSet;
use crate::http::{query_string, FilePart, HeaderSet, MultipartBody};
use crate::proxy::ProxySettings;
use crate::transport::{Method, RawOutput, TransportRequest};

pub use response::Response;

type Callback = Box<dyn FnOnce(&mut Exchange) + Send>;

/// Terminal state of an exchange.
#[derive(Debug)]
pub enum Outcome {
    /// No terminal event yet.
    Pending,
    Completed(Response),
    Failed(TransportError),
    Cancelled,
}

/// An HTTP request under construction and, later, its result.
pub struct Exchange {
    method: Method,
    url: Url,
    headers: HeaderSet,
    variables: FieldSet<String>,
    files: FieldSet<FilePart>,
    payload: Option<FilePart>,
    credentials: Option<Credentials>,
    proxy: Option<ProxySettings>,
    callback: Option<Callback>,
    prepared: Option<TransportRequest>,
    outcome: Outcome,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("fields", &self.variables.len())
            .field("files", &self.files.len())
            .field("has_callback", &self.callback.is_some())
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl Exchange {
    fn new(method: Method, url: &str) -> Result<Self, Error> {
        // For GET and PUT, inline query parameters merge with explicitly
        // added fields and are re-encoded on finalization. POST fields
        // travel in the body, so a POST URL keeps its query untouched.
        let mut variables = FieldSet::new();
        let url = match method {
            Method::Post => Url::parse(url).map_err(|_| Error::InvalidUrl {
                url: url.to_string(),
            })?,
            _ => variables.parse_url(url)?,
        };
        Ok(Self {
            method,
            url,
            headers: HeaderSet::new(),
            variables,
            files: FieldSet::new(),
            payload: None,
            credentials: None,
            proxy: None,
            callback: None,
            prepared: None,
            outcome: Outcome::Pending,
        })
    }

    /// Start building a GET exchange.
    pub fn get(url: &str) -> Result<Self, Error> {
        Self::new(Method::Get, url)
    }

    /// Start building a POST exchange.
    pub fn post(url: &str) -> Result<Self, Error> {
        Self::new(Method::Post, url)
    }

    /// Start building a PUT exchange.
    pub fn put(url: &str) -> Result<Self, Error> {
        Self::new(Method::Put, url)
    }

    /// Add a field. Duplicate names and array-suffix syntax follow
    /// [`FieldSet`] semantics.
    pub fn add_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), Error> {
        self.variables.add(name, value.into())
    }

    /// Attach a file upload. Only POST exchanges carry multipart files.
    pub fn add_file(&mut self, name: &str, file: FilePart) -> Result<(), Error> {
        if self.method != Method::Post {
            return Err(Error::Validation(format!(
                "file uploads require POST, not {}",
                self.method
            )));
        }
        self.files.add(name, file)
    }

    /// Set the raw payload of a PUT exchange.
    pub fn set_payload(&mut self, payload: FilePart) -> Result<(), Error> {
        if self.method != Method::Put {
            return Err(Error::Validation(format!(
                "a raw payload requires PUT, not {}",
                self.method
            )));
        }
        self.payload = Some(payload);
        Ok(())
    }

    /// Set a header, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.headers.set(name, value)
    }

    /// Append a header, keeping existing values for the same name.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.headers.append(name, value)
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    pub fn set_proxy(&mut self, proxy: ProxySettings) {
        self.proxy = Some(proxy);
    }

    /// Register the completion callback. It runs exactly once, after the
    /// outcome is set, whether the exchange completed, failed or was
    /// cancelled.
    pub fn on_complete(&mut self, callback: impl FnOnce(&mut Exchange) + Send + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The URL as configured (without the encoded field query string).
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Fix the exchange for submission: encode the query string or body,
    /// apply body headers, and capture credentials and proxy settings.
    ///
    /// Re-finalizing rebuilds from the stored configuration, so headers are
    /// not duplicated and query strings are not appended twice.
    pub fn finalize(&mut self) -> Result<(), Error> {
        let mut headers = self.headers.clone();
        let mut url = self.url.clone();

        let body = match self.method {
            Method::Get => {
                apply_query(&mut url, &self.variables);
                Bytes::new()
            }
            Method::Put => {
                let payload = self
                    .payload
                    .as_ref()
                    .ok_or_else(|| Error::Validation("PUT exchange has no payload".to_string()))?;
                apply_query(&mut url, &self.variables);
                if !headers.contains("Content-Type") {
                    headers.set("Content-Type", payload.mime_type())?;
                }
                headers.set("Content-Length", &payload.len().to_string())?;
                payload.content().clone()
            }
            Method::Post => {
                if self.variables.is_empty() && self.files.is_empty() {
                    headers.set("Content-Length", "0")?;
                    Bytes::new()
                } else {
                    let multipart = MultipartBody::encode(&self.variables, &self.files)?;
                    headers.set("Content-Type", &multipart.content_type())?;
                    headers.set("Content-Length", &multipart.content_length().to_string())?;
                    multipart.into_body()
                }
            }
        };

        self.prepared = Some(TransportRequest {
            method: self.method,
            url,
            headers,
            body,
            credentials: self.credentials.clone(),
            proxy: self.proxy.clone(),
        });
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.prepared.is_some()
    }

    /// The effective URL that will be submitted, once finalized.
    pub fn effective_url(&self) -> Option<&Url> {
        self.prepared.as_ref().map(|p| &p.url)
    }

    pub(crate) fn take_prepared(&mut self) -> Result<TransportRequest, Error> {
        self.prepared
            .take()
            .ok_or_else(|| Error::Validation("exchange submitted before finalize".to_string()))
    }

    /// Record the terminal outcome from a transport result and fire the
    /// callback.
    pub(crate) fn recover(&mut self, result: Result<RawOutput, TransportError>) {
        debug_assert!(
            matches!(self.outcome, Outcome::Pending),
            "outcome set twice"
        );
        self.outcome = match result {
            Err(err) => Outcome::Failed(err),
            Ok(raw) => match Response::parse(raw) {
                Ok(response) => Outcome::Completed(response),
                Err(err) => Outcome::Failed(err),
            },
        };
        self.fire_callback();
    }

    /// Mark the exchange cancelled and fire the callback.
    pub(crate) fn mark_cancelled(&mut self) {
        debug_assert!(
            matches!(self.outcome, Outcome::Pending),
            "outcome set twice"
        );
        self.outcome = Outcome::Cancelled;
        self.fire_callback();
    }

    fn fire_callback(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(self);
        }
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, Outcome::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, Outcome::Cancelled)
    }

    /// The transport error, when the exchange failed.
    pub fn error(&self) -> Option<TransportError> {
        match self.outcome {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The response, when the exchange completed.
    pub fn response(&self) -> Option<&Response> {
        match &self.outcome {
            Outcome::Completed(response) => Some(response),
            _ => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        match &mut self.outcome {
            Outcome::Completed(response) => Some(response),
            _ => None,
        }
    }

    /// Take ownership of the response. Subsequent calls return `None`.
    pub fn take_response(&mut self) -> Option<Response> {
        match std::mem::replace(&mut self.outcome, Outcome::Pending) {
            Outcome::Completed(response) => Some(response),
            other => {
                self.outcome = other;
                None
            }
        }
    }
}

fn apply_query(url: &mut Url, variables: &FieldSet<String>) {
    let query = query_string(variables);
    if !query.is_empty() {
        url.set_query(Some(&query));
    }
}
