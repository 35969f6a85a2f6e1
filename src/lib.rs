//! # volley
//!
//! A parallel HTTP client library for Rust.
//!
//! `volley` lets a caller build HTTP exchanges (GET/POST/PUT with headers,
//! query/body fields, file attachments, authentication and proxying) and
//! execute many of them concurrently without manual thread management.
//! Exchanges are queued on a [`Requester`], dispatched to a transport under
//! a bounded parallel limit, and demultiplexed back as they complete.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use volley::{Exchange, HyperEngine, Requester};
//!
//! let mut requester = Requester::with_limit(HyperEngine::new()?, 8);
//! for id in 0..100 {
//!     let mut exchange = Exchange::get(&format!("http://example.com/item/{id}"))?;
//!     exchange.on_complete(|ex| match ex.response() {
//!         Some(response) => println!("{} -> {}", response.url(), response.status()),
//!         None => eprintln!("failed: {:?}", ex.error()),
//!     });
//!     requester.enqueue(exchange);
//! }
//! requester.run()?;
//! # Ok::<(), volley::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy
//! - [`fields`] - Ordered multi-valued field containers with array-suffix
//!   semantics
//! - [`http`] - Query-string and multipart body encoding, ordered headers
//! - [`auth`] / [`proxy`] - Authentication and proxy descriptors
//! - [`exchange`] - One request/response unit and its outcome
//! - [`transport`] - The engine boundary: the hyper-backed [`HyperEngine`]
//!   and the deterministic [`ScriptedTransport`]
//! - [`scheduler`] - The bounded-concurrency [`Requester`]
//!
//! ## Failure model
//!
//! Misuse (bad field names, field/file name collisions, a PUT without a
//! payload) fails synchronously with [`Error`] at construction or
//! finalization. A single exchange's network failure never aborts a batch:
//! it is recorded on the exchange as a [`TransportError`] and delivered
//! through its callback. Only a multiplexer-level fault aborts
//! [`Requester::run`] as a whole.

pub mod auth;
pub mod base;
pub mod exchange;
pub mod fields;
pub mod http;
pub mod proxy;
pub mod scheduler;
pub mod transport;

pub use auth::Credentials;
pub use base::{Error, TransportError};
pub use exchange::{Exchange, Outcome, Response};
pub use fields::FieldSet;
pub use http::{FilePart, HeaderSet, MultipartBody};
pub use proxy::ProxySettings;
pub use scheduler::{CancelToken, Requester};
pub use transport::{
    Completion, EngineConfig, Handle, HyperEngine, Method, Plan, RawOutput, ScriptedTransport,
    Transport, TransportRequest,
};
