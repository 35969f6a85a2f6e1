//! Base types and error handling.
//!
//! Two error channels exist and never mix:
//! - [`Error`]: synchronous misuse errors, raised at the call site.
//! - [`TransportError`]: a single exchange's network failure, recorded on
//!   the exchange and observed through its outcome.

pub mod error;
pub mod transerror;

pub use error::Error;
pub use transerror::TransportError;
