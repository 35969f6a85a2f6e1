//! Query-string encoding.
//!
//! Duplicate rendered keys are legal and preserved, which is why this does
//! not go through a map-based encoder: `a[0]=1&a[0]=1` must survive as two
//! pairs.

use crate::fields::FieldSet;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one component.
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, FORM).to_string()
}

/// Render a field set as a query string: `k=v` pairs joined with `&`, in
/// field enumeration order.
pub fn query_string(fields: &FieldSet<String>) -> String {
    fields
        .pairs()
        .map(|(key, value)| format!("{}={}", encode_component(&key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}
