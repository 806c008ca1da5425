//! Default header set and the merge rule applied at request time.

use http::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use http::HeaderValue;

/// Headers every client starts from unless overridden at construction or
/// per call.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Merge per-call headers over the client defaults.
///
/// Per-call entries replace same-named defaults (names are
/// case-insensitive), defaults supply the rest. Neither input is modified.
pub fn merge(defaults: &HeaderMap, call: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in call.keys() {
        let mut values = call.get_all(name).iter();
        if let Some(first) = values.next() {
            merged.insert(name.clone(), first.clone());
        }
        for value in values {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}
