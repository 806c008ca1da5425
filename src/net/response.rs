//! Minimal buffered transport response model.
//!
//! This struct represents a **fully buffered** response handed back by the
//! transport: status code, response headers, and the raw body bytes. The
//! normalizer decides what the body means; nothing is parsed here.
//!
//! ## Notes
//! - The body is stored as raw `Vec<u8>`. Streaming is not supported.
//! - `headers` is an `http::HeaderMap`, which is **case-insensitive** for
//!   header names.

use http::HeaderMap;

/// Snapshot of the transport's answer, fully read into memory.
///
/// All fields reflect the **received** response as-is; no parsing or
/// transformation is performed by this type.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}
