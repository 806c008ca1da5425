//! Builds the final transport request and executes it.
//!
//! The actual network I/O is reqwest's job. This module appends the query
//! multi-map to the resolved target, attaches headers and (for body-bearing
//! methods) the serialized body, applies the deadline, and races the whole
//! interaction against the call's cancellation token. What comes back is a
//! raw outcome plus the elapsed wall-clock time; classification happens in
//! the normalizer.

use std::time::{Duration, Instant};

use http::Method;
use log::debug;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::net::response::RawResponse;
use crate::transform::CallOptions;

/// What came back from the transport, before normalization.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The transport produced a response (any status).
    Response(RawResponse),
    /// The transport failed before or while producing a response.
    Failed(reqwest::Error),
    /// The cancellation token fired while the call was in flight.
    Aborted,
}

/// True for methods that conventionally carry a request body.
pub(crate) fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Run one request against the transport.
///
/// The start timestamp is taken immediately before handing off to the
/// transport and the end timestamp when the transport settles; reading the
/// body happens after that and is not billed to the duration. The clock is
/// monotonic, so the difference can never be negative.
pub async fn dispatch(
    transport: &reqwest::Client,
    url: Url,
    method: Method,
    options: &CallOptions,
    body: Option<Vec<u8>>,
    default_timeout: Duration,
    client_cancel: Option<&CancellationToken>,
) -> (FetchOutcome, Duration) {
    let mut url = url;
    if !options.query.is_empty() {
        url.query_pairs_mut().extend_pairs(options.query.iter());
    }

    let mut request = transport
        .request(method.clone(), url.clone())
        .headers(options.headers.clone())
        .timeout(options.timeout.unwrap_or(default_timeout));

    if let Some(bytes) = body {
        // Content-Type is already part of the merged headers.
        request = request.body(bytes);
    }

    debug!("dispatching {} {}", method, url);

    let cancel = options.cancel.as_ref().or(client_cancel);

    let started = Instant::now();
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => (FetchOutcome::Aborted, started.elapsed()),
                settled = run(request, started) => settled,
            }
        }
        None => run(request, started).await,
    }
}

/// Send the request and buffer the full body.
async fn run(request: reqwest::RequestBuilder, started: Instant) -> (FetchOutcome, Duration) {
    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => return (FetchOutcome::Failed(error), started.elapsed()),
    };

    // The transport settled here; the body read below is a separate
    // suspension point.
    let duration = started.elapsed();

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    let outcome = match response.bytes().await {
        Ok(bytes) => FetchOutcome::Response(RawResponse {
            status,
            headers,
            body: bytes.to_vec(),
        }),
        // A failure while draining the body is still a transport failure,
        // not a malformed result.
        Err(error) => FetchOutcome::Failed(error),
    };

    (outcome, duration)
}
