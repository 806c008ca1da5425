//! The uniform call result.
//!
//! Every call settles into an [`ApiResponse`]: either a success with a
//! parsed body, or a failure carrying an issue code and the original error.
//! The two-variant shape carries the invariant (the success side has no
//! issue and no error, the failure side always has both), so callers
//! branch on the discriminant instead of catching anything.

use std::time::Duration;

use http::HeaderMap;
use serde_json::Value;

use crate::issue::Issue;
use crate::net::{FetchOutcome, RawResponse};
use crate::transform::CallOptions;

/// Status code reserved for calls cancelled through a token. Out of the
/// success range but adjacent to it, so it can never collide with a real
/// error-range status.
pub const ABORTED_STATUS: u16 = 299;

/// Status reported when the deadline passed before any response arrived.
const TIMEOUT_STATUS: u16 = 408;

/// A settled call that produced a success-range response.
#[derive(Debug)]
pub struct ApiSuccess {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body. `None` means the response had zero-length
    /// content; `Some(Value::Null)` means the body was the literal JSON
    /// `null`. Falsy values (`false`, `0`, `""`) survive as themselves.
    pub body: Option<Value>,
    pub duration: Duration,
    /// The options the request went out with, after request transforms.
    pub options: CallOptions,
}

/// A settled call that did not produce a success-range response.
#[derive(Debug)]
pub struct ApiFailure {
    /// Absent when no response was ever received, e.g. refused connections.
    pub status: Option<u16>,
    pub headers: Option<HeaderMap>,
    pub duration: Duration,
    /// Never [`Issue::None`].
    pub issue: Issue,
    /// The triggering error, preserved.
    pub error: Fault,
    /// Absent for aborted calls.
    pub options: Option<CallOptions>,
}

/// The original error preserved on a failed call.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error("request aborted")]
    Aborted,

    #[error("server answered with status {0}")]
    Status(u16),

    /// Non-empty response body that is not valid JSON. The raw text is
    /// kept so nothing is lost.
    #[error("response body is not valid JSON")]
    BodyDecode {
        text: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(reqwest::Error),
}

/// Uniform result of a call.
#[derive(Debug)]
pub enum ApiResponse {
    Ok(ApiSuccess),
    Err(ApiFailure),
}

impl ApiResponse {
    pub fn ok(&self) -> bool {
        matches!(self, ApiResponse::Ok(_))
    }

    /// [`Issue::None`] on success, the classified issue otherwise.
    pub fn issue(&self) -> Issue {
        match self {
            ApiResponse::Ok(_) => Issue::None,
            ApiResponse::Err(failure) => failure.issue,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiResponse::Ok(success) => Some(success.status),
            ApiResponse::Err(failure) => failure.status,
        }
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            ApiResponse::Ok(success) => Some(&success.headers),
            ApiResponse::Err(failure) => failure.headers.as_ref(),
        }
    }

    /// Parsed body; always absent on failures.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiResponse::Ok(success) => success.body.as_ref(),
            ApiResponse::Err(_) => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            ApiResponse::Ok(success) => success.duration,
            ApiResponse::Err(failure) => failure.duration,
        }
    }

    /// The triggering error; always absent on successes.
    pub fn original_error(&self) -> Option<&Fault> {
        match self {
            ApiResponse::Ok(_) => None,
            ApiResponse::Err(failure) => Some(&failure.error),
        }
    }

    pub fn options(&self) -> Option<&CallOptions> {
        match self {
            ApiResponse::Ok(success) => Some(&success.options),
            ApiResponse::Err(failure) => failure.options.as_ref(),
        }
    }

    /// Whether the response body was read. Successes buffer the body in
    /// full; failures never consume one.
    pub fn body_consumed(&self) -> bool {
        matches!(self, ApiResponse::Ok(_))
    }

    /// Settle a transport outcome into the uniform shape.
    pub(crate) fn from_outcome(
        outcome: FetchOutcome,
        duration: Duration,
        options: CallOptions,
    ) -> ApiResponse {
        match outcome {
            FetchOutcome::Aborted => ApiResponse::Err(ApiFailure {
                status: Some(ABORTED_STATUS),
                headers: None,
                duration,
                issue: Issue::AbortError,
                error: Fault::Aborted,
                options: None,
            }),
            FetchOutcome::Response(raw) => ApiResponse::from_raw(raw, duration, options),
            FetchOutcome::Failed(error) => {
                let issue = Issue::from_transport(&error);
                let status = match issue {
                    Issue::TimeoutError => Some(TIMEOUT_STATUS),
                    _ => error.status().map(|s| s.as_u16()),
                };

                ApiResponse::Err(ApiFailure {
                    status,
                    headers: None,
                    duration,
                    issue,
                    error: Fault::Transport(error),
                    options: Some(options),
                })
            }
        }
    }

    fn from_raw(raw: RawResponse, duration: Duration, options: CallOptions) -> ApiResponse {
        let issue = Issue::from_status(Some(raw.status));
        if issue != Issue::None {
            return ApiResponse::Err(ApiFailure {
                status: Some(raw.status),
                headers: Some(raw.headers),
                duration,
                issue,
                error: Fault::Status(raw.status),
                options: Some(options),
            });
        }

        if raw.body.is_empty() {
            return ApiResponse::Ok(ApiSuccess {
                status: raw.status,
                headers: raw.headers,
                body: None,
                duration,
                options,
            });
        }

        let text = String::from_utf8_lossy(&raw.body);
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => ApiResponse::Ok(ApiSuccess {
                status: raw.status,
                headers: raw.headers,
                body: Some(body),
                duration,
                options,
            }),
            Err(source) => ApiResponse::Err(ApiFailure {
                status: Some(raw.status),
                headers: Some(raw.headers),
                duration,
                issue: Issue::UnknownError,
                error: Fault::BodyDecode {
                    text: text.into_owned(),
                    source,
                },
                options: Some(options),
            }),
        }
    }
}
