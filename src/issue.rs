//! Issue codes: the closed classification of a call's outcome.
//!
//! An issue is derived from the HTTP status or from the transport error,
//! but callers branch on the issue alone instead of re-deriving status
//! ranges or sniffing error types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of outcome classifications.
///
/// When more than one classification could apply, precedence is
/// abort > connection-refused > timeout > status-derived > unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Issue {
    None,
    ClientError,
    ServerError,
    TimeoutError,
    ConnectionError,
    NetworkError,
    UnknownError,
    AbortError,
}

impl Issue {
    /// Classify a bare HTTP status code.
    ///
    /// Ranges are inclusive on both ends: `[200, 299]` is success,
    /// `[400, 499]` client, `[500, 599]` server. Everything else, 3xx
    /// included, is unknown; redirects are not specially handled here.
    pub fn from_status(status: Option<u16>) -> Issue {
        let Some(status) = status else {
            return Issue::UnknownError;
        };

        if (200..=299).contains(&status) {
            return Issue::None;
        }
        if (400..=499).contains(&status) {
            return Issue::ClientError;
        }
        if (500..=599).contains(&status) {
            return Issue::ServerError;
        }

        Issue::UnknownError
    }

    /// Classify a transport-level failure.
    ///
    /// Connection establishment is checked before timeout: reqwest flags
    /// connect timeouts as both, and connection refusal wins. An error that
    /// carries a status (the transport already had a response in hand) is
    /// classified from that status.
    pub fn from_transport(error: &reqwest::Error) -> Issue {
        if error.is_connect() {
            return Issue::ConnectionError;
        }
        if error.is_timeout() {
            return Issue::TimeoutError;
        }
        if error.is_body() || error.is_decode() {
            return Issue::NetworkError;
        }

        Issue::from_status(error.status().map(|s| s.as_u16()))
    }

    /// The wire code for this issue, e.g. `"CLIENT_ERROR"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Issue::None => "NONE",
            Issue::ClientError => "CLIENT_ERROR",
            Issue::ServerError => "SERVER_ERROR",
            Issue::TimeoutError => "TIMEOUT_ERROR",
            Issue::ConnectionError => "CONNECTION_ERROR",
            Issue::NetworkError => "NETWORK_ERROR",
            Issue::UnknownError => "UNKNOWN_ERROR",
            Issue::AbortError => "ABORT_ERROR",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
