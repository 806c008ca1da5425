use crate::config::ConfigError;

/// Errors the façade raises.
///
/// HTTP- and network-level failures never land here; those are settled
/// into [`ApiResponse`](crate::ApiResponse). This enum covers programming
/// errors only: bad construction options, unresolvable paths, and failures
/// inside caller-supplied transforms.
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cannot resolve path `{path}` against the base address: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request body is not serializable: {0}")]
    BodySerialize(#[from] serde_json::Error),

    #[error("request transform failed: {0}")]
    RequestTransform(anyhow::Error),

    #[error("response transform failed: {0}")]
    ResponseTransform(anyhow::Error),
}
