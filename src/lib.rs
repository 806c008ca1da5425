pub mod client;
pub mod config;
pub mod errors;
pub mod headers;
pub mod issue;
pub mod net;
pub mod query;
pub mod response;
pub mod transform;

pub use client::ApiClient;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use errors::ApiClientError;
pub use issue::Issue;
pub use query::QueryParams;
pub use response::{ApiFailure, ApiResponse, ApiSuccess, Fault, ABORTED_STATUS};
pub use transform::{
    CallOptions, Continuation, Monitor, RequestContext, RequestTransform, ResponseTransform,
    TransformStep,
};
