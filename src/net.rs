pub mod fetch;
pub mod response;

pub use fetch::{dispatch, FetchOutcome};
pub use response::RawResponse;
