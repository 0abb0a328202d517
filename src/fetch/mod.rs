pub mod engine;
pub mod report;
pub mod retry;
pub mod transport;

use std::time::Duration;

pub use engine::FetchEngine;
pub use report::{
    format_bytes, DownloadOutcome, DownloadTask, FetchReport, ProgressEvent, ProgressObserver,
    RunStatus,
};
pub use retry::{Decision, RetryPolicy, RetryState};
pub use transport::{HttpTransport, ResponseBody, Transport};

/// Immutable settings for talking to the model CDN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Prefix the artifact basename is appended to
    pub url_prefix: String,
    /// Value of the `cf_clearance` cookie
    pub cookie: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
}

/// User agent sent with every request; the CDN rejects some generic ones
#[must_use]
pub fn default_user_agent() -> String {
    format!("vaimm/{}", env!("CARGO_PKG_VERSION"))
}
