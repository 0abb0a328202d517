use std::time::Duration;

use thiserror::Error;

use crate::fetch::report::FetchReport;

/// Main error type for vaimm
#[derive(Error, Debug)]
pub enum VaimmError {
    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/vaimm/config.toml\n- Check the TVAI_* environment variables\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("Metadata error: {0}\n\nTroubleshooting:\n- Point --json-dir at the folder containing alq-13.json\n- Reinstall Video AI if the model json files are corrupt")]
    Metadata(String),

    #[error("Download error: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure of a single download attempt
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Status {
        status: u16,
        /// Delay requested by the server through `Retry-After`
        retry_after: Option<Duration>,
    },

    #[error("network error: {0}")]
    Transport(String),

    /// The request could not be built (bad URL or header value)
    #[error("invalid request: {0}")]
    Request(String),

    #[error("incomplete data from server - expected: {expected}, got: {received}")]
    ShortContent { expected: u64, received: u64 },

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anomalies found while expanding a metadata record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionAnomaly {
    #[error("model {model}: scale {scale} has an odd number of block entries ({len})")]
    OddBlockCount {
        model: String,
        scale: String,
        len: usize,
    },

    #[error("model {model} has no files for backend {backend}")]
    UnknownBackend { model: String, backend: String },
}

/// Download run aborted by the operator
#[derive(Error, Debug)]
#[error("download interrupted after {} of {} files", .report.finished(), .report.task_count)]
pub struct Interrupted {
    /// Results collected before the interrupt arrived
    pub report: FetchReport,
}

pub type Result<T> = std::result::Result<T, VaimmError>;
