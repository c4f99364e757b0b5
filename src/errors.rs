/*!
 * Error types for the ocity video pipeline.
 *
 * Upstream collaborators (narration, translation, image fetching) report
 * `ProviderError`; the pipeline itself reports `PipelineError`, whose kind
 * decides how a caller surfaces it (4xx for caller mistakes, 5xx otherwise).
 */

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when talking to an upstream HTTP provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The provider answered successfully but with nothing usable
    #[error("Empty response: {0}")]
    EmptyResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            Self::ApiError {
                status_code: status.as_u16(),
                message: error.to_string(),
            }
        } else if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors from running the external transcoder
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The executable could not be started
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        /// Executable name
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process did not finish in time and was killed
    #[error("{program} timed out after {secs} seconds")]
    Timeout {
        /// Executable name
        program: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// The process exited with a failure status
    #[error("{program} failed: {stderr}")]
    Failed {
        /// Executable name
        program: String,
        /// Filtered stderr output
        stderr: String,
    },

    /// Probe output could not be interpreted
    #[error("Unreadable probe output: {0}")]
    Probe(String),
}

/// Coarse classification of a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller error, never retried
    InvalidInput,
    /// Upstream provider failed and no fallback applied
    UpstreamFailure,
    /// A single segment could not be encoded
    RenderFailure,
    /// Concatenation or muxing failed
    AssemblyFailure,
}

/// Errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing text, malformed record, empty batch, or a broken precondition
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An upstream provider failed where no fallback exists
    #[error("Upstream failure ({context}): {source}")]
    UpstreamFailure {
        /// What the pipeline was doing when the provider failed
        context: String,
        /// The provider error
        #[source]
        source: ProviderError,
    },

    /// Encoding of one segment failed
    #[error("Render failure for unit {unit_index}: {reason}")]
    RenderFailure {
        /// Index of the text unit that failed to render
        unit_index: usize,
        /// Filtered transcoder output or I/O error
        reason: String,
    },

    /// Concatenation or muxing failed
    #[error("Assembly failure: {0}")]
    AssemblyFailure(String),

    /// Local file system error on the temp directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Build an upstream failure with context
    pub fn upstream(context: impl Into<String>, source: ProviderError) -> Self {
        Self::UpstreamFailure {
            context: context.into(),
            source,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::UpstreamFailure { .. } => ErrorKind::UpstreamFailure,
            Self::RenderFailure { .. } => ErrorKind::RenderFailure,
            Self::AssemblyFailure(_) | Self::Io(_) => ErrorKind::AssemblyFailure,
        }
    }

    /// HTTP-style status code for the error: 400 for caller errors, 500 for the rest
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput => 400,
            _ => 500,
        }
    }
}

/// A temporary artifact that could not be removed.
///
/// Cleanup failures are logged and never escalated, so this is not an error
/// variant of `PipelineError`.
#[derive(Debug)]
pub struct CleanupFailure {
    /// Artifact that was left behind
    pub path: PathBuf,
    /// Underlying I/O error
    pub error: std::io::Error,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to delete {}: {}", self.path.display(), self.error)
    }
}
