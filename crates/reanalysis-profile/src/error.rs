//! Error types for profile lookup and assembly.

use thiserror::Error;

/// Errors that can occur while looking up archive slices or assembling profiles.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// No archive coordinate lies within tolerance of the requested value.
    #[error("no {axis} coordinate within {tolerance} of {requested} (nearest available: {nearest})")]
    NotFound {
        axis: String,
        requested: String,
        nearest: String,
        tolerance: String,
    },

    /// Failed to open an archive or one of its arrays.
    #[error("failed to open archive: {0}")]
    OpenFailed(String),

    /// Failed to read data from an opened archive.
    #[error("failed to read archive data: {0}")]
    ReadFailed(String),

    /// Archive metadata is missing or inconsistent.
    #[error("invalid archive metadata: {0}")]
    InvalidMetadata(String),

    /// A variable needed to build a profile is not present in the slice.
    #[error("variable '{0}' not present in slice")]
    MissingVariable(String),

    /// The vertical coefficient table is missing or malformed.
    #[error("vertical coefficient table: {0}")]
    CoefficientTable(String),

    /// A pool could not open its required number of handles.
    #[error("failed to start pool '{pool}': opened {opened} of {requested} handles: {reason}")]
    StartupFailure {
        pool: String,
        opened: usize,
        requested: usize,
        reason: String,
    },

    /// A physical formula produced an undefined or non-finite result.
    #[error("computation produced no finite {field} at level {level}: {reason}")]
    Computation {
        field: String,
        level: usize,
        reason: String,
    },

    /// No conversion is defined between two unit labels.
    #[error("cannot convert from '{from}' to '{to}'")]
    UnsupportedConversion { from: String, to: String },

    /// A remote fetch exceeded its time bound.
    #[error("lookup on '{pool}' timed out after {seconds:.1}s")]
    Timeout { pool: String, seconds: f64 },

    /// The handle or pool has already been released.
    #[error("dataset '{0}' is closed")]
    Closed(String),

    /// One or more handles failed to close.
    #[error("failed to close {} handle(s) of '{pool}': {}", failures.len(), failures.join("; "))]
    ShutdownPartialFailure { pool: String, failures: Vec<String> },

    /// An assembled profile does not satisfy its structural invariants.
    #[error("profile invariant violated: {0}")]
    InvariantViolation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ProfileError {
    /// Create a NotFound error for one coordinate axis.
    pub fn not_found(
        axis: impl Into<String>,
        requested: impl ToString,
        nearest: impl ToString,
        tolerance: impl ToString,
    ) -> Self {
        Self::NotFound {
            axis: axis.into(),
            requested: requested.to_string(),
            nearest: nearest.to_string(),
            tolerance: tolerance.to_string(),
        }
    }

    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a Computation error.
    pub fn computation(field: impl Into<String>, level: usize, reason: impl Into<String>) -> Self {
        Self::Computation {
            field: field.into(),
            level,
            reason: reason.into(),
        }
    }

    /// Whether this error means "the requested point is not in the archive".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status code the boundary should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Timeout { .. } => 504,
            Self::Closed(_) | Self::StartupFailure { .. } => 503,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for ProfileError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
