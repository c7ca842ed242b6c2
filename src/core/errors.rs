/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Three failure classes exist:
 * - ValidationError: declared input is bad or conflicting
 * - StagingError: filesystem or ownership fault while staging secrets
 * - FatalError: an internal invariant was violated (a defect, never operator error)
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared-input errors, reported to the operator
///
/// Every variant names the offending application so a batch failure can be
/// traced back to a single declaration.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("application `{app}`: required field `{field}` is missing")]
    #[diagnostic(
        code(validation::missing_field),
        help("Declare the field explicitly; it has no default.")
    )]
    MissingField { app: String, field: String },

    #[error("application `{app}`: field `{field}` is invalid: {reason}")]
    #[diagnostic(
        code(validation::invalid_field),
        help("Fix the declared value and reconcile again.")
    )]
    InvalidField {
        app: String,
        field: String,
        reason: String,
    },

    #[error("application `{app}` is declared more than once")]
    #[diagnostic(
        code(validation::duplicate_name),
        help("Application names must be unique across the declared set.")
    )]
    DuplicateName { app: String },

    #[error("application `{app}`: {field} `{value}` is already claimed by `{owner}`")]
    #[diagnostic(
        code(validation::conflict),
        help("Bindings, users, databases and proxied host names cannot be shared.")
    )]
    Conflict {
        app: String,
        field: String,
        value: String,
        owner: String,
    },

    #[error("application `{app}`: network isolation conflict: {reason}")]
    #[diagnostic(
        code(validation::isolation_conflict),
        help("An isolated application may only listen on a unix socket.")
    )]
    IsolationConflict { app: String, reason: String },

    #[error("application `{app}`: {field} = {value} is outside [{min}, {max}]")]
    #[diagnostic(
        code(validation::out_of_range),
        help("Worker process and thread counts must be between 1 and 1024.")
    )]
    OutOfRange {
        app: String,
        field: String,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl ValidationError {
    /// Name of the application that failed validation
    #[must_use]
    pub fn app(&self) -> &str {
        match self {
            Self::MissingField { app, .. }
            | Self::InvalidField { app, .. }
            | Self::DuplicateName { app }
            | Self::Conflict { app, .. }
            | Self::IsolationConflict { app, .. }
            | Self::OutOfRange { app, .. } => app,
        }
    }

    /// Offending field, when the failure is attributable to one
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field, .. }
            | Self::InvalidField { field, .. }
            | Self::Conflict { field, .. }
            | Self::OutOfRange { field, .. } => field,
            Self::DuplicateName { .. } => "name",
            Self::IsolationConflict { .. } => "isolate_network",
        }
    }
}

/// Secret staging errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum StagingError {
    #[error("secrets source {path} for `{user}` is unreadable: {reason}")]
    #[diagnostic(
        code(staging::source_unreadable),
        help("Check that the secrets file exists and is readable by the provisioner.")
    )]
    SourceUnreadable {
        user: String,
        path: String,
        reason: String,
    },

    #[error("user `{0}` does not exist on this host")]
    #[diagnostic(
        code(staging::unknown_user),
        help("Create the service account before reconciling.")
    )]
    UnknownUser(String),

    #[error("group `{0}` does not exist on this host")]
    #[diagnostic(
        code(staging::unknown_group),
        help("Create the service group before reconciling.")
    )]
    UnknownGroup(String),

    #[error("refusing to stage into {path}: {reason}")]
    #[diagnostic(
        code(staging::unsafe_directory),
        help("The secrets directory must be a real directory owned by the provisioner and not writable by others.")
    )]
    UnsafeDirectory { path: String, reason: String },

    #[error("I/O error on {path}: {reason}")]
    #[diagnostic(
        code(staging::io),
        help("Filesystem operation failed. Check permissions and disk space.")
    )]
    Io { path: String, reason: String },
}

impl StagingError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        StagingError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn unsafe_dir(path: &std::path::Path, reason: impl Into<String>) -> Self {
        StagingError::UnsafeDirectory {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Internal invariant violations
///
/// Inputs reaching the descriptor builder were validated upstream; hitting
/// one of these is a defect and is surfaced as a crash by the binary.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum FatalError {
    #[error("invariant violated for `{app}`: {reason}")]
    #[diagnostic(
        code(fatal::invariant),
        help("This is a bug in appstage. Please report it with the declaration that triggered it.")
    )]
    Invariant { app: String, reason: String },
}

/// Unified provisioning error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum ProvisionError {
    #[error("Validation error: {0}")]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error("Staging error: {0}")]
    #[diagnostic(transparent)]
    Staging(#[from] StagingError),

    #[error("Fatal error: {0}")]
    #[diagnostic(transparent)]
    Fatal(#[from] FatalError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(appstage::configuration_error),
        help("Review the declaration file and provisioner settings.")
    )]
    Configuration(String),
}

impl ProvisionError {
    /// True when the error indicates a defect rather than bad input
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProvisionError::Fatal(_))
    }
}

/// Validation result
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Staging result
pub type StagingResult<T> = std::result::Result<T, StagingError>;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;
