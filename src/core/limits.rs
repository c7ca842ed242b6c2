/*!
 * Limits and Constants
 *
 * Centralized location for validation bounds, filesystem modes and
 * derived-limit factors. Grouped by domain.
 */

// =============================================================================
// DECLARATION BOUNDS
// =============================================================================

/// Lowest accepted worker process / thread count
pub const MIN_WORKERS: u32 = 1;

/// Highest accepted worker process / thread count
pub const MAX_WORKERS: u32 = 1024;

/// Longest accepted application, user or group name
/// [LINUX-COMPAT] useradd rejects names longer than 32 bytes
pub const MAX_IDENTIFIER_LEN: usize = 32;

/// Longest accepted host name (RFC 1035)
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Longest accepted host name label (RFC 1035)
pub const MAX_HOSTNAME_LABEL_LEN: usize = 63;

/// Host name every application falls back to
pub const LOCALHOST: &str = "localhost";

// =============================================================================
// NETWORK
// =============================================================================

/// Highest port that requires CAP_NET_BIND_SERVICE
/// [LINUX-COMPAT] ports up to and including 1024 are treated as privileged
pub const PRIVILEGED_PORT_MAX: u16 = 1024;

// =============================================================================
// SUPERVISOR
// =============================================================================

/// Root the supervisor resolves RuntimeDirectory= names against
pub const SUPERVISOR_RUNTIME_ROOT: &str = "/run";

/// Socket directories must be traversable by the reverse proxy
pub const RUNTIME_DIRECTORY_MODE: u32 = 0o755;

// =============================================================================
// RESOURCE LIMITS
// =============================================================================

/// Open file floor for every service
pub const MIN_OPEN_FILES: u32 = 1024;

/// Open files granted per worker thread
pub const OPEN_FILES_PER_WORKER_THREAD: u32 = 256;

// =============================================================================
// SECRET STAGING
// =============================================================================

/// [SECURITY] Staged secrets are owner-read-only
pub const SECRET_FILE_MODE: u32 = 0o400;

/// [SECURITY] Per-user secret directories are traversable but not listable
pub const SECRET_DIR_MODE: u32 = 0o711;

/// File name of the staged secret inside the per-user directory
pub const SECRET_FILE_NAME: &str = "secrets.env";

/// Marker naming the application an account's secret belongs to
pub const OWNER_MARKER_NAME: &str = "application";

/// [SECURITY] The marker is private to the provisioner
pub const OWNER_MARKER_MODE: u32 = 0o600;

/// Prefix of in-flight temporary files
pub const STAGING_TEMP_PREFIX: &str = ".staging-";
