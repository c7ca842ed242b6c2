/*!
 * Provisioner Settings
 *
 * Defaults, overlaid by APPSTAGE_* environment variables, overlaid by
 * command-line flags in the binary.
 */

use crate::service::{BuildContext, RestartPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

pub const ENV_STATE_DIR: &str = "APPSTAGE_STATE_DIR";
pub const ENV_RUNTIME_DIR: &str = "APPSTAGE_RUNTIME_DIR";
pub const ENV_SERVER_PROGRAM: &str = "APPSTAGE_SERVER_PROGRAM";
pub const ENV_DATABASE_SERVICE: &str = "APPSTAGE_DATABASE_SERVICE";
pub const ENV_DATABASE_SOCKET_DIR: &str = "APPSTAGE_DATABASE_SOCKET_DIR";

/// Host-wide provisioner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct ProvisionerConfig {
    /// Root of private state; secrets live under `<state_dir>/secrets`
    pub state_dir: PathBuf,
    /// Parent of default per-application socket directories
    pub runtime_dir: PathBuf,
    pub database_service: String,
    pub database_socket_dir: PathBuf,
    pub server_program: String,
    /// Applied to applications that declare no restart policy
    pub restart: RestartPolicy,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        let ctx = BuildContext::default();
        Self {
            state_dir: PathBuf::from("/var/lib/appstage"),
            runtime_dir: PathBuf::from("/run/appstage"),
            database_service: ctx.database_service,
            database_socket_dir: ctx.database_socket_dir,
            server_program: ctx.server_program,
            restart: ctx.default_restart,
        }
    }
}

impl ProvisionerConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        Self::default().with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; empty values are ignored
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_RUNTIME_DIR) {
            self.runtime_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_SERVER_PROGRAM) {
            self.server_program = v;
        }
        if let Some(v) = get(ENV_DATABASE_SERVICE) {
            self.database_service = v;
        }
        if let Some(v) = get(ENV_DATABASE_SOCKET_DIR) {
            self.database_socket_dir = PathBuf::from(v);
        }

        debug!(
            state_dir = %self.state_dir.display(),
            runtime_dir = %self.runtime_dir.display(),
            "Provisioner configuration loaded"
        );
        self
    }

    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_server_program(mut self, program: impl Into<String>) -> Self {
        self.server_program = program.into();
        self
    }

    /// Settings the descriptor builder consumes
    pub fn build_context(&self) -> BuildContext {
        BuildContext {
            server_program: self.server_program.clone(),
            database_service: self.database_service.clone(),
            database_socket_dir: self.database_socket_dir.clone(),
            runtime_dir: self.runtime_dir.clone(),
            default_restart: self.restart.clone(),
        }
    }
}
