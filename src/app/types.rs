/*!
 * Application Types
 * Declared (raw) and validated application records
 */

use crate::network::TrafficRule;
use crate::sandbox::SandboxOverrides;
use crate::service::RestartPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Network endpoint an application listens on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "address")]
pub enum Binding {
    Tcp(u16),
    Unix(PathBuf),
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn is_tcp(&self) -> bool {
        matches!(self, Binding::Tcp(_))
    }

    #[inline]
    #[must_use]
    pub fn tcp_port(&self) -> Option<u16> {
        match self {
            Binding::Tcp(port) => Some(*port),
            Binding::Unix(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Binding::Unix(path) => Some(path),
            Binding::Tcp(_) => None,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Binding::Tcp(port) => write!(f, "tcp:{}", port),
            Binding::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Application record as declared by the operator
///
/// Every field is optional at this stage; the validator fills defaults and
/// rejects missing or conflicting values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct RawApplicationSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_entry_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_assets: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    pub expose_via_proxy: bool,
    pub isolate_network: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_override: Option<TrafficRule>,
    #[serde(skip_serializing_if = "SandboxOverrides::is_empty")]
    pub sandbox: SandboxOverrides,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartPolicy>,
}

impl RawApplicationSpec {
    /// Start a declaration with only a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Validated, normalized application record
///
/// Only the validator produces values of this type; once built it is never
/// mutated. A redeclaration produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ApplicationSpec {
    pub(crate) name: String,
    pub(crate) user: String,
    pub(crate) group: String,
    pub(crate) root: PathBuf,
    pub(crate) module_entry_point: String,
    pub(crate) database_name: String,
    pub(crate) secrets_file: PathBuf,
    pub(crate) binding: Binding,
    pub(crate) allowed_hosts: BTreeSet<String>,
    pub(crate) process_count: u32,
    pub(crate) thread_count: u32,
    pub(crate) static_assets: PathBuf,
    pub(crate) host_name: String,
    pub(crate) expose_via_proxy: bool,
    pub(crate) isolate_network: bool,
    pub(crate) inbound_override: Option<TrafficRule>,
    pub(crate) sandbox: SandboxOverrides,
    pub(crate) environment: BTreeMap<String, String>,
    pub(crate) restart: Option<RestartPolicy>,
}

impl ApplicationSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_entry_point(&self) -> &str {
        &self.module_entry_point
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Operator-managed secrets source; never written by this crate
    pub fn secrets_file(&self) -> &Path {
        &self.secrets_file
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Allowed hosts, never empty
    pub fn allowed_hosts(&self) -> &BTreeSet<String> {
        &self.allowed_hosts
    }

    pub fn process_count(&self) -> u32 {
        self.process_count
    }

    pub fn thread_count(&self) -> u32 {
        self.thread_count
    }

    pub fn static_assets(&self) -> &Path {
        &self.static_assets
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn expose_via_proxy(&self) -> bool {
        self.expose_via_proxy
    }

    pub fn isolate_network(&self) -> bool {
        self.isolate_network
    }

    pub fn inbound_override(&self) -> Option<TrafficRule> {
        self.inbound_override
    }

    pub fn sandbox(&self) -> &SandboxOverrides {
        &self.sandbox
    }

    /// Declared extra environment (non-secret, non-shadowing)
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn restart(&self) -> Option<&RestartPolicy> {
        self.restart.as_ref()
    }
}
