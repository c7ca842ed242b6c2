/*!
 * Sandbox Types
 * Strongly-typed process hardening policy and its override layer
 */

use crate::core::serde::{is_empty_vec, is_false};
use crate::network::AddressFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Read-only view of the host filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectSystem {
    /// No restriction
    Off,
    /// /usr, /boot and /etc read-only
    Full,
    /// Whole filesystem read-only except explicit read-write paths
    Strict,
}

/// Linux capability a service may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "CAP_NET_BIND_SERVICE")]
    NetBindService,
}

impl Capability {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Capability::NetBindService => "CAP_NET_BIND_SERVICE",
        }
    }
}

/// Complete sandbox policy for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxPolicy {
    pub no_new_privileges: bool,
    pub private_tmp: bool,
    pub private_devices: bool,
    pub private_users: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub private_network: bool,
    pub protect_system: ProtectSystem,
    pub protect_home: bool,
    pub protect_hostname: bool,
    pub protect_clock: bool,
    pub protect_kernel_tunables: bool,
    pub protect_kernel_modules: bool,
    pub protect_kernel_logs: bool,
    pub protect_control_groups: bool,
    pub restrict_namespaces: bool,
    pub restrict_realtime: bool,
    pub restrict_suid_sgid: bool,
    pub lock_personality: bool,
    pub memory_deny_write_execute: bool,
    pub remove_ipc: bool,
    pub umask: u32,
    /// Capabilities the process may ever acquire; empty means none
    pub capability_bounding_set: BTreeSet<Capability>,
    /// Capabilities granted at exec time
    pub ambient_capabilities: BTreeSet<Capability>,
    pub restrict_address_families: BTreeSet<AddressFamily>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub ip_address_deny: Vec<String>,
    pub system_call_architectures: Vec<String>,
    pub system_call_filter: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub read_only_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub read_write_paths: Vec<PathBuf>,
}

/// Declared adjustments to the hardened base policy
///
/// Every field left unset keeps the base value. Network-derived settings
/// (address families, IP filtering, private network, capabilities) are not
/// overridable here; they always come from the resolved network policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct SandboxOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_new_privileges: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_tmp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_devices: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_users: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_system: Option<ProtectSystem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_home: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_hostname: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_clock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_kernel_tunables: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_kernel_modules: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_kernel_logs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect_control_groups: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict_namespaces: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict_realtime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrict_suid_sgid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_personality: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_deny_write_execute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_ipc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umask: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_call_filter: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_read_write_paths: Vec<PathBuf>,
}

impl SandboxOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
