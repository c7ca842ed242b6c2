/*!
 * Sandbox Policy Logic
 * Hardened base table, override merge and network projection
 */

use super::types::{Capability, ProtectSystem, SandboxOverrides, SandboxPolicy};
use crate::network::{NetworkPolicy, TrafficRule};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Deny everything not explicitly allowed
const ANY: &str = "any";

impl SandboxPolicy {
    /// Hardened base policy every service starts from
    #[must_use]
    pub fn hardened() -> Self {
        Self {
            no_new_privileges: true,
            private_tmp: true,
            private_devices: true,
            private_users: true,
            private_network: false,
            protect_system: ProtectSystem::Strict,
            protect_home: true,
            protect_hostname: true,
            protect_clock: true,
            protect_kernel_tunables: true,
            protect_kernel_modules: true,
            protect_kernel_logs: true,
            protect_control_groups: true,
            restrict_namespaces: true,
            restrict_realtime: true,
            restrict_suid_sgid: true,
            lock_personality: true,
            memory_deny_write_execute: true,
            remove_ipc: true,
            umask: 0o077,
            capability_bounding_set: BTreeSet::new(),
            ambient_capabilities: BTreeSet::new(),
            restrict_address_families: BTreeSet::new(),
            ip_address_deny: vec![],
            system_call_architectures: vec!["native".to_string()],
            system_call_filter: vec!["@system-service".to_string(), "~@privileged".to_string()],
            read_only_paths: vec![],
            read_write_paths: vec![],
        }
    }

    /// Layer declared overrides on top of this policy; overrides win
    #[must_use]
    pub fn merged(mut self, overrides: &SandboxOverrides) -> Self {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = overrides.$field {
                    self.$field = value;
                })*
            };
        }

        take!(
            no_new_privileges,
            private_tmp,
            private_devices,
            private_users,
            protect_system,
            protect_home,
            protect_hostname,
            protect_clock,
            protect_kernel_tunables,
            protect_kernel_modules,
            protect_kernel_logs,
            protect_control_groups,
            restrict_namespaces,
            restrict_realtime,
            restrict_suid_sgid,
            lock_personality,
            memory_deny_write_execute,
            remove_ipc,
            umask,
        );

        if let Some(filter) = &overrides.system_call_filter {
            self.system_call_filter = filter.clone();
        }
        for path in &overrides.extra_read_write_paths {
            self.allow_write(path.clone());
        }
        self
    }

    /// Project a resolved network policy onto the sandbox
    ///
    /// Applied after overrides so no declaration can weaken it. IP filtering
    /// is symmetric, so local-only inbound is enforced by the bind address
    /// rather than here.
    #[must_use]
    pub fn with_network(mut self, policy: &NetworkPolicy) -> Self {
        self.restrict_address_families = policy.allowed_address_families.clone();
        self.private_network = !policy.allows_inet();

        let deny_ip = policy.inbound_rule == TrafficRule::DenyAll
            || policy.outbound_rule == TrafficRule::DenyAll;
        self.ip_address_deny = if deny_ip { vec![ANY.to_string()] } else { vec![] };
        self
    }

    /// Grant the privileged-port bind capability
    ///
    /// Capabilities held inside a private user namespace do not reach the host
    /// network namespace, so this also leaves the user namespace.
    #[must_use]
    pub fn with_bind_capability(mut self) -> Self {
        self.private_users = false;
        self.capability_bounding_set.insert(Capability::NetBindService);
        self.ambient_capabilities.insert(Capability::NetBindService);
        self
    }

    /// Add a read-only path, ignoring duplicates
    pub fn allow_read(&mut self, path: PathBuf) {
        if !self.read_only_paths.contains(&path) {
            self.read_only_paths.push(path);
        }
    }

    /// Add a read-write path, ignoring duplicates
    pub fn allow_write(&mut self, path: PathBuf) {
        if !self.read_write_paths.contains(&path) {
            self.read_write_paths.push(path);
        }
    }

    #[must_use]
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capability_bounding_set.contains(&cap) && self.ambient_capabilities.contains(&cap)
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::hardened()
    }
}
