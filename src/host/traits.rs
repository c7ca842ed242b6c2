/*!
 * Host Traits
 * Read-only facts queried from the host operating system
 */

use crate::core::types::{Gid, UserIdentity};

/// Host facts the orchestrator consults but never mutates
pub trait HostFacts: Send + Sync {
    /// Resolve an existing OS account
    fn lookup_user(&self, name: &str) -> Option<UserIdentity>;

    /// Resolve an existing OS group
    fn lookup_group(&self, name: &str) -> Option<Gid>;

    /// Check whether a TCP port is currently bound by another process
    fn tcp_port_in_use(&self, port: u16) -> bool;

    /// Identity the provisioner itself runs as; owns the secrets tree
    fn system_identity(&self) -> UserIdentity;
}
