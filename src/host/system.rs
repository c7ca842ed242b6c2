/*!
 * System Host Facts
 * Queries the real user database and socket table
 */

use super::traits::HostFacts;
use crate::core::types::{Gid, UserIdentity};
use nix::unistd::{getegid, geteuid, Group, User};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};
use tracing::warn;

/// Host facts backed by the running system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostFacts for SystemHost {
    fn lookup_user(&self, name: &str) -> Option<UserIdentity> {
        match User::from_name(name) {
            Ok(Some(user)) => Some(UserIdentity {
                name: user.name,
                uid: user.uid.as_raw(),
                gid: user.gid.as_raw(),
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(user = %name, error = %e, "User lookup failed");
                None
            }
        }
    }

    fn lookup_group(&self, name: &str) -> Option<Gid> {
        match Group::from_name(name) {
            Ok(group) => group.map(|g| g.gid.as_raw()),
            Err(e) => {
                warn!(group = %name, error = %e, "Group lookup failed");
                None
            }
        }
    }

    fn tcp_port_in_use(&self, port: u16) -> bool {
        // Only EADDRINUSE counts; EACCES on privileged ports says nothing
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
            Ok(_) => false,
            Err(e) => e.kind() == ErrorKind::AddrInUse,
        }
    }

    fn system_identity(&self) -> UserIdentity {
        let uid = geteuid().as_raw();
        let name = User::from_uid(geteuid())
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| uid.to_string());
        UserIdentity {
            name,
            uid,
            gid: getegid().as_raw(),
        }
    }
}
