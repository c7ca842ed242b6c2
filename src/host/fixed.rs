/*!
 * Fixed Host Facts
 * In-memory host facts for dry runs and tests
 */

use super::traits::HostFacts;
use crate::core::types::{Gid, Uid, UserIdentity};
use std::collections::{BTreeSet, HashMap};

/// Host facts from a fixed table
///
/// With `map_unknown_to_system` set, every account and group that is not in
/// the table resolves to the system identity. Dry runs use this to stage
/// into a scratch directory without real service accounts.
#[derive(Debug, Clone)]
pub struct FixedHost {
    system: UserIdentity,
    users: HashMap<String, UserIdentity>,
    groups: HashMap<String, Gid>,
    busy_ports: BTreeSet<u16>,
    map_unknown_to_system: bool,
}

impl FixedHost {
    pub fn new(system: UserIdentity) -> Self {
        Self {
            system,
            users: HashMap::new(),
            groups: HashMap::new(),
            busy_ports: BTreeSet::new(),
            map_unknown_to_system: false,
        }
    }

    /// Resolve every name to `system`
    pub fn mapping_all_to(system: UserIdentity) -> Self {
        Self {
            map_unknown_to_system: true,
            ..Self::new(system)
        }
    }

    #[must_use]
    pub fn with_user(mut self, name: &str, uid: Uid, gid: Gid) -> Self {
        self.users.insert(
            name.to_string(),
            UserIdentity {
                name: name.to_string(),
                uid,
                gid,
            },
        );
        self.groups.entry(name.to_string()).or_insert(gid);
        self
    }

    #[must_use]
    pub fn with_group(mut self, name: &str, gid: Gid) -> Self {
        self.groups.insert(name.to_string(), gid);
        self
    }

    #[must_use]
    pub fn with_busy_port(mut self, port: u16) -> Self {
        self.busy_ports.insert(port);
        self
    }
}

impl HostFacts for FixedHost {
    fn lookup_user(&self, name: &str) -> Option<UserIdentity> {
        self.users.get(name).cloned().or_else(|| {
            self.map_unknown_to_system.then(|| UserIdentity {
                name: name.to_string(),
                uid: self.system.uid,
                gid: self.system.gid,
            })
        })
    }

    fn lookup_group(&self, name: &str) -> Option<Gid> {
        self.groups
            .get(name)
            .copied()
            .or_else(|| self.map_unknown_to_system.then_some(self.system.gid))
    }

    fn tcp_port_in_use(&self, port: u16) -> bool {
        self.busy_ports.contains(&port)
    }

    fn system_identity(&self) -> UserIdentity {
        self.system.clone()
    }
}
