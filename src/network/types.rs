/*!
 * Network Policy Types
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Socket address families a sandboxed service may open
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    Unix,
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Kernel constant name, as supervisors spell it
    #[must_use]
    pub const fn as_af(&self) -> &'static str {
        match self {
            AddressFamily::Unix => "AF_UNIX",
            AddressFamily::Ipv4 => "AF_INET",
            AddressFamily::Ipv6 => "AF_INET6",
        }
    }

    #[must_use]
    pub const fn is_inet(&self) -> bool {
        matches!(self, AddressFamily::Ipv4 | AddressFamily::Ipv6)
    }
}

/// Direction-agnostic traffic rule, ordered from most to least permissive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficRule {
    AllowAll,
    AllowLocalOnly,
    DenyAll,
}

impl TrafficRule {
    /// Strictness rank: higher is more restrictive
    #[inline]
    #[must_use]
    pub const fn strictness(&self) -> u8 {
        match self {
            TrafficRule::AllowAll => 0,
            TrafficRule::AllowLocalOnly => 1,
            TrafficRule::DenyAll => 2,
        }
    }

    /// True if `self` permits nothing that `other` forbids
    #[inline]
    #[must_use]
    pub const fn at_least_as_strict_as(&self, other: &TrafficRule) -> bool {
        self.strictness() >= other.strictness()
    }
}

impl fmt::Display for TrafficRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrafficRule::AllowAll => write!(f, "allow-all"),
            TrafficRule::AllowLocalOnly => write!(f, "allow-local-only"),
            TrafficRule::DenyAll => write!(f, "deny-all"),
        }
    }
}

/// Resolved network policy for one application
///
/// Derived from the declaration, never declared directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NetworkPolicy {
    pub allowed_address_families: BTreeSet<AddressFamily>,
    pub inbound_rule: TrafficRule,
    pub outbound_rule: TrafficRule,
}

impl NetworkPolicy {
    /// Policy that allows unix sockets only and no outbound traffic
    #[must_use]
    pub fn isolated() -> Self {
        Self {
            allowed_address_families: BTreeSet::from([AddressFamily::Unix]),
            inbound_rule: TrafficRule::AllowLocalOnly,
            outbound_rule: TrafficRule::DenyAll,
        }
    }

    /// Policy with all families and the given inbound rule
    #[must_use]
    pub fn open(inbound_rule: TrafficRule) -> Self {
        Self {
            allowed_address_families: BTreeSet::from([
                AddressFamily::Unix,
                AddressFamily::Ipv4,
                AddressFamily::Ipv6,
            ]),
            inbound_rule,
            outbound_rule: TrafficRule::AllowAll,
        }
    }

    #[must_use]
    pub fn allows_inet(&self) -> bool {
        self.allowed_address_families.iter().any(AddressFamily::is_inet)
    }
}
