/*!
 * Network Policy Resolver
 * Pure mapping from a validated application to its network policy
 */

use super::hosts::is_localhost_only;
use super::types::{NetworkPolicy, TrafficRule};
use crate::app::ApplicationSpec;

/// Resolve the network policy for an application
///
/// | allowed hosts       | isolated | inbound          | outbound  | families        |
/// |---------------------|----------|------------------|-----------|-----------------|
/// | localhost only      | no       | allow-local-only | allow-all | unix,ipv4,ipv6  |
/// | any public entry    | no       | allow-all        | allow-all | unix,ipv4,ipv6  |
/// | any                 | yes      | allow-local-only | deny-all  | unix            |
///
/// An explicit inbound override replaces the table's inbound rule. For
/// isolated applications the validator only admits overrides at least as
/// strict as the table, and the resolver never loosens them.
#[must_use]
pub fn resolve(spec: &ApplicationSpec) -> NetworkPolicy {
    if spec.isolate_network() {
        let mut policy = NetworkPolicy::isolated();
        if let Some(rule) = spec.inbound_override() {
            if rule.at_least_as_strict_as(&policy.inbound_rule) {
                policy.inbound_rule = rule;
            }
        }
        return policy;
    }

    let table_inbound = if is_localhost_only(spec.allowed_hosts()) {
        TrafficRule::AllowLocalOnly
    } else {
        TrafficRule::AllowAll
    };

    NetworkPolicy::open(spec.inbound_override().unwrap_or(table_inbound))
}
