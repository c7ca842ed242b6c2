/*!
 * Service Registry
 * Immutable snapshot of `name -> descriptor`
 */

use crate::service::ServiceDescriptor;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One generation of the registry
///
/// Replaced wholesale on every reconcile, never merged into.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    services: BTreeMap<String, ServiceDescriptor>,
}

impl Registry {
    pub(crate) fn from_descriptors(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Self {
        Self {
            services: descriptors
                .into_iter()
                .map(|d| (d.name().to_string(), d))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    /// Declared application names, for start/stop diffing
    pub fn names(&self) -> BTreeSet<String> {
        self.services.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Descriptors in name order
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    /// Application currently running as `user`, if any
    pub fn find_by_user(&self, user: &str) -> Option<&ServiceDescriptor> {
        self.iter().find(|d| d.spec().user() == user)
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::collections::btree_map::Values<'a, String, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.values()
    }
}
