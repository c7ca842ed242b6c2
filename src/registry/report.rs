/*!
 * Reconcile Reports
 */

use super::snapshot::Registry;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Non-fatal findings of a reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A newly claimed TCP port is already bound on the host
    PortInUse { app: String, port: u16 },
    /// A proxied host name is not accepted by the application itself
    HostNotAllowed { app: String, host_name: String },
    /// A staged secret no registered service reads; awaits decommission
    UnusedSecret { app: String, user: String },
}

impl Warning {
    pub fn app(&self) -> &str {
        match self {
            Warning::PortInUse { app, .. }
            | Warning::HostNotAllowed { app, .. }
            | Warning::UnusedSecret { app, .. } => app,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::PortInUse { app, port } => {
                write!(f, "{}: TCP port {} is already in use on this host", app, port)
            }
            Warning::HostNotAllowed { app, host_name } => write!(
                f,
                "{}: proxied host `{}` is not in allowed_hosts",
                app, host_name
            ),
            Warning::UnusedSecret { app, user } => write!(
                f,
                "{}: staged secret under account `{}` is unused; decommission it",
                app, user
            ),
        }
    }
}

/// Outcome of a successful reconcile
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Registry now in effect
    pub registry: Arc<Registry>,
    pub warnings: Vec<Warning>,
    /// Applications dropped from the registry; the caller stops them
    pub removed: BTreeSet<String>,
    /// Accounts whose obsolete staged secret was removed
    pub purged: BTreeSet<String>,
}

impl ReconcileReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
