/*!
 * appstage
 * Secrets staging and service descriptor orchestration for web application hosts
 *
 * Declared applications flow strictly downward: validated specs, then
 * staged secrets and network policies, then service descriptors, then one
 * atomically swapped registry read by the supervisor and reverse proxy.
 */

pub mod app;
pub mod config;
pub mod core;
pub mod host;
pub mod monitoring;
pub mod network;
pub mod registry;
pub mod render;
pub mod sandbox;
pub mod secrets;
pub mod service;

// Re-exports
pub use app::{validate_batch, ApplicationSpec, Binding, RawApplicationSpec, Validator};
pub use config::{load_declarations, ProvisionerConfig};
pub use crate::core::errors::{
    FatalError, ProvisionError, Result, StagingError, StagingResult, ValidationError,
    ValidationResult,
};
pub use crate::core::types::{Gid, ResourceLimits, Uid, UserIdentity};
pub use host::{FixedHost, HostFacts, SystemHost};
pub use monitoring::init_tracing;
pub use network::{resolve, AddressFamily, NetworkPolicy, TrafficRule};
pub use registry::{Orchestrator, ReconcileReport, Registry, Warning};
pub use sandbox::{Capability, SandboxOverrides, SandboxPolicy};
pub use secrets::{SecretStager, StagedAccount, StagedSecret};
pub use service::{build, BuildContext, RestartPolicy, ServiceDescriptor};
