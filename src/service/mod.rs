/*!
 * Service Module
 * Supervisor-ready descriptors built from validated applications
 */

pub mod builder;
pub mod environment;
pub mod types;

pub use builder::{build, BuildContext};
pub use types::{
    ExecSpec, ProxyRoute, RestartMode, RestartPolicy, ServiceDescriptor, StartDependencies,
};
