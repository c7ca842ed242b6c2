/*!
 * Service Descriptor Builder
 * Composes a validated application, its staged secret and its network
 * policy into one immutable descriptor
 *
 * Merge order is fixed: derived values, then declared environment, then the
 * hardened sandbox, then declared sandbox overrides. The network projection
 * lands last so no override can weaken it. No I/O.
 */

use super::environment as env;
use super::types::{ExecSpec, ProxyRoute, RestartPolicy, ServiceDescriptor, StartDependencies};
use crate::app::{ApplicationSpec, Binding};
use crate::core::errors::FatalError;
use crate::core::limits::{PRIVILEGED_PORT_MAX, SUPERVISOR_RUNTIME_ROOT};
use crate::core::types::ResourceLimits;
use crate::network::{NetworkPolicy, TrafficRule};
use crate::sandbox::SandboxPolicy;
use crate::secrets::StagedSecret;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// URL prefix under which static assets are served
const STATIC_PREFIX: &str = "/static/";

/// Host-wide settings the builder needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub server_program: String,
    pub database_service: String,
    pub database_socket_dir: PathBuf,
    /// Parent of the per-application socket directories the supervisor creates
    pub runtime_dir: PathBuf,
    pub default_restart: RestartPolicy,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            server_program: "gunicorn".to_string(),
            database_service: "postgresql.service".to_string(),
            database_socket_dir: PathBuf::from("/run/postgresql"),
            runtime_dir: PathBuf::from("/run/appstage"),
            default_restart: RestartPolicy::default(),
        }
    }
}

/// Build the descriptor for one application
pub fn build(
    spec: &ApplicationSpec,
    secret: &StagedSecret,
    policy: &NetworkPolicy,
    ctx: &BuildContext,
) -> Result<ServiceDescriptor, FatalError> {
    check_invariants(spec, secret, policy)?;

    let bind = bind_address(spec.binding(), policy);
    let environment = environment(spec, secret, ctx, &bind)?;
    let runtime_directory = runtime_directory(spec, ctx);
    let sandbox = sandbox(spec, policy, runtime_directory.is_some());

    let exec = ExecSpec {
        program: ctx.server_program.clone(),
        args: vec![
            "--workers".to_string(),
            spec.process_count().to_string(),
            "--threads".to_string(),
            spec.thread_count().to_string(),
            "--bind".to_string(),
            bind,
            spec.module_entry_point().to_string(),
        ],
        working_directory: spec.root().to_path_buf(),
    };

    let proxy_route = spec.expose_via_proxy().then(|| ProxyRoute {
        host_name: spec.host_name().to_string(),
        upstream: spec.binding().clone(),
        static_prefix: STATIC_PREFIX.to_string(),
        static_root: spec.static_assets().to_path_buf(),
    });

    debug!(
        app = %spec.name(),
        binding = %spec.binding(),
        inbound = %policy.inbound_rule,
        outbound = %policy.outbound_rule,
        proxied = proxy_route.is_some(),
        "Built service descriptor"
    );

    Ok(ServiceDescriptor {
        spec: spec.clone(),
        secret: secret.clone(),
        network: policy.clone(),
        environment,
        exec,
        limits: ResourceLimits::for_workers(spec.process_count(), spec.thread_count()),
        sandbox,
        restart: spec.restart().cloned().unwrap_or_else(|| ctx.default_restart.clone()),
        dependencies: StartDependencies {
            database_service: ctx.database_service.clone(),
            staged_secret: secret.location().to_path_buf(),
        },
        runtime_directory,
        proxy_route,
    })
}

fn check_invariants(
    spec: &ApplicationSpec,
    secret: &StagedSecret,
    policy: &NetworkPolicy,
) -> Result<(), FatalError> {
    let fatal = |reason: String| FatalError::Invariant {
        app: spec.name().to_string(),
        reason,
    };

    if secret.user() != spec.user() {
        return Err(fatal(format!(
            "staged secret belongs to `{}`, service runs as `{}`",
            secret.user(),
            spec.user()
        )));
    }
    if secret.mode() & 0o077 != 0 {
        return Err(fatal(format!(
            "staged secret mode {:o} is readable beyond its owner",
            secret.mode()
        )));
    }
    if spec.isolate_network() && (policy.allows_inet() || spec.binding().is_tcp()) {
        return Err(fatal("isolated service would keep internet access".to_string()));
    }
    Ok(())
}

/// Address the server binds, in server notation
///
/// Anything stricter than allow-all stays on loopback.
fn bind_address(binding: &Binding, policy: &NetworkPolicy) -> String {
    match binding {
        Binding::Tcp(port) if policy.inbound_rule == TrafficRule::AllowAll => {
            format!("[::]:{}", port)
        }
        Binding::Tcp(port) => format!("127.0.0.1:{}", port),
        Binding::Unix(path) => format!("unix:{}", path.display()),
    }
}

fn environment(
    spec: &ApplicationSpec,
    secret: &StagedSecret,
    ctx: &BuildContext,
    bind: &str,
) -> Result<BTreeMap<String, String>, FatalError> {
    let allowed_hosts = spec
        .allowed_hosts()
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");

    let mut vars: BTreeMap<String, String> = [
        (env::APP_NAME, spec.name().to_string()),
        (env::SETTINGS_MODULE, spec.module_entry_point().to_string()),
        (env::ALLOWED_HOSTS, allowed_hosts),
        (env::DATABASE_NAME, spec.database_name().to_string()),
        (env::DATABASE_USER, spec.user().to_string()),
        (env::DATABASE_HOST, ctx.database_socket_dir.display().to_string()),
        (env::STATIC_ROOT, spec.static_assets().display().to_string()),
        (env::SECRETS_FILE, secret.location().display().to_string()),
        (env::BIND, bind.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    for (key, value) in spec.environment() {
        if vars.insert(key.clone(), value.clone()).is_some() {
            return Err(FatalError::Invariant {
                app: spec.name().to_string(),
                reason: format!("declared variable `{}` shadows a derived one", key),
            });
        }
    }
    Ok(vars)
}

/// Supervisor-managed socket directory, relative to the supervisor's runtime root
///
/// Only the application's own directory under `runtime_dir` qualifies; the
/// supervisor removes it when the service stops.
fn runtime_directory(spec: &ApplicationSpec, ctx: &BuildContext) -> Option<PathBuf> {
    let dir = spec.binding().socket_path()?.parent()?;
    if dir != ctx.runtime_dir.join(spec.name()) {
        return None;
    }
    dir.strip_prefix(SUPERVISOR_RUNTIME_ROOT)
        .ok()
        .map(Path::to_path_buf)
}

fn sandbox(spec: &ApplicationSpec, policy: &NetworkPolicy, managed_socket_dir: bool) -> SandboxPolicy {
    let mut sandbox = SandboxPolicy::hardened().merged(spec.sandbox());

    sandbox.allow_read(spec.root().to_path_buf());
    sandbox.allow_read(spec.static_assets().to_path_buf());
    if !managed_socket_dir {
        if let Some(dir) = spec.binding().socket_path().and_then(|p| p.parent()) {
            sandbox.allow_write(dir.to_path_buf());
        }
    }

    if spec
        .binding()
        .tcp_port()
        .is_some_and(|port| port <= PRIVILEGED_PORT_MAX)
    {
        sandbox = sandbox.with_bind_capability();
    }

    sandbox.with_network(policy)
}
