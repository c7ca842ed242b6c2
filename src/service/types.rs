/*!
 * Service Types
 * Supervisor-ready descriptors and their parts
 */

use crate::app::{ApplicationSpec, Binding};
use crate::core::serde::duration_secs;
use crate::core::types::ResourceLimits;
use crate::network::NetworkPolicy;
use crate::sandbox::SandboxPolicy;
use crate::secrets::StagedSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// When the supervisor restarts a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartMode {
    Always,
    #[default]
    OnFailure,
    No,
}

impl fmt::Display for RestartMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RestartMode::Always => write!(f, "always"),
            RestartMode::OnFailure => write!(f, "on-failure"),
            RestartMode::No => write!(f, "no"),
        }
    }
}

/// Restart policy with rate limiting
///
/// At most `burst` restarts within `interval`; `delay` between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct RestartPolicy {
    pub mode: RestartMode,
    #[serde(with = "duration_secs")]
    pub delay: Duration,
    pub burst: u32,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
}

impl RestartPolicy {
    /// Reject combinations a supervisor cannot honor
    pub fn check(&self) -> Result<(), String> {
        if self.mode == RestartMode::No {
            return Ok(());
        }
        if self.burst == 0 {
            return Err("burst must allow at least one restart".to_string());
        }
        if self.interval.is_zero() {
            return Err("interval must be positive".to_string());
        }
        if self.delay >= self.interval {
            return Err(format!(
                "delay {}s does not fit in the {}s interval",
                self.delay.as_secs(),
                self.interval.as_secs()
            ));
        }
        Ok(())
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            mode: RestartMode::OnFailure,
            delay: Duration::from_secs(5),
            burst: 5,
            interval: Duration::from_secs(60),
        }
    }
}

/// Program and arguments the supervisor executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
}

impl ExecSpec {
    /// Single-line command as a supervisor spells it
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What must be in place before the service may start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartDependencies {
    /// Database unit that must be running
    pub database_service: String,
    /// Staged secret that must exist
    pub staged_secret: PathBuf,
}

/// Reverse-proxy route for an exposed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyRoute {
    pub host_name: String,
    pub upstream: Binding,
    pub static_prefix: String,
    pub static_root: PathBuf,
}

impl ProxyRoute {
    /// Upstream address in proxy notation
    pub fn upstream_url(&self) -> String {
        match &self.upstream {
            Binding::Tcp(port) => format!("http://127.0.0.1:{}", port),
            Binding::Unix(path) => format!("http://unix:{}:", path.display()),
        }
    }
}

/// Supervisor-ready unit for one application
///
/// Built once by the descriptor builder and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub(crate) spec: ApplicationSpec,
    pub(crate) secret: StagedSecret,
    pub(crate) network: NetworkPolicy,
    pub(crate) environment: BTreeMap<String, String>,
    pub(crate) exec: ExecSpec,
    pub(crate) limits: ResourceLimits,
    pub(crate) sandbox: SandboxPolicy,
    pub(crate) restart: RestartPolicy,
    pub(crate) dependencies: StartDependencies,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) runtime_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) proxy_route: Option<ProxyRoute>,
}

impl ServiceDescriptor {
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn spec(&self) -> &ApplicationSpec {
        &self.spec
    }

    pub fn secret(&self) -> &StagedSecret {
        &self.secret
    }

    pub fn network(&self) -> &NetworkPolicy {
        &self.network
    }

    /// Complete process environment, secrets excluded
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn exec(&self) -> &ExecSpec {
        &self.exec
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn sandbox(&self) -> &SandboxPolicy {
        &self.sandbox
    }

    pub fn restart(&self) -> &RestartPolicy {
        &self.restart
    }

    pub fn dependencies(&self) -> &StartDependencies {
        &self.dependencies
    }

    /// Socket directory the supervisor creates, relative to its runtime root
    pub fn runtime_directory(&self) -> Option<&Path> {
        self.runtime_directory.as_deref()
    }

    pub fn proxy_route(&self) -> Option<&ProxyRoute> {
        self.proxy_route.as_ref()
    }

    /// Staged secret path the application reads at startup
    pub fn secrets_file(&self) -> &Path {
        self.secret.location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_restart_policy_is_valid() {
        assert!(RestartPolicy::default().check().is_ok());
    }

    #[test]
    fn test_restart_policy_checks() {
        let policy = RestartPolicy {
            burst: 0,
            ..Default::default()
        };
        assert!(policy.check().is_err());

        let policy = RestartPolicy {
            delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert!(policy.check().is_err());

        let policy = RestartPolicy {
            mode: RestartMode::No,
            burst: 0,
            ..Default::default()
        };
        assert!(policy.check().is_ok());
    }

    #[test]
    fn test_restart_policy_from_toml() {
        let policy: RestartPolicy = toml::from_str("mode = \"always\"\ndelay = 2").unwrap();
        assert_eq!(policy.mode, RestartMode::Always);
        assert_eq!(policy.delay, Duration::from_secs(2));
        assert_eq!(policy.burst, 5);
    }

    #[test]
    fn test_command_line() {
        let exec = ExecSpec {
            program: "gunicorn".into(),
            args: vec!["--workers".into(), "2".into(), "blog.wsgi".into()],
            working_directory: PathBuf::from("/srv/blog"),
        };
        assert_eq!(exec.command_line(), "gunicorn --workers 2 blog.wsgi");
    }

    #[test]
    fn test_upstream_url() {
        let route = ProxyRoute {
            host_name: "blog.example.com".into(),
            upstream: Binding::Unix(PathBuf::from("/run/appstage/blog/blog.sock")),
            static_prefix: "/static/".into(),
            static_root: PathBuf::from("/srv/blog/static"),
        };
        assert_eq!(route.upstream_url(), "http://unix:/run/appstage/blog/blog.sock:");
    }
}
