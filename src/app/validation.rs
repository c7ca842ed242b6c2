/*!
 * Application Validation
 * Fail-fast validation of declared applications, batch-scoped
 *
 * Checks run in a fixed order and stop at the first violation. Batch state
 * (claimed names, bindings, users, databases, proxied hosts) is only
 * committed once a record passes every check.
 */

use super::types::{ApplicationSpec, Binding, RawApplicationSpec};
use crate::core::errors::{ValidationError, ValidationResult};
use crate::core::limits::{LOCALHOST, MAX_IDENTIFIER_LEN, MAX_WORKERS, MIN_WORKERS};
use crate::network::hosts::{is_valid_host_pattern, is_valid_hostname};
use crate::network::TrafficRule;
use crate::service::environment::is_derived_key;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Longest unix socket path the kernel accepts (sun_path minus NUL)
const MAX_SOCKET_PATH_LEN: usize = 107;

/// Highest meaningful umask
const MAX_UMASK: u32 = 0o777;

/// Batch-scoped validator
///
/// Holds the claims made by every record accepted so far so that conflicts
/// across the batch are caught.
#[derive(Debug)]
pub struct Validator {
    runtime_dir: PathBuf,
    names: BTreeSet<String>,
    bindings: HashMap<Binding, String>,
    users: HashMap<String, String>,
    databases: HashMap<String, String>,
    proxied_hosts: HashMap<String, String>,
}

impl Validator {
    /// Create a validator; default sockets are placed under `runtime_dir`
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            names: BTreeSet::new(),
            bindings: HashMap::new(),
            users: HashMap::new(),
            databases: HashMap::new(),
            proxied_hosts: HashMap::new(),
        }
    }

    /// Validate one record against the batch accumulated so far
    pub fn validate(&mut self, raw: &RawApplicationSpec) -> ValidationResult<ApplicationSpec> {
        let name = raw.name.trim();
        if name.is_empty() {
            return Err(missing("<unnamed>", "name"));
        }
        check_identifier(name, "name", name)?;
        if self.names.contains(name) {
            return Err(ValidationError::DuplicateName {
                app: name.to_string(),
            });
        }

        let user = raw.user.clone().unwrap_or_else(|| name.to_string());
        check_identifier(name, "user", &user)?;
        let group = raw.group.clone().unwrap_or_else(|| user.clone());
        check_identifier(name, "group", &group)?;

        let root = required(name, "root", raw.root.as_ref())?;
        check_absolute(name, "root", root)?;
        let database_name = required(name, "database_name", raw.database_name.as_ref())?;
        check_database_name(name, database_name)?;
        let entry_point = required(name, "module_entry_point", raw.module_entry_point.as_ref())?;
        check_entry_point(name, entry_point)?;
        let secrets_file = required(name, "secrets_file", raw.secrets_file.as_ref())?;
        check_absolute(name, "secrets_file", secrets_file)?;

        let binding = self.resolve_binding(name, raw)?;
        if let Some(owner) = self.bindings.get(&binding) {
            return Err(conflict(name, "binding", binding.to_string(), owner));
        }

        if raw.isolate_network {
            if binding.is_tcp() {
                return Err(ValidationError::IsolationConflict {
                    app: name.to_string(),
                    reason: format!("{} is a TCP binding", binding),
                });
            }
            if let Some(rule) = raw.inbound_override {
                if !rule.at_least_as_strict_as(&TrafficRule::AllowLocalOnly) {
                    return Err(ValidationError::IsolationConflict {
                        app: name.to_string(),
                        reason: format!("inbound override {} is weaker than allow-local-only", rule),
                    });
                }
            }
        }

        let process_count = check_workers(name, "process_count", raw.process_count)?;
        let thread_count = check_workers(name, "thread_count", raw.thread_count)?;

        // Host names compare case-insensitively everywhere they are served
        let host_name = raw
            .host_name
            .as_deref()
            .map_or_else(|| LOCALHOST.to_string(), str::to_ascii_lowercase);
        if !is_valid_hostname(&host_name) {
            return Err(invalid(name, "host_name", format!("`{}` is not a valid host name", host_name)));
        }

        let mut allowed_hosts = BTreeSet::new();
        for host in &raw.allowed_hosts {
            if !is_valid_host_pattern(host) {
                return Err(invalid(
                    name,
                    "allowed_hosts",
                    format!("`{}` is not a host name, `.domain` wildcard or `*`", host),
                ));
            }
            allowed_hosts.insert(host.to_ascii_lowercase());
        }
        if allowed_hosts.is_empty() {
            allowed_hosts.insert(LOCALHOST.to_string());
        }

        if let Some(owner) = self.users.get(&user) {
            return Err(conflict(name, "user", user.clone(), owner));
        }
        if let Some(owner) = self.databases.get(database_name) {
            return Err(conflict(name, "database_name", database_name.clone(), owner));
        }
        if raw.expose_via_proxy {
            if host_name == LOCALHOST {
                return Err(invalid(
                    name,
                    "host_name",
                    "a proxied application needs a public host name".to_string(),
                ));
            }
            if let Some(owner) = self.proxied_hosts.get(&host_name) {
                return Err(conflict(name, "host_name", host_name.clone(), owner));
            }
        }

        for (key, value) in &raw.environment {
            check_env_key(name, key)?;
            check_env_value(name, key, value)?;
        }

        let static_assets = match &raw.static_assets {
            Some(path) => {
                check_absolute(name, "static_assets", path)?;
                path.clone()
            }
            None => root.join("static"),
        };

        if let Some(umask) = raw.sandbox.umask {
            if umask > MAX_UMASK {
                return Err(invalid(name, "sandbox.umask", format!("{:o} is not a file mode mask", umask)));
            }
        }
        for path in &raw.sandbox.extra_read_write_paths {
            check_absolute(name, "sandbox.extra_read_write_paths", path)?;
        }

        if let Some(restart) = &raw.restart {
            restart
                .check()
                .map_err(|reason| invalid(name, "restart", reason))?;
        }

        // Every check passed; commit claims
        self.names.insert(name.to_string());
        self.bindings.insert(binding.clone(), name.to_string());
        self.users.insert(user.clone(), name.to_string());
        self.databases.insert(database_name.clone(), name.to_string());
        if raw.expose_via_proxy {
            self.proxied_hosts.insert(host_name.clone(), name.to_string());
        }

        Ok(ApplicationSpec {
            name: name.to_string(),
            user,
            group,
            root: root.clone(),
            module_entry_point: entry_point.clone(),
            database_name: database_name.clone(),
            secrets_file: secrets_file.clone(),
            binding,
            allowed_hosts,
            process_count,
            thread_count,
            static_assets,
            host_name,
            expose_via_proxy: raw.expose_via_proxy,
            isolate_network: raw.isolate_network,
            inbound_override: raw.inbound_override,
            sandbox: raw.sandbox.clone(),
            environment: raw.environment.clone(),
            restart: raw.restart.clone(),
        })
    }

    fn resolve_binding(&self, app: &str, raw: &RawApplicationSpec) -> ValidationResult<Binding> {
        match (raw.port, &raw.socket) {
            (Some(_), Some(_)) => Err(invalid(
                app,
                "binding",
                "`port` and `socket` are mutually exclusive".to_string(),
            )),
            (Some(0), None) => Err(invalid(app, "port", "port 0 cannot be bound".to_string())),
            (Some(port), None) => Ok(Binding::Tcp(port)),
            (None, Some(path)) => {
                check_absolute(app, "socket", path)?;
                check_socket_len(app, path)?;
                Ok(Binding::Unix(path.clone()))
            }
            (None, None) => {
                let path = self
                    .runtime_dir
                    .join(app)
                    .join(format!("{}.sock", app));
                check_socket_len(app, &path)?;
                Ok(Binding::Unix(path))
            }
        }
    }
}

/// Validate a whole batch; the first violation aborts it
pub fn validate_batch(
    raws: &[RawApplicationSpec],
    runtime_dir: &Path,
) -> ValidationResult<Vec<ApplicationSpec>> {
    let mut validator = Validator::new(runtime_dir);
    raws.iter().map(|raw| validator.validate(raw)).collect()
}

fn missing(app: &str, field: &str) -> ValidationError {
    ValidationError::MissingField {
        app: app.to_string(),
        field: field.to_string(),
    }
}

fn invalid(app: &str, field: &str, reason: String) -> ValidationError {
    ValidationError::InvalidField {
        app: app.to_string(),
        field: field.to_string(),
        reason,
    }
}

fn conflict(app: &str, field: &str, value: String, owner: &str) -> ValidationError {
    ValidationError::Conflict {
        app: app.to_string(),
        field: field.to_string(),
        value,
        owner: owner.to_string(),
    }
}

fn required<'a, T>(app: &str, field: &str, value: Option<&'a T>) -> ValidationResult<&'a T> {
    value.ok_or_else(|| missing(app, field))
}

/// Unix-style account / application identifier
fn check_identifier(app: &str, field: &str, value: &str) -> ValidationResult<()> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !valid_start || !valid_rest || value.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(
            app,
            field,
            format!(
                "`{}` must match [a-z_][a-z0-9_-]* and be at most {} characters",
                value, MAX_IDENTIFIER_LEN
            ),
        ));
    }
    Ok(())
}

/// Absolute, no `..`, no control characters
fn check_absolute(app: &str, field: &str, path: &Path) -> ValidationResult<()> {
    if path.to_string_lossy().chars().any(char::is_control) {
        return Err(invalid(
            app,
            field,
            format!("{:?} contains control characters", path),
        ));
    }
    if !path.is_absolute() {
        return Err(invalid(app, field, format!("{} is not an absolute path", path.display())));
    }
    if path.components().any(|c| c == std::path::Component::ParentDir) {
        return Err(invalid(app, field, format!("{} contains `..`", path.display())));
    }
    Ok(())
}

fn check_socket_len(app: &str, path: &Path) -> ValidationResult<()> {
    if path.as_os_str().len() > MAX_SOCKET_PATH_LEN {
        return Err(invalid(
            app,
            "socket",
            format!("{} exceeds {} bytes", path.display(), MAX_SOCKET_PATH_LEN),
        ));
    }
    Ok(())
}

fn check_database_name(app: &str, value: &str) -> ValidationResult<()> {
    let valid = !value.is_empty()
        && value.len() <= 63
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(invalid(
            app,
            "database_name",
            format!("`{}` is not a plain SQL identifier", value),
        ));
    }
    Ok(())
}

/// Dotted module path with an optional `:callable` suffix
fn check_entry_point(app: &str, value: &str) -> ValidationResult<()> {
    let (module, callable) = match value.split_once(':') {
        Some((module, callable)) => (module, Some(callable)),
        None => (value, None),
    };

    let is_ident = |s: &str| {
        let mut chars = s.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let valid = module.split('.').all(is_ident) && callable.map_or(true, is_ident);
    if !valid {
        return Err(invalid(
            app,
            "module_entry_point",
            format!("`{}` is not a dotted module path", value),
        ));
    }
    Ok(())
}

fn check_workers(app: &str, field: &str, value: Option<u32>) -> ValidationResult<u32> {
    let value = value.unwrap_or(MIN_WORKERS);
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&value) {
        return Err(ValidationError::OutOfRange {
            app: app.to_string(),
            field: field.to_string(),
            value,
            min: MIN_WORKERS,
            max: MAX_WORKERS,
        });
    }
    Ok(value)
}

fn check_env_key(app: &str, key: &str) -> ValidationResult<()> {
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(invalid(app, "environment", format!("`{}` is not a variable name", key)));
    }
    if is_derived_key(key) {
        return Err(invalid(
            app,
            "environment",
            format!("`{}` is derived and cannot be overridden", key),
        ));
    }
    Ok(())
}

/// Values end up on single unit lines
fn check_env_value(app: &str, key: &str, value: &str) -> ValidationResult<()> {
    if value.chars().any(char::is_control) {
        return Err(invalid(
            app,
            "environment",
            format!("value of `{}` contains control characters", key),
        ));
    }
    Ok(())
}
