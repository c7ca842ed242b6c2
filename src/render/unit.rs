/*!
 * Unit File Rendering
 * Descriptor -> systemd-style unit text
 */

use crate::sandbox::{ProtectSystem, SandboxPolicy};
use crate::core::limits::RUNTIME_DIRECTORY_MODE;
use crate::service::{ExecSpec, RestartMode, ServiceDescriptor};
use std::fmt::Write;

/// Render a descriptor as a unit file
///
/// Output is deterministic: same descriptor, same bytes.
pub fn unit_file(descriptor: &ServiceDescriptor) -> String {
    let mut out = String::new();
    let spec = descriptor.spec();
    let deps = descriptor.dependencies();

    section(&mut out, "Unit");
    line(&mut out, "Description", &format!("{} web application", spec.name()));
    line(&mut out, "After", &format!("network.target {}", deps.database_service));
    line(&mut out, "Requires", &deps.database_service);
    line(&mut out, "ConditionPathExists", &deps.staged_secret.display().to_string());
    let restart = descriptor.restart();
    if restart.mode != RestartMode::No {
        line(&mut out, "StartLimitIntervalSec", &restart.interval.as_secs().to_string());
        line(&mut out, "StartLimitBurst", &restart.burst.to_string());
    }

    out.push('\n');
    section(&mut out, "Service");
    line(&mut out, "Type", "simple");
    line(&mut out, "User", spec.user());
    line(&mut out, "Group", spec.group());
    if let Some(dir) = descriptor.runtime_directory() {
        line(&mut out, "RuntimeDirectory", &word(&dir.display().to_string()));
        line(&mut out, "RuntimeDirectoryMode", &format!("{:04o}", RUNTIME_DIRECTORY_MODE));
    }
    line(&mut out, "WorkingDirectory", &descriptor.exec().working_directory.display().to_string());
    line(&mut out, "ExecStart", &exec_start(descriptor.exec()));
    for (key, value) in descriptor.environment() {
        line(&mut out, "Environment", &quote(&format!("{}={}", key, value)));
    }
    line(&mut out, "Restart", &restart.mode.to_string());
    line(&mut out, "RestartSec", &restart.delay.as_secs().to_string());

    let limits = descriptor.limits();
    line(&mut out, "LimitNOFILE", &limits.max_open_files.to_string());
    line(&mut out, "TasksMax", &limits.max_tasks.to_string());

    sandbox(&mut out, descriptor.sandbox());

    out.push('\n');
    section(&mut out, "Install");
    line(&mut out, "WantedBy", "multi-user.target");
    out
}

fn sandbox(out: &mut String, policy: &SandboxPolicy) {
    flag(out, "NoNewPrivileges", policy.no_new_privileges);
    flag(out, "PrivateTmp", policy.private_tmp);
    flag(out, "PrivateDevices", policy.private_devices);
    flag(out, "PrivateUsers", policy.private_users);
    flag(out, "PrivateNetwork", policy.private_network);
    line(
        out,
        "ProtectSystem",
        match policy.protect_system {
            ProtectSystem::Off => "no",
            ProtectSystem::Full => "full",
            ProtectSystem::Strict => "strict",
        },
    );
    flag(out, "ProtectHome", policy.protect_home);
    flag(out, "ProtectHostname", policy.protect_hostname);
    flag(out, "ProtectClock", policy.protect_clock);
    flag(out, "ProtectKernelTunables", policy.protect_kernel_tunables);
    flag(out, "ProtectKernelModules", policy.protect_kernel_modules);
    flag(out, "ProtectKernelLogs", policy.protect_kernel_logs);
    flag(out, "ProtectControlGroups", policy.protect_control_groups);
    flag(out, "RestrictNamespaces", policy.restrict_namespaces);
    flag(out, "RestrictRealtime", policy.restrict_realtime);
    flag(out, "RestrictSUIDSGID", policy.restrict_suid_sgid);
    flag(out, "LockPersonality", policy.lock_personality);
    flag(out, "MemoryDenyWriteExecute", policy.memory_deny_write_execute);
    flag(out, "RemoveIPC", policy.remove_ipc);
    line(out, "UMask", &format!("{:04o}", policy.umask));

    // An empty set means no capabilities at all
    let caps = join(policy.capability_bounding_set.iter().map(|c| c.as_str()));
    line(out, "CapabilityBoundingSet", &caps);
    if !policy.ambient_capabilities.is_empty() {
        let ambient = join(policy.ambient_capabilities.iter().map(|c| c.as_str()));
        line(out, "AmbientCapabilities", &ambient);
    }

    let families = if policy.restrict_address_families.is_empty() {
        "none".to_string()
    } else {
        join(policy.restrict_address_families.iter().map(|f| f.as_af()))
    };
    line(out, "RestrictAddressFamilies", &families);
    if !policy.ip_address_deny.is_empty() {
        line(out, "IPAddressDeny", &policy.ip_address_deny.join(" "));
    }

    line(out, "SystemCallArchitectures", &policy.system_call_architectures.join(" "));
    for filter in &policy.system_call_filter {
        line(out, "SystemCallFilter", filter);
    }
    // `-` skips entries that do not exist yet instead of failing the unit
    for path in &policy.read_only_paths {
        line(out, "ReadOnlyPaths", &word(&format!("-{}", path.display())));
    }
    for path in &policy.read_write_paths {
        line(out, "ReadWritePaths", &word(&format!("-{}", path.display())));
    }
}

fn section(out: &mut String, name: &str) {
    let _ = writeln!(out, "[{}]", name);
}

/// Every value is literal; `%` would otherwise start a specifier
fn line(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{}={}", key, value.replace('%', "%%"));
}

fn flag(out: &mut String, key: &str, value: bool) {
    line(out, key, if value { "yes" } else { "no" });
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(" ")
}

/// Quote an assignment for an Environment= line
fn quote(assignment: &str) -> String {
    let escaped = assignment.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// One command-line word; quoted when it would otherwise split
fn word(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';'));
    if plain {
        value.to_string()
    } else {
        quote(value)
    }
}

/// ExecStart line; `$` is doubled so nothing is expanded from the environment
fn exec_start(exec: &ExecSpec) -> String {
    std::iter::once(exec.program.as_str())
        .chain(exec.args.iter().map(String::as_str))
        .map(|arg| word(&arg.replace('$', "$$")))
        .collect::<Vec<_>>()
        .join(" ")
}
