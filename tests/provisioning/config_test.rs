/*!
 * Configuration Tests
 * Environment overlay and declaration files
 */

use appstage::config::settings::{ENV_RUNTIME_DIR, ENV_SERVER_PROGRAM, ENV_STATE_DIR};
use appstage::{load_declarations, validate_batch, ProvisionError, ProvisionerConfig};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

fn clear_env() {
    for key in [ENV_STATE_DIR, ENV_RUNTIME_DIR, ENV_SERVER_PROGRAM] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_overrides_defaults() {
    clear_env();
    std::env::set_var(ENV_STATE_DIR, "/srv/appstage-state");
    std::env::set_var(ENV_SERVER_PROGRAM, "uvicorn");

    let config = ProvisionerConfig::from_env();
    clear_env();

    assert_eq!(config.state_dir, PathBuf::from("/srv/appstage-state"));
    assert_eq!(config.server_program, "uvicorn");
    assert_eq!(config.runtime_dir, PathBuf::from("/run/appstage"));
}

#[test]
#[serial]
fn test_from_env_without_variables() {
    clear_env();
    assert_eq!(ProvisionerConfig::from_env(), ProvisionerConfig::default());
}

#[test]
fn test_toml_declarations_validate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apps.toml");
    fs::write(
        &path,
        r#"
[[applications]]
name = "blog"
root = "/srv/blog"
module_entry_point = "blog.wsgi:application"
database_name = "blog"
secrets_file = "/etc/secrets/blog.env"
allowed_hosts = ["blog.example.com", ".example.com"]
host_name = "blog.example.com"
expose_via_proxy = true
process_count = 2

[applications.environment]
DEBUG = "0"

[applications.restart]
mode = "always"
delay = 3

[[applications]]
name = "worker"
root = "/srv/worker"
module_entry_point = "worker.app"
database_name = "worker"
secrets_file = "/etc/secrets/worker.env"
isolate_network = true
inbound_override = "deny_all"

[applications.sandbox]
memory_deny_write_execute = false
"#,
    )
    .unwrap();

    let raws = load_declarations(&path).unwrap();
    let specs = validate_batch(&raws, &PathBuf::from("/run/appstage")).unwrap();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].process_count(), 2);
    assert!(specs[0].expose_via_proxy());
    assert!(specs[1].isolate_network());
}

#[test]
fn test_json_declarations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apps.json");
    fs::write(
        &path,
        r#"{"applications": [{"name": "blog", "root": "/srv/blog", "port": 8000}]}"#,
    )
    .unwrap();

    let raws = load_declarations(&path).unwrap();
    assert_eq!(raws[0].port, Some(8000));

    // Missing required fields surface as validation errors, not parse errors
    let err = validate_batch(&raws, &PathBuf::from("/run/appstage")).unwrap_err();
    assert_eq!(err.field(), "database_name");
}

#[test]
fn test_unsupported_extension() {
    let err = load_declarations(&PathBuf::from("/etc/appstage/apps.yaml")).unwrap_err();
    assert!(matches!(err, ProvisionError::Configuration(_)));
}
