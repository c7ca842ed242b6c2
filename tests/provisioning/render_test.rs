/*!
 * Rendering Tests
 * Units and proxy routes produced from a reconciled registry
 */

use crate::common::TestHost;
use appstage::render::{proxy_routes, unit_file};
use appstage::{ProvisionError, ValidationError};

#[test]
fn test_render_reconciled_registry() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.expose_via_proxy = true;
    blog.host_name = Some("blog.example.com".into());
    blog.allowed_hosts = vec!["blog.example.com".into()];
    let mut shop = host.app("shop");
    shop.port = Some(8001);

    let report = host.orchestrator.reconcile(&[blog, shop]).unwrap();

    let blog = report.registry.get("blog").unwrap();
    let unit = unit_file(blog);
    let secret_line = format!("Environment=\"SECRETS_FILE={}\"", blog.secrets_file().display());
    assert!(unit.lines().any(|l| l == secret_line));
    assert!(unit.lines().any(|l| l == "Requires=postgresql.service"));
    assert!(!unit.contains("SECRET_KEY"));

    let shop_unit = unit_file(report.registry.get("shop").unwrap());
    assert!(shop_unit.contains("--bind 127.0.0.1:8001"));

    let routes = proxy_routes(&report.registry);
    assert!(routes.contains("server_name blog.example.com;"));
    assert!(!routes.contains("shop"));
}

#[test]
fn test_proxied_host_names_ignore_case() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.expose_via_proxy = true;
    blog.host_name = Some("blog.example.com".into());
    let mut shop = host.app("shop");
    shop.expose_via_proxy = true;
    shop.host_name = Some("BLOG.example.com".into());

    let err = host.orchestrator.reconcile(&[blog, shop]).unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Validation(ValidationError::Conflict { ref field, .. }) if field == "host_name"
    ));
    assert!(proxy_routes(&host.orchestrator.current()).is_empty());
}

#[test]
fn test_injected_directives_rejected() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.environment
        .insert("DEBUG".into(), "0\nExecStartPre=/bin/sh -c id".into());

    let err = host.orchestrator.reconcile(&[blog]).unwrap_err();
    assert!(matches!(err, ProvisionError::Validation(_)));
    assert!(host.orchestrator.current().is_empty());
}
