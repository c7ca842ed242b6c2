/*!
 * Reconcile Integration Tests
 * Whole-batch behavior of the orchestrator against a scratch host
 */

use crate::common::{me, TestHost};
use appstage::{
    AddressFamily, FixedHost, Orchestrator, ProvisionError, TrafficRule, ValidationError, Warning,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_valid_batch_registers_every_app() {
    let host = TestHost::new();
    let mut shop = host.app("shop");
    shop.port = Some(8001);
    let mut api = host.app("api");
    api.port = Some(8002);

    let report = host
        .orchestrator
        .reconcile(&[host.app("blog"), shop, api])
        .unwrap();

    assert_eq!(report.registry.names(), names(&["api", "blog", "shop"]));
    assert_eq!(host.orchestrator.current().names(), names(&["api", "blog", "shop"]));
    for descriptor in report.registry.iter() {
        assert!(descriptor.secrets_file().exists());
    }
}

#[test]
fn test_identical_reconcile_is_idempotent() {
    let host = TestHost::new();
    let batch = vec![host.app("blog")];

    let first = host.orchestrator.reconcile(&batch).unwrap();
    let location = first.registry.get("blog").unwrap().secrets_file().to_path_buf();
    let bytes = fs::read(&location).unwrap();
    let mtime = fs::metadata(&location).unwrap().modified().unwrap();
    let inode = fs::metadata(&location).unwrap().ino();

    thread::sleep(Duration::from_millis(20));
    let second = host.orchestrator.reconcile(&batch).unwrap();

    assert_eq!(first.registry, second.registry);
    assert_eq!(fs::read(&location).unwrap(), bytes);
    assert_eq!(fs::metadata(&location).unwrap().modified().unwrap(), mtime);
    assert_eq!(fs::metadata(&location).unwrap().ino(), inode);
    assert_eq!(host.orchestrator.stager().stats().writes, 1);
}

#[test]
fn test_duplicate_port_aborts_whole_batch() {
    let host = TestHost::new();
    host.orchestrator.reconcile(&[host.app("blog")]).unwrap();
    let before = host.orchestrator.current();

    let mut shop = host.app("shop");
    shop.port = Some(8000);
    let mut api = host.app("api");
    api.port = Some(8000);

    let err = host
        .orchestrator
        .reconcile(&[host.app("blog"), shop, api])
        .unwrap_err();

    match err {
        ProvisionError::Validation(ValidationError::Conflict { app, field, owner, .. }) => {
            assert_eq!(app, "api");
            assert_eq!(field, "binding");
            assert_eq!(owner, "shop");
        }
        other => panic!("expected binding conflict, got {:?}", other),
    }
    assert!(Arc::ptr_eq(&before, &host.orchestrator.current()));
    assert!(!host.orchestrator.stager().location_for("shop").exists());
}

#[test]
fn test_isolation_with_tcp_rejected() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.port = Some(8000);
    blog.isolate_network = true;

    let err = host.orchestrator.reconcile(&[blog]).unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Validation(ValidationError::IsolationConflict { .. })
    ));
    assert!(host.orchestrator.current().is_empty());
}

#[test]
fn test_localhost_only_is_local_inbound() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.allowed_hosts = vec!["localhost".into()];

    let report = host.orchestrator.reconcile(&[blog]).unwrap();
    let network = report.registry.get("blog").unwrap().network();
    assert_eq!(network.inbound_rule, TrafficRule::AllowLocalOnly);
    assert_eq!(network.outbound_rule, TrafficRule::AllowAll);
}

#[test]
fn test_public_host_is_open_inbound() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.allowed_hosts = vec!["example.com".into()];

    let report = host.orchestrator.reconcile(&[blog]).unwrap();
    assert_eq!(
        report.registry.get("blog").unwrap().network().inbound_rule,
        TrafficRule::AllowAll
    );
}

#[test]
fn test_isolated_app_keeps_only_unix() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.isolate_network = true;
    blog.allowed_hosts = vec!["example.com".into()];

    let report = host.orchestrator.reconcile(&[blog]).unwrap();
    let descriptor = report.registry.get("blog").unwrap();
    assert_eq!(descriptor.network().outbound_rule, TrafficRule::DenyAll);
    assert_eq!(
        descriptor.sandbox().restrict_address_families,
        BTreeSet::from([AddressFamily::Unix])
    );
}

#[test]
fn test_registry_replaced_not_merged() {
    let host = TestHost::new();
    host.orchestrator
        .reconcile(&[host.app("blog"), host.app("shop")])
        .unwrap();

    let report = host.orchestrator.reconcile(&[host.app("api")]).unwrap();
    assert_eq!(report.registry.names(), names(&["api"]));
    assert_eq!(report.removed, names(&["blog", "shop"]));
}

#[test]
fn test_secrets_isolated_per_app() {
    let host = TestHost::new();
    let report = host
        .orchestrator
        .reconcile(&[host.app("blog"), host.app("shop")])
        .unwrap();

    let blog = report.registry.get("blog").unwrap().secrets_file();
    let shop = report.registry.get("shop").unwrap().secrets_file();
    assert_ne!(blog.parent(), shop.parent());
    assert_eq!(fs::read_to_string(blog).unwrap(), "SECRET_KEY=blog-key\n");
    assert_eq!(fs::read_to_string(shop).unwrap(), "SECRET_KEY=shop-key\n");
}

#[test]
fn test_busy_port_is_warning_not_error() {
    let host = TestHost::with_host(FixedHost::mapping_all_to(me()).with_busy_port(8080));
    let mut blog = host.app("blog");
    blog.port = Some(8080);

    let report = host.orchestrator.reconcile(&[blog]).unwrap();
    assert_eq!(
        report.warnings,
        vec![Warning::PortInUse {
            app: "blog".into(),
            port: 8080
        }]
    );
    assert_eq!(report.registry.len(), 1);
}

#[test]
fn test_readers_see_old_or_new_registry() {
    let host = Arc::new(TestHost::new());
    host.orchestrator.reconcile(&[host.app("blog")]).unwrap();
    let batch = vec![host.app("blog"), host.app("shop")];

    let reader = {
        let host = Arc::clone(&host);
        thread::spawn(move || {
            for _ in 0..1_000 {
                let len = host.orchestrator.current().len();
                assert!(len == 1 || len == 2, "saw partial registry of {}", len);
            }
        })
    };

    host.orchestrator.reconcile(&batch).unwrap();
    reader.join().unwrap();
    assert_eq!(host.orchestrator.current().len(), 2);
}

#[test]
fn test_decommission_survives_restart() {
    let host = TestHost::new();
    let mut blog = host.app("blog");
    blog.user = Some("blogger".into());
    host.orchestrator.reconcile(&[blog]).unwrap();
    let staged = host.orchestrator.stager().location_for("blogger");
    assert!(staged.exists());

    let restarted = Orchestrator::new(
        host.orchestrator.config().clone(),
        Arc::new(FixedHost::mapping_all_to(me())),
    );
    restarted.reconcile(&[]).unwrap();

    assert!(restarted.decommission("blog").unwrap());
    assert!(!staged.exists());
}
