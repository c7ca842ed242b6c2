/*!
 * Validator Property Tests
 */

use crate::common::declaration;
use appstage::{resolve, validate_batch, RawApplicationSpec, TrafficRule, ValidationError};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

fn runtime() -> &'static Path {
    Path::new("/run/appstage")
}

fn app(name: &str) -> RawApplicationSpec {
    declaration(name, &PathBuf::from(format!("/etc/secrets/{}.env", name)))
}

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .unwrap_or_else(|e| panic!("regex failed: {e}"))
}

proptest! {
    #[test]
    fn prop_isolation_with_tcp_always_rejected(port in 1u16..=u16::MAX) {
        let mut raw = app("blog");
        raw.port = Some(port);
        raw.isolate_network = true;

        let err = validate_batch(&[raw], runtime()).unwrap_err();
        prop_assert!(
            matches!(err, ValidationError::IsolationConflict { .. }),
            "unexpected error: {:?}",
            err
        );
    }

    #[test]
    fn prop_unique_batches_validate(names in proptest::collection::btree_set(name_strategy(), 1..8)) {
        let raws: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut raw = app(name);
                raw.port = Some(8000 + i as u16);
                raw
            })
            .collect();

        let specs = validate_batch(&raws, runtime()).unwrap();
        let validated: BTreeSet<String> = specs.iter().map(|s| s.name().to_string()).collect();
        prop_assert_eq!(validated, names);
    }

    #[test]
    fn prop_shared_port_always_conflicts(
        names in proptest::collection::btree_set(name_strategy(), 2..6),
        port in 1u16..=u16::MAX,
    ) {
        let raws: Vec<_> = names
            .iter()
            .map(|name| {
                let mut raw = app(name);
                raw.port = Some(port);
                raw
            })
            .collect();

        let err = validate_batch(&raws, runtime()).unwrap_err();
        prop_assert!(
            matches!(err, ValidationError::Conflict { .. }),
            "unexpected error: {:?}",
            err
        );
        prop_assert_eq!(err.field(), "binding");
    }

    #[test]
    fn prop_worker_bounds(processes in 0u32..2048, threads in 0u32..2048) {
        let mut raw = app("blog");
        raw.process_count = Some(processes);
        raw.thread_count = Some(threads);

        let in_range = |n: u32| (1..=1024).contains(&n);
        let result = validate_batch(&[raw], runtime());
        prop_assert_eq!(result.is_ok(), in_range(processes) && in_range(threads));
    }

    #[test]
    fn prop_localhost_only_never_open(copies in 1usize..4, port in proptest::option::of(1u16..=u16::MAX)) {
        let mut raw = app("blog");
        raw.allowed_hosts = vec!["localhost".to_string(); copies];
        raw.port = port;

        let specs = validate_batch(&[raw], runtime()).unwrap();
        prop_assert_eq!(resolve(&specs[0]).inbound_rule, TrafficRule::AllowLocalOnly);
    }
}
