/*!
 * Secret Staging Integration Tests
 * Atomic replacement and private-tree guarantees
 */

use crate::common::me;
use appstage::secrets::StageOutcome;
use appstage::{SecretStager, StagingError};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const PAYLOAD_LEN: usize = 256 * 1024;

fn payload(fill: u8) -> Vec<u8> {
    let mut bytes = b"SECRET_KEY=".to_vec();
    bytes.resize(PAYLOAD_LEN, fill);
    bytes.push(b'\n');
    bytes
}

#[test]
fn test_restage_never_exposes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let stager = SecretStager::new(&dir.path().join("state"), me());
    let source = dir.path().join("blog.env");
    let owner = appstage::UserIdentity {
        name: "blog".into(),
        ..me()
    };

    let versions = [payload(b'a'), payload(b'b')];
    fs::write(&source, &versions[0]).unwrap();
    let target = stager.stage(&owner, owner.gid, &source).unwrap().location().to_path_buf();

    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(2));

    let reader = {
        let (stop, reads, start) = (Arc::clone(&stop), Arc::clone(&reads), Arc::clone(&start));
        let versions = versions.clone();
        let target = target.clone();
        thread::spawn(move || {
            start.wait();
            while !stop.load(Ordering::Acquire) {
                let seen = fs::read(&target).expect("staged secret vanished during restage");
                assert!(
                    versions.iter().any(|v| *v == seen),
                    "reader saw a partial file of {} bytes",
                    seen.len()
                );
                reads.fetch_add(1, Ordering::Relaxed);
                thread::yield_now();
            }
        })
    };

    start.wait();
    for round in 1..=40 {
        fs::write(&source, &versions[round % 2]).unwrap();
        let (_, outcome) = stager.stage_with_outcome(&owner, owner.gid, &source).unwrap();
        assert_eq!(outcome, StageOutcome::Written);
        thread::yield_now();
    }
    stop.store(true, Ordering::Release);
    reader.join().unwrap();

    assert!(reads.load(Ordering::Relaxed) > 0);
    assert_eq!(fs::read(&target).unwrap(), versions[0]);
}

#[test]
fn test_staged_file_is_owner_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let stager = SecretStager::new(&dir.path().join("state"), me());
    let source = dir.path().join("blog.env");
    fs::write(&source, b"SECRET_KEY=x\n").unwrap();
    fs::set_permissions(&source, fs::Permissions::from_mode(0o666)).unwrap();

    let secret = stager.stage(&me(), me().gid, &source).unwrap();
    let md = fs::metadata(secret.location()).unwrap();
    assert_eq!(md.mode() & 0o777, 0o400);
    assert_eq!(md.uid(), me().uid);

    // Source keeps its own permissions
    assert_eq!(fs::metadata(&source).unwrap().mode() & 0o777, 0o666);

    for ancestor in [secret.location().parent().unwrap(), stager.root()] {
        let md = fs::symlink_metadata(ancestor).unwrap();
        assert!(md.is_dir());
        assert_eq!(md.mode() & 0o022, 0);
    }
}

#[test]
fn test_world_writable_state_dir_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");
    fs::create_dir(&state).unwrap();
    fs::set_permissions(&state, fs::Permissions::from_mode(0o777)).unwrap();

    let stager = SecretStager::new(&state, me());
    let source = dir.path().join("blog.env");
    fs::write(&source, b"SECRET_KEY=x\n").unwrap();

    let err = stager.stage(&me(), me().gid, &source).unwrap_err();
    assert!(matches!(err, StagingError::UnsafeDirectory { .. }));
    assert!(!stager.root().exists());
}

#[test]
fn test_symlinked_target_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stager = SecretStager::new(&dir.path().join("state"), me());
    let source = dir.path().join("blog.env");
    fs::write(&source, b"SECRET_KEY=x\n").unwrap();
    let secret = stager.stage(&me(), me().gid, &source).unwrap();

    let decoy = dir.path().join("decoy");
    fs::write(&decoy, b"not a secret").unwrap();
    fs::remove_file(secret.location()).unwrap();
    std::os::unix::fs::symlink(&decoy, secret.location()).unwrap();

    let err = stager.stage(&me(), me().gid, &source).unwrap_err();
    assert!(matches!(err, StagingError::UnsafeDirectory { .. }));
    assert_eq!(fs::read(&decoy).unwrap(), b"not a secret");
}
