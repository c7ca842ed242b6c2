/*!
 * Shared fixtures for provisioning tests
 */

use appstage::{FixedHost, Orchestrator, ProvisionerConfig, RawApplicationSpec, UserIdentity};
use nix::unistd::{getegid, geteuid};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of the test process
pub fn me() -> UserIdentity {
    UserIdentity {
        name: "appstage".to_string(),
        uid: geteuid().as_raw(),
        gid: getegid().as_raw(),
    }
}

/// Scratch host: private state under a temp dir, every account mapped to us
pub struct TestHost {
    pub dir: tempfile::TempDir,
    pub orchestrator: Orchestrator,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with_host(FixedHost::mapping_all_to(me()))
    }

    pub fn with_host(host: FixedHost) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sources")).unwrap();
        let config = ProvisionerConfig::default()
            .with_state_dir(dir.path().join("state"))
            .with_runtime_dir(dir.path().join("run"));
        Self {
            orchestrator: Orchestrator::new(config, Arc::new(host)),
            dir,
        }
    }

    /// Operator-owned source file for `name`
    pub fn source(&self, name: &str) -> PathBuf {
        self.dir.path().join("sources").join(format!("{}.env", name))
    }

    pub fn write_source(&self, name: &str, content: &str) -> PathBuf {
        let path = self.source(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Minimal valid declaration with a freshly written secrets file
    pub fn app(&self, name: &str) -> RawApplicationSpec {
        let source = self.write_source(name, &format!("SECRET_KEY={}-key\n", name));
        declaration(name, &source)
    }
}

pub fn declaration(name: &str, secrets: &Path) -> RawApplicationSpec {
    RawApplicationSpec {
        name: name.to_string(),
        root: Some(PathBuf::from(format!("/srv/{}", name))),
        module_entry_point: Some(format!("{}.wsgi", name)),
        database_name: Some(name.replace('-', "_")),
        secrets_file: Some(secrets.to_path_buf()),
        ..Default::default()
    }
}
