/*!
 * Secret Stager
 * Atomic, idempotent hand-off of operator secrets into a private tree
 *
 * Layout: <state_dir>/secrets/<user>/secrets.env
 *
 * A stage writes into a temporary file in the target directory, fixes mode
 * and ownership, then renames over the target. Readers see either the old
 * or the new file, never a missing or partial one.
 */

use super::checksum::sha256_hex;
use super::dirs::{check_private_dir, ensure_private_dir, ensure_root_dir};
use super::types::{AtomicStagerStats, StageOutcome, StagedAccount, StagedSecret, StagerStats};
use crate::core::errors::{StagingError, StagingResult};
use crate::core::limits::{
    OWNER_MARKER_MODE, OWNER_MARKER_NAME, SECRET_DIR_MODE, SECRET_FILE_MODE, SECRET_FILE_NAME,
    STAGING_TEMP_PREFIX,
};
use crate::core::types::{Gid, UserIdentity};
use dashmap::DashMap;
use nix::unistd::{chown, Gid as NixGid, Uid as NixUid};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Largest secrets file accepted (1 MiB)
const MAX_SECRET_BYTES: u64 = 1024 * 1024;

/// Stages secrets for service accounts
#[derive(Clone)]
pub struct SecretStager {
    root: PathBuf,
    system: UserIdentity,
    staged: Arc<DashMap<String, StagedSecret>>,
    stats: Arc<AtomicStagerStats>,
}

impl SecretStager {
    /// Create a stager rooted at `<state_dir>/secrets`
    ///
    /// `system` is the identity the provisioner runs as; it must own every
    /// directory on the private path.
    pub fn new(state_dir: &Path, system: UserIdentity) -> Self {
        info!(state_dir = %state_dir.display(), uid = system.uid, "Secret stager initialized");
        Self {
            root: state_dir.join("secrets"),
            system,
            staged: Arc::new(DashMap::new()),
            stats: Arc::new(AtomicStagerStats::default()),
        }
    }

    /// Root of the private secrets tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Target location for a user's staged secret
    pub fn location_for(&self, user: &str) -> PathBuf {
        self.root.join(user).join(SECRET_FILE_NAME)
    }

    /// Stage `source` for `owner`, readable by the owner only
    pub fn stage(&self, owner: &UserIdentity, group: Gid, source: &Path) -> StagingResult<StagedSecret> {
        self.stage_with_outcome(owner, group, source)
            .map(|(secret, _)| secret)
    }

    /// Stage and report whether anything was written
    pub fn stage_with_outcome(
        &self,
        owner: &UserIdentity,
        group: Gid,
        source: &Path,
    ) -> StagingResult<(StagedSecret, StageOutcome)> {
        let content = read_source(&owner.name, source)?;
        let checksum = sha256_hex(&content);

        let dir = self.prepare_dir(&owner.name)?;
        let target = dir.join(SECRET_FILE_NAME);
        let secret = StagedSecret::new(
            owner.name.clone(),
            target.clone(),
            checksum.clone(),
            SECRET_FILE_MODE,
        );

        let outcome = if self.target_matches(&target, owner, group, &checksum)? {
            debug!(user = %owner.name, "Staged secret unchanged");
            StageOutcome::Unchanged
        } else {
            self.write_atomic(&dir, &target, &content, owner, group)?;
            info!(
                user = %owner.name,
                location = %target.display(),
                checksum = %&checksum[..12],
                "Staged secret written"
            );
            StageOutcome::Written
        };

        self.stats.record(outcome);
        self.staged.insert(owner.name.clone(), secret.clone());
        Ok((secret, outcome))
    }

    /// Last secret staged for `user` by this stager
    pub fn staged(&self, user: &str) -> Option<StagedSecret> {
        self.staged.get(user).map(|s| s.clone())
    }

    /// Destroy a user's staged secret directory
    ///
    /// Returns false when there was nothing to remove.
    pub fn remove(&self, user: &str) -> StagingResult<bool> {
        self.staged.remove(user);

        let dir = self.root.join(user);
        match fs::symlink_metadata(&dir) {
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StagingError::io(&dir, e)),
            Ok(_) => {}
        }
        check_private_dir(&self.root, self.system.uid)?;
        check_private_dir(&dir, self.system.uid)?;

        fs::remove_dir_all(&dir).map_err(|e| StagingError::io(&dir, e))?;
        self.stats.record_removal();
        info!(user = %user, "Removed staged secret");
        Ok(true)
    }

    /// Record which application `user`'s secret belongs to
    ///
    /// Decommissioning reads this back, so it survives the process.
    pub fn record_owner(&self, user: &str, app: &str) -> StagingResult<()> {
        let dir = self.prepare_dir(user)?;
        let marker = dir.join(OWNER_MARKER_NAME);
        if read_marker(&marker)?.as_deref() == Some(app) {
            return Ok(());
        }

        let mut temp = tempfile::Builder::new()
            .prefix(STAGING_TEMP_PREFIX)
            .tempfile_in(&dir)
            .map_err(|e| StagingError::io(&dir, e))?;
        temp.write_all(app.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| StagingError::io(temp.path(), e))?;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(OWNER_MARKER_MODE))
            .map_err(|e| StagingError::io(temp.path(), e))?;
        temp.persist(&marker)
            .map_err(|e| StagingError::io(&marker, e.error))?;

        debug!(user = %user, app = %app, "Recorded secret owner");
        Ok(())
    }

    /// Every account directory in the secrets tree, sorted by account
    pub fn accounts(&self) -> StagingResult<Vec<StagedAccount>> {
        match fs::symlink_metadata(&self.root) {
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StagingError::io(&self.root, e)),
            Ok(_) => {}
        }
        check_private_dir(&self.root, self.system.uid)?;

        let mut accounts = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| StagingError::io(&self.root, e))? {
            let entry = entry.map_err(|e| StagingError::io(&self.root, e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| StagingError::io(&entry.path(), e))?
                .is_dir();
            let Ok(user) = entry.file_name().into_string() else {
                continue;
            };
            if !is_dir {
                continue;
            }
            let application = read_marker(&entry.path().join(OWNER_MARKER_NAME))?;
            accounts.push(StagedAccount { user, application });
        }
        accounts.sort_by(|a, b| a.user.cmp(&b.user));
        Ok(accounts)
    }

    pub fn stats(&self) -> StagerStats {
        self.stats.snapshot()
    }

    fn prepare_dir(&self, user: &str) -> StagingResult<PathBuf> {
        if let Some(parent) = self.root.parent() {
            ensure_root_dir(parent, SECRET_DIR_MODE, self.system.uid)?;
        }
        ensure_private_dir(&self.root, SECRET_DIR_MODE, self.system.uid)?;

        let dir = self.root.join(user);
        ensure_private_dir(&dir, SECRET_DIR_MODE, self.system.uid)?;
        Ok(dir)
    }

    /// True if the target already holds `checksum` with the right mode and owner
    fn target_matches(
        &self,
        target: &Path,
        owner: &UserIdentity,
        group: Gid,
        checksum: &str,
    ) -> StagingResult<bool> {
        let md = match fs::symlink_metadata(target) {
            Ok(md) => md,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StagingError::io(target, e)),
        };

        if !md.file_type().is_file() {
            return Err(StagingError::unsafe_dir(
                target,
                "staged secret is not a regular file",
            ));
        }
        if md.mode() & 0o7777 != SECRET_FILE_MODE || md.uid() != owner.uid || md.gid() != group {
            return Ok(false);
        }

        let current = fs::read(target).map_err(|e| StagingError::io(target, e))?;
        Ok(sha256_hex(&current) == checksum)
    }

    fn write_atomic(
        &self,
        dir: &Path,
        target: &Path,
        content: &[u8],
        owner: &UserIdentity,
        group: Gid,
    ) -> StagingResult<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(STAGING_TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| StagingError::io(dir, e))?;

        temp.write_all(content)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| StagingError::io(temp.path(), e))?;

        fs::set_permissions(temp.path(), fs::Permissions::from_mode(SECRET_FILE_MODE))
            .map_err(|e| StagingError::io(temp.path(), e))?;

        let md = temp
            .as_file()
            .metadata()
            .map_err(|e| StagingError::io(temp.path(), e))?;
        if md.uid() != owner.uid || md.gid() != group {
            chown(
                temp.path(),
                Some(NixUid::from_raw(owner.uid)),
                Some(NixGid::from_raw(group)),
            )
            .map_err(|e| StagingError::io(temp.path(), e.into()))?;
        }

        temp.persist(target)
            .map_err(|e| StagingError::io(target, e.error))?;

        // Make the rename durable
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| StagingError::io(dir, e))
    }
}

impl std::fmt::Debug for SecretStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStager")
            .field("root", &self.root)
            .field("system", &self.system)
            .field("staged", &self.staged.len())
            .finish()
    }
}

fn read_marker(marker: &Path) -> StagingResult<Option<String>> {
    let md = match fs::symlink_metadata(marker) {
        Ok(md) => md,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StagingError::io(marker, e)),
    };
    if !md.file_type().is_file() {
        return Err(StagingError::unsafe_dir(marker, "owner marker is not a regular file"));
    }
    let app = fs::read_to_string(marker).map_err(|e| StagingError::io(marker, e))?;
    Ok(Some(app.trim().to_string()).filter(|a| !a.is_empty()))
}

fn read_source(user: &str, source: &Path) -> StagingResult<Vec<u8>> {
    let unreadable = |reason: String| StagingError::SourceUnreadable {
        user: user.to_string(),
        path: source.display().to_string(),
        reason,
    };

    let file = File::open(source).map_err(|e| unreadable(e.to_string()))?;
    let md = file.metadata().map_err(|e| unreadable(e.to_string()))?;
    if !md.is_file() {
        return Err(unreadable("not a regular file".to_string()));
    }
    if md.len() > MAX_SECRET_BYTES {
        return Err(unreadable(format!(
            "{} bytes exceeds the {} byte limit",
            md.len(),
            MAX_SECRET_BYTES
        )));
    }

    read_bounded(file, md.len(), MAX_SECRET_BYTES).map_err(unreadable)
}

/// Read at most `limit` bytes; a source that grew past it since it was sized
/// is rejected rather than truncated
fn read_bounded(reader: impl Read, expected: u64, limit: u64) -> Result<Vec<u8>, String> {
    let mut content = Vec::with_capacity(expected.min(limit) as usize);
    reader
        .take(limit + 1)
        .read_to_end(&mut content)
        .map_err(|e| e.to_string())?;
    if content.len() as u64 > limit {
        return Err(format!("source grew past the {} byte limit while reading", limit));
    }
    Ok(content)
}
