/*!
 * Private Directory Checks
 * Symlink-safe creation and verification of the secrets tree
 *
 * Every directory on the private path must be a real directory (never a
 * symlink), owned by the provisioner and not writable by group or others.
 * A mismatch is a security fault; nothing is silently followed or fixed.
 */

use crate::core::errors::{StagingError, StagingResult};
use crate::core::types::Uid;
use std::fs::{self, DirBuilder};
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::Path;

/// Group- and world-write bits
const FOREIGN_WRITE_BITS: u32 = 0o022;

/// Verify that `path` is a directory exclusively controlled by `owner`
pub fn check_private_dir(path: &Path, owner: Uid) -> StagingResult<()> {
    let md = fs::symlink_metadata(path).map_err(|e| StagingError::io(path, e))?;

    if md.file_type().is_symlink() {
        return Err(StagingError::unsafe_dir(path, "is a symlink"));
    }
    if !md.is_dir() {
        return Err(StagingError::unsafe_dir(path, "is not a directory"));
    }
    if md.uid() != owner {
        return Err(StagingError::unsafe_dir(
            path,
            format!("owned by uid {} instead of {}", md.uid(), owner),
        ));
    }
    if md.mode() & FOREIGN_WRITE_BITS != 0 {
        return Err(StagingError::unsafe_dir(
            path,
            format!("mode {:o} is writable by group or others", md.mode() & 0o7777),
        ));
    }
    Ok(())
}

/// Create `path` with `mode` if missing, then verify it
///
/// The parent must already have been verified by the caller.
pub fn ensure_private_dir(path: &Path, mode: u32, owner: Uid) -> StagingResult<()> {
    match DirBuilder::new().mode(mode).create(path) {
        Ok(()) => {
            // DirBuilder mode is filtered by the umask; pin it explicitly
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(|e| StagingError::io(path, e))?;
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => return Err(StagingError::io(path, e)),
    }
    check_private_dir(path, owner)
}

/// Create the state root (and missing ancestors) if needed, then verify it
pub fn ensure_root_dir(path: &Path, mode: u32, owner: Uid) -> StagingResult<()> {
    if fs::symlink_metadata(path).is_err() {
        DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|e| StagingError::io(path, e))?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| StagingError::io(path, e))?;
    }
    check_private_dir(path, owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::geteuid;

    fn me() -> Uid {
        geteuid().as_raw()
    }

    #[test]
    fn test_creates_private_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("blog");

        ensure_private_dir(&target, 0o711, me()).unwrap();
        let md = fs::metadata(&target).unwrap();
        assert_eq!(md.mode() & 0o777, 0o711);

        // Second call is a no-op
        ensure_private_dir(&target, 0o711, me()).unwrap();
    }

    #[test]
    fn test_rejects_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let err = check_private_dir(&link, me()).unwrap_err();
        assert!(matches!(err, StagingError::UnsafeDirectory { .. }));
    }

    #[test]
    fn test_rejects_world_writable() {
        let dir = tempfile::tempdir().unwrap();
        let open = dir.path().join("open");
        fs::create_dir(&open).unwrap();
        fs::set_permissions(&open, fs::Permissions::from_mode(0o777)).unwrap();

        let err = check_private_dir(&open, me()).unwrap_err();
        assert!(matches!(err, StagingError::UnsafeDirectory { .. }));
    }

    #[test]
    fn test_rejects_foreign_owner() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_private_dir(dir.path(), me().wrapping_add(1)).unwrap_err();
        assert!(matches!(err, StagingError::UnsafeDirectory { .. }));
    }

    #[test]
    fn test_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(check_private_dir(&file, me()).is_err());
    }
}
