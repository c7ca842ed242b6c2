/*!
 * Core Types
 * Common types used across the provisioner
 */

use serde::{Deserialize, Serialize};

use super::limits::{MIN_OPEN_FILES, OPEN_FILES_PER_WORKER_THREAD};

/// Numeric user ID
pub type Uid = u32;

/// Numeric group ID
pub type Gid = u32;

/// Resolved OS identity of a service account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
}

/// Resource limits handed to the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourceLimits {
    /// Open file descriptors (LimitNOFILE)
    pub max_open_files: u32,
    /// Processes plus threads (TasksMax)
    pub max_tasks: u32,
}

impl ResourceLimits {
    /// Derive limits from worker counts
    ///
    /// One task per worker thread, one per worker process, plus the master.
    #[must_use]
    pub fn for_workers(process_count: u32, thread_count: u32) -> Self {
        let threads = process_count.saturating_mul(thread_count);
        Self {
            max_open_files: threads
                .saturating_mul(OPEN_FILES_PER_WORKER_THREAD)
                .max(MIN_OPEN_FILES),
            max_tasks: process_count
                .saturating_mul(thread_count.saturating_add(1))
                .saturating_add(1),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::for_workers(1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_for_single_worker() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_open_files, 1024);
        assert_eq!(limits.max_tasks, 3);
    }

    #[test]
    fn test_limits_scale_with_workers() {
        let limits = ResourceLimits::for_workers(4, 8);
        assert_eq!(limits.max_open_files, 4 * 8 * 256);
        assert_eq!(limits.max_tasks, 4 * 9 + 1);
    }

    #[test]
    fn test_limits_saturate() {
        let limits = ResourceLimits::for_workers(u32::MAX, u32::MAX);
        assert_eq!(limits.max_open_files, u32::MAX);
        assert_eq!(limits.max_tasks, u32::MAX);
    }
}
