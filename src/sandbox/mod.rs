/*!
 * Sandbox Module
 *
 * Layered hardening policy:
 * - Hardened base table shared by every service
 * - Declared per-application overrides (override wins)
 * - Network projection applied last, never overridable
 */

pub mod policy;
pub mod types;

pub use types::{Capability, ProtectSystem, SandboxOverrides, SandboxPolicy};
