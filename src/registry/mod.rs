/*!
 * Registry Module
 * Name-to-descriptor registry and the orchestrator that replaces it
 */

pub mod orchestrator;
pub mod report;
pub mod snapshot;

pub use orchestrator::Orchestrator;
pub use report::{ReconcileReport, Warning};
pub use snapshot::Registry;
