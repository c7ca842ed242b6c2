/*!
 * Monitoring Module
 * Structured logging for provisioning runs
 */

pub mod tracer;

pub use tracer::{generate_run_id, init_tracing, RunSpan};
