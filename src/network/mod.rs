/*!
 * Network Module
 * Host name rules and network policy resolution
 */

pub mod hosts;
pub mod resolver;
pub mod types;

pub use resolver::resolve;
pub use types::{AddressFamily, NetworkPolicy, TrafficRule};
