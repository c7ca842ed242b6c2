/*!
 * Host Module
 * Facts about existing OS users and occupied ports
 */

pub mod fixed;
pub mod system;
pub mod traits;

pub use fixed::FixedHost;
pub use system::SystemHost;
pub use traits::HostFacts;
