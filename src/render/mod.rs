/*!
 * Render Module
 * Text handed to the external supervisor and reverse proxy
 */

pub mod proxy;
pub mod unit;

pub use proxy::{proxy_routes, routes};
pub use unit::unit_file;
