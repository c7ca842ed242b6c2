/*!
 * Application Module
 * Declared application records and their validation
 */

pub mod types;
pub mod validation;

pub use types::{ApplicationSpec, Binding, RawApplicationSpec};
pub use validation::{validate_batch, Validator};
