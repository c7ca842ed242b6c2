/*!
 * Configuration
 * Provisioner settings and declaration files
 */

pub mod declarations;
pub mod settings;

pub use declarations::{load_declarations, parse_declarations, DeclarationFile, DeclarationFormat};
pub use settings::ProvisionerConfig;
