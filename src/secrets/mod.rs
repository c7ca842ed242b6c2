/*!
 * Secrets Module
 * Private staging of operator-supplied secret files
 */

pub mod checksum;
pub mod dirs;
pub mod stager;
pub mod types;

pub use stager::SecretStager;
pub use types::{StageOutcome, StagedAccount, StagedSecret, StagerStats};
