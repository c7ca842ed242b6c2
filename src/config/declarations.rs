/*!
 * Declaration Files
 * Application records read from JSON or TOML, chosen by extension
 */

use crate::app::RawApplicationSpec;
use crate::core::errors::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk shape: a list of application records
///
/// TOML uses `[[applications]]` tables; JSON an `applications` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeclarationFile {
    pub applications: Vec<RawApplicationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationFormat {
    Json,
    Toml,
}

impl DeclarationFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Parse declarations from text
pub fn parse_declarations(text: &str, format: DeclarationFormat) -> Result<Vec<RawApplicationSpec>> {
    let file: DeclarationFile = match format {
        DeclarationFormat::Json => serde_json::from_str(text)
            .map_err(|e| ProvisionError::Configuration(format!("invalid JSON declarations: {}", e)))?,
        DeclarationFormat::Toml => toml::from_str(text)
            .map_err(|e| ProvisionError::Configuration(format!("invalid TOML declarations: {}", e)))?,
    };
    Ok(file.applications)
}

/// Read declarations from a `.json` or `.toml` file
pub fn load_declarations(path: &Path) -> Result<Vec<RawApplicationSpec>> {
    let format = DeclarationFormat::from_path(path).ok_or_else(|| {
        ProvisionError::Configuration(format!(
            "{}: expected a .json or .toml declaration file",
            path.display()
        ))
    })?;
    let text = std::fs::read_to_string(path).map_err(|e| {
        ProvisionError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_declarations(&text, format)
}
