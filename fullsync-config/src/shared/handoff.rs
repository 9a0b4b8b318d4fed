use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::ValidationError;

/// Where extracted row sets are kept between the Extract and Load steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandoffConfig {
    /// Process memory. Lost when the process exits.
    #[default]
    Memory,
    /// One JSON file per table inside `path`.
    File { path: PathBuf },
}

impl HandoffConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            HandoffConfig::Memory => Ok(()),
            HandoffConfig::File { path } if path.as_os_str().is_empty() => {
                Err(ValidationError::EmptyHandoffPath)
            }
            HandoffConfig::File { .. } => Ok(()),
        }
    }
}
