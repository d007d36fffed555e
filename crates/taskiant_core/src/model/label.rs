//! Label records.

use super::{normalize_required, RowId, ValidationError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LABEL_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: RowId,
    /// Unique across all labels.
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewLabel {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn normalized(&self) -> Result<(String, String), ValidationError> {
        let name = normalize_required(&self.name, ValidationError::EmptyName)?;
        let color = self
            .color
            .as_deref()
            .map(str::trim)
            .filter(|color| !color.is_empty())
            .unwrap_or(DEFAULT_LABEL_COLOR)
            .to_string();
        Ok((name, color))
    }
}
