//! Project records.

use super::{normalize_required, RowId, ValidationError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROJECT_ICON: &str = "📁";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: RowId,
    pub name: String,
    pub icon: String,
    /// Display order; new projects append at `max + 1`.
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Trims the name and fills the default icon.
    pub fn normalized(&self) -> Result<(String, String), ValidationError> {
        let name = normalize_required(&self.name, ValidationError::EmptyName)?;
        let icon = self
            .icon
            .as_deref()
            .map(str::trim)
            .filter(|icon| !icon.is_empty())
            .unwrap_or(DEFAULT_PROJECT_ICON)
            .to_string();
        Ok((name, icon))
    }
}

/// Partial project update; only present fields are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon.is_none() && self.sort_order.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            normalize_required(name, ValidationError::EmptyName)?;
        }
        Ok(())
    }
}
