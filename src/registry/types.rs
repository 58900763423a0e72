//! Registry data model — app definitions, widgets, and their drafts/patches.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Widget configuration: a JSON object keyed by setting name.
pub type Config = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// SIZE + POSITION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    #[default]
    Medium,
    Large,
}

impl SizeClass {
    /// Resize-button order: small → medium → large → small.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Small => Self::Medium,
            Self::Medium => Self::Large,
            Self::Large => Self::Small,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Advisory `(column, row)` grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// APP DEFINITION
// =============================================================================

/// A named unit of sandboxed UI logic plus its default configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(alias = "code")]
    pub source_text: String,
    #[serde(default, alias = "config")]
    pub default_config: Config,
    /// Entry-point symbol named by the producer, when it supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    pub created_at: i64,
}

/// Caller-supplied fields for a new app; id and timestamp are assigned on admission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(alias = "code")]
    pub source_text: String,
    #[serde(default, alias = "config")]
    pub default_config: Config,
    #[serde(default)]
    pub entry_point: Option<String>,
}

// =============================================================================
// WIDGET
// =============================================================================

/// One placed instance of an app on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: Uuid,
    pub app_id: Uuid,
    pub name: String,
    #[serde(alias = "size")]
    pub size_class: SizeClass,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_override: Option<Config>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDraft {
    pub app_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "size")]
    pub size_class: Option<SizeClass>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub config_override: Option<Config>,
}

impl WidgetDraft {
    #[must_use]
    pub fn new(app_id: Uuid) -> Self {
        Self { app_id, name: None, size_class: None, position: None, config_override: None }
    }

    #[must_use]
    pub fn with_size(mut self, size: SizeClass) -> Self {
        self.size_class = Some(size);
        self
    }
}

/// Partial widget update. An empty `config_override` object clears the override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "size")]
    pub size_class: Option<SizeClass>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub config_override: Option<Config>,
}

impl WidgetPatch {
    pub(crate) fn apply(self, widget: &mut Widget) {
        if let Some(name) = self.name {
            widget.name = name;
        }
        if let Some(size) = self.size_class {
            widget.size_class = size;
        }
        if let Some(position) = self.position {
            widget.position = position;
        }
        if let Some(config) = self.config_override {
            widget.config_override = if config.is_empty() { None } else { Some(config) };
        }
    }
}

// =============================================================================
// CONFIG MERGE
// =============================================================================

/// Shallow merge: every key in `overrides` replaces the default of the same key.
#[must_use]
pub fn merge_config(defaults: &Config, overrides: Option<&Config>) -> Config {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
