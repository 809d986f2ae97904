//! Configuration document handed to checks.
//!
//! The document is shaped per category:
//!
//! ```json
//! {
//!   "python": {
//!     "enabled": true,
//!     "gates": { "tests": { "enabled": true, "timeout_secs": 600 } }
//!   },
//!   "disabled_gates": ["security:audit"]
//! }
//! ```
//!
//! Gate fragments are passed through to checks uninterpreted, apart from
//! the `enabled` flags used to switch gates off.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::CheckId;

/// Errors that can occur while building a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Document is not valid JSON
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Document root is not an object
    #[error("configuration root must be a JSON object")]
    NotAnObject,
}

/// Whether a gate may run under the current configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStatus {
    /// Gate may run
    Enabled,
    /// Gate is switched off, with the reason
    Disabled(String),
}

/// Full configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityConfig {
    root: Value,
}

impl QualityConfig {
    /// Build from a parsed JSON value. The root must be an object.
    pub fn from_value(root: Value) -> Result<Self, ConfigError> {
        if !root.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(Self { root })
    }

    /// Parse from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(s)?)
    }

    /// Raw document.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Gate fragment at `<category>.gates.<name>`, empty if absent.
    pub fn lookup(&self, category: &str, name: &str) -> GateSettings {
        self.root
            .get(category)
            .and_then(|c| c.get("gates"))
            .and_then(|g| g.get(name))
            .and_then(Value::as_object)
            .cloned()
            .map(GateSettings::from)
            .unwrap_or_default()
    }

    /// Gate fragment for a check id.
    pub fn lookup_id(&self, id: &CheckId) -> GateSettings {
        self.lookup(id.category(), id.name())
    }

    /// Decide whether a gate is switched on.
    ///
    /// A gate is off when it is listed in `disabled_gates`, when its
    /// category has `enabled: false`, or when its own fragment has
    /// `enabled: false`. Anything else, including a missing entry, is on.
    pub fn gate_status(&self, id: &CheckId) -> GateStatus {
        let qualified = id.qualified();

        let listed = self
            .root
            .get("disabled_gates")
            .and_then(Value::as_array)
            .is_some_and(|list| list.iter().any(|v| v.as_str() == Some(qualified.as_str())));
        if listed {
            return GateStatus::Disabled(format!("{qualified} is in disabled_gates list"));
        }

        let Some(category) = self.root.get(id.category()).and_then(Value::as_object) else {
            return GateStatus::Enabled;
        };

        if category.get("enabled").and_then(Value::as_bool) == Some(false) {
            return GateStatus::Disabled(format!("{} category is disabled in config", id.category()));
        }

        if self.lookup_id(id).get_bool("enabled") == Some(false) {
            return GateStatus::Disabled(format!("{qualified} is disabled in config"));
        }

        GateStatus::Enabled
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

/// Per-gate settings fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateSettings(Map<String, Value>);

impl GateSettings {
    /// Empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Unsigned integer value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// String value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// List of strings. Non-string items are ignored.
    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        let items = self.0.get(key)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// Whether there are no settings.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for GateSettings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> QualityConfig {
        QualityConfig::from_value(json!({
            "python": {
                "enabled": true,
                "gates": {
                    "tests": { "timeout_secs": 600, "args": ["-x", "-q"] },
                    "types": { "enabled": false }
                }
            },
            "javascript": { "enabled": false },
            "disabled_gates": ["security:audit"]
        }))
        .unwrap()
    }

    #[test]
    fn test_lookup_fragment() {
        let settings = config().lookup("python", "tests");
        assert_eq!(settings.get_u64("timeout_secs"), Some(600));
        assert_eq!(
            settings.get_str_list("args"),
            Some(vec!["-x".to_string(), "-q".to_string()])
        );
    }

    #[test]
    fn test_lookup_missing_is_empty() {
        assert!(config().lookup("python", "lint").is_empty());
        assert!(config().lookup("rust", "clippy").is_empty());
        assert!(QualityConfig::default().lookup("python", "tests").is_empty());
    }

    #[test]
    fn test_gate_status() {
        let config = config();
        assert_eq!(config.gate_status(&CheckId::new("python", "tests")), GateStatus::Enabled);
        assert!(matches!(
            config.gate_status(&CheckId::new("python", "types")),
            GateStatus::Disabled(_)
        ));
        assert!(matches!(
            config.gate_status(&CheckId::new("javascript", "lint")),
            GateStatus::Disabled(_)
        ));
        assert_eq!(
            config.gate_status(&CheckId::new("security", "audit")),
            GateStatus::Disabled("security:audit is in disabled_gates list".to_string())
        );
        assert_eq!(config.gate_status(&CheckId::new("rust", "clippy")), GateStatus::Enabled);
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(matches!(
            QualityConfig::from_json_str("[1, 2]"),
            Err(ConfigError::NotAnObject)
        ));
        assert!(matches!(
            QualityConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
