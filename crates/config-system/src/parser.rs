//! Host configuration parsing

use crate::{AnnotatorSettings, ConfigError, HostConfig, Result};
use serde::{Deserialize, Deserializer};

/// Parser for the configuration blob the host page embeds
pub struct ConfigParser;

impl ConfigParser {
    /// Parse configuration from a JSON string
    pub fn parse_str(content: &str) -> Result<HostConfig> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e)))
    }

    /// Parse configuration from an already decoded JSON value
    pub fn parse_value(value: serde_json::Value) -> Result<HostConfig> {
        serde_json::from_value(value)
            .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e)))
    }

    /// Parse, validate and resolve in one step
    pub fn resolve_str(content: &str) -> Result<AnnotatorSettings> {
        AnnotatorSettings::resolve(Self::parse_str(content)?)
    }
}

/// Normalizes the `initialAnnotations` field into a JSON document string
///
/// Hosts either inline the document object or pass it pre-serialized. Empty
/// strings and `null` mean "no document".
pub(crate) fn annotation_json(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(raw) if raw.trim().is_empty() => None,
        serde_json::Value::String(raw) => Some(raw.clone()),
        other => Some(other.to_string()),
    }
}

/// Accepts identifiers rendered either as JSON strings or numbers
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}
