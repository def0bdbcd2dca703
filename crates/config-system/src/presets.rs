//! Stroke style presets offered by the toolbar

use crate::{ConfigError, Result};
use framemark_shared::Style;
use std::collections::HashMap;

/// Named stroke style
#[derive(Debug, Clone, PartialEq)]
pub struct StylePreset {
    pub name: String,
    pub style: Style,
}

impl StylePreset {
    fn new(name: &str, color: &str, width: f64) -> Self {
        Self {
            name: name.to_string(),
            style: Style::new(color, width),
        }
    }
}

/// Preset manager for stroke styles
pub struct PresetManager {
    /// Built-in presets, in toolbar order
    builtin_presets: Vec<StylePreset>,

    /// User-defined presets
    user_presets: HashMap<String, StylePreset>,
}

impl Default for PresetManager {
    fn default() -> Self {
        Self {
            builtin_presets: vec![
                StylePreset::new("red", "#ff3b30", 3.0),
                StylePreset::new("yellow", "#ffcc00", 3.0),
                StylePreset::new("green", "#34c759", 3.0),
                StylePreset::new("blue", "#0a84ff", 3.0),
                StylePreset::new("white", "#ffffff", 2.0),
                StylePreset::new("marker", "#ff9500", 8.0),
            ],
            user_presets: HashMap::new(),
        }
    }
}

impl PresetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset by name, built-ins first
    pub fn get(&self, name: &str) -> Option<&StylePreset> {
        self.builtin_presets
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.user_presets.get(name))
    }

    pub fn list_presets_by_name(&self) -> Vec<&str> {
        let mut user: Vec<&str> = self.user_presets.keys().map(String::as_str).collect();
        user.sort_unstable();
        self.builtin_presets
            .iter()
            .map(|p| p.name.as_str())
            .chain(user)
            .collect()
    }

    /// Add a user preset
    pub fn add_user_preset(&mut self, name: String, style: Style) -> Result<()> {
        if self.builtin_presets.iter().any(|p| p.name == name) {
            return Err(ConfigError::Validation(format!(
                "Cannot override built-in preset: {}",
                name
            )));
        }
        if style.width <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "Invalid stroke width for preset {}: {}",
                name, style.width
            )));
        }

        self.user_presets
            .insert(name.clone(), StylePreset { name, style });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let manager = PresetManager::new();
        assert_eq!(manager.get("marker").unwrap().style.width, 8.0);
        assert!(manager.get("missing").is_none());
        assert_eq!(manager.list_presets_by_name()[0], "red");
    }

    #[test]
    fn test_user_presets_cannot_shadow_builtins() {
        let mut manager = PresetManager::new();
        assert!(manager
            .add_user_preset("red".to_string(), Style::new("#000", 1.0))
            .is_err());
        manager
            .add_user_preset("team".to_string(), Style::new("#123456", 4.0))
            .unwrap();
        assert_eq!(manager.get("team").unwrap().style.color, "#123456");
        assert_eq!(manager.list_presets_by_name().last(), Some(&"team"));
    }
}
