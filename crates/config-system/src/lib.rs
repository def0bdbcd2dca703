//! Configuration system for Framemark
//! Parses the host-provided configuration, applies defaults and resolves it
//! into the settings consumed by the annotation core

use framemark_shared::{FramemarkError, Style};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod parser;
pub mod presets;
pub mod validation;

pub use parser::ConfigParser;
pub use presets::{PresetManager, StylePreset};
pub use validation::ConfigValidator;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required field: {0}")]
    Missing(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for FramemarkError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing(field) => FramemarkError::MissingConfig { field },
            ConfigError::Parse(message) | ConfigError::Validation(message) => {
                FramemarkError::InvalidConfig {
                    message,
                    field: None,
                }
            }
        }
    }
}

/// Frame rate used to quantize playback time into annotation frames
pub const FRAME_RATE: f64 = 30.0;

/// Configuration object handed over by the host page at initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    pub video_src: String,
    /// Initial user zoom factor, multiplied with `zoom_base`
    pub default_zoom: f64,
    pub zoom_base: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Additive factor change per wheel notch or zoom button press
    pub zoom_step: f64,
    pub read_only: bool,
    pub project_name: Option<String>,
    #[serde(deserialize_with = "parser::string_or_number")]
    pub project_id: Option<String>,
    #[serde(deserialize_with = "parser::string_or_number")]
    pub video_id: Option<String>,
    pub share_token: Option<String>,
    pub dashboard_url: Option<String>,
    pub video_upload_url: Option<String>,
    pub annotation_save_url: Option<String>,
    pub snapshot_upload_url: Option<String>,
    pub save_debounce_ms: f64,
    /// Either a JSON string or an inline object
    pub initial_annotations: Option<serde_json::Value>,
    pub default_style: Style,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            video_src: String::new(),
            default_zoom: 1.0,
            zoom_base: 1.0,
            min_zoom: 0.25,
            max_zoom: 8.0,
            zoom_step: 0.1,
            read_only: false,
            project_name: None,
            project_id: None,
            video_id: None,
            share_token: None,
            dashboard_url: None,
            video_upload_url: None,
            annotation_save_url: None,
            snapshot_upload_url: None,
            save_debounce_ms: 800.0,
            initial_annotations: None,
            default_style: Style::default(),
        }
    }
}

/// Zoom composition parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomSettings {
    pub base: f64,
    pub default_factor: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        let host = HostConfig::default();
        Self {
            base: host.zoom_base,
            default_factor: host.default_zoom,
            min: host.min_zoom,
            max: host.max_zoom,
            step: host.zoom_step,
        }
    }
}

/// Save and upload targets; absent entirely in read-only mode
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Endpoints {
    pub annotation_save_url: Option<String>,
    pub snapshot_upload_url: Option<String>,
    pub video_upload_url: Option<String>,
}

impl Endpoints {
    pub fn is_empty(&self) -> bool {
        self.annotation_save_url.is_none()
            && self.snapshot_upload_url.is_none()
            && self.video_upload_url.is_none()
    }
}

/// Identification of the annotated video, forwarded with save requests
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoIdentity {
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub video_id: Option<String>,
    pub share_token: Option<String>,
    pub dashboard_url: Option<String>,
}

/// Resolved settings consumed by the annotation core
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatorSettings {
    pub video_src: String,
    pub zoom: ZoomSettings,
    pub read_only: bool,
    pub endpoints: Endpoints,
    pub identity: VideoIdentity,
    pub save_debounce_ms: f64,
    pub initial_document: Option<String>,
    pub default_style: Style,
}

impl Default for AnnotatorSettings {
    fn default() -> Self {
        Self {
            video_src: String::new(),
            zoom: ZoomSettings::default(),
            read_only: false,
            endpoints: Endpoints::default(),
            identity: VideoIdentity::default(),
            save_debounce_ms: HostConfig::default().save_debounce_ms,
            initial_document: None,
            default_style: Style::default(),
        }
    }
}

impl AnnotatorSettings {
    /// Validate a host configuration and resolve it into settings
    ///
    /// Read-only configurations never carry endpoints, even when the host
    /// supplied URLs.
    pub fn resolve(config: HostConfig) -> Result<Self> {
        ConfigValidator::validate(&config)?;

        let endpoints = if config.read_only {
            if config.annotation_save_url.is_some() || config.snapshot_upload_url.is_some() {
                log::warn!("Read-only configuration carries save URLs; ignoring them");
            }
            Endpoints::default()
        } else {
            Endpoints {
                annotation_save_url: config.annotation_save_url,
                snapshot_upload_url: config.snapshot_upload_url,
                video_upload_url: config.video_upload_url,
            }
        };

        let initial_document = config
            .initial_annotations
            .as_ref()
            .and_then(parser::annotation_json);

        Ok(Self {
            video_src: config.video_src,
            zoom: ZoomSettings {
                base: config.zoom_base,
                default_factor: config.default_zoom,
                min: config.min_zoom,
                max: config.max_zoom,
                step: config.zoom_step,
            },
            read_only: config.read_only,
            endpoints,
            identity: VideoIdentity {
                project_name: config.project_name,
                project_id: config.project_id,
                video_id: config.video_id,
                share_token: config.share_token,
                dashboard_url: config.dashboard_url,
            },
            save_debounce_ms: config.save_debounce_ms,
            initial_document,
            default_style: config.default_style,
        })
    }

    /// Whether any mutation may be persisted
    pub fn can_save(&self) -> bool {
        !self.read_only && self.endpoints.annotation_save_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> HostConfig {
        HostConfig {
            video_src: "https://cdn.example.com/clip.mp4".to_string(),
            annotation_save_url: Some("/api/videos/7/annotations".to_string()),
            snapshot_upload_url: Some("/api/videos/7/snapshots".to_string()),
            ..HostConfig::default()
        }
    }

    #[test]
    fn test_resolve_keeps_endpoints_when_writable() {
        let settings = AnnotatorSettings::resolve(base_config()).unwrap();
        assert!(settings.can_save());
        assert_eq!(
            settings.endpoints.snapshot_upload_url.as_deref(),
            Some("/api/videos/7/snapshots")
        );
    }

    #[test]
    fn test_read_only_strips_endpoints() {
        let config = HostConfig {
            read_only: true,
            ..base_config()
        };
        let settings = AnnotatorSettings::resolve(config).unwrap();
        assert!(settings.read_only);
        assert!(settings.endpoints.is_empty());
        assert!(!settings.can_save());
    }

    #[test]
    fn test_config_error_maps_to_framemark_error() {
        let err: FramemarkError = ConfigError::Missing("videoSrc".to_string()).into();
        assert_eq!(
            err,
            FramemarkError::MissingConfig {
                field: "videoSrc".to_string()
            }
        );
    }
}
