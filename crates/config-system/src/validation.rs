//! Configuration validation utilities

use crate::{ConfigError, HostConfig, Result};

/// Upper bound for the save debounce; longer delays risk losing work on unload
const MAX_SAVE_DEBOUNCE_MS: f64 = 60_000.0;
const MAX_STROKE_WIDTH: f64 = 50.0;

/// Host configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete configuration
    pub fn validate(config: &HostConfig) -> Result<()> {
        if config.video_src.trim().is_empty() {
            return Err(ConfigError::Missing("videoSrc".to_string()));
        }

        Self::validate_zoom(config)?;
        Self::validate_urls(config)?;

        if !config.save_debounce_ms.is_finite()
            || config.save_debounce_ms < 0.0
            || config.save_debounce_ms > MAX_SAVE_DEBOUNCE_MS
        {
            return Err(ConfigError::Validation(format!(
                "Invalid saveDebounceMs: {}. Must be between 0 and {}",
                config.save_debounce_ms, MAX_SAVE_DEBOUNCE_MS
            )));
        }

        let width = config.default_style.width;
        if !(width > 0.0 && width <= MAX_STROKE_WIDTH) {
            return Err(ConfigError::Validation(format!(
                "Invalid default stroke width: {}. Must be above 0 and at most 50",
                config.default_style.width
            )));
        }

        Ok(())
    }

    /// Validate zoom bounds and the composed default zoom
    fn validate_zoom(config: &HostConfig) -> Result<()> {
        let values = [
            ("zoomBase", config.zoom_base),
            ("defaultZoom", config.default_zoom),
            ("minZoom", config.min_zoom),
            ("maxZoom", config.max_zoom),
            ("zoomStep", config.zoom_step),
        ];
        for (field, value) in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "Invalid {field}: {value}. Must be a positive number"
                )));
            }
        }

        if config.min_zoom > config.max_zoom {
            return Err(ConfigError::Validation(format!(
                "minZoom ({}) exceeds maxZoom ({})",
                config.min_zoom, config.max_zoom
            )));
        }

        let composed = config.zoom_base * config.default_zoom;
        if composed < config.min_zoom || composed > config.max_zoom {
            log::warn!(
                "Default zoom {} falls outside [{}, {}]; it will be clamped",
                composed,
                config.min_zoom,
                config.max_zoom
            );
        }

        Ok(())
    }

    /// URLs are optional, but a present URL must not be blank
    fn validate_urls(config: &HostConfig) -> Result<()> {
        let urls = [
            ("annotationSaveUrl", &config.annotation_save_url),
            ("snapshotUploadUrl", &config.snapshot_upload_url),
            ("videoUploadUrl", &config.video_upload_url),
            ("dashboardUrl", &config.dashboard_url),
        ];
        for (field, url) in urls {
            if let Some(url) = url {
                if url.trim().is_empty() {
                    return Err(ConfigError::Validation(format!("{field} cannot be empty")));
                }
            }
        }
        Ok(())
    }
}
