//! Editor configuration, persisted as TOML.
//!
//! Every field has a default, so a partial or empty file is valid. A file
//! that fails to parse falls back to the defaults with a warning.

use std::fs;
use std::io;
use std::path::Path;

use pictoria_core::encode::EncodeFormat;
use pictoria_core::{CanvasSize, InterpolationFilter, DEFAULT_CANVAS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default padding between the viewport edge and the canvas, in points.
pub const DEFAULT_VIEWPORT_PADDING: u32 = 32;

/// Default upper bound of the corner radius control.
pub const DEFAULT_MAX_CORNER_RADIUS: f32 = 100.0;

/// Default logical key of the persisted project list.
pub const DEFAULT_STORE_KEY: &str = "ImagesProjects";

/// What cancelling an open stage throws away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Discard only the open stage's pending change.
    #[default]
    PerStage,
    /// Reset every parameter set to its default, as older releases did.
    ResetAll,
}

/// Errors from reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings for the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Canvas used by the free aspect preset.
    pub default_canvas: CanvasSize,
    /// Subtracted from the viewport width to get the available canvas width.
    pub viewport_padding: u32,
    /// Upper bound of the corner radius control.
    pub max_corner_radius: f32,
    /// Filter for interactive previews.
    pub preview_filter: InterpolationFilter,
    /// Filter for the saved render.
    pub export_filter: InterpolationFilter,
    /// File format of saved renders.
    pub export_format: EncodeFormat,
    /// Behavior of cancelling an open stage.
    pub cancel_policy: CancelPolicy,
    /// Logical key of the persisted project list.
    pub store_key: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_canvas: DEFAULT_CANVAS,
            viewport_padding: DEFAULT_VIEWPORT_PADDING,
            max_corner_radius: DEFAULT_MAX_CORNER_RADIUS,
            preview_filter: InterpolationFilter::Bilinear,
            export_filter: InterpolationFilter::Lanczos3,
            export_format: EncodeFormat::Png,
            cancel_policy: CancelPolicy::PerStage,
            store_key: DEFAULT_STORE_KEY.to_string(),
        }
    }
}

impl EditorConfig {
    /// Width handed to the aspect stage for a viewport `viewport_width` wide.
    pub fn available_width(&self, viewport_width: u32) -> u32 {
        viewport_width.saturating_sub(self.viewport_padding)
    }

    /// Viewport width whose available width is exactly the default canvas.
    pub fn default_viewport_width(&self) -> u32 {
        self.default_canvas.width + self.viewport_padding
    }
}

/// Load the configuration from `path`.
///
/// # Errors
///
/// Returns `ConfigError::Io` if the file cannot be read. A file that is not
/// valid TOML yields the default configuration instead of an error.
pub fn load_from_path(path: &Path) -> Result<EditorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Ok(EditorConfig::default())
        }
    }
}

/// Write the configuration to `path`, creating parent directories.
///
/// # Errors
///
/// Returns `ConfigError` if serialization or any filesystem operation fails.
pub fn save_to_path(config: &EditorConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
