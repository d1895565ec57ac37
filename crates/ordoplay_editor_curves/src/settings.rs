// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve editor settings.
//!
//! Settings are stored as RON next to the editor's other configuration:
//! - Editing rules (deleting the last key, frame snapping)
//! - Picking radii for keys, handles and curve bodies
//! - Display options (tangent handles)
//! - Undo history depth

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "curve_editor.ron";

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),

    /// The settings file could not be parsed
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Curve editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveEditorSettings {
    /// Allow deleting the only remaining key of a curve
    pub allow_delete_last_key_in_curve: bool,
    /// Squared pixel distance at which a key or handle is picked immediately
    pub exact_pick_distance_sqr: f32,
    /// Squared pixel distance within which the nearest key or handle is picked
    pub approximate_pick_distance_sqr: f32,
    /// Pixel distance within which a click hits a curve body
    pub curve_hit_distance: f32,
    /// Pixel spacing of samples when hit testing a curve body
    pub curve_sample_spacing: f32,
    /// Pixels sampled to each side of the query when hit testing a curve body
    pub curve_sample_radius: f32,
    /// Snap dragged and inserted keys to whole frames
    pub snap_to_frame: bool,
    /// Frame rate used when no clip is loaded
    pub frame_rate: f32,
    /// Pixel length of drawn tangent handles
    pub tangent_handle_length: f32,
    /// Draw tangent handles of unselected keys
    pub show_unselected_tangents: bool,
    /// Maximum undo steps
    pub history_depth: usize,
}

impl Default for CurveEditorSettings {
    fn default() -> Self {
        Self {
            allow_delete_last_key_in_curve: false,
            exact_pick_distance_sqr: 16.0,
            approximate_pick_distance_sqr: 64.0,
            curve_hit_distance: 6.0,
            curve_sample_spacing: 2.0,
            curve_sample_radius: 10.0,
            snap_to_frame: true,
            frame_rate: 60.0,
            tangent_handle_length: 50.0,
            show_unselected_tangents: false,
            history_depth: 100,
        }
    }
}

impl CurveEditorSettings {
    /// Load settings from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No curve editor settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved curve editor settings to {:?}", path);
        Ok(())
    }

    /// Settings file path inside a configuration directory
    pub fn file_path(config_dir: &Path) -> std::path::PathBuf {
        config_dir.join(SETTINGS_FILE_NAME)
    }

    /// Frame snapping rate, `None` when snapping is off
    pub fn snap_rate(&self, frame_rate: f32) -> Option<f32> {
        (self.snap_to_frame && frame_rate > 0.0).then_some(frame_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = CurveEditorSettings::default();
        assert!(!settings.allow_delete_last_key_in_curve);
        assert!(settings.exact_pick_distance_sqr < settings.approximate_pick_distance_sqr);
        assert_eq!(settings.history_depth, 100);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("{}.ron", uuid::Uuid::new_v4()));
        let settings = CurveEditorSettings::load(&path).unwrap();
        assert_eq!(settings, CurveEditorSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = CurveEditorSettings::file_path(&dir);
        let settings = CurveEditorSettings {
            allow_delete_last_key_in_curve: true,
            frame_rate: 24.0,
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let loaded = CurveEditorSettings::load(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: CurveEditorSettings = ron::from_str("(snap_to_frame: false)").unwrap();
        assert!(!settings.snap_to_frame);
        assert_eq!(settings.history_depth, 100);
        assert_eq!(settings.snap_rate(30.0), None);
    }
}
