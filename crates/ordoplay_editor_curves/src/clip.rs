// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation clip data and persistence.
//!
//! A clip is the persisted form of an editing session: the bound curves and
//! the events. The editor never writes clips directly; committed edits are
//! handed to a [`ClipSink`].

use crate::binding::CurveBinding;
use crate::curve::Curve;
use crate::events::AnimationEvent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Current clip format version
pub const CLIP_FORMAT_VERSION: u32 = 1;

/// Clip file extension
pub const CLIP_EXTENSION: &str = "anim.ron";

/// Clip errors
#[derive(Debug, Error)]
pub enum ClipError {
    /// Reading or writing the clip failed
    #[error("Clip I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The clip could not be serialized
    #[error("Failed to serialize clip: {0}")]
    Serialize(#[from] ron::Error),

    /// The clip could not be parsed
    #[error("Failed to parse clip: {0}")]
    Deserialize(#[from] ron::error::SpannedError),

    /// The clip was written by a newer editor
    #[error("Clip version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },
}

/// A curve together with the property it animates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveData {
    /// Animated property
    pub binding: CurveBinding,
    /// Keys and wrap modes
    pub curve: Curve,
}

/// Persisted animation clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClipData {
    /// Format version
    pub version: u32,
    /// Clip name
    pub name: String,
    /// Frames per second
    pub frame_rate: f32,
    /// Bound curves
    #[serde(default)]
    pub curves: Vec<CurveData>,
    /// Events, sorted by time
    #[serde(default)]
    pub events: Vec<AnimationEvent>,
}

impl Default for AnimationClipData {
    fn default() -> Self {
        Self::new("New Clip", 60.0)
    }
}

impl AnimationClipData {
    /// Create an empty clip
    pub fn new(name: impl Into<String>, frame_rate: f32) -> Self {
        Self {
            version: CLIP_FORMAT_VERSION,
            name: name.into(),
            frame_rate,
            curves: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Curve bound to a property
    pub fn curve(&self, binding: &CurveBinding) -> Option<&Curve> {
        self.curves.iter().find(|c| c.binding == *binding).map(|c| &c.curve)
    }

    /// Add or replace the curve of a property
    pub fn set_curve(&mut self, binding: CurveBinding, curve: Curve) {
        match self.curves.iter_mut().find(|c| c.binding == binding) {
            Some(existing) => existing.curve = curve,
            None => self.curves.push(CurveData { binding, curve }),
        }
    }

    /// Clip length: the latest key or event time
    pub fn duration(&self) -> f32 {
        let keys = self
            .curves
            .iter()
            .filter_map(|c| c.curve.time_range())
            .map(|(_, end)| end);
        let events = self.events.iter().map(|e| e.time);
        keys.chain(events).fold(0.0, f32::max)
    }

    /// Insert an event keeping time order. Events at the same time keep insertion order.
    pub fn add_event(&mut self, event: AnimationEvent) -> Uuid {
        let id = event.id;
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
        id
    }

    /// Remove an event
    pub fn remove_event(&mut self, id: Uuid) -> Option<AnimationEvent> {
        let index = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(index))
    }

    /// Events with `start <= time <= end`
    pub fn events_in_range(&self, start: f32, end: f32) -> Vec<&AnimationEvent> {
        self.events
            .iter()
            .filter(|e| e.time >= start && e.time <= end)
            .collect()
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ClipError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Parse from RON, rejecting newer format versions
    pub fn from_ron(s: &str) -> Result<Self, ClipError> {
        let clip: AnimationClipData = ron::from_str(s)?;
        if clip.version > CLIP_FORMAT_VERSION {
            return Err(ClipError::UnsupportedVersion {
                found: clip.version,
                supported: CLIP_FORMAT_VERSION,
            });
        }
        Ok(clip)
    }

    /// Load a clip file
    pub fn load(path: &Path) -> Result<Self, ClipError> {
        let content = std::fs::read_to_string(path)?;
        let clip = Self::from_ron(&content)?;
        tracing::info!("Loaded clip {} from {:?}", clip.name, path);
        Ok(clip)
    }

    /// Save to a clip file
    pub fn save(&self, path: &Path) -> Result<(), ClipError> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::info!("Saved clip {} to {:?}", self.name, path);
        Ok(())
    }
}

/// Receives committed clip data
pub trait ClipSink {
    /// Persist the clip
    fn save(&mut self, clip: &AnimationClipData) -> Result<(), ClipError>;
}

/// Writes clips to a RON file, skipping writes of unchanged content
#[derive(Debug, Clone)]
pub struct RonFileSink {
    path: PathBuf,
    last_written: Option<String>,
}

impl RonFileSink {
    /// Create a sink writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: None,
        }
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ClipSink for RonFileSink {
    fn save(&mut self, clip: &AnimationClipData) -> Result<(), ClipError> {
        let content = clip.to_ron()?;
        if self.last_written.as_deref() == Some(content.as_str()) {
            tracing::debug!("Clip unchanged, skipping write to {:?}", self.path);
            return Ok(());
        }
        std::fs::write(&self.path, &content)?;
        self.last_written = Some(content);
        Ok(())
    }
}

/// Keeps every saved clip in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Saved clips, oldest first
    pub saved: Vec<AnimationClipData>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently saved clip
    pub fn last(&self) -> Option<&AnimationClipData> {
        self.saved.last()
    }
}

impl ClipSink for MemorySink {
    fn save(&mut self, clip: &AnimationClipData) -> Result<(), ClipError> {
        self.saved.push(clip.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventParameter;
    use crate::keyframe::{Keyframe, ObjectRef, TangentMode};

    fn sample_clip() -> AnimationClipData {
        let mut clip = AnimationClipData::new("Walk", 30.0);
        clip.set_curve(
            CurveBinding::new("Body", "Transform", "m_LocalPosition.y"),
            Curve::from_keys(vec![
                Keyframe::float(0.0, 0.0),
                Keyframe::float(0.5, 0.2).with_mode(TangentMode::Stepped),
                Keyframe::float(1.0, 0.0),
            ]),
        );
        clip.set_curve(
            CurveBinding::new("Body", "SpriteRenderer", "m_Sprite"),
            Curve::from_keys(vec![
                Keyframe::object(0.0, ObjectRef::sub_asset("walk.png", "walk_0")),
                Keyframe::object(0.5, ObjectRef::sub_asset("walk.png", "walk_1")),
            ]),
        );
        clip.add_event(AnimationEvent::new(0.5, "PlayStep", EventParameter::String("left".into())));
        clip
    }

    #[test]
    fn test_ron_round_trip_keeps_stepped_tangents() {
        let clip = sample_clip();
        let ron = clip.to_ron().unwrap();
        let loaded = AnimationClipData::from_ron(&ron).unwrap();
        assert_eq!(loaded, clip);
        let stepped = &loaded.curves[0].curve.keys()[1];
        assert!(stepped.out_tangent.is_infinite());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut clip = sample_clip();
        clip.version = CLIP_FORMAT_VERSION + 1;
        let ron = clip.to_ron().unwrap();
        assert!(matches!(
            AnimationClipData::from_ron(&ron),
            Err(ClipError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_events_stay_sorted() {
        let mut clip = sample_clip();
        clip.add_event(AnimationEvent::new(0.1, "SetVolume", EventParameter::Float(1.0)));
        let late = clip.add_event(AnimationEvent::new(2.0, "End", EventParameter::None));
        let times: Vec<_> = clip.events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.1, 0.5, 2.0]);
        assert_eq!(clip.duration(), 2.0);
        assert_eq!(clip.events_in_range(0.0, 0.5).len(), 2);

        clip.remove_event(late);
        assert_eq!(clip.duration(), 1.0);
    }

    #[test]
    fn test_file_sink_skips_unchanged_writes() {
        let path = std::env::temp_dir().join(format!("{}.{CLIP_EXTENSION}", Uuid::new_v4()));
        let mut sink = RonFileSink::new(&path);
        let clip = sample_clip();

        sink.save(&clip).unwrap();
        std::fs::remove_file(&path).unwrap();
        sink.save(&clip).unwrap();
        assert!(!path.exists());

        let mut changed = clip.clone();
        changed.name = "Run".to_string();
        sink.save(&changed).unwrap();
        let loaded = AnimationClipData::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.name, "Run");
    }
}
