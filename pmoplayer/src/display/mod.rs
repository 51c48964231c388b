//! Capability contract shared by every playback backend.
//!
//! The orchestrator drives the in-page video element and a cast receiver
//! through the same [`DisplayInterface`]. Commands are fire-and-forget: their
//! effect is only observable through the [`DisplayEvent`]s a display
//! publishes on its event bus, each stamped with the [`LoadGeneration`] of
//! the `load` it belongs to.

pub mod chromecast;
mod events;

use std::fmt;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

pub use chromecast::{ChromecastDisplay, ChromecastSettings};
pub use events::{DisplayEnvelope, DisplayEventBus, LoadGeneration};

use crate::model::{Caption, MediaType, PlayerMeta};
use crate::quality::{LoadableSource, Quality};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Web,
    Casting,
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayType::Web => f.write_str("web"),
            DisplayType::Casting => f.write_str("casting"),
        }
    }
}

/// Subsystem that raised a [`DisplayError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayErrorKind {
    Hls,
    HtmlVideo,
    Global,
}

/// Fatal playback error reported by a display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayError {
    pub error_name: String,
    #[serde(rename = "type")]
    pub kind: DisplayErrorKind,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub key: Option<String>,
}

impl DisplayError {
    pub fn new(error_name: impl Into<String>, kind: DisplayErrorKind) -> Self {
        Self {
            error_name: error_name.into(),
            kind,
            message: None,
            stack_trace: None,
            key: None,
        }
    }

    pub fn global(error_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(error_name, DisplayErrorKind::Global)
        }
    }
}

/// Events published by a display.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayEvent {
    Play,
    Pause,
    Fullscreen(bool),
    VolumeChange(f64),
    Time(f64),
    Duration(f64),
    Buffered(f64),
    Loading(bool),
    Qualities(Vec<Quality>),
    ChangedQuality(Option<Quality>),
    NeedsTrack(bool),
    CanAirplay(bool),
    PlaybackRate(f64),
    Error(DisplayError),
}

impl DisplayEvent {
    /// Media-scoped events describe the loaded media and are only meaningful
    /// for the load that produced them. The others describe the device
    /// (volume, fullscreen, ...) and stay valid across loads.
    pub fn is_media_scoped(&self) -> bool {
        !matches!(
            self,
            DisplayEvent::Fullscreen(_)
                | DisplayEvent::VolumeChange(_)
                | DisplayEvent::CanAirplay(_)
                | DisplayEvent::PlaybackRate(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DisplayEvent::Play => "play",
            DisplayEvent::Pause => "pause",
            DisplayEvent::Fullscreen(_) => "fullscreen",
            DisplayEvent::VolumeChange(_) => "volumechange",
            DisplayEvent::Time(_) => "time",
            DisplayEvent::Duration(_) => "duration",
            DisplayEvent::Buffered(_) => "buffered",
            DisplayEvent::Loading(_) => "loading",
            DisplayEvent::Qualities(_) => "qualities",
            DisplayEvent::ChangedQuality(_) => "changedquality",
            DisplayEvent::NeedsTrack(_) => "needstrack",
            DisplayEvent::CanAirplay(_) => "canairplay",
            DisplayEvent::PlaybackRate(_) => "playbackrate",
            DisplayEvent::Error(_) => "error",
        }
    }
}

/// Arguments of [`DisplayInterface::load`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoadOptions {
    /// `None` unloads the current media.
    pub source: Option<LoadableSource>,
    pub automatic_quality: bool,
    pub preferred_quality: Option<Quality>,
    /// Offset in seconds.
    pub start_at: f64,
    pub generation: LoadGeneration,
}

impl LoadOptions {
    pub fn unload(generation: LoadGeneration) -> Self {
        Self {
            source: None,
            automatic_quality: false,
            preferred_quality: None,
            start_at: 0.0,
            generation,
        }
    }
}

/// Display-only metadata for native chrome (cast receiver UI, OS widgets).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMeta {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

impl From<&PlayerMeta> for DisplayMeta {
    fn from(meta: &PlayerMeta) -> Self {
        Self {
            title: meta.title.clone(),
            media_type: meta.media_type(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCaption {
    pub srt_data: String,
    pub language: String,
    pub url: Option<String>,
}

impl From<&Caption> for DisplayCaption {
    fn from(caption: &Caption) -> Self {
        Self {
            srt_data: caption.srt_data.clone(),
            language: caption.language.clone(),
            url: caption.url.clone(),
        }
    }
}

/// Opaque handle on a rendering surface owned by the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub String);

/// Operations every playback backend implements.
pub trait DisplayInterface {
    /// New receiver for the events of this display.
    fn subscribe(&self) -> Receiver<DisplayEnvelope>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Tears down the loaded media and starts loading `options.source` at
    /// `options.start_at`.
    fn load(&mut self, options: LoadOptions);

    /// Re-selects a rendition in place when the backend can.
    fn change_quality(&mut self, automatic_quality: bool, preferred_quality: Option<Quality>);

    fn process_video_element(&mut self, surface: SurfaceHandle);

    fn process_container_element(&mut self, surface: SurfaceHandle);

    fn toggle_fullscreen(&mut self);

    fn toggle_picture_in_picture(&mut self);

    fn set_seeking(&mut self, active: bool);

    fn set_volume(&mut self, volume: f64);

    fn set_time(&mut self, time: f64);

    /// Releases every resource of the backend. Safe to call more than once.
    fn destroy(&mut self);

    fn start_airplay(&mut self);

    fn set_playback_rate(&mut self, rate: f64);

    fn set_meta(&mut self, meta: DisplayMeta);

    fn set_caption(&mut self, caption: Option<DisplayCaption>);

    fn display_type(&self) -> DisplayType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_scoped_events() {
        assert!(DisplayEvent::Time(1.0).is_media_scoped());
        assert!(DisplayEvent::ChangedQuality(None).is_media_scoped());
        assert!(DisplayEvent::Error(DisplayError::global("x", "y")).is_media_scoped());
        assert!(!DisplayEvent::VolumeChange(0.5).is_media_scoped());
        assert!(!DisplayEvent::Fullscreen(true).is_media_scoped());
        assert!(!DisplayEvent::PlaybackRate(1.5).is_media_scoped());
    }

    #[test]
    fn test_display_error_json_shape() {
        let err = DisplayError::new("manifestLoadError", DisplayErrorKind::Hls);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "hls");
        assert_eq!(json["error_name"], "manifestLoadError");

        let html: DisplayErrorKind = serde_json::from_str("\"htmlvideo\"").unwrap();
        assert_eq!(html, DisplayErrorKind::HtmlVideo);
    }

    #[test]
    fn test_display_meta_from_player_meta() {
        let meta = PlayerMeta::movie("Film", "1", 2001);
        let display_meta = DisplayMeta::from(&meta);
        assert_eq!(display_meta.title, "Film");
        assert_eq!(display_meta.media_type, MediaType::Movie);
    }
}
