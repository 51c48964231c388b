//! # pmoplayer - source and display orchestration
//!
//! Drives one playback experience across interchangeable displays (the
//! in-page video element, a Chromecast receiver) for titles offered either
//! as a set of progressive files keyed by quality or as one HLS playlist.
//!
//! - [`display`]: the [`DisplayInterface`] every backend implements, its
//!   event vocabulary and the [`ChromecastDisplay`] adapter
//! - [`quality`]: source shapes and the [`select_quality`] rule
//! - [`orchestrator`]: the [`SourceOrchestrator`] state machine
//! - [`preferences`]: owners of the process-wide quality preference
//!
//! ```no_run
//! use std::sync::Arc;
//! use pmoplayer::{
//!     ChromecastDisplay, ChromecastSettings, ConfigQualityStore, PlayerMeta, PlayerStatus,
//!     Quality, Source, SourceOrchestrator,
//! };
//!
//! # fn main() -> pmoplayer::Result<()> {
//! let mut player = SourceOrchestrator::new(Arc::new(ConfigQualityStore::global()));
//! let settings = ChromecastSettings::from_location("chromecast://192.168.1.20:8009")?;
//! player.bind_display(Box::new(ChromecastDisplay::spawn(settings)?));
//!
//! player.set_meta(PlayerMeta::movie("Sintel", "45745", 2010), Some(PlayerStatus::Playing));
//! player.set_source(
//!     Source::files([(Quality::Q720, "https://cdn.example/sintel-720.mp4")]),
//!     Vec::new(),
//!     0.0,
//! );
//! player.pump_events();
//! # Ok(())
//! # }
//! ```

pub mod config_ext;
pub mod display;
pub mod errors;
pub mod logs;
pub mod model;
pub mod orchestrator;
pub mod preferences;
pub mod quality;
pub mod scrape;

pub use config_ext::PlayerConfigExt;
pub use display::{
    ChromecastDisplay, ChromecastSettings, DisplayCaption, DisplayEnvelope, DisplayError,
    DisplayErrorKind, DisplayEvent, DisplayEventBus, DisplayInterface, DisplayMeta, DisplayType,
    LoadGeneration, LoadOptions, SurfaceHandle,
};
pub use errors::{PlayerError, Result};
pub use logs::{LogHandle, init_logging, init_logging_with};
pub use model::{
    Caption, CaptionListItem, CaptionSelection, MediaType, PlayerMeta, PlayerMetaEpisode,
    PlayerMetaKind, PlayerMetaSeason, PlayerStatus,
};
pub use orchestrator::{BoxedDisplay, PlaybackProgress, PlayerSnapshot, SourceOrchestrator};
pub use preferences::{ConfigQualityStore, MemoryQualityStore, QualityPreferenceStore};
pub use quality::{
    LoadableSource, Quality, QualityPreference, SelectedStream, Source, StreamFile, select_quality,
};
pub use scrape::{
    ScrapeMedia, ScrapeMediaKind, ScrapeSegment, ScrapeSegmentStatus, is_disallowed_media,
    scrape_failure_report,
};
