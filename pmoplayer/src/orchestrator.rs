//! Single authority over what is playing and on which display.
//!
//! [`SourceOrchestrator`] owns the playback status, the current source and
//! its resolved quality, caption state and the bound display. All operations
//! take `&mut self` and run to completion; they never fail; misuse is a
//! logged no-op.
//!
//! Display events are folded back through [`SourceOrchestrator::pump_events`].
//! Every `load` is tagged with a fresh [`LoadGeneration`] and media-scoped
//! events carrying another generation are dropped, so a late `error` or
//! `changedquality` from a superseded load never reaches the state.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::display::{
    DisplayCaption, DisplayEnvelope, DisplayError, DisplayEvent, DisplayInterface, DisplayMeta,
    DisplayType, LoadGeneration, LoadOptions,
};
use crate::model::{
    Caption, CaptionListItem, CaptionSelection, PlayerMeta, PlayerMetaEpisode, PlayerStatus,
};
use crate::preferences::QualityPreferenceStore;
use crate::quality::{LoadableSource, Quality, QualityPreference, Source, select_quality};
use crate::scrape::{ScrapeSegment, scrape_failure_report};

/// Display currently attached to the orchestrator.
pub type BoxedDisplay = Box<dyn DisplayInterface + Send>;

struct BoundDisplay {
    display: BoxedDisplay,
    events: Receiver<DisplayEnvelope>,
}

/// Playback figures reported by the bound display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaybackProgress {
    pub time: f64,
    pub duration: f64,
    pub buffered: f64,
    pub playing: bool,
    pub loading: bool,
    pub volume: f64,
    pub playback_rate: f64,
    pub fullscreen: bool,
    pub can_airplay: bool,
    /// Renditions announced by the display, as reported.
    pub reported_qualities: Vec<Quality>,
    /// Rendition the display says it plays, as reported.
    pub reported_quality: Option<Quality>,
}

impl Default for PlaybackProgress {
    fn default() -> Self {
        Self {
            time: 0.0,
            duration: 0.0,
            buffered: 0.0,
            playing: false,
            loading: false,
            volume: 1.0,
            playback_rate: 1.0,
            fullscreen: false,
            can_airplay: false,
            reported_qualities: Vec::new(),
            reported_quality: None,
        }
    }
}

impl PlaybackProgress {
    /// Clears what belongs to the previous media. Device settings stay.
    fn reset_media(&mut self, start_at: f64) {
        *self = Self {
            time: start_at,
            volume: self.volume,
            playback_rate: self.playback_rate,
            fullscreen: self.fullscreen,
            can_airplay: self.can_airplay,
            ..Self::default()
        };
    }
}

/// Read-only view of the orchestrator for the presentation layer.
#[derive(Clone, Debug, Serialize)]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    pub source: Option<Source>,
    pub source_id: Option<String>,
    pub qualities: Vec<Quality>,
    pub current_quality: Option<Quality>,
    pub caption_list: Vec<CaptionListItem>,
    pub caption: CaptionSelection,
    pub meta: Option<PlayerMeta>,
    pub hide_next_episode_button: bool,
    pub progress: PlaybackProgress,
    pub last_error: Option<DisplayError>,
    pub scrape_report: Option<String>,
    pub display_type: Option<DisplayType>,
}

pub struct SourceOrchestrator {
    preferences: Arc<dyn QualityPreferenceStore>,
    display: Option<BoundDisplay>,
    status: PlayerStatus,
    source: Option<Source>,
    source_id: Option<String>,
    qualities: Vec<Quality>,
    current_quality: Option<Quality>,
    caption_list: Vec<CaptionListItem>,
    caption: CaptionSelection,
    meta: Option<PlayerMeta>,
    hide_next_episode_button: bool,
    progress: PlaybackProgress,
    last_error: Option<DisplayError>,
    scrape_report: Option<String>,
    next_generation: LoadGeneration,
    /// Generation of the last load sent to the bound display.
    current_generation: LoadGeneration,
}

impl SourceOrchestrator {
    pub fn new(preferences: Arc<dyn QualityPreferenceStore>) -> Self {
        Self {
            preferences,
            display: None,
            status: PlayerStatus::Idle,
            source: None,
            source_id: None,
            qualities: Vec::new(),
            current_quality: None,
            caption_list: Vec::new(),
            caption: CaptionSelection::default(),
            meta: None,
            hide_next_episode_button: false,
            progress: PlaybackProgress::default(),
            last_error: None,
            scrape_report: None,
            next_generation: LoadGeneration::default(),
            current_generation: LoadGeneration::default(),
        }
    }

    // ------------------------------------------------------------------
    // Status and metadata
    // ------------------------------------------------------------------

    pub fn set_status(&mut self, status: PlayerStatus) {
        if self.status != status {
            info!(from = %self.status, to = %status, "Player status changed");
        }
        self.status = status;
    }

    /// Stores the title metadata and shows the next-episode button again.
    pub fn set_meta(&mut self, meta: PlayerMeta, new_status: Option<PlayerStatus>) {
        debug!(title = %meta.title, media_type = %meta.media_type(), "Setting player meta");
        if let Some(bound) = self.display.as_mut() {
            bound.display.set_meta(DisplayMeta::from(&meta));
        }
        self.meta = Some(meta);
        self.hide_next_episode_button = false;
        if let Some(status) = new_status {
            self.set_status(status);
        }
    }

    /// Marks the attempt as unresolved and keeps the provider report, if
    /// any provider actually failed.
    pub fn scrape_not_found(&mut self, segments: &[ScrapeSegment]) {
        self.scrape_report = scrape_failure_report(segments);
        self.set_status(PlayerStatus::ScrapeNotFound);
    }

    pub fn set_hide_next_episode_button(&mut self, hide: bool) {
        self.hide_next_episode_button = hide;
    }

    /// Episode to offer after the current one, unless hidden.
    pub fn next_episode(&self) -> Option<&PlayerMetaEpisode> {
        if self.hide_next_episode_button {
            return None;
        }
        self.meta.as_ref()?.next_episode()
    }

    pub fn set_source_id(&mut self, source_id: Option<String>) {
        debug!(source_id = ?source_id, "Source provider recorded");
        self.source_id = source_id;
    }

    // ------------------------------------------------------------------
    // Source and quality
    // ------------------------------------------------------------------

    /// Installs a resolved source and loads it on the bound display.
    ///
    /// Sources breaking the collaborator contract (empty file map, HLS
    /// locator that is not a URL) are ignored.
    pub fn set_source(&mut self, source: Source, captions: Vec<CaptionListItem>, start_at: f64) {
        if let Err(err) = source.validate() {
            warn!("Ignoring source: {}", err);
            return;
        }

        let preference = self.preferences.preference();
        let selected = select_quality(&source, &preference);

        self.current_quality = selected.and_then(|s| s.quality);
        self.qualities = source.available_qualities();
        self.caption_list = captions;
        self.source = Some(source);
        self.last_error = None;
        self.scrape_report = None;
        self.progress.reset_media(start_at);

        info!(
            quality = ?self.current_quality,
            qualities = self.qualities.len(),
            captions = self.caption_list.len(),
            "Source installed"
        );

        self.redisplay_source(start_at);
    }

    /// Replays the current source into the bound display at `start_at`.
    pub fn redisplay_source(&mut self, start_at: f64) {
        let Some(source) = self.source.as_ref() else {
            debug!("redisplay_source without source");
            return;
        };

        let preference = self.preferences.preference();
        let remembered = QualityPreference {
            automatic_quality: preference.automatic_quality,
            last_chosen_quality: self.current_quality,
        };
        let Some(selected) = select_quality(source, &remembered) else {
            return;
        };

        if matches!(source, Source::File { .. }) {
            self.current_quality = selected.quality;
        }

        self.issue_load(
            selected.stream,
            preference.automatic_quality,
            preference.last_chosen_quality,
            start_at,
        );
    }

    /// Manual quality override.
    ///
    /// File sources reload the chosen rung at the current position, and
    /// labels missing from the map are ignored. HLS sources forward the
    /// label to the display and let it switch in place.
    pub fn switch_quality(&mut self, quality: Quality) {
        match self.source.as_ref() {
            None => debug!(%quality, "switch_quality without source"),
            Some(source @ Source::File { .. }) => {
                let Some(file) = source.file_for(quality) else {
                    debug!(%quality, "Quality not offered by source, ignored");
                    return;
                };
                let stream = LoadableSource::Mp4 {
                    url: file.url.clone(),
                };
                self.current_quality = Some(quality);
                let start_at = self.progress.time;
                self.issue_load(stream, false, Some(quality), start_at);
            }
            Some(Source::Hls { .. }) => match self.display.as_mut() {
                Some(bound) => {
                    debug!(%quality, "Forwarding quality change to display");
                    bound.display.change_quality(false, Some(quality));
                }
                None => debug!(%quality, "switch_quality without display"),
            },
        }
    }

    /// Asks the display to pick renditions itself. The resulting quality is
    /// learned from its `changedquality` events.
    pub fn enable_automatic_quality(&mut self) {
        match self.display.as_mut() {
            Some(bound) => bound.display.change_quality(true, None),
            None => debug!("enable_automatic_quality without display"),
        }
    }

    /// True when the bound display can switch renditions by itself.
    pub fn supports_automatic_quality(&self) -> bool {
        matches!(
            (self.source.as_ref(), self.bound_display_type()),
            (Some(Source::Hls { .. }), Some(DisplayType::Web))
        )
    }

    fn issue_load(
        &mut self,
        stream: LoadableSource,
        automatic_quality: bool,
        preferred_quality: Option<Quality>,
        start_at: f64,
    ) {
        let Some(bound) = self.display.as_mut() else {
            debug!(url = stream.url(), "No display bound, load deferred");
            return;
        };

        self.next_generation = self.next_generation.next();
        self.current_generation = self.next_generation;

        info!(
            generation = self.current_generation.0,
            url = stream.url(),
            start_at,
            automatic_quality,
            "Loading source on display"
        );

        bound.display.load(LoadOptions {
            source: Some(stream),
            automatic_quality,
            preferred_quality,
            start_at,
            generation: self.current_generation,
        });
    }

    // ------------------------------------------------------------------
    // Captions
    // ------------------------------------------------------------------

    pub fn set_caption(&mut self, caption: Option<Caption>) {
        if let Some(bound) = self.display.as_mut() {
            bound
                .display
                .set_caption(caption.as_ref().map(DisplayCaption::from));
        }
        debug!(
            language = ?caption.as_ref().map(|c| c.language.as_str()),
            "Caption selected"
        );
        self.caption.selected = caption;
    }

    // ------------------------------------------------------------------
    // Display binding
    // ------------------------------------------------------------------

    /// Swaps the bound display.
    ///
    /// The previous display is destroyed before the new one receives any
    /// command. The new display then gets the meta, the current source at
    /// the current position and finally the selected caption, so its
    /// track-mode answer carries the generation of that load.
    pub fn bind_display(&mut self, display: BoxedDisplay) {
        self.release_display();

        let display_type = display.display_type();
        let events = display.subscribe();
        self.display = Some(BoundDisplay { display, events });
        self.current_generation = LoadGeneration::default();
        self.caption.as_track = false;
        info!(display_type = %display_type, "Display bound");

        if let (Some(bound), Some(meta)) = (self.display.as_mut(), self.meta.as_ref()) {
            bound.display.set_meta(DisplayMeta::from(meta));
        }

        let time = self.progress.time;
        self.redisplay_source(time);

        if let (Some(bound), Some(caption)) = (self.display.as_mut(), self.caption.selected.as_ref()) {
            bound.display.set_caption(Some(DisplayCaption::from(caption)));
        }
    }

    /// Destroys and detaches the bound display, if any.
    pub fn unbind_display(&mut self) {
        if self.release_display() {
            info!("Display unbound");
        }
    }

    fn release_display(&mut self) -> bool {
        match self.display.take() {
            Some(mut bound) => {
                debug!(display_type = %bound.display.display_type(), "Destroying display");
                bound.display.destroy();
                true
            }
            None => false,
        }
    }

    pub fn bound_display_type(&self) -> Option<DisplayType> {
        self.display.as_ref().map(|bound| bound.display.display_type())
    }

    /// Direct access for transport controls (play, pause, volume, ...).
    pub fn display_mut(&mut self) -> Option<&mut (dyn DisplayInterface + Send + 'static)> {
        self.display.as_mut().map(|bound| bound.display.as_mut())
    }

    // ------------------------------------------------------------------
    // Display events
    // ------------------------------------------------------------------

    /// Folds every pending event of the bound display. Returns how many
    /// were read.
    pub fn pump_events(&mut self) -> usize {
        let pending: Vec<DisplayEnvelope> = match self.display.as_ref() {
            Some(bound) => bound.events.try_iter().collect(),
            None => return 0,
        };
        let count = pending.len();
        for envelope in pending {
            self.handle_display_event(envelope);
        }
        count
    }

    pub fn handle_display_event(&mut self, envelope: DisplayEnvelope) {
        let DisplayEnvelope { generation, event } = envelope;

        if self.display.is_none() {
            debug!(event = event.name(), "No display bound, event dropped");
            return;
        }
        if event.is_media_scoped() && generation != self.current_generation {
            debug!(
                event = event.name(),
                generation = generation.0,
                current = self.current_generation.0,
                "Stale display event dropped"
            );
            return;
        }

        match event {
            DisplayEvent::Play => self.progress.playing = true,
            DisplayEvent::Pause => self.progress.playing = false,
            DisplayEvent::Fullscreen(active) => self.progress.fullscreen = active,
            DisplayEvent::VolumeChange(volume) => self.progress.volume = volume,
            DisplayEvent::Time(time) => self.progress.time = time,
            DisplayEvent::Duration(duration) => self.progress.duration = duration,
            DisplayEvent::Buffered(buffered) => self.progress.buffered = buffered,
            DisplayEvent::Loading(loading) => self.progress.loading = loading,
            DisplayEvent::CanAirplay(available) => self.progress.can_airplay = available,
            DisplayEvent::PlaybackRate(rate) => self.progress.playback_rate = rate,
            DisplayEvent::NeedsTrack(as_track) => self.caption.as_track = as_track,
            DisplayEvent::Qualities(qualities) => {
                if matches!(self.source, Some(Source::Hls { .. })) {
                    self.qualities = qualities.clone();
                }
                self.progress.reported_qualities = qualities;
            }
            DisplayEvent::ChangedQuality(quality) => {
                self.progress.reported_quality = quality;
                self.apply_changed_quality(quality);
            }
            DisplayEvent::Error(error) => {
                warn!(
                    error_name = %error.error_name,
                    kind = ?error.kind,
                    message = ?error.message,
                    "Display reported a playback error"
                );
                self.last_error = Some(error);
                self.set_status(PlayerStatus::PlaybackError);
            }
        }
    }

    /// Keeps `current_quality` consistent with the source: HLS follows the
    /// display, a file source only accepts one of its own keys.
    fn apply_changed_quality(&mut self, quality: Option<Quality>) {
        match self.source.as_ref() {
            Some(Source::Hls { .. }) => self.current_quality = quality,
            Some(Source::File { qualities }) => match quality {
                Some(q) if qualities.contains_key(&q) => self.current_quality = Some(q),
                _ => debug!(quality = ?quality, "Reported quality not in source, ignored"),
            },
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn qualities(&self) -> &[Quality] {
        &self.qualities
    }

    pub fn current_quality(&self) -> Option<Quality> {
        self.current_quality
    }

    pub fn caption_list(&self) -> &[CaptionListItem] {
        &self.caption_list
    }

    pub fn caption(&self) -> &CaptionSelection {
        &self.caption
    }

    pub fn meta(&self) -> Option<&PlayerMeta> {
        self.meta.as_ref()
    }

    pub fn hide_next_episode_button(&self) -> bool {
        self.hide_next_episode_button
    }

    pub fn progress(&self) -> &PlaybackProgress {
        &self.progress
    }

    pub fn last_error(&self) -> Option<&DisplayError> {
        self.last_error.as_ref()
    }

    pub fn scrape_report(&self) -> Option<&str> {
        self.scrape_report.as_deref()
    }

    pub fn current_generation(&self) -> LoadGeneration {
        self.current_generation
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            status: self.status,
            source: self.source.clone(),
            source_id: self.source_id.clone(),
            qualities: self.qualities.clone(),
            current_quality: self.current_quality,
            caption_list: self.caption_list.clone(),
            caption: self.caption.clone(),
            meta: self.meta.clone(),
            hide_next_episode_button: self.hide_next_episode_button,
            progress: self.progress.clone(),
            last_error: self.last_error.clone(),
            scrape_report: self.scrape_report.clone(),
            display_type: self.bound_display_type(),
        }
    }
}

impl fmt::Debug for SourceOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOrchestrator")
            .field("status", &self.status)
            .field("display", &self.bound_display_type())
            .field("current_quality", &self.current_quality)
            .field("current_generation", &self.current_generation)
            .finish_non_exhaustive()
    }
}

impl Drop for SourceOrchestrator {
    fn drop(&mut self) {
        self.release_display();
    }
}
