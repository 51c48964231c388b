#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use pmoplayer::{
    DisplayCaption, DisplayEnvelope, DisplayEvent, DisplayEventBus, DisplayInterface, DisplayMeta,
    DisplayType, LoadGeneration, LoadOptions, MemoryQualityStore, Quality, QualityPreference,
    SourceOrchestrator, SurfaceHandle,
};

/// Command received by a [`RecordingDisplay`], tagged with the display name.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Play,
    Pause,
    Load(LoadOptions),
    ChangeQuality(bool, Option<Quality>),
    SetCaption(Option<DisplayCaption>),
    SetMeta(DisplayMeta),
    SetVolume(f64),
    SetTime(f64),
    Destroy,
}

pub type CallLog = Arc<Mutex<Vec<(String, Call)>>>;

/// Display that records every command in a log shared between displays,
/// so ordering across a swap can be checked.
pub struct RecordingDisplay {
    name: String,
    kind: DisplayType,
    log: CallLog,
    bus: DisplayEventBus,
    generation: LoadGeneration,
    track_answer: Option<bool>,
}

impl RecordingDisplay {
    pub fn new(name: &str, kind: DisplayType, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            kind,
            log: log.clone(),
            bus: DisplayEventBus::new(),
            generation: LoadGeneration::default(),
            track_answer: None,
        }
    }

    /// Answers every `set_caption` with `NeedsTrack(as_track)`, tagged with
    /// the generation of the last load it received.
    pub fn answering_needs_track(mut self, as_track: bool) -> Self {
        self.track_answer = Some(as_track);
        self
    }

    /// Handle to emit events as if the display produced them.
    pub fn bus(&self) -> DisplayEventBus {
        self.bus.clone()
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push((self.name.clone(), call));
    }
}

impl DisplayInterface for RecordingDisplay {
    fn subscribe(&self) -> Receiver<DisplayEnvelope> {
        self.bus.subscribe()
    }

    fn play(&mut self) {
        self.record(Call::Play);
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
    }

    fn load(&mut self, options: LoadOptions) {
        self.generation = options.generation;
        self.record(Call::Load(options));
    }

    fn change_quality(&mut self, automatic_quality: bool, preferred_quality: Option<Quality>) {
        self.record(Call::ChangeQuality(automatic_quality, preferred_quality));
    }

    fn process_video_element(&mut self, _surface: SurfaceHandle) {}

    fn process_container_element(&mut self, _surface: SurfaceHandle) {}

    fn toggle_fullscreen(&mut self) {}

    fn toggle_picture_in_picture(&mut self) {}

    fn set_seeking(&mut self, _active: bool) {}

    fn set_volume(&mut self, volume: f64) {
        self.record(Call::SetVolume(volume));
    }

    fn set_time(&mut self, time: f64) {
        self.record(Call::SetTime(time));
    }

    fn destroy(&mut self) {
        self.record(Call::Destroy);
    }

    fn start_airplay(&mut self) {}

    fn set_playback_rate(&mut self, _rate: f64) {}

    fn set_meta(&mut self, meta: DisplayMeta) {
        self.record(Call::SetMeta(meta));
    }

    fn set_caption(&mut self, caption: Option<DisplayCaption>) {
        self.record(Call::SetCaption(caption));
        if let Some(as_track) = self.track_answer {
            self.bus.emit(self.generation, DisplayEvent::NeedsTrack(as_track));
        }
    }

    fn display_type(&self) -> DisplayType {
        self.kind
    }
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<(String, Call)> {
    log.lock().unwrap().clone()
}

pub fn loads(log: &CallLog) -> Vec<LoadOptions> {
    calls(log)
        .into_iter()
        .filter_map(|(_, call)| match call {
            Call::Load(options) => Some(options),
            _ => None,
        })
        .collect()
}

pub fn last_load(log: &CallLog) -> LoadOptions {
    loads(log).pop().expect("no load issued")
}

pub fn clear(log: &CallLog) {
    log.lock().unwrap().clear();
}

/// Orchestrator with an in-memory preference store.
pub fn player(preference: QualityPreference) -> (SourceOrchestrator, MemoryQualityStore) {
    let store = MemoryQualityStore::new(preference);
    (SourceOrchestrator::new(Arc::new(store.clone())), store)
}

/// Orchestrator with a web display bound. Returns the display event bus.
pub fn player_with_display(
    preference: QualityPreference,
    log: &CallLog,
) -> (SourceOrchestrator, MemoryQualityStore, DisplayEventBus) {
    let (mut orchestrator, store) = player(preference);
    let display = RecordingDisplay::new("web", DisplayType::Web, log);
    let bus = display.bus();
    orchestrator.bind_display(Box::new(display));
    (orchestrator, store, bus)
}

pub fn emit(bus: &DisplayEventBus, generation: LoadGeneration, event: DisplayEvent) {
    bus.emit(generation, event);
}
