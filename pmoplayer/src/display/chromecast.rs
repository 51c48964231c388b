//! Casting display over the Cast v2 protocol.
//!
//! A `CastDevice` cannot leave the thread that opened it, so the worker
//! thread builds its own state and does every exchange with the receiver. The
//! [`ChromecastDisplay`] handle only queues [`CastCommand`]s, which keeps
//! every [`DisplayInterface`] call non-blocking.
//!
//! Between commands the worker polls the media status and turns changes
//! into [`DisplayEvent`]s, the same way renderer watchers detect changes by
//! comparing against the last polled state.

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use rust_cast::CastDevice;
use rust_cast::channels::media::{
    IdleReason, Media, Metadata, MovieMediaMetadata, PlayerState, ResumeState, StreamType,
    TvShowMediaMetadata,
};
use rust_cast::channels::receiver::CastDeviceApp;
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::config_ext::PlayerConfigExt;
use crate::display::{
    DisplayCaption, DisplayEnvelope, DisplayError, DisplayEvent, DisplayEventBus,
    DisplayInterface, DisplayMeta, DisplayType, LoadGeneration, LoadOptions, SurfaceHandle,
};
use crate::errors::{PlayerError, Result};
use crate::model::MediaType;
use crate::quality::{LoadableSource, Quality};

pub const DEFAULT_CAST_PORT: u16 = 8009;
pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const RECEIVER_DESTINATION_ID: &str = "receiver-0";
const CAST_LOCATION_SCHEME: &str = "chromecast";

fn ensure_crypto_provider_initialized() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::aws_lc_rs::default_provider(),
        );
    });
}

/// Where and how often to talk to a receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChromecastSettings {
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
}

impl ChromecastSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
        }
    }

    /// Parses a `chromecast://host[:port]` location. IPv6 hosts are
    /// bracketed: `chromecast://[fe80::1]:8009`.
    pub fn from_location(location: &str) -> Result<Self> {
        Self::from_location_with_port(location, DEFAULT_CAST_PORT)
    }

    /// Same as [`ChromecastSettings::from_location`], with the default port
    /// and the poll interval read from the configuration.
    pub fn from_config(location: &str, config: &pmoconfig::Config) -> Result<Self> {
        let settings = Self::from_location_with_port(location, config.get_cast_port()?)?;
        Ok(settings.with_poll_interval(config.get_status_poll_interval()?))
    }

    fn from_location_with_port(location: &str, default_port: u16) -> Result<Self> {
        let invalid = || PlayerError::InvalidCastLocation(location.to_string());

        let url = Url::parse(location.trim()).map_err(|_| invalid())?;
        if url.scheme() != CAST_LOCATION_SCHEME || !matches!(url.path(), "" | "/") {
            return Err(invalid());
        }

        let host = match url.host() {
            Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid()),
        };

        Ok(Self::new(host, url.port().unwrap_or(default_port)))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Requests queued from the handle to the worker thread.
#[derive(Debug)]
enum CastCommand {
    Load(LoadOptions),
    Play,
    Pause,
    Seek(f64),
    Volume(f64),
    Meta(DisplayMeta),
    Shutdown,
}

/// Receiver-side playback state, reduced to what the player cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CastPlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
    Finished,
    Failed,
}

/// One poll of the receiver.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct CastSnapshot {
    pub state: Option<CastPlayerState>,
    pub time: Option<f64>,
    pub duration: Option<f64>,
    pub volume: Option<f64>,
}

/// Last polled values, used to only emit events on change.
#[derive(Clone, Debug, Default)]
pub(crate) struct WatchedCastState {
    state: Option<CastPlayerState>,
    time: Option<f64>,
    duration: Option<f64>,
    volume: Option<f64>,
}

impl WatchedCastState {
    /// Forgets media-related values. Volume belongs to the device and is kept.
    pub fn reset_media(&mut self) {
        self.state = None;
        self.time = None;
        self.duration = None;
    }

    pub fn diff(&mut self, snapshot: &CastSnapshot) -> Vec<DisplayEvent> {
        let mut events = Vec::new();

        if let Some(state) = snapshot.state {
            if self.state != Some(state) {
                if self.state == Some(CastPlayerState::Buffering) {
                    events.push(DisplayEvent::Loading(false));
                }
                match state {
                    CastPlayerState::Buffering => events.push(DisplayEvent::Loading(true)),
                    CastPlayerState::Playing => events.push(DisplayEvent::Play),
                    CastPlayerState::Paused | CastPlayerState::Finished => {
                        events.push(DisplayEvent::Pause)
                    }
                    CastPlayerState::Failed => events.push(DisplayEvent::Error(
                        DisplayError::global("castPlaybackError", "receiver stopped on an error"),
                    )),
                    CastPlayerState::Idle => {}
                }
                self.state = Some(state);
            }
        }

        if let Some(duration) = snapshot.duration {
            if self.duration != Some(duration) {
                self.duration = Some(duration);
                events.push(DisplayEvent::Duration(duration));
            }
        }

        if let Some(time) = snapshot.time {
            if self.time != Some(time) {
                self.time = Some(time);
                events.push(DisplayEvent::Time(time));
            }
        }

        if let Some(volume) = snapshot.volume {
            if self.volume != Some(volume) {
                self.volume = Some(volume);
                events.push(DisplayEvent::VolumeChange(volume));
            }
        }

        events
    }
}

fn content_type_for(source: &LoadableSource) -> String {
    if source.is_hls() {
        "application/x-mpegurl".to_string()
    } else {
        "video/mp4".to_string()
    }
}

fn metadata_for(meta: &DisplayMeta) -> Metadata {
    match meta.media_type {
        MediaType::Movie => Metadata::Movie(MovieMediaMetadata {
            title: Some(meta.title.clone()),
            subtitle: None,
            studio: None,
            images: Vec::new(),
            release_date: None,
        }),
        MediaType::Show => Metadata::TvShow(TvShowMediaMetadata {
            series_title: Some(meta.title.clone()),
            episode_title: None,
            season: None,
            episode: None,
            images: Vec::new(),
            original_air_date: None,
        }),
    }
}

/// Live connection with the Default Media Receiver running.
struct CastSession {
    device: CastDevice<'static>,
    session_id: String,
    transport_id: String,
    media_session_id: Option<i32>,
}

impl CastSession {
    fn open(settings: &ChromecastSettings) -> Result<Self> {
        ensure_crypto_provider_initialized();
        debug!("Connecting to Chromecast at {}:{}", settings.host, settings.port);

        let device =
            CastDevice::connect_without_host_verification(settings.host.clone(), settings.port)
                .map_err(|e| PlayerError::chromecast_error(format!("failed to connect: {e}")))?;

        device
            .connection
            .connect(RECEIVER_DESTINATION_ID.to_string())
            .map_err(|e| PlayerError::chromecast_error(format!("failed to connect channel: {e}")))?;
        device
            .heartbeat
            .ping()
            .map_err(|e| PlayerError::chromecast_error(format!("initial ping failed: {e}")))?;

        let app = device
            .receiver
            .launch_app(&CastDeviceApp::DefaultMediaReceiver)
            .map_err(|e| PlayerError::chromecast_error(format!("failed to launch app: {e}")))?;

        device
            .connection
            .connect(app.transport_id.clone())
            .map_err(|e| PlayerError::chromecast_error(format!("failed to connect transport: {e}")))?;

        info!(
            "Chromecast session {} opened on {}:{}",
            app.session_id, settings.host, settings.port
        );

        Ok(Self {
            device,
            session_id: app.session_id,
            transport_id: app.transport_id,
            media_session_id: None,
        })
    }

    fn load(&mut self, source: &LoadableSource, start_at: f64, meta: Option<&DisplayMeta>) -> Result<()> {
        let media = Media {
            content_id: source.url().to_string(),
            content_type: content_type_for(source),
            stream_type: StreamType::Buffered,
            duration: None,
            metadata: meta.map(metadata_for),
        };

        let status = self
            .device
            .media
            .load(self.transport_id.clone(), self.session_id.clone(), &media)
            .map_err(|e| PlayerError::chromecast_error(format!("failed to load media: {e}")))?;

        self.media_session_id = status.entries.first().map(|entry| entry.media_session_id);

        if start_at > 0.0 {
            self.seek(start_at)?;
        }
        Ok(())
    }

    fn media_session(&self) -> Result<i32> {
        self.media_session_id
            .ok_or_else(|| PlayerError::chromecast_error("no media loaded"))
    }

    fn play(&self) -> Result<()> {
        self.device
            .media
            .play(self.transport_id.clone(), self.media_session()?)
            .map_err(|e| PlayerError::chromecast_error(format!("failed to play: {e}")))?;
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.device
            .media
            .pause(self.transport_id.clone(), self.media_session()?)
            .map_err(|e| PlayerError::chromecast_error(format!("failed to pause: {e}")))?;
        Ok(())
    }

    fn seek(&self, time: f64) -> Result<()> {
        self.device
            .media
            .seek(
                self.transport_id.clone(),
                self.media_session()?,
                Some(time as f32),
                Some(ResumeState::PlaybackStart),
            )
            .map_err(|e| PlayerError::chromecast_error(format!("failed to seek: {e}")))?;
        Ok(())
    }

    fn stop_media(&mut self) -> Result<()> {
        if let Some(media_session_id) = self.media_session_id.take() {
            self.device
                .media
                .stop(self.transport_id.clone(), media_session_id)
                .map_err(|e| PlayerError::chromecast_error(format!("failed to stop: {e}")))?;
        }
        Ok(())
    }

    fn set_volume(&self, volume: f64) -> Result<()> {
        self.device
            .receiver
            .set_volume(volume.clamp(0.0, 1.0) as f32)
            .map_err(|e| PlayerError::chromecast_error(format!("failed to set volume: {e}")))?;
        Ok(())
    }

    fn snapshot(&self) -> Result<CastSnapshot> {
        // Keeps the receiver from dropping an otherwise silent sender.
        self.device
            .heartbeat
            .pong()
            .map_err(|e| PlayerError::chromecast_error(format!("heartbeat failed: {e}")))?;

        let status = self
            .device
            .media
            .get_status(self.transport_id.clone(), self.media_session_id)
            .map_err(|e| PlayerError::chromecast_error(format!("failed to get media status: {e}")))?;
        let receiver = self
            .device
            .receiver
            .get_status()
            .map_err(|e| PlayerError::chromecast_error(format!("failed to get receiver status: {e}")))?;

        let mut snapshot = CastSnapshot {
            volume: receiver.volume.level.map(f64::from),
            ..CastSnapshot::default()
        };

        if let Some(entry) = status.entries.first() {
            snapshot.state = Some(match entry.player_state {
                PlayerState::Playing => CastPlayerState::Playing,
                PlayerState::Paused => CastPlayerState::Paused,
                PlayerState::Buffering => CastPlayerState::Buffering,
                PlayerState::Idle => match entry.idle_reason {
                    Some(IdleReason::Error) => CastPlayerState::Failed,
                    Some(IdleReason::Finished) => CastPlayerState::Finished,
                    _ => CastPlayerState::Idle,
                },
            });
            snapshot.time = entry.current_time.map(f64::from);
            snapshot.duration = entry
                .media
                .as_ref()
                .and_then(|media| media.duration)
                .map(f64::from);
        }

        Ok(snapshot)
    }

    fn close(&mut self) {
        if let Err(e) = self.stop_media() {
            debug!("Chromecast stop before close failed: {}", e);
        }
        if let Err(e) = self.device.receiver.stop_app(self.session_id.clone()) {
            warn!("Failed to stop Chromecast app {}: {}", self.session_id, e);
        }
    }
}

/// State owned by the worker thread.
struct CastWorker {
    settings: ChromecastSettings,
    bus: DisplayEventBus,
    session: Option<CastSession>,
    generation: LoadGeneration,
    meta: Option<DisplayMeta>,
    /// Volume requested before any session exists, applied on the next load.
    pending_volume: Option<f64>,
    watched: WatchedCastState,
}

impl CastWorker {
    fn new(settings: ChromecastSettings, bus: DisplayEventBus) -> Self {
        Self {
            settings,
            bus,
            session: None,
            generation: LoadGeneration::default(),
            meta: None,
            pending_volume: None,
            watched: WatchedCastState::default(),
        }
    }

    fn run(mut self, commands: Receiver<CastCommand>) {
        debug!("Chromecast worker started for {}", self.settings.host);
        let ticker = tick(self.settings.poll_interval);
        loop {
            select! {
                recv(commands) -> msg => match msg {
                    Ok(CastCommand::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
                recv(ticker) -> _ => self.poll(),
            }
        }
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        debug!("Chromecast worker stopped for {}", self.settings.host);
    }

    fn emit(&self, event: DisplayEvent) {
        self.bus.emit(self.generation, event);
    }

    fn fail(&mut self, err: PlayerError) {
        warn!("{}", err);
        self.emit(DisplayEvent::Error(DisplayError::global(
            "chromecastError",
            err.to_string(),
        )));
    }

    fn session(&mut self) -> Result<&mut CastSession> {
        if self.session.is_none() {
            self.session = Some(CastSession::open(&self.settings)?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| PlayerError::chromecast_error("no session"))
    }

    fn handle(&mut self, command: CastCommand) {
        let outcome = match command {
            CastCommand::Load(options) => self.load(options),
            CastCommand::Meta(meta) => {
                self.meta = Some(meta);
                Ok(())
            }
            CastCommand::Play => self.with_media(|session| session.play()),
            CastCommand::Pause => self.with_media(|session| session.pause()),
            CastCommand::Seek(time) => self.with_media(|session| session.seek(time)),
            CastCommand::Volume(volume) => self.volume(volume),
            CastCommand::Shutdown => Ok(()),
        };

        if let Err(err) = outcome {
            self.session = None;
            self.fail(err);
        }
    }

    /// Runs `op` only when media is loaded; transport commands without media
    /// are dropped.
    fn with_media(&mut self, op: impl FnOnce(&CastSession) -> Result<()>) -> Result<()> {
        match self.session.as_ref() {
            Some(session) if session.media_session_id.is_some() => op(session),
            _ => {
                debug!("Chromecast command ignored: no media loaded");
                Ok(())
            }
        }
    }

    /// Changes the receiver volume. Without a session the value is kept for
    /// the next load, so no receiver app is launched just for it.
    fn volume(&mut self, volume: f64) -> Result<()> {
        match self.session.as_ref() {
            Some(session) => session.set_volume(volume),
            None => {
                debug!("Chromecast volume {:.2} deferred until load", volume);
                self.pending_volume = Some(volume);
                Ok(())
            }
        }
    }

    fn load(&mut self, options: LoadOptions) -> Result<()> {
        self.generation = options.generation;
        self.watched.reset_media();

        let Some(source) = options.source else {
            if let Some(session) = self.session.as_mut() {
                session.stop_media()?;
            }
            return Ok(());
        };

        self.emit(DisplayEvent::Loading(true));
        let meta = self.meta.clone();
        let pending_volume = self.pending_volume.take();
        let session = self.session()?;
        if let Some(volume) = pending_volume {
            session.set_volume(volume)?;
        }
        session.load(&source, options.start_at, meta.as_ref())?;
        info!("Chromecast loaded {} at {:.1}s", source.url(), options.start_at);
        Ok(())
    }

    fn poll(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.media_session_id.is_none() {
            return;
        }

        match session.snapshot() {
            Ok(snapshot) => {
                for event in self.watched.diff(&snapshot) {
                    self.emit(event);
                }
            }
            Err(err) => {
                self.session = None;
                self.fail(err);
            }
        }
    }
}

/// [`DisplayInterface`] implementation driving a cast receiver.
pub struct ChromecastDisplay {
    host: String,
    bus: DisplayEventBus,
    commands: Sender<CastCommand>,
    generation: LoadGeneration,
    destroyed: Arc<AtomicBool>,
}

impl ChromecastDisplay {
    /// Starts the worker thread. No connection is attempted before the
    /// first `load`.
    pub fn spawn(settings: ChromecastSettings) -> Result<Self> {
        let bus = DisplayEventBus::new();
        let (commands, receiver) = unbounded::<CastCommand>();
        let host = settings.host.clone();

        let worker_bus = bus.clone();

        thread::Builder::new()
            .name(format!("chromecast-{host}"))
            .spawn(move || CastWorker::new(settings, worker_bus).run(receiver))
            .map_err(|e| PlayerError::chromecast_error(format!("failed to start worker: {e}")))?;

        Ok(Self {
            host,
            bus,
            commands,
            generation: LoadGeneration::default(),
            destroyed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn send(&self, command: CastCommand) {
        if self.is_destroyed() {
            debug!("Chromecast {} destroyed, dropping {:?}", self.host, command);
            return;
        }
        if self.commands.send(command).is_err() {
            warn!("Chromecast worker for {} is gone", self.host);
        }
    }
}

impl DisplayInterface for ChromecastDisplay {
    fn subscribe(&self) -> Receiver<DisplayEnvelope> {
        self.bus.subscribe()
    }

    fn play(&mut self) {
        self.send(CastCommand::Play);
    }

    fn pause(&mut self) {
        self.send(CastCommand::Pause);
    }

    fn load(&mut self, options: LoadOptions) {
        self.generation = options.generation;
        self.send(CastCommand::Load(options));
    }

    fn change_quality(&mut self, automatic_quality: bool, preferred_quality: Option<Quality>) {
        debug!(
            "Chromecast has no in-place quality switch (automatic={}, preferred={:?})",
            automatic_quality, preferred_quality
        );
    }

    fn process_video_element(&mut self, _surface: SurfaceHandle) {}

    fn process_container_element(&mut self, _surface: SurfaceHandle) {}

    fn toggle_fullscreen(&mut self) {}

    fn toggle_picture_in_picture(&mut self) {}

    fn set_seeking(&mut self, _active: bool) {}

    fn set_volume(&mut self, volume: f64) {
        self.send(CastCommand::Volume(volume));
    }

    fn set_time(&mut self, time: f64) {
        self.send(CastCommand::Seek(time));
    }

    fn destroy(&mut self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Destroying Chromecast display for {}", self.host);
        let _ = self.commands.send(CastCommand::Shutdown);
    }

    fn start_airplay(&mut self) {}

    fn set_playback_rate(&mut self, rate: f64) {
        debug!("Chromecast ignores playback rate {}", rate);
    }

    fn set_meta(&mut self, meta: DisplayMeta) {
        self.send(CastCommand::Meta(meta));
    }

    fn set_caption(&mut self, caption: Option<DisplayCaption>) {
        // Receivers render captions themselves; the overlay is never needed.
        if let Some(caption) = caption {
            debug!("Chromecast caption {} left to the receiver", caption.language);
        }
        self.bus.emit(self.generation, DisplayEvent::NeedsTrack(false));
    }

    fn display_type(&self) -> DisplayType {
        DisplayType::Casting
    }
}

impl Drop for ChromecastDisplay {
    fn drop(&mut self) {
        self.destroy();
    }
}
