//! Plays a source on a Chromecast through the orchestrator.
//!
//! Usage:
//!   cargo run -p pmoplayer --example cast_source -- <chromecast_ip> <media_url> [quality]
//!
//! Example:
//!   cargo run -p pmoplayer --example cast_source -- 192.168.1.100 https://cdn.example/film.mp4 720

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pmoplayer::{
    ChromecastDisplay, ChromecastSettings, ConfigQualityStore, PlayerMeta, PlayerStatus, Quality,
    Source, SourceOrchestrator, init_logging,
};

fn main() -> pmoplayer::Result<()> {
    let _log = init_logging()?;

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <chromecast_ip> <media_url> [quality]", args[0]);
        std::process::exit(1);
    }

    let location = format!("chromecast://{}", args[1]);
    let media_url = &args[2];
    let quality = match args.get(3) {
        Some(label) => label.parse::<Quality>()?,
        None => Quality::Unknown,
    };

    let config = pmoconfig::get_config();
    let settings = ChromecastSettings::from_config(&location, &config)?;
    let display = ChromecastDisplay::spawn(settings)?;

    let mut player = SourceOrchestrator::new(Arc::new(ConfigQualityStore::new(config)));
    player.bind_display(Box::new(display));

    player.set_meta(PlayerMeta::movie("Cast test", "0", 2024), Some(PlayerStatus::Playing));
    let source = if media_url.ends_with(".m3u8") {
        Source::hls(media_url.as_str())
    } else {
        Source::files([(quality, media_url.as_str())])
    };
    player.set_source(source, Vec::new(), 0.0);

    loop {
        thread::sleep(Duration::from_millis(500));
        if player.pump_events() == 0 {
            continue;
        }

        let progress = player.progress();
        println!(
            "[{}] {:.0}/{:.0}s playing={} volume={:.2}",
            player.status(),
            progress.time,
            progress.duration,
            progress.playing,
            progress.volume
        );

        if player.status() == PlayerStatus::PlaybackError {
            if let Some(err) = player.last_error() {
                eprintln!("Playback error: {} {:?}", err.error_name, err.message);
            }
            break;
        }
    }

    player.unbind_display();
    Ok(())
}
