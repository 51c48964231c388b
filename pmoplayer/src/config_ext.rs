//! Player settings stored in `pmoconfig`.
//!
//! The [`PlayerConfigExt`] trait adds the player section to
//! [`pmoconfig::Config`]:
//!
//! ```yaml
//! player:
//!   disallowed_ids: [movie-753342]
//!   quality:
//!     automatic: true
//!     last_chosen: "1080"
//!   cast:
//!     port: 8009
//!     status_poll_interval_ms: 1000
//! ```
//!
//! Getters persist their default when the key is missing or malformed.
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoplayer::PlayerConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let preference = config.get_quality_preference()?;
//! println!("automatic quality: {}", preference.automatic_quality);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use tracing::warn;

use crate::display::chromecast::{DEFAULT_CAST_PORT, DEFAULT_STATUS_POLL_INTERVAL};
use crate::quality::{Quality, QualityPreference};

const AUTOMATIC_QUALITY_PATH: &[&str] = &["player", "quality", "automatic"];
const LAST_CHOSEN_QUALITY_PATH: &[&str] = &["player", "quality", "last_chosen"];
const DISALLOWED_IDS_PATH: &[&str] = &["player", "disallowed_ids"];
const CAST_PORT_PATH: &[&str] = &["player", "cast", "port"];
const STATUS_POLL_INTERVAL_PATH: &[&str] = &["player", "cast", "status_poll_interval_ms"];

pub trait PlayerConfigExt {
    fn get_automatic_quality(&self) -> Result<bool>;
    fn set_automatic_quality(&self, automatic: bool) -> Result<()>;

    /// Last quality picked by hand, `None` if never set.
    fn get_last_chosen_quality(&self) -> Result<Option<Quality>>;
    fn set_last_chosen_quality(&self, quality: Option<Quality>) -> Result<()>;

    fn get_quality_preference(&self) -> Result<QualityPreference>;

    /// Titles refused by the player, formatted `<type>-<tmdb id>`.
    fn get_disallowed_ids(&self) -> Result<Vec<String>>;
    fn set_disallowed_ids(&self, ids: &[String]) -> Result<()>;

    fn get_cast_port(&self) -> Result<u16>;
    fn set_cast_port(&self, port: u16) -> Result<()>;

    fn get_status_poll_interval(&self) -> Result<Duration>;
    fn set_status_poll_interval(&self, interval: Duration) -> Result<()>;
}

impl PlayerConfigExt for Config {
    fn get_automatic_quality(&self) -> Result<bool> {
        match self.get_value(AUTOMATIC_QUALITY_PATH) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => {
                let default = QualityPreference::default().automatic_quality;
                self.set_automatic_quality(default)?;
                Ok(default)
            }
        }
    }

    fn set_automatic_quality(&self, automatic: bool) -> Result<()> {
        self.set_value(AUTOMATIC_QUALITY_PATH, Value::Bool(automatic))
    }

    fn get_last_chosen_quality(&self) -> Result<Option<Quality>> {
        // An unquoted 1080 comes back as a number.
        let label = match self.get_value(LAST_CHOSEN_QUALITY_PATH) {
            Ok(Value::String(s)) => s,
            Ok(Value::Number(n)) => n.to_string(),
            _ => return Ok(None),
        };

        match label.parse::<Quality>() {
            Ok(quality) => Ok(Some(quality)),
            Err(err) => {
                warn!("Ignoring stored quality: {}", err);
                self.set_last_chosen_quality(None)?;
                Ok(None)
            }
        }
    }

    fn set_last_chosen_quality(&self, quality: Option<Quality>) -> Result<()> {
        let value = match quality {
            Some(q) => Value::String(q.as_str().to_string()),
            None => Value::Null,
        };
        self.set_value(LAST_CHOSEN_QUALITY_PATH, value)
    }

    fn get_quality_preference(&self) -> Result<QualityPreference> {
        Ok(QualityPreference {
            automatic_quality: self.get_automatic_quality()?,
            last_chosen_quality: self.get_last_chosen_quality()?,
        })
    }

    fn get_disallowed_ids(&self) -> Result<Vec<String>> {
        match self.get_value(DISALLOWED_IDS_PATH) {
            Ok(Value::Sequence(entries)) => Ok(entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect()),
            _ => {
                self.set_disallowed_ids(&[])?;
                Ok(Vec::new())
            }
        }
    }

    fn set_disallowed_ids(&self, ids: &[String]) -> Result<()> {
        let value = Value::Sequence(ids.iter().cloned().map(Value::String).collect());
        self.set_value(DISALLOWED_IDS_PATH, value)
    }

    fn get_cast_port(&self) -> Result<u16> {
        match self.get_value(CAST_PORT_PATH) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => Ok(port),
                None => {
                    self.set_cast_port(DEFAULT_CAST_PORT)?;
                    Ok(DEFAULT_CAST_PORT)
                }
            },
            _ => {
                self.set_cast_port(DEFAULT_CAST_PORT)?;
                Ok(DEFAULT_CAST_PORT)
            }
        }
    }

    fn set_cast_port(&self, port: u16) -> Result<()> {
        self.set_value(CAST_PORT_PATH, Value::Number(Number::from(port)))
    }

    fn get_status_poll_interval(&self) -> Result<Duration> {
        let millis = match self.get_value(STATUS_POLL_INTERVAL_PATH) {
            Ok(Value::Number(n)) => n.as_u64().filter(|ms| *ms > 0),
            _ => None,
        };

        match millis {
            Some(ms) => Ok(Duration::from_millis(ms)),
            None => {
                self.set_status_poll_interval(DEFAULT_STATUS_POLL_INTERVAL)?;
                Ok(DEFAULT_STATUS_POLL_INTERVAL)
            }
        }
    }

    fn set_status_poll_interval(&self, interval: Duration) -> Result<()> {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.set_value(STATUS_POLL_INTERVAL_PATH, Value::Number(Number::from(millis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_default_quality_preference() {
        let (_dir, config) = test_config();
        assert_eq!(
            config.get_quality_preference().unwrap(),
            QualityPreference::default()
        );
    }

    #[test]
    fn test_quality_preference_roundtrip_through_disk() {
        let (dir, config) = test_config();
        config.set_automatic_quality(false).unwrap();
        config.set_last_chosen_quality(Some(Quality::Q720)).unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(
            reloaded.get_quality_preference().unwrap(),
            QualityPreference::manual(Quality::Q720)
        );
    }

    #[test]
    fn test_numeric_quality_label() {
        let (_dir, config) = test_config();
        config
            .set_value(LAST_CHOSEN_QUALITY_PATH, Value::Number(Number::from(1080)))
            .unwrap();
        assert_eq!(config.get_last_chosen_quality().unwrap(), Some(Quality::Q1080));
    }

    #[test]
    fn test_invalid_quality_label_is_reset() {
        let (_dir, config) = test_config();
        config
            .set_value(LAST_CHOSEN_QUALITY_PATH, Value::String("1440".into()))
            .unwrap();
        assert_eq!(config.get_last_chosen_quality().unwrap(), None);
        assert_eq!(config.get_value(LAST_CHOSEN_QUALITY_PATH).unwrap(), Value::Null);
    }

    #[test]
    fn test_cast_settings() {
        let (_dir, config) = test_config();
        assert_eq!(config.get_cast_port().unwrap(), DEFAULT_CAST_PORT);
        assert_eq!(
            config.get_status_poll_interval().unwrap(),
            DEFAULT_STATUS_POLL_INTERVAL
        );

        config.set_cast_port(8010).unwrap();
        config
            .set_status_poll_interval(Duration::from_millis(250))
            .unwrap();
        assert_eq!(config.get_cast_port().unwrap(), 8010);
        assert_eq!(
            config.get_status_poll_interval().unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_disallowed_ids() {
        let (_dir, config) = test_config();
        assert!(config.get_disallowed_ids().unwrap().is_empty());

        let ids = vec!["movie-753342".to_string()];
        config.set_disallowed_ids(&ids).unwrap();
        assert_eq!(config.get_disallowed_ids().unwrap(), ids);
    }
}
