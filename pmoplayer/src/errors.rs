use thiserror::Error;

use crate::model::MediaType;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Unknown quality label: {0}")]
    InvalidQuality(String),
    #[error("Invalid source: {0}")]
    InvalidSource(String),
    #[error("{media_type}-{id} has been removed")]
    DisallowedMedia { media_type: MediaType, id: String },
    #[error("Invalid Chromecast location: {0}")]
    InvalidCastLocation(String),
    #[error("Chromecast Error: {0}")]
    ChromecastError(String),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl PlayerError {
    pub fn invalid_source(message: &str) -> Self {
        PlayerError::InvalidSource(message.to_string())
    }

    pub fn chromecast_error(message: impl std::fmt::Display) -> Self {
        PlayerError::ChromecastError(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
