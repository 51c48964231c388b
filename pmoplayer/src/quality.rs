//! Quality labels, source shapes and the quality selection rule.
//!
//! A title is either offered as a set of progressive files keyed by
//! [`Quality`], or as a single adaptive (HLS) playlist whose renditions are
//! chosen by the backend itself. [`select_quality`] turns a [`Source`] plus
//! the user's [`QualityPreference`] into the [`LoadableSource`] handed to a
//! display.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PlayerError;

/// Discrete playback resolution rung, ordered from lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "360")]
    Q360,
    #[serde(rename = "480")]
    Q480,
    #[serde(rename = "720")]
    Q720,
    #[serde(rename = "1080")]
    Q1080,
    #[serde(rename = "4k")]
    Q4K,
}

impl Quality {
    /// Every label, lowest first.
    pub const ALL: [Quality; 6] = [
        Quality::Unknown,
        Quality::Q360,
        Quality::Q480,
        Quality::Q720,
        Quality::Q1080,
        Quality::Q4K,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::Q360 => "360",
            Quality::Q480 => "480",
            Quality::Q720 => "720",
            Quality::Q1080 => "1080",
            Quality::Q4K => "4k",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Quality::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == normalized)
            .ok_or_else(|| PlayerError::InvalidQuality(s.to_string()))
    }
}

/// A single progressive file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFile {
    pub url: String,
}

impl StreamFile {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Resolved playable descriptor for a title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    File {
        qualities: BTreeMap<Quality, StreamFile>,
    },
    Hls {
        url: String,
    },
}

impl Source {
    /// Builds a file source from `(quality, url)` pairs.
    pub fn files<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Quality, S)>,
        S: Into<String>,
    {
        Source::File {
            qualities: entries
                .into_iter()
                .map(|(q, url)| (q, StreamFile::new(url)))
                .collect(),
        }
    }

    pub fn hls(url: impl Into<String>) -> Self {
        Source::Hls { url: url.into() }
    }

    /// Quality labels offered by a file source, lowest first. Adaptive
    /// sources return an empty list: their renditions are only known to the
    /// backend.
    pub fn available_qualities(&self) -> Vec<Quality> {
        match self {
            Source::File { qualities } => qualities.keys().copied().collect(),
            Source::Hls { .. } => Vec::new(),
        }
    }

    pub fn file_for(&self, quality: Quality) -> Option<&StreamFile> {
        match self {
            Source::File { qualities } => qualities.get(&quality),
            Source::Hls { .. } => None,
        }
    }

    /// Checks the shape promised by the scrape collaborator: a non-empty
    /// quality map, or an HLS locator that parses as a URL.
    pub fn validate(&self) -> Result<(), PlayerError> {
        match self {
            Source::File { qualities } if qualities.is_empty() => {
                Err(PlayerError::invalid_source("file source has no qualities"))
            }
            Source::File { .. } => Ok(()),
            Source::Hls { url } => url::Url::parse(url)
                .map(|_| ())
                .map_err(|err| PlayerError::InvalidSource(format!("{url}: {err}"))),
        }
    }
}

/// What a display actually receives in a `load`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoadableSource {
    Mp4 { url: String },
    Hls { url: String },
}

impl LoadableSource {
    pub fn url(&self) -> &str {
        match self {
            LoadableSource::Mp4 { url } | LoadableSource::Hls { url } => url,
        }
    }

    pub fn is_hls(&self) -> bool {
        matches!(self, LoadableSource::Hls { .. })
    }
}

/// Process-wide quality preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreference {
    pub automatic_quality: bool,
    pub last_chosen_quality: Option<Quality>,
}

impl Default for QualityPreference {
    fn default() -> Self {
        Self {
            automatic_quality: true,
            last_chosen_quality: None,
        }
    }
}

impl QualityPreference {
    pub fn automatic() -> Self {
        Self::default()
    }

    pub fn manual(quality: Quality) -> Self {
        Self {
            automatic_quality: false,
            last_chosen_quality: Some(quality),
        }
    }
}

/// Result of [`select_quality`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedStream {
    pub stream: LoadableSource,
    /// For file sources, the key of `stream`. For HLS, the remembered
    /// preference, informational only.
    pub quality: Option<Quality>,
}

/// Picks the variant to load for `source` under `preference`.
///
/// - HLS: the playlist passes through, the remembered quality is reported.
/// - Files: the highest rung when automatic, when nothing was chosen, or
///   when the chosen rung is missing; otherwise exactly the chosen rung.
///
/// Returns `None` only for a file source without any quality.
pub fn select_quality(source: &Source, preference: &QualityPreference) -> Option<SelectedStream> {
    match source {
        Source::Hls { url } => Some(SelectedStream {
            stream: LoadableSource::Hls { url: url.clone() },
            quality: preference.last_chosen_quality,
        }),
        Source::File { qualities } => {
            let manual = preference
                .last_chosen_quality
                .filter(|q| !preference.automatic_quality && qualities.contains_key(q));
            let quality = match manual {
                Some(q) => q,
                None => *qualities.keys().next_back()?,
            };
            let file = qualities.get(&quality)?;
            Some(SelectedStream {
                stream: LoadableSource::Mp4 {
                    url: file.url.clone(),
                },
                quality: Some(quality),
            })
        }
    }
}
