use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the current playback attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerStatus {
    #[default]
    Idle,
    Scraping,
    Playing,
    ScrapeNotFound,
    PlaybackError,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Scraping => "scraping",
            PlayerStatus::Playing => "playing",
            PlayerStatus::ScrapeNotFound => "scrapeNotFound",
            PlayerStatus::PlaybackError => "playbackError",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "show",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMetaEpisode {
    pub number: u32,
    pub tmdb_id: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMetaSeason {
    pub number: u32,
    pub tmdb_id: String,
    pub title: String,
}

/// Movie or show specific part of [`PlayerMeta`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayerMetaKind {
    Movie,
    Show {
        episode: PlayerMetaEpisode,
        season: PlayerMetaSeason,
        episodes: Vec<PlayerMetaEpisode>,
    },
}

/// Resolved title metadata, as supplied by the metadata collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMeta {
    pub title: String,
    pub tmdb_id: String,
    pub imdb_id: Option<String>,
    pub release_year: u32,
    pub poster: Option<String>,
    #[serde(flatten)]
    pub kind: PlayerMetaKind,
}

impl PlayerMeta {
    pub fn movie(title: impl Into<String>, tmdb_id: impl Into<String>, release_year: u32) -> Self {
        Self {
            title: title.into(),
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
            release_year,
            poster: None,
            kind: PlayerMetaKind::Movie,
        }
    }

    pub fn show(
        title: impl Into<String>,
        tmdb_id: impl Into<String>,
        release_year: u32,
        season: PlayerMetaSeason,
        episode: PlayerMetaEpisode,
        episodes: Vec<PlayerMetaEpisode>,
    ) -> Self {
        Self {
            title: title.into(),
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
            release_year,
            poster: None,
            kind: PlayerMetaKind::Show {
                episode,
                season,
                episodes,
            },
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self.kind {
            PlayerMetaKind::Movie => MediaType::Movie,
            PlayerMetaKind::Show { .. } => MediaType::Show,
        }
    }

    /// Episode following the current one in the season list, if any.
    pub fn next_episode(&self) -> Option<&PlayerMetaEpisode> {
        match &self.kind {
            PlayerMetaKind::Movie => None,
            PlayerMetaKind::Show {
                episode, episodes, ..
            } => {
                let index = episodes.iter().position(|e| e.tmdb_id == episode.tmdb_id)?;
                episodes.get(index + 1)
            }
        }
    }
}

/// Subtitle content ready to be displayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    pub language: String,
    pub url: Option<String>,
    pub srt_data: String,
}

/// Subtitle track discovered alongside a source, before it is fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionListItem {
    pub language: String,
    pub url: String,
    pub needs_proxy: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionSelection {
    pub selected: Option<Caption>,
    /// True when the display renders the caption as a native text track
    /// rather than as an overlay.
    pub as_track: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(number: u32) -> PlayerMetaEpisode {
        PlayerMetaEpisode {
            number,
            tmdb_id: format!("ep{number}"),
            title: format!("Episode {number}"),
        }
    }

    fn season() -> PlayerMetaSeason {
        PlayerMetaSeason {
            number: 1,
            tmdb_id: "s1".to_string(),
            title: "Season 1".to_string(),
        }
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(
            serde_json::to_string(&PlayerStatus::ScrapeNotFound).unwrap(),
            "\"scrapeNotFound\""
        );
        assert_eq!(PlayerStatus::PlaybackError.to_string(), "playbackError");
        assert_eq!(PlayerStatus::default(), PlayerStatus::Idle);
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = PlayerMeta::show("Show", "42", 2020, season(), episode(1), vec![episode(1)]);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "show");
        assert_eq!(json["episode"]["tmdb_id"], "ep1");

        let back: PlayerMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_next_episode() {
        let meta = PlayerMeta::show(
            "Show",
            "42",
            2020,
            season(),
            episode(1),
            vec![episode(1), episode(2)],
        );
        assert_eq!(meta.next_episode().map(|e| e.number), Some(2));

        let last = PlayerMeta::show("Show", "42", 2020, season(), episode(2), vec![episode(1), episode(2)]);
        assert!(last.next_episode().is_none());

        assert!(PlayerMeta::movie("Film", "7", 1999).next_episode().is_none());
    }
}
