//! Descriptors exchanged with the scrape collaborator.
//!
//! The orchestrator never scrapes by itself: it turns [`PlayerMeta`] into the
//! [`ScrapeMedia`] request understood by the providers, and receives back
//! per-provider [`ScrapeSegment`] outcomes when nothing playable was found.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::PlayerError;
use crate::model::{MediaType, PlayerMeta, PlayerMetaEpisode, PlayerMetaKind, PlayerMetaSeason};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScrapeMediaKind {
    Movie,
    Show {
        episode: PlayerMetaEpisode,
        season: PlayerMetaSeason,
    },
}

/// Request descriptor handed to the scrape collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeMedia {
    pub title: String,
    pub release_year: u32,
    pub tmdb_id: String,
    pub imdb_id: Option<String>,
    #[serde(flatten)]
    pub kind: ScrapeMediaKind,
}

impl ScrapeMedia {
    pub fn from_meta(meta: &PlayerMeta) -> Self {
        let kind = match &meta.kind {
            PlayerMetaKind::Movie => ScrapeMediaKind::Movie,
            PlayerMetaKind::Show {
                episode, season, ..
            } => ScrapeMediaKind::Show {
                episode: episode.clone(),
                season: season.clone(),
            },
        };
        Self {
            title: meta.title.clone(),
            release_year: meta.release_year,
            tmdb_id: meta.tmdb_id.clone(),
            imdb_id: meta.imdb_id.clone(),
            kind,
        }
    }

    /// Same as [`ScrapeMedia::from_meta`], refusing titles listed in
    /// `disallowed` (entries formatted `<type>-<tmdb id>`).
    pub fn checked_from_meta(meta: &PlayerMeta, disallowed: &[String]) -> Result<Self, PlayerError> {
        let media_type = meta.media_type();
        if is_disallowed_media(disallowed, media_type, &meta.tmdb_id) {
            return Err(PlayerError::DisallowedMedia {
                media_type,
                id: meta.tmdb_id.clone(),
            });
        }
        Ok(Self::from_meta(meta))
    }
}

/// Returns true if `<media_type>-<id>` appears in `entries`.
pub fn is_disallowed_media(entries: &[String], media_type: MediaType, id: &str) -> bool {
    entries.iter().any(|entry| {
        entry
            .trim()
            .split_once('-')
            .is_some_and(|(kind, entry_id)| kind == media_type.as_str() && entry_id == id)
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeSegmentStatus {
    Waiting,
    Pending,
    Success,
    NotFound,
    Failure,
}

impl fmt::Display for ScrapeSegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScrapeSegmentStatus::Waiting => "waiting",
            ScrapeSegmentStatus::Pending => "pending",
            ScrapeSegmentStatus::Success => "success",
            ScrapeSegmentStatus::NotFound => "notfound",
            ScrapeSegmentStatus::Failure => "failure",
        };
        f.write_str(label)
    }
}

/// Outcome of one provider during a scrape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSegment {
    pub id: String,
    pub status: ScrapeSegmentStatus,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl ScrapeSegment {
    pub fn new(id: impl Into<String>, status: ScrapeSegmentStatus) -> Self {
        Self {
            id: id.into(),
            status,
            reason: None,
            error: None,
        }
    }
}

/// Human readable details of a failed scrape.
///
/// Returns `None` when no segment ended in [`ScrapeSegmentStatus::Failure`];
/// otherwise one `"<id>: <status>"` line per segment, each followed by its
/// reason and error when present.
pub fn scrape_failure_report(segments: &[ScrapeSegment]) -> Option<String> {
    if !segments
        .iter()
        .any(|s| s.status == ScrapeSegmentStatus::Failure)
    {
        return None;
    }

    let mut report = String::new();
    for segment in segments {
        report.push_str(&format!("{}: {}\n", segment.id, segment.status));
        if let Some(reason) = &segment.reason {
            report.push_str(reason);
            report.push('\n');
        }
        if let Some(error) = &segment.error {
            report.push_str(error);
            report.push('\n');
        }
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show_meta() -> PlayerMeta {
        PlayerMeta::show(
            "Show",
            "1399",
            2011,
            PlayerMetaSeason {
                number: 1,
                tmdb_id: "3624".into(),
                title: "Season 1".into(),
            },
            PlayerMetaEpisode {
                number: 2,
                tmdb_id: "63057".into(),
                title: "The Kingsroad".into(),
            },
            Vec::new(),
        )
    }

    #[test]
    fn test_from_meta_movie() {
        let media = ScrapeMedia::from_meta(&PlayerMeta::movie("Film", "753342", 2023));
        assert_eq!(media.kind, ScrapeMediaKind::Movie);
        assert_eq!(media.tmdb_id, "753342");
        assert_eq!(media.release_year, 2023);
    }

    #[test]
    fn test_from_meta_show_carries_episode_and_season() {
        let media = ScrapeMedia::from_meta(&show_meta());
        match media.kind {
            ScrapeMediaKind::Show { episode, season } => {
                assert_eq!(episode.number, 2);
                assert_eq!(season.tmdb_id, "3624");
            }
            ScrapeMediaKind::Movie => panic!("expected a show"),
        }
    }

    #[test]
    fn test_disallowed_media() {
        let entries = vec!["movie-753342".to_string(), " show-1399 ".to_string()];
        assert!(is_disallowed_media(&entries, MediaType::Movie, "753342"));
        assert!(is_disallowed_media(&entries, MediaType::Show, "1399"));
        assert!(!is_disallowed_media(&entries, MediaType::Show, "753342"));
        assert!(!is_disallowed_media(&entries, MediaType::Movie, "1"));
        assert!(!is_disallowed_media(&["garbage".to_string()], MediaType::Movie, "garbage"));
    }

    #[test]
    fn test_checked_from_meta() {
        let entries = vec!["show-1399".to_string()];
        let err = ScrapeMedia::checked_from_meta(&show_meta(), &entries).unwrap_err();
        assert!(matches!(err, PlayerError::DisallowedMedia { media_type: MediaType::Show, .. }));
        assert!(ScrapeMedia::checked_from_meta(&PlayerMeta::movie("Film", "1399", 2000), &entries).is_ok());
    }

    #[test]
    fn test_failure_report() {
        let mut failed = ScrapeSegment::new("alpha", ScrapeSegmentStatus::Failure);
        failed.error = Some("timeout".into());
        let mut missing = ScrapeSegment::new("beta", ScrapeSegmentStatus::NotFound);
        missing.reason = Some("no stream".into());

        let report = scrape_failure_report(&[failed, missing]).unwrap();
        assert_eq!(report, "alpha: failure\ntimeout\nbeta: notfound\nno stream\n");
    }

    #[test]
    fn test_no_report_without_failure() {
        let segments = vec![ScrapeSegment::new("beta", ScrapeSegmentStatus::NotFound)];
        assert!(scrape_failure_report(&segments).is_none());
        assert!(scrape_failure_report(&[]).is_none());
    }
}
