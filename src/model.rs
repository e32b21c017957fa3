use crate::error::PlayerError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stable identity for a track. Assigned at creation and never reused; a
/// given id lives in either the playlist or the trash, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Embedder-minted handle to session-scoped audio bytes. The handle is
/// opaque to the core and becomes unusable once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Where a track's audio bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Locator that survives a save/load cycle.
    Url(String),
    /// Session-scoped handle; lost on reload, must be released on destroy.
    Session(SessionHandle),
    /// A session source that did not survive a reload. Not playable until
    /// the user re-imports the file.
    NeedsReimport,
}

impl TrackSource {
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub source: TrackSource,
    pub cover: Option<String>,
    pub upload_order: u64,
    pub deleted_at: Option<OffsetDateTime>,
}

/// An import candidate handed in by the file-picker glue. `source` is `None`
/// when the picked file carried no audio payload.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub source: Option<TrackSource>,
    pub cover: Option<String>,
}

impl NewTrack {
    /// Import gate: a candidate without an audio payload is rejected.
    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.source.is_none() {
            return Err(PlayerError::InvalidTrack);
        }
        Ok(())
    }

    pub fn from_upload(file_name: &str, source: TrackSource) -> Self {
        let title = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name)
            .to_string();
        Self {
            title,
            artist: String::from("Unknown Artist"),
            album: String::from("Unknown Album"),
            source: Some(source),
            cover: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Custom,
    Title,
    Artist,
    UploadTime,
}

impl SortMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Custom => "Custom Order",
            Self::Title => "Title (A-Z)",
            Self::Artist => "Artist",
            Self::UploadTime => "Upload Order",
        }
    }
}

/// Emitted by the stores after a mutation; the UI drains these and
/// re-renders whatever changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PlaylistChanged,
    CurrentTrackChanged { id: Option<TrackId> },
    TrashChanged,
    PlaybackChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_title_strips_last_extension() {
        let candidate = NewTrack::from_upload(
            "Blinding Lights.mp3",
            TrackSource::Session(SessionHandle(1)),
        );
        assert_eq!(candidate.title, "Blinding Lights");
        assert_eq!(candidate.artist, "Unknown Artist");

        let dotted = NewTrack::from_upload("mix.final.flac", TrackSource::Url(String::new()));
        assert_eq!(dotted.title, "mix.final");
    }

    #[test]
    fn track_ids_are_unique() {
        assert_ne!(TrackId::new(), TrackId::new());
    }

    #[test]
    fn candidate_without_payload_is_invalid() {
        let candidate = NewTrack {
            title: String::from("broken"),
            artist: String::new(),
            album: String::new(),
            source: None,
            cover: None,
        };
        assert_eq!(candidate.validate(), Err(PlayerError::InvalidTrack));
    }
}
