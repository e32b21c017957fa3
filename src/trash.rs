use crate::error::PlayerError;
use crate::model::{Notification, Track};
use time::{Duration, OffsetDateTime, UtcOffset};

/// How long a deleted track stays recoverable.
pub const RETENTION_DAYS: i64 = 30;

pub fn retention_window() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// Holding area for deleted tracks. Expiry is data-driven: nothing is
/// scheduled, callers sweep on load and whenever they feel like it.
#[derive(Debug)]
pub struct TrashStore {
    tracks: Vec<Track>,
    pending: Vec<Notification>,
}

impl TrashStore {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    /// Accepts a batch handed off by the playlist; each track already
    /// carries its deleted-at stamp.
    pub fn add(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        self.tracks.extend(tracks);
        self.pending.push(Notification::TrashChanged);
    }

    /// Drops every track deleted longer than the retention window ago and
    /// returns them so the caller can release session sources. This and
    /// `purge` are the only paths that permanently destroy a track.
    pub fn sweep_expired(&mut self, now: OffsetDateTime) -> Vec<Track> {
        let (kept, expired): (Vec<Track>, Vec<Track>) = std::mem::take(&mut self.tracks)
            .into_iter()
            .partition(|track| {
                !track
                    .deleted_at
                    .is_some_and(|at| now - at > retention_window())
            });
        self.tracks = kept;
        if !expired.is_empty() {
            self.pending.push(Notification::TrashChanged);
        }
        expired
    }

    /// Takes the track at `index` back out of the trash for the playlist.
    pub fn restore(&mut self, index: usize) -> Result<Track, PlayerError> {
        if index >= self.tracks.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        let track = self.tracks.remove(index);
        self.pending.push(Notification::TrashChanged);
        Ok(track)
    }

    /// Drains the whole trash in insertion order for the playlist.
    pub fn restore_all(&mut self) -> Vec<Track> {
        if self.tracks.is_empty() {
            return Vec::new();
        }
        self.pending.push(Notification::TrashChanged);
        std::mem::take(&mut self.tracks)
    }

    /// Discards everything immediately, skipping the retention window. The
    /// caller still owns releasing session sources of the returned tracks.
    pub fn purge(&mut self) -> Vec<Track> {
        if self.tracks.is_empty() {
            return Vec::new();
        }
        self.pending.push(Notification::TrashChanged);
        std::mem::take(&mut self.tracks)
    }
}

/// Deleted-at rendered as a local calendar date for the trash view.
pub fn deleted_label(track: &Track) -> String {
    let Some(at) = track.deleted_at else {
        return String::from("unknown");
    };
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let local = at.to_offset(offset);
    format!(
        "{:04}-{:02}-{:02}",
        local.year(),
        u8::from(local.month()),
        local.day()
    )
}
