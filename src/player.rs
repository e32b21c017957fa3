use crate::audio::AudioBackend;
use crate::error::PlayerError;
use crate::model::{NewTrack, Notification, SortMode, Track};
use crate::playback::PlaybackController;
use crate::playlist::PlaylistStore;
use crate::storage::{self, BlobStore};
use crate::trash::TrashStore;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
}

impl StorageUsage {
    pub fn percent(&self) -> u8 {
        if self.capacity_bytes == 0 {
            return 100;
        }
        ((self.used_bytes * 100 / self.capacity_bytes).min(100)) as u8
    }
}

/// The command surface the UI talks to. Owns the three stores and the two
/// capability boundaries, persists after every mutation, and keeps a status
/// line the UI can show verbatim.
///
/// A failed save never touches in-memory state; the session keeps working
/// from memory and the failure lands in the status line.
pub struct Player {
    playlist: PlaylistStore,
    trash: TrashStore,
    playback: PlaybackController,
    storage: Box<dyn BlobStore>,
    audio: Box<dyn AudioBackend>,
    status: String,
    dirty: bool,
}

impl Player {
    /// Loads both records, falling back to the seed playlist when the
    /// playlist record is missing or unreadable and to an empty trash when
    /// the trash record is, then sweeps expired trash and points the
    /// capability at the current track without starting playback.
    pub fn new(storage: Box<dyn BlobStore>, audio: Box<dyn AudioBackend>) -> Self {
        let now = OffsetDateTime::now_utc();

        let mut seeded = false;
        let mut load_status = String::from("Playlist loaded from storage");
        let playlist_tracks =
            match storage::load_tracks(storage.as_ref(), storage::PLAYLIST_KEY) {
                Ok(Some(tracks)) => tracks,
                Ok(None) => {
                    seeded = true;
                    load_status = String::from("Loaded default playlist");
                    storage::seed_tracks()
                }
                Err(err) => {
                    seeded = true;
                    load_status = format!("Error loading playlist, loaded defaults: {err:#}");
                    storage::seed_tracks()
                }
            };
        let trash_tracks = match storage::load_tracks(storage.as_ref(), storage::TRASH_KEY) {
            Ok(Some(tracks)) => tracks,
            Ok(None) | Err(_) => Vec::new(),
        };

        let mut player = Self {
            playlist: PlaylistStore::from_tracks(playlist_tracks),
            trash: TrashStore::from_tracks(trash_tracks),
            playback: PlaybackController::new(),
            storage,
            audio,
            status: String::from("Ready"),
            dirty: true,
        };

        if seeded {
            player.persist_playlist();
        }
        let expired = player.trash.sweep_expired(now);
        if !expired.is_empty() {
            player.release_sources(&expired);
            player.persist_trash();
        }
        if !player.playlist.is_empty() {
            player.reload_playback();
        }
        player.set_status(&load_status);
        player
    }

    pub fn playlist(&self) -> &PlaylistStore {
        &self.playlist
    }

    pub fn trash(&self) -> &TrashStore {
        &self.trash
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.playlist.current_track()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut events = self.playlist.take_notifications();
        events.extend(self.trash.take_notifications());
        events.extend(self.playback.take_notifications());
        events
    }

    pub fn storage_usage(&self) -> StorageUsage {
        StorageUsage {
            used_bytes: self.storage.used_bytes(),
            capacity_bytes: self.storage.capacity_bytes(),
        }
    }

    /// Imports a batch of picked files. Non-audio candidates are skipped,
    /// the rest appended; returns how many made it in.
    pub fn add_tracks(&mut self, batch: Vec<NewTrack>) -> usize {
        let requested = batch.len();
        let was_empty = self.playlist.is_empty();
        let added = self.playlist.add(batch);
        if added > 0 {
            if was_empty {
                self.reload_playback();
            }
            self.persist_playlist();
            self.set_status(&format!("Added {added} song(s) to playlist"));
        } else if requested > 0 {
            self.set_status("No playable audio files in selection");
        }
        added
    }

    /// Moves the track at a visible position to the trash. Reloads playback
    /// when the removal changed which track is current.
    pub fn remove_track(&mut self, index: usize) -> Result<(), PlayerError> {
        let before = self.playlist.current_track_id();
        let removed = self.playlist.remove(index, OffsetDateTime::now_utc())?;
        self.trash.add(vec![removed]);
        if self.playlist.current_track_id() != before {
            self.reload_playback();
        }
        self.persist_playlist();
        self.persist_trash();
        self.set_status("Song moved to recently deleted");
        Ok(())
    }

    pub fn remove_all(&mut self) {
        if self.playlist.is_empty() {
            self.set_status("Playlist is already empty");
            return;
        }
        let removed = self.playlist.remove_all(OffsetDateTime::now_utc());
        self.trash.add(removed);
        self.reload_playback();
        self.persist_playlist();
        self.persist_trash();
        self.set_status("All songs moved to recently deleted");
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        match self.playlist.reorder(from, to) {
            Ok(()) => {
                self.persist_playlist();
                self.set_status("Playlist order updated");
                Ok(())
            }
            Err(err) => {
                if err == PlayerError::SortModeLocked {
                    self.set_status("Switch to custom order to reorder");
                }
                Err(err)
            }
        }
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.playlist.set_sort_mode(mode);
        self.persist_playlist();
        self.set_status(&format!("Sorted by {}", mode.label()));
    }

    pub fn select_track(&mut self, index: usize) -> Result<(), PlayerError> {
        self.playlist.select(index)?;
        self.reload_playback();
        self.dirty = true;
        Ok(())
    }

    pub fn restore_track(&mut self, index: usize) -> Result<(), PlayerError> {
        let track = self.trash.restore(index)?;
        let title = track.title.clone();
        let was_empty = self.playlist.is_empty();
        self.playlist.restore(track);
        if was_empty {
            self.reload_playback();
        }
        self.persist_playlist();
        self.persist_trash();
        self.set_status(&format!("\"{title}\" restored to playlist"));
        Ok(())
    }

    pub fn restore_all(&mut self) {
        if self.trash.is_empty() {
            self.set_status("No songs to restore");
            return;
        }
        let was_empty = self.playlist.is_empty();
        for track in self.trash.restore_all() {
            self.playlist.restore(track);
        }
        if was_empty {
            self.reload_playback();
        }
        self.persist_playlist();
        self.persist_trash();
        self.set_status("All songs restored to playlist");
    }

    /// Empties the trash immediately, releasing session sources.
    pub fn purge_trash(&mut self) {
        let discarded = self.trash.purge();
        if discarded.is_empty() {
            self.set_status("Recently deleted is empty");
            return;
        }
        self.release_sources(&discarded);
        self.persist_trash();
        self.set_status("Recently deleted emptied");
    }

    /// Drops trash entries past the retention window. Runs on load; callers
    /// may also invoke it on a periodic tick. Returns how many were
    /// destroyed.
    pub fn sweep_trash(&mut self, now: OffsetDateTime) -> usize {
        let expired = self.trash.sweep_expired(now);
        if !expired.is_empty() {
            self.release_sources(&expired);
            self.persist_trash();
        }
        expired.len()
    }

    pub fn toggle_playback(&mut self) -> Result<(), PlayerError> {
        match self.playback.toggle(&self.playlist, &mut *self.audio) {
            Ok(()) => {
                if self.playback.is_playing() {
                    let title = self
                        .playlist
                        .current_track()
                        .map(|track| track.title.clone())
                        .unwrap_or_default();
                    self.set_status(&format!("Now playing: {title}"));
                } else {
                    self.set_status("Paused");
                }
                Ok(())
            }
            Err(err) => {
                self.set_status(&format!("Playback error: {err}"));
                Err(err)
            }
        }
    }

    pub fn next_track(&mut self) -> Result<(), PlayerError> {
        let result = self.playback.next(&mut self.playlist, &mut *self.audio);
        self.report_playback(&result);
        result
    }

    pub fn previous_track(&mut self) -> Result<(), PlayerError> {
        let result = self.playback.previous(&mut self.playlist, &mut *self.audio);
        self.report_playback(&result);
        result
    }

    /// Capability callback: the current track finished.
    pub fn on_track_ended(&mut self) -> Result<(), PlayerError> {
        let result = self.playback.on_ended(&mut self.playlist, &mut *self.audio);
        self.report_playback(&result);
        result
    }

    pub fn on_duration_known(&mut self, seconds: f64) {
        self.playback.on_duration_known(seconds);
        self.dirty = true;
    }

    pub fn on_position_changed(&mut self, seconds: f64) {
        self.playback.on_position_changed(seconds);
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.playback.set_volume(&mut *self.audio, volume);
        self.set_status(&format!("Volume: {}%", self.playback.volume()));
    }

    pub fn step_volume(&mut self, delta: i32) {
        self.playback.step_volume(&mut *self.audio, delta);
        self.set_status(&format!("Volume: {}%", self.playback.volume()));
    }

    pub fn seek(&mut self, seconds: f64) {
        self.playback.seek(&mut *self.audio, seconds);
        self.dirty = true;
    }

    pub fn step_seek(&mut self, delta: f64) {
        self.playback.step_seek(&mut *self.audio, delta);
        self.dirty = true;
    }

    pub fn toggle_shuffle(&mut self) {
        self.playback.toggle_shuffle();
        self.set_status(if self.playback.is_shuffled() {
            "Shuffle enabled"
        } else {
            "Shuffle disabled"
        });
    }

    pub fn toggle_repeat(&mut self) {
        self.playback.toggle_repeat();
        self.set_status(if self.playback.is_repeating() {
            "Repeat enabled"
        } else {
            "Repeat disabled"
        });
    }

    /// Explicit save of both records, for a "save now" command.
    pub fn save(&mut self) -> Result<(), PlayerError> {
        storage::save_tracks(
            self.storage.as_mut(),
            storage::PLAYLIST_KEY,
            self.playlist.custom_order(),
        )
        .map_err(|err| PlayerError::StorageFailure(format!("{err:#}")))?;
        storage::save_tracks(self.storage.as_mut(), storage::TRASH_KEY, self.trash.tracks())
            .map_err(|err| PlayerError::StorageFailure(format!("{err:#}")))?;
        self.set_status("State saved");
        Ok(())
    }

    fn report_playback(&mut self, result: &Result<(), PlayerError>) {
        match result {
            Ok(()) => self.dirty = true,
            Err(err) => {
                let message = format!("Playback error: {err}");
                self.set_status(&message);
            }
        }
    }

    fn reload_playback(&mut self) {
        if let Err(err) = self.playback.load_current(&self.playlist, &mut *self.audio) {
            self.set_status(&format!("Playback error: {err}"));
        }
    }

    fn persist_playlist(&mut self) {
        if let Err(err) = storage::save_tracks(
            self.storage.as_mut(),
            storage::PLAYLIST_KEY,
            self.playlist.custom_order(),
        ) {
            self.set_status(&format!("Error saving playlist: {err:#}"));
        }
    }

    fn persist_trash(&mut self) {
        if let Err(err) = storage::save_tracks(
            self.storage.as_mut(),
            storage::TRASH_KEY,
            self.trash.tracks(),
        ) {
            self.set_status(&format!("Error saving deleted songs: {err:#}"));
        }
    }

    fn release_sources(&mut self, destroyed: &[Track]) {
        for track in destroyed {
            if track.source.is_session() {
                self.audio.release_source(&track.source);
            }
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}
