use crate::error::PlayerError;
use crate::model::{NewTrack, Notification, SortMode, Track, TrackId};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// The ordered collection of active tracks plus the playback cursor.
///
/// `tracks` always holds the user's custom arrangement; `view` is the visible
/// order as indices into `tracks` and is the only thing a sort mode touches.
/// Switching away from custom and back therefore never loses the manual
/// arrangement.
#[derive(Debug)]
pub struct PlaylistStore {
    tracks: Vec<Track>,
    view: Vec<usize>,
    current_index: usize,
    sort_mode: SortMode,
    pending: Vec<Notification>,
}

impl PlaylistStore {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            view: Vec::new(),
            current_index: 0,
            sort_mode: SortMode::Custom,
            pending: Vec::new(),
        }
    }

    pub fn from_tracks(mut tracks: Vec<Track>) -> Self {
        for track in &mut tracks {
            track.deleted_at = None;
        }
        let view = (0..tracks.len()).collect();
        Self {
            tracks,
            view,
            current_index: 0,
            sort_mode: SortMode::Custom,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Position of the current track in the visible order. By convention 0
    /// when the playlist is empty.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.view
            .get(self.current_index)
            .map(|&slot| &self.tracks[slot])
    }

    pub fn current_track_id(&self) -> Option<TrackId> {
        self.current_track().map(|track| track.id)
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    /// Track at a position in the visible order.
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.view.get(index).map(|&slot| &self.tracks[slot])
    }

    /// Tracks in the visible order, for rendering.
    pub fn tracks_in_view(&self) -> impl Iterator<Item = &Track> {
        self.view.iter().map(|&slot| &self.tracks[slot])
    }

    /// Tracks in the custom arrangement, which is what gets persisted.
    pub fn custom_order(&self) -> &[Track] {
        &self.tracks
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    /// Appends a batch of import candidates. Candidates without an audio
    /// payload are skipped; the rest get distinct, increasing upload orders
    /// even within a single multi-file import. Returns the count added.
    ///
    /// Adding to an empty playlist makes the first added track current, but
    /// never starts playback.
    pub fn add(&mut self, batch: Vec<NewTrack>) -> usize {
        let base = self
            .tracks
            .iter()
            .map(|track| track.upload_order)
            .max()
            .unwrap_or(0);
        let was_empty = self.tracks.is_empty();
        let mut added = 0;

        for (offset, candidate) in batch.into_iter().enumerate() {
            if candidate.validate().is_err() {
                continue;
            }
            let NewTrack {
                title,
                artist,
                album,
                source,
                cover,
            } = candidate;
            let Some(source) = source else { continue };
            self.tracks.push(Track {
                id: TrackId::new(),
                title,
                artist,
                album,
                source,
                cover,
                upload_order: base + 1 + offset as u64,
                deleted_at: None,
            });
            self.view.push(self.tracks.len() - 1);
            added += 1;
        }

        if added > 0 {
            if was_empty {
                self.current_index = 0;
                self.pending.push(Notification::CurrentTrackChanged {
                    id: self.current_track_id(),
                });
            }
            self.pending.push(Notification::PlaylistChanged);
        }
        added
    }

    /// Removes the track at a visible position, stamps its deleted-at, and
    /// hands it back for the trash.
    ///
    /// Cursor policy, in priority order: an emptied playlist resets the
    /// cursor to 0; removing the current track keeps the cursor slot (the
    /// next track slides in) unless it fell off the end, in which case it
    /// clamps to the new last track; removing ahead of the cursor shifts it
    /// down by one; removing behind it changes nothing.
    pub fn remove(
        &mut self,
        index: usize,
        now: OffsetDateTime,
    ) -> Result<Track, PlayerError> {
        if index >= self.view.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.view.len(),
            });
        }

        let before = self.current_track_id();
        let slot = self.view[index];
        let mut removed = self.tracks.remove(slot);
        removed.deleted_at = Some(now);

        self.view.remove(index);
        for entry in &mut self.view {
            if *entry > slot {
                *entry -= 1;
            }
        }

        if self.view.is_empty() {
            self.current_index = 0;
        } else if index == self.current_index {
            if self.current_index >= self.view.len() {
                self.current_index = self.view.len() - 1;
            }
        } else if index < self.current_index {
            self.current_index -= 1;
        }

        self.pending.push(Notification::PlaylistChanged);
        if self.current_track_id() != before {
            self.pending.push(Notification::CurrentTrackChanged {
                id: self.current_track_id(),
            });
        }
        Ok(removed)
    }

    /// Empties the playlist, stamping every track, and returns the batch in
    /// visible order for the trash hand-off.
    pub fn remove_all(&mut self, now: OffsetDateTime) -> Vec<Track> {
        if self.tracks.is_empty() {
            return Vec::new();
        }

        let mut removed: Vec<Track> = Vec::with_capacity(self.tracks.len());
        for &slot in &self.view {
            removed.push(self.tracks[slot].clone());
        }
        for track in &mut removed {
            track.deleted_at = Some(now);
        }
        self.tracks.clear();
        self.view.clear();
        self.current_index = 0;

        self.pending.push(Notification::PlaylistChanged);
        self.pending
            .push(Notification::CurrentTrackChanged { id: None });
        removed
    }

    /// Moves one track from `from` to `to` in the custom arrangement. Only
    /// meaningful while the custom sort mode is active; any other mode
    /// rejects the move.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        if self.sort_mode != SortMode::Custom {
            return Err(PlayerError::SortModeLocked);
        }
        let len = self.tracks.len();
        if from >= len {
            return Err(PlayerError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(PlayerError::IndexOutOfRange { index: to, len });
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        self.view = (0..len).collect();

        if self.current_index == from {
            self.current_index = to;
        } else if from < to && self.current_index > from && self.current_index <= to {
            self.current_index -= 1;
        } else if to < from && self.current_index >= to && self.current_index < from {
            self.current_index += 1;
        }

        self.pending.push(Notification::PlaylistChanged);
        Ok(())
    }

    /// Re-derives the visible order. The cursor follows the current track by
    /// identity, never by its stale position.
    pub fn set_sort_mode(&mut self, mode: SortMode) {
        let current = self.current_track_id();
        self.sort_mode = mode;
        self.rebuild_view();
        if let Some(id) = current
            && let Some(position) = self
                .view
                .iter()
                .position(|&slot| self.tracks[slot].id == id)
        {
            self.current_index = position;
        }
        self.pending.push(Notification::PlaylistChanged);
    }

    /// Makes the track at a visible position current. This is a selection
    /// change even when the index is unchanged; the caller reloads playback.
    pub fn select(&mut self, index: usize) -> Result<(), PlayerError> {
        if index >= self.view.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.view.len(),
            });
        }
        self.current_index = index;
        self.pending.push(Notification::CurrentTrackChanged {
            id: self.current_track_id(),
        });
        Ok(())
    }

    /// Appends a track coming back from the trash, clearing its deleted-at.
    /// Upload order is whatever it was at import time.
    pub fn restore(&mut self, mut track: Track) {
        track.deleted_at = None;
        let was_empty = self.tracks.is_empty();
        self.tracks.push(track);
        self.view.push(self.tracks.len() - 1);
        if was_empty {
            self.current_index = 0;
            self.pending.push(Notification::CurrentTrackChanged {
                id: self.current_track_id(),
            });
        }
        self.pending.push(Notification::PlaylistChanged);
    }

    fn rebuild_view(&mut self) {
        let Self { tracks, view, .. } = self;
        *view = (0..tracks.len()).collect();
        match self.sort_mode {
            SortMode::Custom => {}
            SortMode::Title => {
                view.sort_by_cached_key(|&slot| collation_key(&tracks[slot].title));
            }
            SortMode::Artist => {
                view.sort_by_cached_key(|&slot| collation_key(&tracks[slot].artist));
            }
            SortMode::UploadTime => {
                view.sort_by_key(|&slot| tracks[slot].upload_order);
            }
        }
    }
}

/// Case- and accent-insensitive sort key: NFKD with combining marks
/// stripped, then lowercased.
fn collation_key(value: &str) -> String {
    value
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackSource;
    use proptest::{prop_assert, prop_assert_eq};
    use std::collections::HashSet;

    fn candidate(title: &str) -> NewTrack {
        NewTrack {
            title: title.to_string(),
            artist: String::from("Unknown Artist"),
            album: String::from("Unknown Album"),
            source: Some(TrackSource::Url(format!("https://tracks.test/{title}.mp3"))),
            cover: None,
        }
    }

    fn invalid(title: &str) -> NewTrack {
        NewTrack {
            source: None,
            ..candidate(title)
        }
    }

    fn store_with(titles: &[&str]) -> PlaylistStore {
        let mut store = PlaylistStore::new();
        store.add(titles.iter().map(|t| candidate(t)).collect());
        store
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_754_000_000).expect("timestamp")
    }

    fn visible_titles(store: &PlaylistStore) -> Vec<String> {
        store.tracks_in_view().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn add_assigns_increasing_upload_orders_across_a_batch() {
        let mut store = PlaylistStore::new();
        let added = store.add(vec![candidate("a"), candidate("b"), candidate("c")]);
        assert_eq!(added, 3);
        let orders: Vec<u64> = store.tracks_in_view().map(|t| t.upload_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn add_skips_candidates_without_audio_payload() {
        let mut store = PlaylistStore::new();
        let added = store.add(vec![candidate("a"), invalid("junk"), candidate("b")]);
        assert_eq!(added, 2);
        assert_eq!(store.len(), 2);

        // Skipped entries still consume their batch position, so orders stay
        // distinct and increasing.
        let orders: Vec<u64> = store.tracks_in_view().map(|t| t.upload_order).collect();
        assert_eq!(orders, vec![1, 3]);
    }

    #[test]
    fn add_to_empty_playlist_selects_first_track() {
        let mut store = PlaylistStore::new();
        store.add(vec![candidate("a"), candidate("b")]);
        assert_eq!(store.current_index(), 0);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("a"));

        store.add(vec![candidate("c")]);
        assert_eq!(store.current_index(), 0, "later adds leave the cursor alone");
    }

    #[test]
    fn removing_before_current_keeps_pointing_at_same_track() {
        let mut store = store_with(&["A", "B", "C"]);
        store.select(1).expect("select");

        store.remove(0, now()).expect("remove");

        assert_eq!(visible_titles(&store), vec!["B", "C"]);
        assert_eq!(store.current_index(), 0);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("B"));
    }

    #[test]
    fn removing_last_current_track_clamps_to_new_last() {
        let mut store = store_with(&["A", "B", "C"]);
        store.select(2).expect("select");

        store.remove(2, now()).expect("remove");

        assert_eq!(visible_titles(&store), vec!["A", "B"]);
        assert_eq!(store.current_index(), 1);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("B"));
    }

    #[test]
    fn removing_current_mid_list_selects_slid_in_track() {
        let mut store = store_with(&["A", "B", "C"]);
        store.select(1).expect("select");
        let before = store.current_track_id();

        store.remove(1, now()).expect("remove");

        assert_eq!(store.current_index(), 1);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("C"));
        assert_ne!(store.current_track_id(), before, "selection changed");
    }

    #[test]
    fn removing_after_current_changes_nothing() {
        let mut store = store_with(&["A", "B", "C"]);
        store.select(1).expect("select");

        store.remove(2, now()).expect("remove");

        assert_eq!(store.current_index(), 1);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("B"));
    }

    #[test]
    fn removing_only_track_resets_cursor() {
        let mut store = store_with(&["A"]);
        let removed = store.remove(0, now()).expect("remove");
        assert_eq!(removed.deleted_at, Some(now()));
        assert!(store.is_empty());
        assert_eq!(store.current_index(), 0);
        assert_eq!(store.current_track_id(), None);
    }

    #[test]
    fn remove_rejects_stale_index() {
        let mut store = store_with(&["A"]);
        assert_eq!(
            store.remove(3, now()),
            Err(PlayerError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_all_stamps_and_drains_in_visible_order() {
        let mut store = store_with(&["b", "a", "c"]);
        store.set_sort_mode(SortMode::Title);

        let removed = store.remove_all(now());

        let titles: Vec<&str> = removed.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(removed.iter().all(|t| t.deleted_at == Some(now())));
        assert!(store.is_empty());
        assert_eq!(store.current_index(), 0);
    }

    #[test]
    fn reorder_moves_a_single_track() {
        let mut store = store_with(&["A", "B", "C", "D"]);
        store.reorder(0, 2).expect("reorder");
        assert_eq!(visible_titles(&store), vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn reorder_remaps_cursor_when_current_moves() {
        let mut store = store_with(&["A", "B", "C"]);
        store.select(0).expect("select");
        store.reorder(0, 2).expect("reorder");
        assert_eq!(store.current_index(), 2);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("A"));
    }

    #[test]
    fn reorder_shifts_cursor_down_when_move_crosses_it_forward() {
        let mut store = store_with(&["A", "B", "C", "D"]);
        store.select(2).expect("select");

        store.reorder(0, 3).expect("reorder");

        assert_eq!(visible_titles(&store), vec!["B", "C", "D", "A"]);
        assert_eq!(store.current_index(), 1);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("C"));
    }

    #[test]
    fn reorder_shifts_cursor_up_when_move_crosses_it_backward() {
        let mut store = store_with(&["A", "B", "C", "D"]);
        store.select(1).expect("select");

        store.reorder(3, 0).expect("reorder");

        assert_eq!(visible_titles(&store), vec!["D", "A", "B", "C"]);
        assert_eq!(store.current_index(), 2);
        assert_eq!(store.current_track().map(|t| t.title.as_str()), Some("B"));
    }

    #[test]
    fn reorder_is_locked_outside_custom_mode() {
        let mut store = store_with(&["b", "a"]);
        store.set_sort_mode(SortMode::Title);

        assert_eq!(store.reorder(0, 1), Err(PlayerError::SortModeLocked));
        assert_eq!(visible_titles(&store), vec!["a", "b"]);
    }

    #[test]
    fn title_sort_is_case_and_accent_insensitive() {
        let mut store = store_with(&["Zulu", "éclair", "alpha", "Echo"]);
        store.set_sort_mode(SortMode::Title);
        assert_eq!(
            visible_titles(&store),
            vec!["alpha", "Echo", "éclair", "Zulu"]
        );
    }

    #[test]
    fn upload_sort_follows_import_order() {
        let mut store = store_with(&["c", "a", "b"]);
        store.set_sort_mode(SortMode::Title);
        store.set_sort_mode(SortMode::UploadTime);
        assert_eq!(visible_titles(&store), vec!["c", "a", "b"]);
    }

    #[test]
    fn sorting_keeps_current_track_by_identity() {
        let mut store = store_with(&["Zulu", "alpha", "Mike"]);
        store.select(0).expect("select");
        let id = store.current_track_id();

        store.set_sort_mode(SortMode::Title);

        assert_eq!(store.current_track_id(), id);
        assert_eq!(store.current_index(), 2);
    }

    #[test]
    fn returning_to_custom_restores_manual_arrangement() {
        let mut store = store_with(&["C", "A", "B"]);
        store.reorder(2, 0).expect("reorder");
        let custom = visible_titles(&store);
        assert_eq!(custom, vec!["B", "C", "A"]);

        store.set_sort_mode(SortMode::Title);
        assert_eq!(visible_titles(&store), vec!["A", "B", "C"]);

        store.set_sort_mode(SortMode::Custom);
        assert_eq!(visible_titles(&store), custom);
    }

    #[test]
    fn adds_in_sorted_mode_append_to_view_and_custom_order() {
        let mut store = store_with(&["b", "c"]);
        store.set_sort_mode(SortMode::Title);
        store.add(vec![candidate("a")]);

        assert_eq!(visible_titles(&store), vec!["b", "c", "a"]);

        store.set_sort_mode(SortMode::Custom);
        assert_eq!(visible_titles(&store), vec!["b", "c", "a"]);
    }

    #[test]
    fn restore_appends_and_clears_deleted_at() {
        let mut store = store_with(&["A", "B"]);
        let removed = store.remove(0, now()).expect("remove");
        assert!(removed.deleted_at.is_some());
        let order = removed.upload_order;

        store.restore(removed);

        assert_eq!(visible_titles(&store), vec!["B", "A"]);
        let restored = store.track_at(1).expect("restored");
        assert_eq!(restored.deleted_at, None);
        assert_eq!(restored.upload_order, order);
    }

    #[test]
    fn select_rejects_out_of_range() {
        let mut store = store_with(&["A"]);
        assert_eq!(
            store.select(1),
            Err(PlayerError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn mutations_emit_notifications() {
        let mut store = PlaylistStore::new();
        store.add(vec![candidate("a")]);
        let events = store.take_notifications();
        assert!(events.contains(&Notification::PlaylistChanged));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, Notification::CurrentTrackChanged { id: Some(_) }))
        );
        assert!(store.take_notifications().is_empty());
    }

    proptest::proptest! {
        #[test]
        fn invariants_hold_after_random_ops(
            ops in proptest::collection::vec((0u8..6, 0usize..8, 0usize..8), 1..200),
        ) {
            let mut store = store_with(&["a", "b", "c", "d"]);

            for (op, first, second) in ops {
                match op {
                    0 => {
                        store.add(vec![candidate("x")]);
                    }
                    1 => {
                        let _ = store.remove(first, now());
                    }
                    2 => {
                        let _ = store.reorder(first, second);
                    }
                    3 => {
                        let mode = match first % 4 {
                            0 => SortMode::Custom,
                            1 => SortMode::Title,
                            2 => SortMode::Artist,
                            _ => SortMode::UploadTime,
                        };
                        store.set_sort_mode(mode);
                    }
                    4 => {
                        let _ = store.select(first);
                    }
                    _ => {
                        if let Ok(track) = store.remove(first, now()) {
                            store.restore(track);
                        }
                    }
                }

                if store.is_empty() {
                    prop_assert_eq!(store.current_index(), 0);
                } else {
                    prop_assert!(store.current_index() < store.len());
                    prop_assert!(store.current_track().is_some());
                }

                // The view is a permutation of the stored tracks.
                prop_assert_eq!(store.tracks_in_view().count(), store.len());
                let ids: HashSet<TrackId> =
                    store.tracks_in_view().map(|t| t.id).collect();
                prop_assert_eq!(ids.len(), store.len());
            }
        }
    }
}
