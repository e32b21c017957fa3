#![no_main]

use libfuzzer_sys::fuzz_target;
use playdeck::model::{NewTrack, SortMode, TrackId, TrackSource};
use playdeck::playlist::PlaylistStore;
use playdeck::trash::TrashStore;
use std::collections::HashSet;
use time::OffsetDateTime;

fuzz_target!(|data: &[u8]| {
    let mut playlist = PlaylistStore::new();
    let mut trash = TrashStore::new();
    let now = OffsetDateTime::from_unix_timestamp(1_754_000_000).expect("timestamp");

    playlist.add(
        (0..4)
            .map(|n| NewTrack {
                title: format!("track_{n}"),
                artist: String::from("artist"),
                album: String::from("album"),
                source: Some(TrackSource::Url(format!("https://tracks.test/{n}.mp3"))),
                cover: None,
            })
            .collect(),
    );

    let mut bytes = data.iter().copied();
    while let Some(op) = bytes.next() {
        let arg = bytes.next().unwrap_or(0) as usize;
        match op % 8 {
            0 => {
                playlist.add(vec![NewTrack {
                    title: format!("extra_{arg}"),
                    artist: String::from("artist"),
                    album: String::from("album"),
                    source: Some(TrackSource::Url(format!("https://tracks.test/x{arg}.mp3"))),
                    cover: None,
                }]);
            }
            1 => {
                if let Ok(track) = playlist.remove(arg, now) {
                    trash.add(vec![track]);
                }
            }
            2 => {
                let _ = playlist.reorder(arg % 8, arg / 8 % 8);
            }
            3 => {
                let mode = match arg % 4 {
                    0 => SortMode::Custom,
                    1 => SortMode::Title,
                    2 => SortMode::Artist,
                    _ => SortMode::UploadTime,
                };
                playlist.set_sort_mode(mode);
            }
            4 => {
                let _ = playlist.select(arg);
            }
            5 => {
                if let Ok(track) = trash.restore(arg) {
                    playlist.restore(track);
                }
            }
            6 => {
                for track in trash.restore_all() {
                    playlist.restore(track);
                }
            }
            _ => {
                let _ = trash.sweep_expired(now);
            }
        }

        if playlist.is_empty() {
            assert_eq!(playlist.current_index(), 0);
        } else {
            assert!(playlist.current_index() < playlist.len());
            assert!(playlist.current_track().is_some());
        }
        assert_eq!(playlist.tracks_in_view().count(), playlist.len());

        let mut ids: Vec<TrackId> = playlist.tracks_in_view().map(|t| t.id).collect();
        ids.extend(trash.tracks().iter().map(|t| t.id));
        let unique: HashSet<TrackId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }
});
