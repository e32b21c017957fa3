use crate::model::{Track, TrackId, TrackSource};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;

const APP_DIR: &str = "playdeck";

pub const PLAYLIST_KEY: &str = "playlist";
pub const TRASH_KEY: &str = "trash";

/// Roughly what a browser's local storage grants an origin.
pub const STORAGE_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

/// Opaque, capacity-bounded key-value blob store. The core only ever saves
/// and loads whole records; whatever sits behind this (local storage, disk,
/// memory) is not its business.
pub trait BlobStore {
    fn save(&mut self, key: &str, blob: &str) -> Result<()>;
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn used_bytes(&self) -> u64;
    fn capacity_bytes(&self) -> u64 {
        STORAGE_CAPACITY_BYTES
    }
}

/// In-memory store with a quota. Clones share the same backing map, the way
/// every script on a page shares one local storage.
#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
    capacity: u64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_capacity(STORAGE_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryBlobStore {
    fn save(&mut self, key: &str, blob: &str) -> Result<()> {
        let mut entries = self.entries();
        let others: u64 = entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        let needed = others + (key.len() + blob.len()) as u64;
        if needed > self.capacity {
            anyhow::bail!(
                "storage quota exceeded: {needed} of {} bytes",
                self.capacity
            );
        }
        entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn used_bytes(&self) -> u64 {
        self.entries()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity
    }
}

pub fn data_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("PLAYDECK_DATA_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

/// One JSON file per record under the data dir.
#[derive(Debug)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn open() -> Result<Self> {
        Ok(Self { root: data_root()? })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl BlobStore for FileBlobStore {
    fn save(&mut self, key: &str, blob: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.record_path(key);
        fs::write(&path, blob).with_context(|| format!("failed to write {}", path.display()))
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let blob = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(blob))
    }

    fn used_bytes(&self) -> u64 {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return 0;
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }
}

/// Wire form of a track. A session-scoped source cannot cross a save/load
/// cycle; it serializes as no source plus the needs-reimport flag instead of
/// failing the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTrack {
    id: TrackId,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    needs_reimport: bool,
    #[serde(default)]
    cover: Option<String>,
    upload_order: u64,
    #[serde(default)]
    deleted_at: Option<i64>,
}

impl From<&Track> for StoredTrack {
    fn from(track: &Track) -> Self {
        let (source, needs_reimport) = match &track.source {
            TrackSource::Url(url) => (Some(url.clone()), false),
            TrackSource::Session(_) | TrackSource::NeedsReimport => (None, true),
        };
        Self {
            id: track.id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            source,
            needs_reimport,
            cover: track.cover.clone(),
            upload_order: track.upload_order,
            deleted_at: track.deleted_at.map(OffsetDateTime::unix_timestamp),
        }
    }
}

impl From<StoredTrack> for Track {
    fn from(stored: StoredTrack) -> Self {
        let source = match (stored.source, stored.needs_reimport) {
            (Some(url), false) => TrackSource::Url(url),
            _ => TrackSource::NeedsReimport,
        };
        Self {
            id: stored.id,
            title: stored.title,
            artist: stored.artist,
            album: stored.album,
            source,
            cover: stored.cover,
            upload_order: stored.upload_order,
            deleted_at: stored
                .deleted_at
                .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok()),
        }
    }
}

pub fn save_tracks(store: &mut dyn BlobStore, key: &str, tracks: &[Track]) -> Result<()> {
    let stored: Vec<StoredTrack> = tracks.iter().map(StoredTrack::from).collect();
    let blob = serde_json::to_string(&stored)?;
    store
        .save(key, &blob)
        .with_context(|| format!("failed to write {key} record"))
}

/// `Ok(None)` means the record has never been written; a present but
/// unparsable record is an error the caller turns into a fallback.
pub fn load_tracks(store: &dyn BlobStore, key: &str) -> Result<Option<Vec<Track>>> {
    let Some(blob) = store
        .load(key)
        .with_context(|| format!("failed to read {key} record"))?
    else {
        return Ok(None);
    };
    let stored: Vec<StoredTrack> = serde_json::from_str(&blob)
        .with_context(|| format!("failed to parse {key} record"))?;
    Ok(Some(stored.into_iter().map(Track::from).collect()))
}

/// The playlist a fresh install starts with.
pub fn seed_tracks() -> Vec<Track> {
    let seeds = [
        (
            "Blinding Lights",
            "The Weeknd",
            "After Hours",
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3",
        ),
        (
            "Save Your Tears",
            "The Weeknd",
            "After Hours",
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-2.mp3",
        ),
        (
            "Levitating",
            "Dua Lipa",
            "Future Nostalgia",
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-3.mp3",
        ),
    ];

    seeds
        .into_iter()
        .enumerate()
        .map(|(index, (title, artist, album, url))| Track {
            id: TrackId::new(),
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            source: TrackSource::Url(url.to_string()),
            cover: None,
            upload_order: index as u64 + 1,
            deleted_at: None,
        })
        .collect()
}
