use crate::model::TrackSource;
use anyhow::Result;

/// The opaque playback capability. The real implementation sits outside the
/// core (an `<audio>` element behind wasm glue, a native output stream, a
/// test double); the controller only ever talks through this seam.
///
/// Duration/position/ended travel the other way: the embedder feeds them
/// into `PlaybackController::on_duration_known`, `on_position_changed` and
/// `on_ended`.
pub trait AudioBackend {
    /// Points the capability at a track's audio bytes. Does not play.
    fn set_source(&mut self, source: &TrackSource);
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: u8);
    /// Called when a track with a session-scoped source is permanently
    /// destroyed. Backends with nothing to free can ignore it.
    fn release_source(&mut self, _source: &TrackSource) {}
}

/// Backend that swallows everything while remembering what it was told.
/// Serves headless runs and doubles as the test backend.
#[derive(Debug)]
pub struct NullAudioBackend {
    source: Option<TrackSource>,
    playing: bool,
    volume: u8,
    position: f64,
    released: Vec<TrackSource>,
}

impl NullAudioBackend {
    pub fn new() -> Self {
        Self {
            source: None,
            playing: false,
            volume: 100,
            position: 0.0,
            released: Vec::new(),
        }
    }

    pub fn current_source(&self) -> Option<&TrackSource> {
        self.source.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn released(&self) -> &[TrackSource] {
        &self.released
    }
}

impl AudioBackend for NullAudioBackend {
    fn set_source(&mut self, source: &TrackSource) {
        self.source = Some(source.clone());
        self.position = 0.0;
    }

    fn play(&mut self) -> Result<()> {
        match &self.source {
            None => anyhow::bail!("no source loaded"),
            Some(TrackSource::NeedsReimport) => anyhow::bail!("source needs re-import"),
            Some(_) => {
                self.playing = true;
                Ok(())
            }
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds;
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
    }

    fn release_source(&mut self, source: &TrackSource) {
        self.released.push(source.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionHandle;

    #[test]
    fn play_requires_a_loaded_source() {
        let mut backend = NullAudioBackend::new();
        assert!(backend.play().is_err());

        backend.set_source(&TrackSource::Session(SessionHandle(1)));
        assert!(backend.play().is_ok());
        assert!(backend.is_playing());
    }

    #[test]
    fn needs_reimport_source_is_unplayable() {
        let mut backend = NullAudioBackend::new();
        backend.set_source(&TrackSource::NeedsReimport);
        assert!(backend.play().is_err());
        assert!(!backend.is_playing());
    }
}
