use crate::audio::AudioBackend;
use crate::error::PlayerError;
use crate::model::Notification;
use crate::playlist::PlaylistStore;
use rand::RngExt;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Paused,
    Playing,
}

/// Transport state machine. Owns play/pause/shuffle/repeat/volume and
/// mirrors position/duration reported by the capability; the track list
/// itself stays in the playlist store.
#[derive(Debug)]
pub struct PlaybackController {
    state: PlaybackState,
    shuffled: bool,
    repeating: bool,
    volume: u8,
    duration: Option<f64>,
    position: f64,
    rng: SmallRng,
    pending: Vec<Notification>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            shuffled: false,
            repeating: false,
            volume: 100,
            duration: None,
            position: 0.0,
            rng: SmallRng::from_rng(&mut rand::rng()),
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    /// Play/pause. A refused play leaves the state where it was and surfaces
    /// as `PlaybackFailed`.
    pub fn toggle(
        &mut self,
        playlist: &PlaylistStore,
        audio: &mut dyn AudioBackend,
    ) -> Result<(), PlayerError> {
        match self.state {
            PlaybackState::Playing => {
                audio.pause();
                self.state = PlaybackState::Paused;
                self.notify();
                Ok(())
            }
            PlaybackState::Stopped | PlaybackState::Paused => {
                if playlist.is_empty() {
                    return Err(PlayerError::PlaybackFailed(String::from(
                        "playlist is empty",
                    )));
                }
                match audio.play() {
                    Ok(()) => {
                        self.state = PlaybackState::Playing;
                        self.notify();
                        Ok(())
                    }
                    Err(err) => Err(PlayerError::PlaybackFailed(format!("{err:#}"))),
                }
            }
        }
    }

    /// Points the capability at the playlist's current track. Does not start
    /// playback, but re-issues a play when one is already in flight so a
    /// selection change keeps sounding.
    pub fn load_current(
        &mut self,
        playlist: &PlaylistStore,
        audio: &mut dyn AudioBackend,
    ) -> Result<(), PlayerError> {
        let Some(track) = playlist.current_track() else {
            audio.pause();
            self.state = PlaybackState::Stopped;
            self.duration = None;
            self.position = 0.0;
            self.notify();
            return Ok(());
        };

        audio.set_source(&track.source);
        self.duration = None;
        self.position = 0.0;
        self.notify();
        if self.state == PlaybackState::Playing
            && let Err(err) = audio.play()
        {
            self.state = PlaybackState::Paused;
            self.notify();
            return Err(PlayerError::PlaybackFailed(format!("{err:#}")));
        }
        Ok(())
    }

    /// Advance. Sequential mode wraps to the top; shuffle picks a uniformly
    /// random other track (a single-track list degrades to repeating it).
    pub fn next(
        &mut self,
        playlist: &mut PlaylistStore,
        audio: &mut dyn AudioBackend,
    ) -> Result<(), PlayerError> {
        if playlist.is_empty() {
            return self.load_current(playlist, audio);
        }
        let len = playlist.len();
        let current = playlist.current_index();
        let target = if self.shuffled {
            self.shuffle_target(len, current)
        } else {
            (current + 1) % len
        };
        playlist.select(target)?;
        self.load_current(playlist, audio)
    }

    /// Step back one track, wrapping to the end. Shuffle is ignored here;
    /// "previous" is always sequential.
    pub fn previous(
        &mut self,
        playlist: &mut PlaylistStore,
        audio: &mut dyn AudioBackend,
    ) -> Result<(), PlayerError> {
        if playlist.is_empty() {
            return self.load_current(playlist, audio);
        }
        let len = playlist.len();
        let target = (playlist.current_index() + len - 1) % len;
        playlist.select(target)?;
        self.load_current(playlist, audio)
    }

    /// Capability reported the track finished: replay it under repeat,
    /// otherwise advance.
    pub fn on_ended(
        &mut self,
        playlist: &mut PlaylistStore,
        audio: &mut dyn AudioBackend,
    ) -> Result<(), PlayerError> {
        if self.repeating && !playlist.is_empty() {
            self.position = 0.0;
            audio.seek(0.0);
            match audio.play() {
                Ok(()) => {
                    self.state = PlaybackState::Playing;
                    self.notify();
                    Ok(())
                }
                Err(err) => {
                    self.state = PlaybackState::Paused;
                    self.notify();
                    Err(PlayerError::PlaybackFailed(format!("{err:#}")))
                }
            }
        } else {
            self.next(playlist, audio)
        }
    }

    /// Clamps to 0..=100 and forwards; out-of-range input is never an error.
    pub fn set_volume(&mut self, audio: &mut dyn AudioBackend, volume: i32) {
        let clamped = volume.clamp(0, 100) as u8;
        self.volume = clamped;
        audio.set_volume(clamped);
        self.notify();
    }

    pub fn step_volume(&mut self, audio: &mut dyn AudioBackend, delta: i32) {
        self.set_volume(audio, i32::from(self.volume) + delta);
    }

    /// Clamps to the known duration and forwards. An unknown duration only
    /// clamps the lower bound.
    pub fn seek(&mut self, audio: &mut dyn AudioBackend, seconds: f64) {
        let mut target = if seconds.is_finite() { seconds } else { 0.0 };
        target = target.max(0.0);
        if let Some(duration) = self.duration {
            target = target.min(duration);
        }
        self.position = target;
        audio.seek(target);
        self.notify();
    }

    pub fn step_seek(&mut self, audio: &mut dyn AudioBackend, delta: f64) {
        self.seek(audio, self.position + delta);
    }

    pub fn toggle_shuffle(&mut self) {
        self.shuffled = !self.shuffled;
        self.notify();
    }

    pub fn toggle_repeat(&mut self) {
        self.repeating = !self.repeating;
        self.notify();
    }

    pub fn on_duration_known(&mut self, seconds: f64) {
        self.duration = (seconds.is_finite() && seconds >= 0.0).then_some(seconds);
        self.notify();
    }

    /// Position ticks arrive continuously; they are mirrored without a
    /// notification, the UI polls `position()` when drawing.
    pub fn on_position_changed(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.position = seconds;
        }
    }

    fn shuffle_target(&mut self, len: usize, current: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        loop {
            let candidate = self.rng.random_range(0..len);
            if candidate != current {
                return candidate;
            }
        }
    }

    fn notify(&mut self) {
        self.pending.push(Notification::PlaybackChanged);
    }
}

/// "m:ss" for the transport display; anything unknowable renders as 0:00.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return String::from("0:00");
    }
    let total = seconds as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
