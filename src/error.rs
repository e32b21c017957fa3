use thiserror::Error;

/// Conditions the stores and the controller can signal. None of them leave
/// any store in an inconsistent state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("track has no audio payload")]
    InvalidTrack,

    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("playlist can only be reordered in custom sort mode")]
    SortModeLocked,

    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}
