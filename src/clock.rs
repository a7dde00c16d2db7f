//! Clock arithmetic for playback position.
//!
//! The position of a playing sound is never stored while it plays; it is
//! derived from the host clock: `position = now - playback_start`. The
//! playback-start timestamp is rebased on every resume, seek, and
//! loop-boundary promotion.

/// Derives playback position from a monotonic clock.
///
/// `playback_start` is the clock time at which position zero of the current
/// playback window would have been audible. It is only meaningful while the
/// owning instance is playing.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaybackClock {
    playback_start: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock time corresponding to position zero.
    #[inline]
    pub fn playback_start(&self) -> f64 {
        self.playback_start
    }

    /// Rebase so that `position_secs` is the position at clock time `now`.
    #[inline]
    pub fn rebase(&mut self, now: f64, position_secs: f64) {
        self.playback_start = now - position_secs;
    }

    /// Rebase directly to a known window start (loop promotion uses the
    /// promoted node's recorded scheduled start, not the current clock).
    #[inline]
    pub fn set_playback_start(&mut self, start: f64) {
        self.playback_start = start;
    }

    /// Current position in milliseconds at clock time `now`.
    #[inline]
    pub fn position_ms(&self, now: f64) -> f64 {
        (now - self.playback_start) * 1000.0
    }
}
