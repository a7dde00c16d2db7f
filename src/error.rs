//! Error taxonomy for play attempts.
//!
//! Decode and node-graph errors are terminal for the current play attempt -
//! never silently retried. The caller re-invokes `play()` to retry. There are
//! no partial-success states: a node is either fully connected and scheduled
//! or fully absent.

use thiserror::Error;

use crate::host::DecodeError;

/// Why a play attempt failed.
#[derive(Clone, Debug, Error)]
pub enum PlayError {
    /// `play()` was invoked with no available buffer, neither encoded nor
    /// decoded. Immediate failure, no state mutation.
    #[error("no audio data available for playback")]
    NoSource,
    /// Asynchronous decode rejected the input. The instance is in the
    /// `Failed` state and a `Failed` event has been raised.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}
