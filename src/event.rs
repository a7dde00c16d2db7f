//! Playback notifications.

/// Events raised by a [`SoundInstance`](crate::SoundInstance).
///
/// Queued on the instance and drained by the owner via
/// [`poll_event`](crate::SoundInstance::poll_event). Delivery through a
/// drainable queue keeps the single-threaded cooperative model free of
/// re-entrant callbacks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InstanceEvent {
    /// Playback actually began (decode, if any, completed and nodes are live).
    Succeeded,
    /// A loop boundary was crossed and the look-ahead node was promoted.
    Looped,
    /// Natural end of playback with no loops remaining.
    Complete,
    /// The play attempt failed terminally (decode rejection).
    Failed,
}
