//! The seam to the external audio subsystem.
//!
//! Everything spielwerk needs from the outside world goes through [`AudioHost`]:
//! stage and source creation, scheduled starts, asynchronous decode, a
//! monotonic clock, and fire-once cancellable timers. The engine never talks
//! to a device, a mixer, or a decoder directly.
//!
//! # Deferred completions
//!
//! The host runs a single logical thread. Timers and decodes complete later,
//! as [`HostEvent`]s surfaced by [`AudioHost::poll`]; the owning layer drains
//! them and routes each into
//! [`SoundInstance::handle_host_event`](crate::SoundInstance::handle_host_event).
//! There is no true parallelism, only interleaving - no locks are required on
//! either side of the seam.

use std::sync::Arc;

use thiserror::Error;

/// Identifier for a source node minted by the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SourceId(pub(crate) u64);

/// Identifier for a gain or pan stage minted by the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StageId(pub(crate) u64);

/// Identifier for a scheduled fire-once timer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimerId(pub(crate) u64);

/// Identifier for an in-flight decode request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DecodeId(pub(crate) u64);

/// The host does not accept scratch-buffer substitution on this source.
///
/// Some hosts leak sample data unless a zero-length buffer is assigned to a
/// source before release; others reject the assignment outright. Callers
/// swallow this error - it has no bearing on the correctness of an
/// already-stopped node.
#[derive(Debug, Error)]
#[error("host rejected scratch buffer substitution")]
pub struct ScratchRejected;

/// Why a decode attempt failed. Terminal for the play attempt that issued it.
#[derive(Clone, Debug, Error)]
pub enum DecodeError {
    #[error("no bytes to decode")]
    EmptySource,
    #[error("unrecognized or unsupported encoding")]
    UnsupportedFormat,
    #[error("corrupt audio data: {0}")]
    Corrupt(String),
}

/// A deferred completion surfaced by [`AudioHost::poll`].
#[derive(Clone, Debug)]
pub enum HostEvent<B> {
    /// A timer armed via [`AudioHost::schedule_timer`] came due.
    TimerFired(TimerId),
    /// A decode started via [`AudioHost::begin_decode`] finished.
    DecodeFinished(DecodeId, Result<B, DecodeError>),
}

/// The external audio subsystem, as consumed by [`SoundInstance`](crate::SoundInstance).
///
/// Stage and source handles are plain copyable ids; the decoded sample buffer
/// type is host-defined. Implementations in this crate:
/// [`OfflineHost`](crate::hosts::OfflineHost) (deterministic, manually
/// advanced clock) and [`GraphHost`](crate::hosts::GraphHost) (a real
/// audio graph with optional device output).
///
/// # Contract notes
///
/// - [`now`](Self::now) is monotonic, in seconds. All scheduling math in the
///   engine is relative to it.
/// - [`start_source`](Self::start_source): if `when` is already in the past,
///   the source starts immediately *mid-buffer* (catch-up), never from the
///   beginning of its window.
/// - [`schedule_timer`](Self::schedule_timer) is fire-once. A timer cancelled
///   via [`cancel_timer`](Self::cancel_timer) must never appear in a later
///   [`poll`](Self::poll).
/// - [`begin_decode`](Self::begin_decode) is a single attempt; the host never
///   retries on its own.
pub trait AudioHost {
    /// Decoded sample buffer handle. Cloning must be cheap (shared data).
    type Buffer: Clone;

    /// Monotonic clock, in seconds.
    fn now(&self) -> f64;

    /// Duration of a decoded buffer, in seconds.
    fn buffer_duration(&self, buffer: &Self::Buffer) -> f64;

    /// A zero-length buffer for scratch substitution during node teardown.
    fn scratch_buffer(&self) -> Self::Buffer;

    fn create_gain(&mut self) -> StageId;
    fn create_pan(&mut self) -> StageId;
    fn set_gain(&mut self, stage: StageId, value: f32);
    fn set_pan(&mut self, stage: StageId, value: f32);

    /// Connect the output of `from` to the input of `to`.
    fn connect_stages(&mut self, from: StageId, to: StageId);
    /// Connect a stage to the shared output destination.
    fn connect_to_output(&mut self, stage: StageId);
    /// Drop all outgoing connections of a stage. Idempotent.
    fn disconnect_stage(&mut self, stage: StageId);
    /// Release a stage entirely. The id is dead afterwards.
    fn release_stage(&mut self, stage: StageId);

    /// Create a source node bound to a decoded buffer. Not yet connected or
    /// started.
    fn create_source(&mut self, buffer: &Self::Buffer) -> SourceId;
    fn connect_source(&mut self, source: SourceId, to: StageId);
    /// Schedule the source to start emitting at clock time `when`, playing
    /// the buffer from `offset` seconds for `duration` seconds.
    fn start_source(&mut self, source: SourceId, when: f64, offset: f64, duration: f64);
    /// Stop emission immediately.
    fn stop_source(&mut self, source: SourceId);
    /// Swap the source's buffer, normally for the scratch buffer just before
    /// release.
    fn replace_source_buffer(
        &mut self,
        source: SourceId,
        buffer: &Self::Buffer,
    ) -> Result<(), ScratchRejected>;
    /// Drop all outgoing connections of a source. Idempotent.
    fn disconnect_source(&mut self, source: SourceId);
    /// Release a source entirely. The id is dead afterwards.
    fn release_source(&mut self, source: SourceId);

    /// Kick off an asynchronous decode of encoded bytes. The result arrives
    /// later as [`HostEvent::DecodeFinished`].
    fn begin_decode(&mut self, bytes: Arc<[u8]>) -> DecodeId;

    /// Arm a fire-once timer `delay_ms` milliseconds from now.
    fn schedule_timer(&mut self, delay_ms: f64) -> TimerId;
    /// Cancel a pending timer. Cancelling an already-fired or unknown timer
    /// is a no-op.
    fn cancel_timer(&mut self, timer: TimerId);

    /// Drain completions that came due, in time order.
    fn poll(&mut self) -> Vec<HostEvent<Self::Buffer>>;
}
