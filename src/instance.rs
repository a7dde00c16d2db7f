//! The sound instance - one playing, paused, or stopped occurrence of a sound.
//!
//! A [`SoundInstance`] owns the graph nodes behind a single sound (source →
//! pan → gain → output), schedules loop boundaries with look-ahead against
//! the host clock, and reconciles transport operations with the graph.
//!
//! # Look-ahead looping
//!
//! When a node starts playing and looping is enabled, the *next* iteration's
//! node is created and scheduled on the graph immediately, one full duration
//! after the current node's window start. The completion timer only
//! bookkeeps: by the time it fires, the graph's own clock has already made
//! the switch-over, so timer jitter can't produce an audible gap or overlap.
//! The cost is that loop *events* may lag the audible boundary slightly.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::clock::PlaybackClock;
use crate::error::PlayError;
use crate::event::InstanceEvent;
use crate::host::{AudioHost, DecodeError, DecodeId, HostEvent, SourceId, StageId, TimerId};
use crate::source_data::SourceData;

/// Transport state of a [`SoundInstance`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlayState {
    /// Created, never played.
    Initializing,
    /// A play request is waiting on asynchronous decode.
    AwaitingDecode,
    Playing,
    Paused,
    /// Stopped explicitly or played to natural completion. Re-playable.
    Stopped,
    /// The last play attempt's decode was rejected. Re-playable.
    Failed,
}

/// Parameters applied when playback starts.
///
/// ```
/// # use spielwerk::PlayProps;
/// let props = PlayProps::default().loops(2).volume(0.8).pan(-0.25);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct PlayProps {
    /// Initial playback position within the window, in milliseconds.
    pub offset_ms: f64,
    /// `0` = no loop, `n > 0` = n extra passes, negative = loop forever.
    pub loop_count: i32,
    /// `0.0` to `1.0`.
    pub volume: f32,
    /// `-1.0` (hard left) to `1.0` (hard right).
    pub pan: f32,
    /// Segment playback: where the window starts inside the source.
    pub start_time_ms: Option<f64>,
    /// Segment playback: explicit window length. Disables later reversion of
    /// the decoded data to its encoded form.
    pub duration_ms: Option<f64>,
}

impl Default for PlayProps {
    fn default() -> Self {
        Self {
            offset_ms: 0.0,
            loop_count: 0,
            volume: 1.0,
            pan: 0.0,
            start_time_ms: None,
            duration_ms: None,
        }
    }
}

impl PlayProps {
    pub fn offset_ms(mut self, ms: f64) -> Self {
        self.offset_ms = ms;
        self
    }

    pub fn loops(mut self, count: i32) -> Self {
        self.loop_count = count;
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn pan(mut self, pan: f32) -> Self {
        self.pan = pan;
        self
    }

    /// Play only `[start_ms, start_ms + duration_ms)` of the source.
    pub fn window(mut self, start_ms: f64, duration_ms: f64) -> Self {
        self.start_time_ms = Some(start_ms);
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// A running source node together with its recorded scheduled start.
///
/// The start time is what look-ahead math is computed from at loop
/// promotion - never the current clock, so a late callback can't drift the
/// position.
#[derive(Clone, Copy, Debug)]
pub struct ScheduledNode {
    pub source: SourceId,
    /// Clock time at which this node's window begins (or began).
    pub start_time: f64,
}

/// One playing/paused/stopped occurrence of a sound.
///
/// Generic over the host so the same transport logic runs against the
/// deterministic [`OfflineHost`](crate::hosts::OfflineHost) in tests and a
/// real graph in production.
///
/// # Driving it
///
/// All operations take the host by `&mut`; deferred completions (decode,
/// completion timer) are routed in by the owner:
///
/// ```
/// use spielwerk::{hosts::OfflineHost, AudioHost, PlayProps, SoundInstance};
///
/// let mut host = OfflineHost::new(48_000);
/// let mut sound = SoundInstance::from_encoded(&mut host, vec![0u8; 9600]);
/// sound.play(&mut host, PlayProps::default()).unwrap();
///
/// loop {
///     host.advance(0.010);
///     for event in host.poll() {
///         sound.handle_host_event(&mut host, &event);
///     }
///     if sound.poll_event().is_some() {
///         break;
///     }
/// }
/// ```
pub struct SoundInstance<H: AudioHost> {
    state: PlayState,
    source: SourceData<H::Buffer>,

    /// Window start inside the source, for segment playback. Milliseconds.
    start_offset_ms: f64,
    /// Window length. `0.0` until known (derived from the buffer on decode
    /// unless set explicitly).
    duration_ms: f64,
    /// Whether the duration was requested explicitly (segment playback).
    explicit_duration: bool,
    /// Snapshotted position. Only authoritative while not playing; live
    /// position is derived from the clock.
    position_ms: f64,

    volume: f32,
    muted: bool,
    pan: f32,
    loop_count: i32,
    loops_remaining: i32,

    clock: PlaybackClock,
    gain: StageId,
    pan_stage: StageId,

    current: Option<ScheduledNode>,
    next: Option<ScheduledNode>,
    complete_timer: Option<TimerId>,
    pending_decode: Option<DecodeId>,
    /// Raise `Succeeded` on the next successful playback start (set by
    /// `play`, not by resume/seek rebuilds).
    pending_announce: bool,

    events: VecDeque<InstanceEvent>,
}

impl<H: AudioHost> SoundInstance<H> {
    /// Create an instance from raw encoded bytes. Decode happens lazily on
    /// first playback.
    pub fn from_encoded(host: &mut H, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_source(host, SourceData::Encoded(bytes.into()))
    }

    /// Create an instance from an already-decoded buffer.
    pub fn from_decoded(host: &mut H, buffer: H::Buffer) -> Self {
        let duration_ms = host.buffer_duration(&buffer) * 1000.0;
        let mut instance = Self::with_source(
            host,
            SourceData::Decoded {
                buffer,
                original: None,
            },
        );
        instance.duration_ms = duration_ms;
        instance
    }

    fn with_source(host: &mut H, source: SourceData<H::Buffer>) -> Self {
        let gain = host.create_gain();
        let pan_stage = host.create_pan();
        // Fixed chain: source nodes attach to pan, pan feeds gain, gain is
        // connected to the output only while audible.
        host.connect_stages(pan_stage, gain);
        host.set_pan(pan_stage, 0.0);

        Self {
            state: PlayState::Initializing,
            source,
            start_offset_ms: 0.0,
            duration_ms: 0.0,
            explicit_duration: false,
            position_ms: 0.0,
            volume: 1.0,
            muted: false,
            pan: 0.0,
            loop_count: 0,
            loops_remaining: 0,
            clock: PlaybackClock::new(),
            gain,
            pan_stage,
            current: None,
            next: None,
            complete_timer: None,
            pending_decode: None,
            pending_announce: false,
            events: VecDeque::new(),
        }
    }

    // ------------------------------------------------------------------
    // Transport operations
    // ------------------------------------------------------------------

    /// Start playback with the given parameters.
    ///
    /// If the source is already decoded the outcome is synchronous: nodes are
    /// live and a `Succeeded` event is queued on return. Otherwise decode is
    /// kicked off, the instance enters `AwaitingDecode`, and success or
    /// failure arrives later through [`handle_host_event`](Self::handle_host_event).
    ///
    /// Calling `play` on a live instance restarts it: existing nodes are
    /// reaped first.
    pub fn play(&mut self, host: &mut H, props: PlayProps) -> Result<(), PlayError> {
        if !self.source.is_available() {
            warn!("play rejected: no source data");
            return Err(PlayError::NoSource);
        }

        self.teardown_nodes(host);
        self.pending_decode = None;

        self.position_ms = props.offset_ms.max(0.0);
        self.loop_count = props.loop_count;
        self.loops_remaining = props.loop_count;
        self.volume = props.volume.clamp(0.0, 1.0);
        self.pan = props.pan.clamp(-1.0, 1.0);
        if let Some(start) = props.start_time_ms {
            self.start_offset_ms = start.max(0.0);
        }
        if let Some(duration) = props.duration_ms {
            self.duration_ms = duration.max(0.0);
            self.explicit_duration = true;
        }
        self.apply_volume(host);
        host.set_pan(self.pan_stage, self.pan);

        debug!(
            offset_ms = self.position_ms,
            loops = self.loop_count,
            "play"
        );
        self.pending_announce = true;
        self.handle_ready(host);
        Ok(())
    }

    /// Pause playback, snapshotting the position for a later resume.
    ///
    /// Reaps both the current and the look-ahead node, cancels the completion
    /// timer, and disconnects the gain stage from the output. The decoded
    /// buffer stays.
    pub fn pause(&mut self, host: &mut H) {
        if self.state != PlayState::Playing {
            trace!(state = ?self.state, "pause ignored");
            return;
        }
        self.position_ms = self.clock.position_ms(host.now());
        self.teardown_nodes(host);
        self.state = PlayState::Paused;
        debug!(position_ms = self.position_ms, "paused");
    }

    /// Resume from the snapshotted position.
    pub fn resume(&mut self, host: &mut H) {
        if self.state != PlayState::Paused {
            trace!(state = ?self.state, "resume ignored");
            return;
        }
        debug!(position_ms = self.position_ms, "resume");
        self.handle_ready(host);
    }

    /// Stop playback. Terminal until the next `play`; position resets to 0
    /// and reversible decoded data is dropped back to its encoded form.
    pub fn stop(&mut self, host: &mut H) {
        if self.state == PlayState::Stopped {
            return;
        }
        self.teardown_nodes(host);
        self.pending_decode = None;
        self.pending_announce = false;
        self.position_ms = 0.0;
        self.state = PlayState::Stopped;
        self.source.revert_on_cleanup();
        debug!("stopped");
    }

    /// Seek to a position, in milliseconds.
    ///
    /// While playing this tears down and rebuilds the node chain at the new
    /// position; while paused (or idle) only the snapshot moves.
    pub fn set_position(&mut self, host: &mut H, position_ms: f64) {
        self.position_ms = position_ms.max(0.0);
        if self.state == PlayState::Playing {
            self.current = Self::reap_node(host, self.current.take());
            self.next = Self::reap_node(host, self.next.take());
            self.cancel_completion_timer(host);
            self.start_playback(host);
        }
        trace!(position_ms = self.position_ms, "position set");
    }

    /// Override the playback window length, in milliseconds.
    ///
    /// Changes the node scheduling window, so while playing this costs a
    /// pause/resume cycle. Marks the instance as segment playback.
    pub fn set_duration(&mut self, host: &mut H, duration_ms: f64) {
        self.duration_ms = duration_ms.max(0.0);
        self.explicit_duration = true;
        self.rebuild_if_playing(host);
    }

    /// Move the playback window's start inside the source, in milliseconds.
    pub fn set_start_time(&mut self, host: &mut H, start_ms: f64) {
        self.start_offset_ms = start_ms.max(0.0);
        self.rebuild_if_playing(host);
    }

    /// Change the loop count (`0` none, negative infinite).
    ///
    /// Affects look-ahead scheduling, so while playing this costs a
    /// pause/resume cycle.
    pub fn set_loop(&mut self, host: &mut H, loop_count: i32) {
        self.loop_count = loop_count;
        self.loops_remaining = loop_count;
        self.rebuild_if_playing(host);
    }

    /// Set the volume (`0.0` to `1.0`). Applies live to the gain stage.
    pub fn set_volume(&mut self, host: &mut H, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume(host);
    }

    /// Mute or unmute without losing the volume setting.
    pub fn set_muted(&mut self, host: &mut H, muted: bool) {
        self.muted = muted;
        self.apply_volume(host);
    }

    /// Set the stereo pan (`-1.0` to `1.0`). Applies live to the pan stage.
    pub fn set_pan(&mut self, host: &mut H, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
        host.set_pan(self.pan_stage, self.pan);
    }

    /// Tear everything down and release the gain and pan stages.
    ///
    /// Consumes the instance; a destroyed instance cannot be touched again.
    pub fn destroy(mut self, host: &mut H) {
        self.teardown_nodes(host);
        host.disconnect_stage(self.pan_stage);
        host.release_stage(self.gain);
        host.release_stage(self.pan_stage);
        debug!("destroyed");
    }

    // ------------------------------------------------------------------
    // Deferred completions
    // ------------------------------------------------------------------

    /// Route a host completion into the instance.
    ///
    /// Returns `true` if the event belonged to this instance. Stale events -
    /// a timer cancelled elsewhere, a decode finishing after `stop` - are
    /// discarded rather than applied to torn-down state.
    pub fn handle_host_event(&mut self, host: &mut H, event: &HostEvent<H::Buffer>) -> bool {
        match event {
            HostEvent::TimerFired(id) => self.handle_completion_timer(host, *id),
            HostEvent::DecodeFinished(id, result) => {
                self.handle_decode_finished(host, *id, result.clone())
            }
        }
    }

    fn handle_completion_timer(&mut self, host: &mut H, id: TimerId) -> bool {
        if self.complete_timer != Some(id) {
            return false;
        }
        self.complete_timer = None;
        if self.state != PlayState::Playing {
            debug!(?id, "completion timer for torn-down playback discarded");
            return true;
        }
        if self.loops_remaining != 0 {
            self.handle_loop_boundary(host);
        } else {
            self.finish_playback(host);
        }
        true
    }

    fn handle_decode_finished(
        &mut self,
        host: &mut H,
        id: DecodeId,
        result: Result<H::Buffer, DecodeError>,
    ) -> bool {
        if self.pending_decode != Some(id) {
            // Late result for a playback that was stopped or superseded.
            // Applying it would resurrect torn-down state.
            return false;
        }
        self.pending_decode = None;
        match result {
            Err(err) => {
                warn!(%err, "decode failed");
                self.position_ms = 0.0;
                self.state = PlayState::Failed;
                self.events.push_back(InstanceEvent::Failed);
            }
            Ok(buffer) => {
                let segment = self.explicit_duration;
                self.source.adopt_decoded(buffer, segment);
                if !self.explicit_duration {
                    if let Some(buffer) = self.source.decoded() {
                        self.duration_ms = host.buffer_duration(buffer) * 1000.0;
                    }
                }
                trace!(duration_ms = self.duration_ms, segment, "decoded");
                self.start_playback(host);
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Node factory / reaper
    // ------------------------------------------------------------------

    /// Create, connect, and schedule a source node whose window begins at
    /// clock time `start_at`, entering the window `offset` seconds in.
    ///
    /// Assumes a decoded buffer - an undecoded source here is a caller bug,
    /// not an error path.
    fn spawn_node(
        &mut self,
        host: &mut H,
        buffer: &H::Buffer,
        start_at: f64,
        offset: f64,
    ) -> ScheduledNode {
        let duration = self.duration_ms * 0.001;
        let source = host.create_source(buffer);
        host.connect_source(source, self.pan_stage);
        host.start_source(
            source,
            start_at,
            self.start_offset_ms * 0.001 + offset,
            duration - offset,
        );
        trace!(?source, start_at, offset, "source node armed");
        ScheduledNode {
            source,
            start_time: start_at,
        }
    }

    /// Stop, scratch-substitute, disconnect, and release a node.
    ///
    /// Idempotent over `None`; always returns `None` so callers overwrite
    /// their slot uniformly. Scratch substitution failing is a host quirk and
    /// is swallowed.
    fn reap_node(host: &mut H, node: Option<ScheduledNode>) -> Option<ScheduledNode> {
        if let Some(node) = node {
            host.stop_source(node.source);
            let scratch = host.scratch_buffer();
            if host.replace_source_buffer(node.source, &scratch).is_err() {
                warn!(source = ?node.source, "scratch substitution rejected by host");
            }
            host.disconnect_source(node.source);
            host.release_source(node.source);
            trace!(source = ?node.source, "source node reaped");
        }
        None
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Decode-or-play: the common entry for play and resume.
    fn handle_ready(&mut self, host: &mut H) {
        if self.source.is_decoded() {
            self.start_playback(host);
        } else if let Some(bytes) = self.source.encoded() {
            let bytes = Arc::clone(bytes);
            self.pending_decode = Some(host.begin_decode(bytes));
            self.state = PlayState::AwaitingDecode;
            trace!(decode = ?self.pending_decode, "awaiting decode");
        }
    }

    /// Build the node chain at the current snapshot position and arm the
    /// completion timer (and the look-ahead node when looping).
    fn start_playback(&mut self, host: &mut H) {
        let Some(buffer) = self.source.decoded().cloned() else {
            debug_assert!(false, "start_playback requires a decoded buffer");
            return;
        };
        if self.duration_ms <= 0.0 {
            self.duration_ms = host.buffer_duration(&buffer) * 1000.0;
        }
        let duration = self.duration_ms * 0.001;
        let position = (self.position_ms * 0.001).clamp(0.0, duration);

        host.connect_to_output(self.gain);
        self.apply_volume(host);
        host.set_pan(self.pan_stage, self.pan);

        // Exactly one current node at a time.
        self.current = Self::reap_node(host, self.current.take());
        self.next = Self::reap_node(host, self.next.take());

        let now = host.now();
        self.clock.rebase(now, position);
        self.current = Some(self.spawn_node(host, &buffer, now, position));

        self.cancel_completion_timer(host);
        self.complete_timer = Some(host.schedule_timer((duration - position) * 1000.0));

        if self.loops_remaining != 0 {
            let next_start = self.clock.playback_start() + duration;
            self.next = Some(self.spawn_node(host, &buffer, next_start, 0.0));
        }

        self.state = PlayState::Playing;
        debug!(
            start = self.clock.playback_start(),
            position_ms = position * 1000.0,
            looping = self.loops_remaining != 0,
            "playback started"
        );
        if self.pending_announce {
            self.pending_announce = false;
            self.events.push_back(InstanceEvent::Succeeded);
        }
    }

    /// Loop-boundary promotion. The look-ahead node has been feeding the
    /// output since the boundary; this callback only does the bookkeeping.
    fn handle_loop_boundary(&mut self, host: &mut H) {
        let Some(buffer) = self.source.decoded().cloned() else {
            debug_assert!(false, "looping playback without a decoded buffer");
            return;
        };
        let duration = self.duration_ms * 0.001;

        // The finished node still has to be disconnected.
        self.current = Self::reap_node(host, self.current.take());

        match self.next.take() {
            Some(promoted) => {
                // Rebase from the promoted node's recorded start, not the
                // clock: a late callback must not drift the position.
                self.clock.set_playback_start(promoted.start_time);
                self.current = Some(promoted);
            }
            None => {
                // Look-ahead was never armed; recover at the computed
                // boundary.
                let start = self.clock.playback_start() + duration;
                self.clock.set_playback_start(start);
                self.current = Some(self.spawn_node(host, &buffer, start, 0.0));
            }
        }

        if self.loops_remaining > 0 {
            self.loops_remaining -= 1;
        }
        if self.loops_remaining != 0 {
            let next_start = self.clock.playback_start() + duration;
            self.next = Some(self.spawn_node(host, &buffer, next_start, 0.0));
        }

        // The promoted node plays its full window from here, so the nominal
        // loop length is the right delay regardless of callback lateness.
        self.complete_timer = Some(host.schedule_timer(self.duration_ms));

        debug!(
            start = self.clock.playback_start(),
            remaining = self.loops_remaining,
            "loop boundary promoted"
        );
        self.events.push_back(InstanceEvent::Looped);
    }

    /// Natural end of playback: no loops remaining, window elapsed.
    fn finish_playback(&mut self, host: &mut H) {
        self.teardown_nodes(host);
        self.position_ms = 0.0;
        self.state = PlayState::Stopped;
        self.source.revert_on_cleanup();
        debug!("playback complete");
        self.events.push_back(InstanceEvent::Complete);
    }

    /// Reap both nodes, cancel the completion timer, detach from the output.
    fn teardown_nodes(&mut self, host: &mut H) {
        self.current = Self::reap_node(host, self.current.take());
        self.next = Self::reap_node(host, self.next.take());
        self.cancel_completion_timer(host);
        host.disconnect_stage(self.gain);
    }

    /// Single-slot timer discipline: arming always cancels the prior one.
    fn cancel_completion_timer(&mut self, host: &mut H) {
        if let Some(timer) = self.complete_timer.take() {
            host.cancel_timer(timer);
        }
    }

    fn rebuild_if_playing(&mut self, host: &mut H) {
        if self.state == PlayState::Playing {
            self.pause(host);
            self.resume(host);
        }
    }

    fn apply_volume(&mut self, host: &mut H) {
        let effective = if self.muted { 0.0 } else { self.volume };
        host.set_gain(self.gain, effective);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Playback position in milliseconds. Derived from the clock while
    /// playing, snapshotted otherwise.
    pub fn position_ms(&self, host: &H) -> f64 {
        match self.state {
            PlayState::Playing => self.clock.position_ms(host.now()),
            _ => self.position_ms,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    /// Pop the next queued notification, if any.
    pub fn poll_event(&mut self) -> Option<InstanceEvent> {
        self.events.pop_front()
    }

    /// The instance's gain stage. Intended for advanced callers only.
    pub fn gain_stage(&self) -> StageId {
        self.gain
    }

    /// The instance's pan stage. Intended for advanced callers only.
    pub fn pan_stage(&self) -> StageId {
        self.pan_stage
    }

    /// The currently playing node, if any. Intended for advanced callers.
    pub fn current_node(&self) -> Option<ScheduledNode> {
        self.current
    }

    /// The pre-armed look-ahead node, if any. Intended for advanced callers.
    pub fn next_node(&self) -> Option<ScheduledNode> {
        self.next
    }
}
