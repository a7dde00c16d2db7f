//! A deterministic host with a hand-cranked clock.
//!
//! Nothing here touches a device or a thread. The clock only moves when the
//! test calls [`OfflineHost::advance`], and every deferred completion -
//! timers, decodes - is delivered by [`poll`](AudioHost::poll) in time order.
//! All graph mutations are recorded so tests can assert on node lifecycle
//! without listening to audio.

use std::sync::Arc;

use hashbrown::HashMap;
use itertools::Itertools;
use tracing::trace;

use crate::host::{
    AudioHost, DecodeError, DecodeId, HostEvent, ScratchRejected, SourceId, StageId, TimerId,
};
use crate::hosts::PcmBuffer;

/// Decoder plugged into an [`OfflineHost`].
pub type DecodeFn = fn(&[u8], u32) -> Result<PcmBuffer, DecodeError>;

/// The default offline decoder: 16-bit little-endian mono PCM at the host's
/// sample rate. One byte pair per sample makes test fixtures trivial to size.
pub fn decode_pcm_i16(bytes: &[u8], sample_rate: u32) -> Result<PcmBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptySource);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::Corrupt("odd byte count for i16 pcm".into()));
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    Ok(PcmBuffer::new(samples, 1, sample_rate))
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum StageKind {
    Gain,
    Pan,
}

struct OfflineStage {
    kind: StageKind,
    value: f32,
    connected_to: Option<StageId>,
    to_output: bool,
}

/// What `start_source` was called with, for assertions.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SourceSchedule {
    pub when: f64,
    pub offset: f64,
    pub duration: f64,
}

struct OfflineSource {
    buffer: PcmBuffer,
    connected_to: Option<StageId>,
    schedule: Option<SourceSchedule>,
    stopped: bool,
}

struct PendingTimer {
    id: TimerId,
    deadline: f64,
}

struct PendingDecode {
    id: DecodeId,
    deadline: f64,
    bytes: Arc<[u8]>,
}

/// See the module docs.
pub struct OfflineHost {
    now: f64,
    sample_rate: u32,
    next_id: u64,

    stages: HashMap<StageId, OfflineStage>,
    sources: HashMap<SourceId, OfflineSource>,
    timers: Vec<PendingTimer>,
    decodes: Vec<PendingDecode>,

    decoder: DecodeFn,
    decode_latency: f64,
    reject_scratch: bool,

    decode_count: usize,
    released_source_count: usize,
    scratch_substitution_count: usize,
}

impl OfflineHost {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            now: 0.0,
            sample_rate,
            next_id: 0,
            stages: HashMap::new(),
            sources: HashMap::new(),
            timers: Vec::new(),
            decodes: Vec::new(),
            decoder: decode_pcm_i16,
            decode_latency: 0.0,
            reject_scratch: false,
            decode_count: 0,
            released_source_count: 0,
            scratch_substitution_count: 0,
        }
    }

    pub fn with_decoder(mut self, decoder: DecodeFn) -> Self {
        self.decoder = decoder;
        self
    }

    /// Delay, in seconds, between `begin_decode` and its result coming due.
    pub fn with_decode_latency(mut self, secs: f64) -> Self {
        self.decode_latency = secs;
        self
    }

    /// Make `replace_source_buffer` fail, exercising the swallow path.
    pub fn with_scratch_rejected(mut self) -> Self {
        self.reject_scratch = true;
        self
    }

    /// Move the clock forward. Completions that come due are held until the
    /// next [`poll`](AudioHost::poll).
    pub fn advance(&mut self, secs: f64) {
        self.now += secs;
    }

    pub fn advance_to(&mut self, time: f64) {
        debug_assert!(time >= self.now, "clock is monotonic");
        self.now = time;
    }

    fn mint(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- assertion surface -------------------------------------------------

    /// Sources created but not yet released.
    pub fn live_source_count(&self) -> usize {
        self.sources.len()
    }

    /// Live sources still connected to a stage.
    pub fn attached_source_count(&self) -> usize {
        self.sources
            .values()
            .filter(|s| s.connected_to.is_some())
            .count()
    }

    pub fn live_stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Total decode attempts, ever.
    pub fn decode_count(&self) -> usize {
        self.decode_count
    }

    pub fn released_source_count(&self) -> usize {
        self.released_source_count
    }

    /// How many sources had the zero-length scratch buffer assigned during
    /// teardown.
    pub fn scratch_substitution_count(&self) -> usize {
        self.scratch_substitution_count
    }

    /// Frame count of a live source's current buffer.
    pub fn source_buffer_frames(&self, source: SourceId) -> Option<usize> {
        self.sources.get(&source).map(|s| s.buffer.frames())
    }

    pub fn pending_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn output_connected(&self, stage: StageId) -> bool {
        self.stages.get(&stage).is_some_and(|s| s.to_output)
    }

    pub fn stage_value(&self, stage: StageId) -> Option<f32> {
        self.stages.get(&stage).map(|s| s.value)
    }

    pub fn stage_kind(&self, stage: StageId) -> Option<StageKind> {
        self.stages.get(&stage).map(|s| s.kind)
    }

    /// Downstream stage of a stage, if connected.
    pub fn stage_target(&self, stage: StageId) -> Option<StageId> {
        self.stages.get(&stage).and_then(|s| s.connected_to)
    }

    /// Stage a live source is attached to, if any.
    pub fn source_target(&self, source: SourceId) -> Option<StageId> {
        self.sources.get(&source).and_then(|s| s.connected_to)
    }

    /// The last `start_source` call on a live source.
    pub fn source_schedule(&self, source: SourceId) -> Option<SourceSchedule> {
        self.sources.get(&source).and_then(|s| s.schedule)
    }

    pub fn source_stopped(&self, source: SourceId) -> Option<bool> {
        self.sources.get(&source).map(|s| s.stopped)
    }

    fn create_stage(&mut self, kind: StageKind, value: f32) -> StageId {
        let id = StageId(self.mint());
        self.stages.insert(
            id,
            OfflineStage {
                kind,
                value,
                connected_to: None,
                to_output: false,
            },
        );
        id
    }
}

impl AudioHost for OfflineHost {
    type Buffer = PcmBuffer;

    fn now(&self) -> f64 {
        self.now
    }

    fn buffer_duration(&self, buffer: &PcmBuffer) -> f64 {
        buffer.duration_secs()
    }

    fn scratch_buffer(&self) -> PcmBuffer {
        PcmBuffer::scratch(self.sample_rate)
    }

    fn create_gain(&mut self) -> StageId {
        self.create_stage(StageKind::Gain, 1.0)
    }

    fn create_pan(&mut self) -> StageId {
        self.create_stage(StageKind::Pan, 0.0)
    }

    fn set_gain(&mut self, stage: StageId, value: f32) {
        if let Some(stage) = self.stages.get_mut(&stage) {
            stage.value = value;
        }
    }

    fn set_pan(&mut self, stage: StageId, value: f32) {
        if let Some(stage) = self.stages.get_mut(&stage) {
            stage.value = value;
        }
    }

    fn connect_stages(&mut self, from: StageId, to: StageId) {
        if let Some(stage) = self.stages.get_mut(&from) {
            stage.connected_to = Some(to);
        }
    }

    fn connect_to_output(&mut self, stage: StageId) {
        if let Some(stage) = self.stages.get_mut(&stage) {
            stage.to_output = true;
        }
    }

    fn disconnect_stage(&mut self, stage: StageId) {
        if let Some(stage) = self.stages.get_mut(&stage) {
            stage.connected_to = None;
            stage.to_output = false;
        }
    }

    fn release_stage(&mut self, stage: StageId) {
        self.stages.remove(&stage);
    }

    fn create_source(&mut self, buffer: &PcmBuffer) -> SourceId {
        let id = SourceId(self.mint());
        self.sources.insert(
            id,
            OfflineSource {
                buffer: buffer.clone(),
                connected_to: None,
                schedule: None,
                stopped: false,
            },
        );
        id
    }

    fn connect_source(&mut self, source: SourceId, to: StageId) {
        if let Some(source) = self.sources.get_mut(&source) {
            source.connected_to = Some(to);
        }
    }

    fn start_source(&mut self, source: SourceId, when: f64, offset: f64, duration: f64) {
        if let Some(source) = self.sources.get_mut(&source) {
            source.schedule = Some(SourceSchedule {
                when,
                offset,
                duration,
            });
        }
    }

    fn stop_source(&mut self, source: SourceId) {
        if let Some(source) = self.sources.get_mut(&source) {
            source.stopped = true;
        }
    }

    fn replace_source_buffer(
        &mut self,
        source: SourceId,
        buffer: &PcmBuffer,
    ) -> Result<(), ScratchRejected> {
        if self.reject_scratch {
            return Err(ScratchRejected);
        }
        if let Some(source) = self.sources.get_mut(&source) {
            if buffer.frames() == 0 {
                self.scratch_substitution_count += 1;
            }
            source.buffer = buffer.clone();
        }
        Ok(())
    }

    fn disconnect_source(&mut self, source: SourceId) {
        if let Some(source) = self.sources.get_mut(&source) {
            source.connected_to = None;
        }
    }

    fn release_source(&mut self, source: SourceId) {
        if self.sources.remove(&source).is_some() {
            self.released_source_count += 1;
        }
    }

    fn begin_decode(&mut self, bytes: Arc<[u8]>) -> DecodeId {
        let id = DecodeId(self.mint());
        self.decode_count += 1;
        trace!(?id, len = bytes.len(), "decode queued");
        self.decodes.push(PendingDecode {
            id,
            deadline: self.now + self.decode_latency,
            bytes,
        });
        id
    }

    fn schedule_timer(&mut self, delay_ms: f64) -> TimerId {
        let id = TimerId(self.mint());
        self.timers.push(PendingTimer {
            id,
            deadline: self.now + delay_ms * 0.001,
        });
        id
    }

    fn cancel_timer(&mut self, timer: TimerId) {
        self.timers.retain(|t| t.id != timer);
    }

    fn poll(&mut self) -> Vec<HostEvent<PcmBuffer>> {
        let now = self.now;
        let sample_rate = self.sample_rate;
        let decoder = self.decoder;

        let (fired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|t| t.deadline <= now);
        self.timers = pending;

        let (finished, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.decodes)
            .into_iter()
            .partition(|d| d.deadline <= now);
        self.decodes = pending;

        let mut due: Vec<(f64, HostEvent<PcmBuffer>)> = Vec::new();
        for timer in fired {
            due.push((timer.deadline, HostEvent::TimerFired(timer.id)));
        }
        for decode in finished {
            let result = decoder(&decode.bytes, sample_rate);
            due.push((decode.deadline, HostEvent::DecodeFinished(decode.id, result)));
        }

        due.into_iter()
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, event)| event)
            .collect()
    }
}
