//! A host backed by a real audio graph.
//!
//! Control-side operations mint ids and translate into graph mutations and
//! node messages; [`pump`](GraphHost::pump) renders blocks through the engine
//! and advances the clock. With the `cpal_sink` feature the terminal node
//! feeds a device stream; otherwise a null sink drives the graph silently.
//!
//! Decode here is deferred, not threaded: `begin_decode` queues the bytes and
//! the next [`poll`](crate::AudioHost::poll) runs the decoder and surfaces
//! the result, preserving the asynchronous completion order the engine
//! expects.

mod decode;
mod device;
mod engine;
mod node;
mod nodes;
mod sink;

use std::sync::Arc;

use hashbrown::HashMap;
use itertools::Itertools;
use tracing::warn;

use crate::host::{
    AudioHost, DecodeId, HostEvent, ScratchRejected, SourceId, StageId, TimerId,
};
use crate::hosts::PcmBuffer;

pub use decode::{decode_unsupported, DecodeFn};
#[cfg(feature = "vorbis_decode")]
pub use decode::decode_vorbis;
pub use device::CpalDevice;
pub use node::{GraphNode, NodeId, ProcessContext};
pub use nodes::{GainStage, OutputMix, PanStage, ScheduledSource, SourceMessage, StageMessage};
#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;
pub use sink::NullSink;

use engine::{Engine, NodeHandle, BLOCK_FRAMES};
use nodes::StageMessage as Msg;

struct PendingTimer {
    id: TimerId,
    deadline: f64,
}

/// See the module docs.
pub struct GraphHost {
    engine: Engine,
    /// The mix bus every audible stage connects to.
    output: NodeId,

    stages: HashMap<StageId, NodeHandle<StageMessage>>,
    sources: HashMap<SourceId, NodeHandle<SourceMessage>>,
    next_id: u64,

    timers: Vec<PendingTimer>,
    pending_decodes: Vec<(DecodeId, f64, Arc<[u8]>)>,
    decoder: DecodeFn,
}

impl GraphHost {
    /// A graph rendering to a null sink. Useful headless: the clock and
    /// scheduling behave exactly as with a device attached.
    pub fn new(sample_rate: u32) -> Self {
        let mut engine = Engine::new(sample_rate);
        let output = engine.add(OutputMix);
        let sink = engine.add(NullSink);
        engine.connect(output.id(), sink.id());
        engine.set_terminal(sink.id());
        Self::with_parts(engine, output.id())
    }

    /// A graph rendering to a device stream.
    #[cfg(feature = "cpal_sink")]
    pub fn with_device(device: &CpalDevice) -> Self {
        let mut engine = Engine::new(device.sample_rate());
        let output = engine.add(OutputMix);
        let sink = engine.add(CpalSink::new(&device.device, &device.config));
        engine.connect(output.id(), sink.id());
        engine.set_terminal(sink.id());
        Self::with_parts(engine, output.id())
    }

    fn with_parts(engine: Engine, output: NodeId) -> Self {
        #[cfg(feature = "vorbis_decode")]
        let decoder: DecodeFn = decode::decode_vorbis;
        #[cfg(not(feature = "vorbis_decode"))]
        let decoder: DecodeFn = decode::decode_unsupported;

        Self {
            engine,
            output,
            stages: HashMap::new(),
            sources: HashMap::new(),
            next_id: 0,
            timers: Vec::new(),
            pending_decodes: Vec::new(),
            decoder,
        }
    }

    pub fn with_decoder(mut self, decoder: DecodeFn) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    /// Render `blocks` blocks of audio, advancing the clock by
    /// `blocks * 64 / sample_rate` seconds.
    pub fn pump(&mut self, blocks: usize) {
        for _ in 0..blocks {
            self.engine.process_block();
        }
    }

    /// Render at least `secs` seconds of audio.
    pub fn pump_for(&mut self, secs: f64) {
        let frames = secs * self.engine.sample_rate() as f64;
        let blocks = (frames / BLOCK_FRAMES as f64).ceil() as usize;
        self.pump(blocks);
    }

    fn mint(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn send_stage(&mut self, stage: StageId, msg: Msg) {
        if let Some(handle) = self.stages.get_mut(&stage) {
            if handle.send(msg).is_err() {
                warn!(?stage, "stage message queue full, update dropped");
            }
        }
    }
}

impl AudioHost for GraphHost {
    type Buffer = PcmBuffer;

    fn now(&self) -> f64 {
        self.engine.frames_rendered() as f64 / self.engine.sample_rate() as f64
    }

    fn buffer_duration(&self, buffer: &PcmBuffer) -> f64 {
        buffer.duration_secs()
    }

    fn scratch_buffer(&self) -> PcmBuffer {
        PcmBuffer::scratch(self.engine.sample_rate())
    }

    fn create_gain(&mut self) -> StageId {
        let id = StageId(self.mint());
        let handle = self.engine.add(GainStage::new(1.0));
        self.stages.insert(id, handle);
        id
    }

    fn create_pan(&mut self) -> StageId {
        let id = StageId(self.mint());
        let handle = self.engine.add(PanStage::new(0.0));
        self.stages.insert(id, handle);
        id
    }

    fn set_gain(&mut self, stage: StageId, value: f32) {
        self.send_stage(stage, Msg::SetLevel(value));
    }

    fn set_pan(&mut self, stage: StageId, value: f32) {
        self.send_stage(stage, Msg::SetLevel(value));
    }

    fn connect_stages(&mut self, from: StageId, to: StageId) {
        let (Some(from), Some(to)) = (self.stages.get(&from), self.stages.get(&to)) else {
            return;
        };
        self.engine.connect(from.id(), to.id());
    }

    fn connect_to_output(&mut self, stage: StageId) {
        if let Some(handle) = self.stages.get(&stage) {
            self.engine.connect(handle.id(), self.output);
        }
    }

    fn disconnect_stage(&mut self, stage: StageId) {
        if let Some(handle) = self.stages.get(&stage) {
            self.engine.disconnect(handle.id());
        }
    }

    fn release_stage(&mut self, stage: StageId) {
        if let Some(handle) = self.stages.remove(&stage) {
            self.engine.remove(handle.id());
        }
    }

    fn create_source(&mut self, buffer: &PcmBuffer) -> SourceId {
        let id = SourceId(self.mint());
        let handle = self.engine.add(ScheduledSource::new(buffer.clone()));
        self.sources.insert(id, handle);
        id
    }

    fn connect_source(&mut self, source: SourceId, to: StageId) {
        let (Some(source), Some(to)) = (self.sources.get(&source), self.stages.get(&to)) else {
            return;
        };
        self.engine.connect(source.id(), to.id());
    }

    fn start_source(&mut self, source: SourceId, when: f64, offset: f64, duration: f64) {
        if let Some(handle) = self.sources.get_mut(&source) {
            if handle
                .send(SourceMessage::Start {
                    when,
                    offset,
                    duration,
                })
                .is_err()
            {
                warn!(?source, "source message queue full, start dropped");
            }
        }
    }

    fn stop_source(&mut self, source: SourceId) {
        if let Some(handle) = self.sources.get_mut(&source) {
            if handle.send(SourceMessage::Stop).is_err() {
                warn!(?source, "source message queue full, stop dropped");
            }
        }
    }

    fn replace_source_buffer(
        &mut self,
        source: SourceId,
        buffer: &PcmBuffer,
    ) -> Result<(), ScratchRejected> {
        let Some(handle) = self.sources.get_mut(&source) else {
            return Ok(());
        };
        handle
            .send(SourceMessage::ReplaceBuffer(buffer.clone()))
            .map_err(|_| ScratchRejected)
    }

    fn disconnect_source(&mut self, source: SourceId) {
        if let Some(handle) = self.sources.get(&source) {
            self.engine.disconnect(handle.id());
        }
    }

    fn release_source(&mut self, source: SourceId) {
        if let Some(handle) = self.sources.remove(&source) {
            self.engine.remove(handle.id());
        }
    }

    fn begin_decode(&mut self, bytes: Arc<[u8]>) -> DecodeId {
        let id = DecodeId(self.mint());
        self.pending_decodes.push((id, self.now(), bytes));
        id
    }

    fn schedule_timer(&mut self, delay_ms: f64) -> TimerId {
        let id = TimerId(self.mint());
        self.timers.push(PendingTimer {
            id,
            deadline: self.now() + delay_ms * 0.001,
        });
        id
    }

    fn cancel_timer(&mut self, timer: TimerId) {
        self.timers.retain(|t| t.id != timer);
    }

    fn poll(&mut self) -> Vec<HostEvent<PcmBuffer>> {
        let now = self.now();
        let decoder = self.decoder;

        let (fired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|t| t.deadline <= now);
        self.timers = pending;

        let mut due: Vec<(f64, HostEvent<PcmBuffer>)> = Vec::new();
        for timer in fired {
            due.push((timer.deadline, HostEvent::TimerFired(timer.id)));
        }
        for (id, begun_at, bytes) in std::mem::take(&mut self.pending_decodes) {
            due.push((begun_at, HostEvent::DecodeFinished(id, decoder(&bytes))));
        }

        due.into_iter()
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, event)| event)
            .collect()
    }
}
