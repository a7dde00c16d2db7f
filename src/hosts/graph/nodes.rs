//! Graph host node implementations.
//!
//! Stereo throughout: every node here renders two output channels, with mono
//! buffers duplicated to both.

use dasp_graph::{Buffer, Input};

use crate::hosts::graph::node::{GraphNode, ProcessContext};
use crate::hosts::PcmBuffer;

// ---------------------------------------------------------------------------
// Scheduled source
// ---------------------------------------------------------------------------

/// Messages to control a [`ScheduledSource`].
pub enum SourceMessage {
    /// Arm the source: emit from clock time `when`, playing the buffer
    /// window starting `offset` seconds in, for `duration` seconds.
    Start {
        when: f64,
        offset: f64,
        duration: f64,
    },
    /// Silence immediately.
    Stop,
    /// Swap the sample data (scratch substitution during teardown).
    ReplaceBuffer(PcmBuffer),
}

struct Window {
    /// Graph clock frame at which the window opens.
    start_frame: u64,
    /// Graph clock frame at which the window closes.
    end_frame: u64,
    /// Buffer offset of the window start, in source frames.
    offset_frames: f64,
}

/// Plays a windowed region of a pre-decoded buffer at an absolute clock time.
///
/// The window is evaluated against the block clock every frame, so a start
/// time in the past begins mid-buffer immediately (catch-up) rather than
/// replaying the window from its beginning. Sample rate mismatch between
/// buffer and graph is bridged by nearest-neighbor resampling.
pub struct ScheduledSource {
    buffer: PcmBuffer,
    window: Option<Window>,
    stopped: bool,
}

impl ScheduledSource {
    pub fn new(buffer: PcmBuffer) -> Self {
        Self {
            buffer,
            window: None,
            stopped: false,
        }
    }
}

impl GraphNode for ScheduledSource {
    type Message = SourceMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SourceMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let graph_rate = ctx.sample_rate as f64;
        for msg in messages {
            match msg {
                SourceMessage::Start {
                    when,
                    offset,
                    duration,
                } => {
                    let start_frame = (when.max(0.0) * graph_rate) as u64;
                    let end_frame = ((when + duration.max(0.0)).max(0.0) * graph_rate) as u64;
                    self.window = Some(Window {
                        start_frame,
                        end_frame,
                        offset_frames: offset.max(0.0) * self.buffer.sample_rate() as f64,
                    });
                    self.stopped = false;
                }
                SourceMessage::Stop => self.stopped = true,
                SourceMessage::ReplaceBuffer(buffer) => self.buffer = buffer,
            }
        }

        for buffer in outputs.iter_mut() {
            buffer.iter_mut().for_each(|s| *s = 0.0);
        }

        let window = match (&self.window, self.stopped) {
            (Some(window), false) => window,
            _ => return,
        };

        let samples = self.buffer.samples();
        let src_channels = self.buffer.channels().max(1) as usize;
        let src_frames = samples.len() / src_channels;
        let rate_ratio = self.buffer.sample_rate() as f64 / graph_rate;

        for i in 0..ctx.buffer_size {
            let frame = ctx.block_start + i as u64;
            if frame < window.start_frame || frame >= window.end_frame {
                continue;
            }
            let elapsed = (frame - window.start_frame) as f64;
            let src_frame = (window.offset_frames + elapsed * rate_ratio) as usize;
            if src_frame >= src_frames {
                continue;
            }
            for (ch, out) in outputs.iter_mut().enumerate() {
                let src_ch = ch % src_channels;
                out[i] = samples[src_frame * src_channels + src_ch];
            }
        }
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        2
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Parameter update for a gain or pan stage.
#[derive(Clone, Copy, Debug)]
pub enum StageMessage {
    SetLevel(f32),
}

/// Amplitude scaling with short smoothing to prevent clicks on rapid changes.
pub struct GainStage {
    gain: f32,
    smoothed_gain: f32,
    /// Smoothing coefficient (0.0 = instant, 1.0 = no change)
    smooth_coeff: f32,
}

impl GainStage {
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            smoothed_gain: gain,
            smooth_coeff: 0.995, // ~7ms at 48kHz
        }
    }
}

impl GraphNode for GainStage {
    type Message = StageMessage;

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        messages: impl Iterator<Item = StageMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            match msg {
                StageMessage::SetLevel(g) => self.gain = g,
            }
        }

        let in_buffers = match inputs.first() {
            Some(input) if !input.buffers().is_empty() => input.buffers(),
            _ => {
                for buffer in outputs.iter_mut() {
                    buffer.iter_mut().for_each(|s| *s = 0.0);
                }
                return;
            }
        };

        let smooth_coeff = self.smooth_coeff;
        let target_gain = self.gain;
        let mut current_gain = self.smoothed_gain;

        for (ch, out_buffer) in outputs.iter_mut().enumerate() {
            let in_buffer = in_buffers.get(ch).unwrap_or(&in_buffers[0]);

            // Channels track together; restart from the block's entry value
            let mut gain = current_gain;
            for (out_sample, &in_sample) in out_buffer.iter_mut().zip(in_buffer.iter()) {
                gain = target_gain + smooth_coeff * (gain - target_gain);
                *out_sample = in_sample * gain;
            }
            if ch == 0 {
                current_gain = gain;
            }
        }

        self.smoothed_gain = current_gain;
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        2
    }
}

/// Equal-power stereo pan. Level `-1.0` is hard left, `1.0` hard right.
pub struct PanStage {
    pan: f32,
}

impl PanStage {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: pan.clamp(-1.0, 1.0),
        }
    }

    fn gains(&self) -> (f32, f32) {
        let angle = (self.pan + 1.0) * core::f32::consts::FRAC_PI_4;
        (angle.cos(), angle.sin())
    }
}

impl GraphNode for PanStage {
    type Message = StageMessage;

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        messages: impl Iterator<Item = StageMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            match msg {
                StageMessage::SetLevel(p) => self.pan = p.clamp(-1.0, 1.0),
            }
        }

        for buffer in outputs.iter_mut() {
            buffer.iter_mut().for_each(|s| *s = 0.0);
        }

        let (left_gain, right_gain) = self.gains();

        // All attached sources sum into the pan stage
        for input in inputs {
            let in_buffers = input.buffers();
            if in_buffers.is_empty() {
                continue;
            }
            for (ch, out_buffer) in outputs.iter_mut().enumerate() {
                let in_ch = ch.min(in_buffers.len() - 1);
                let gain = if ch == 0 { left_gain } else { right_gain };
                for (out_sample, &in_sample) in
                    out_buffer.iter_mut().zip(in_buffers[in_ch].iter())
                {
                    *out_sample += in_sample * gain;
                }
            }
        }
    }

    fn num_inputs(&self) -> usize {
        usize::MAX
    }

    fn num_outputs(&self) -> usize {
        2
    }
}

// ---------------------------------------------------------------------------
// Output mix
// ---------------------------------------------------------------------------

/// Sums every connected stage with equal weight into the stereo bus that
/// feeds the sink.
pub struct OutputMix;

impl GraphNode for OutputMix {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for buffer in outputs.iter_mut() {
            buffer.iter_mut().for_each(|s| *s = 0.0);
        }

        for input in inputs {
            let in_buffers = input.buffers();
            if in_buffers.is_empty() {
                continue;
            }
            for (out_ch, out_buffer) in outputs.iter_mut().enumerate() {
                let in_ch = if in_buffers.len() == 1 {
                    0
                } else {
                    out_ch.min(in_buffers.len() - 1)
                };
                for (out_sample, &in_sample) in
                    out_buffer.iter_mut().zip(in_buffers[in_ch].iter())
                {
                    *out_sample += in_sample;
                }
            }
        }
    }

    fn num_inputs(&self) -> usize {
        usize::MAX
    }

    fn num_outputs(&self) -> usize {
        2
    }
}
