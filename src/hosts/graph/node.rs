//! Processing node trait and context types for the graph host.

use dasp_graph::{Buffer, Input};

/// Information available during audio processing.
///
/// Passed to every [`GraphNode::process`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz.
    pub sample_rate: u32,
    /// Number of samples per block (always 64, the dasp_graph block size).
    pub buffer_size: usize,
    /// Absolute frame index of the first sample in this block. The graph
    /// clock in frames: scheduled sources window against it.
    pub block_start: u64,
}

impl ProcessContext {
    /// Clock time of the first sample in this block, in seconds.
    pub fn block_time(&self) -> f64 {
        self.block_start as f64 / self.sample_rate as f64
    }
}

/// Unique identifier for a node within an engine graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// A processing node in the graph host's engine.
///
/// Parameter updates arrive as messages drained at the start of
/// `process`; nodes never share mutable state with the control side.
pub trait GraphNode: Send + 'static {
    /// Message type for parameter updates. `()` for nodes without any.
    type Message: Send + 'static;

    /// Process one block of audio.
    ///
    /// Drain `messages` first, then read `inputs` and fill `outputs`.
    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    );

    /// Number of audio input channels (0 for sources).
    fn num_inputs(&self) -> usize {
        0
    }

    /// Number of audio output channels.
    fn num_outputs(&self) -> usize {
        1
    }
}
