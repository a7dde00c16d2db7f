//! Host implementations.
//!
//! [`OfflineHost`] runs with a hand-cranked clock for deterministic tests;
//! [`GraphHost`](graph::GraphHost) renders through a real audio graph.

use std::sync::Arc;

pub mod graph;
mod offline;

pub use offline::{decode_pcm_i16, OfflineHost, SourceSchedule, StageKind};

/// Interleaved f32 PCM. Cheap to clone; the sample data is shared.
#[derive(Clone, Debug)]
pub struct PcmBuffer {
    samples: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            channels,
            sample_rate,
        }
    }

    /// The zero-length buffer hosts hand out for scratch substitution.
    pub fn scratch(sample_rate: u32) -> Self {
        Self::new(Vec::new(), 1, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}
