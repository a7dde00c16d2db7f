//! spielwerk - scheduled playback of decoded audio with gapless looping
//!
//! Design principles:
//! - All scheduling math runs against the host's monotonic clock; position is
//!   derived from it, never accumulated
//! - Loop boundaries are pre-armed on the graph (look-ahead), so callback
//!   jitter cannot cause gaps or drift
//! - The audio subsystem sits behind the [`AudioHost`] trait; the same
//!   transport logic runs against a deterministic offline host in tests and
//!   a real graph in production
//! - Single logical thread: deferred completions are polled and routed, no
//!   locks on either side of the seam
//!
//! # Quick start
//!
//! ```
//! use spielwerk::{hosts::OfflineHost, PlayProps, SoundInstance};
//!
//! let mut host = OfflineHost::new(48_000);
//! let mut sound = SoundInstance::from_encoded(&mut host, vec![0u8; 9600]);
//! sound.play(&mut host, PlayProps::default().loops(2)).unwrap();
//! ```

mod clock;
mod error;
mod event;
mod host;
pub mod hosts;
mod instance;
mod source_data;

pub use error::PlayError;
pub use event::InstanceEvent;
pub use host::{
    AudioHost, DecodeError, DecodeId, HostEvent, ScratchRejected, SourceId, StageId, TimerId,
};
pub use instance::{PlayProps, PlayState, ScheduledNode, SoundInstance};
pub use source_data::SourceData;
