//! Encoded-or-decoded source data.
//!
//! The original resource a sound is created from stays in encoded form until
//! first playback. An explicit tagged union replaces any runtime probing of
//! buffer shapes: a buffer is either still raw bytes or a decoded host
//! buffer, never "whatever object happens to have the right fields".

use std::sync::Arc;

/// The sample data behind a sound instance.
///
/// Full-buffer decodes keep the original encoded bytes around so the decoded
/// data can be dropped again on full teardown (a later play re-decodes).
/// Segment decodes are permanent: re-decoding a sub-range on every resume
/// would cost more than the retained memory.
#[derive(Clone, Debug)]
pub enum SourceData<B> {
    /// Not yet decoded. Playback must go through the decode coordinator.
    Encoded(Arc<[u8]>),
    /// Decoded and playable. `original` is `Some` only for reversible
    /// (full-buffer) decodes.
    Decoded {
        buffer: B,
        original: Option<Arc<[u8]>>,
    },
}

impl<B> SourceData<B> {
    /// Whether there is anything to play at all (the `play()` precondition).
    pub fn is_available(&self) -> bool {
        match self {
            SourceData::Encoded(bytes) => !bytes.is_empty(),
            SourceData::Decoded { .. } => true,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, SourceData::Decoded { .. })
    }

    pub fn decoded(&self) -> Option<&B> {
        match self {
            SourceData::Decoded { buffer, .. } => Some(buffer),
            SourceData::Encoded(_) => None,
        }
    }

    pub fn encoded(&self) -> Option<&Arc<[u8]>> {
        match self {
            SourceData::Encoded(bytes) => Some(bytes),
            SourceData::Decoded { .. } => None,
        }
    }

    /// Adopt a decoded buffer. For a full-buffer decode (`segment == false`)
    /// the prior encoded bytes are retained for later reversion; a segment
    /// decode discards them and keeps the decoded form permanently.
    pub fn adopt_decoded(&mut self, buffer: B, segment: bool) {
        let original = match self {
            SourceData::Encoded(bytes) if !segment => Some(Arc::clone(bytes)),
            _ => None,
        };
        *self = SourceData::Decoded { buffer, original };
    }

    /// Full-teardown cleanup: a reversible decode drops its decoded data and
    /// goes back to the encoded form; a segment decode stays decoded.
    pub fn revert_on_cleanup(&mut self) {
        if let SourceData::Decoded { original, .. } = self {
            if let Some(bytes) = original.take() {
                *self = SourceData::Encoded(bytes);
            }
        }
    }
}
