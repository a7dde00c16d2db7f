//! Decoders for the graph host.

use crate::host::DecodeError;
use crate::hosts::PcmBuffer;

/// Decoder plugged into a [`GraphHost`](crate::hosts::graph::GraphHost).
pub type DecodeFn = fn(&[u8]) -> Result<PcmBuffer, DecodeError>;

/// Decoder used when no format support is compiled in. Plug a real one via
/// [`GraphHost::with_decoder`](crate::hosts::graph::GraphHost::with_decoder).
pub fn decode_unsupported(bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptySource);
    }
    Err(DecodeError::UnsupportedFormat)
}

/// Decode an ogg/vorbis stream into interleaved f32 PCM.
#[cfg(feature = "vorbis_decode")]
pub fn decode_vorbis(bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
    use lewton::inside_ogg::OggStreamReader;
    use std::io::Cursor;

    if bytes.is_empty() {
        return Err(DecodeError::EmptySource);
    }

    let mut reader =
        OggStreamReader::new(Cursor::new(bytes)).map_err(|_| DecodeError::UnsupportedFormat)?;
    let channels = reader.ident_hdr.audio_channels as u16;
    let sample_rate = reader.ident_hdr.audio_sample_rate;

    let mut samples = Vec::new();
    loop {
        match reader.read_dec_packet_itl() {
            Ok(Some(packet)) => {
                samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
            }
            Ok(None) => break,
            Err(err) => return Err(DecodeError::Corrupt(err.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Corrupt("stream contained no audio".into()));
    }
    Ok(PcmBuffer::new(samples, channels, sample_rate))
}
