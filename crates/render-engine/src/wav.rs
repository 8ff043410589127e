//! 16-bit PCM WAV output.
//!
//! The writer produces the canonical 44-byte RIFF header followed by
//! interleaved little-endian samples. The reader only understands that same
//! layout; external media goes through [`crate::decode::WavFileDecoder`].

use std::io::Write;
use std::path::Path;

use crate::error::{RenderError, RenderResult};
use crate::mixdown::MixBuffer;

const HEADER_LEN: usize = 44;

/// Float sample to signed 16-bit, asymmetric so both -1.0 and 1.0 are exact.
#[inline]
pub fn sample_to_i16(v: f32) -> i16 {
    let v = v.clamp(-1.0, 1.0);
    if v < 0.0 {
        (v * 32768.0) as i16
    } else {
        (v * 32767.0) as i16
    }
}

#[inline]
pub fn i16_to_sample(v: i16) -> f32 {
    if v < 0 {
        v as f32 / 32768.0
    } else {
        v as f32 / 32767.0
    }
}

/// Encode `buffer` as a complete WAV file.
pub fn encode_wav(buffer: &MixBuffer) -> Vec<u8> {
    let channels = buffer.channels.max(1);
    let data_size = (buffer.samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + data_size as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(data_size + 36).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    out.extend_from_slice(&(buffer.sample_rate * channels as u32 * 2).to_le_bytes());
    out.extend_from_slice(&(channels * 2).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());

    for s in &buffer.samples {
        out.extend_from_slice(&sample_to_i16(*s).to_le_bytes());
    }
    out
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decode a file produced by [`encode_wav`].
pub fn decode_wav_pcm16(bytes: &[u8]) -> RenderResult<MixBuffer> {
    if bytes.len() < HEADER_LEN {
        return Err(RenderError::encode(format!(
            "WAV data too short: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(RenderError::encode("Missing RIFF/WAVE header"));
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return Err(RenderError::encode("Unexpected chunk layout"));
    }
    if read_u16(bytes, 20) != 1 || read_u16(bytes, 34) != 16 {
        return Err(RenderError::encode("Only 16-bit PCM is supported"));
    }

    let channels = read_u16(bytes, 22);
    let sample_rate = read_u32(bytes, 24);
    let data_size = read_u32(bytes, 40) as usize;
    let data = bytes
        .get(HEADER_LEN..HEADER_LEN + data_size)
        .ok_or_else(|| RenderError::encode("Data chunk is truncated"))?;

    let samples = data
        .chunks_exact(2)
        .map(|pair| i16_to_sample(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    Ok(MixBuffer {
        sample_rate,
        channels,
        samples,
    })
}

/// Write `bytes` to `path` through a temp file in the same directory.
///
/// On any failure nothing exists at `path` and the temp file is removed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> RenderResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RenderError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| RenderError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| RenderError::io(path, e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote output file");
    Ok(())
}
