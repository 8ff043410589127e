//! Media decode collaborator.
//!
//! Renders never touch files directly: they ask a [`MediaDecoder`] for audio
//! samples or a [`VideoSource`]. Failures come back as [`DecodeError`] so the
//! render can skip the clip and keep going.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use splice_project_model::SourceRef;

use crate::compositor::Frame;
use crate::error::DecodeError;

/// Fully decoded audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Split interleaved samples into channels.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let mut channels = vec![Vec::with_capacity(samples.len() / channel_count); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in frame.iter().enumerate() {
                channels[ch].push(s);
            }
        }
        Self::new(sample_rate, channels)
    }

    /// Linearly interpolated sample at fractional frame `pos`.
    ///
    /// `channel` beyond the source's count maps to its last channel.
    pub fn sample_at(&self, channel: usize, pos: f64) -> f32 {
        let Some(data) = self
            .channels
            .get(channel.min(self.channels.len().saturating_sub(1)))
        else {
            return 0.0;
        };
        if pos < 0.0 || data.is_empty() {
            return 0.0;
        }
        let i = pos.floor() as usize;
        let frac = (pos - i as f64) as f32;
        match (data.get(i), data.get(i + 1)) {
            (Some(&a), Some(&b)) => a + (b - a) * frac,
            (Some(&a), None) => a,
            _ => 0.0,
        }
    }
}

/// Stream properties of a video source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration_secs: f64,
}

/// Random access to decoded video frames.
pub trait VideoSource: Send {
    fn info(&self) -> VideoInfo;

    /// Frame shown at source time `t` seconds.
    fn frame_at(&mut self, t: f64) -> Result<Frame, DecodeError>;
}

/// Turns source references into decoded media.
pub trait MediaDecoder: Send + Sync {
    fn decode_audio(&self, source: &SourceRef) -> Result<DecodedAudio, DecodeError>;

    fn open_video(&self, source: &SourceRef) -> Result<Box<dyn VideoSource>, DecodeError>;
}

/// Decodes WAV files with `hound`, resolving sources against a project root.
#[derive(Debug, Clone)]
pub struct WavFileDecoder {
    root: PathBuf,
}

impl WavFileDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, source: &SourceRef) -> PathBuf {
        let path = Path::new(source.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl MediaDecoder for WavFileDecoder {
    fn decode_audio(&self, source: &SourceRef) -> Result<DecodedAudio, DecodeError> {
        let path = self.resolve(source);
        if !path.exists() {
            return Err(DecodeError::NotFound {
                source_id: source.to_string(),
            });
        }

        let mut reader =
            hound::WavReader::open(&path).map_err(|e| DecodeError::malformed(source.as_str(), e))?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| DecodeError::malformed(source.as_str(), e))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| DecodeError::malformed(source.as_str(), e))?
            }
        };

        tracing::debug!(
            source = %source,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            frames = samples.len() / spec.channels.max(1) as usize,
            "Decoded audio source"
        );
        Ok(DecodedAudio::from_interleaved(
            spec.sample_rate,
            spec.channels as usize,
            &samples,
        ))
    }

    fn open_video(&self, source: &SourceRef) -> Result<Box<dyn VideoSource>, DecodeError> {
        Err(DecodeError::unsupported(
            source.as_str(),
            "video decoding is not available from the WAV decoder",
        ))
    }
}

/// A fixed list of frames played at a constant rate.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Arc<Vec<Frame>>,
    frame_rate: f64,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>, frame_rate: f64) -> Self {
        Self {
            frames: Arc::new(frames),
            frame_rate: if frame_rate > 0.0 { frame_rate } else { 30.0 },
        }
    }
}

impl VideoSource for FrameSequence {
    fn info(&self) -> VideoInfo {
        let (width, height) = self
            .frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        VideoInfo {
            width,
            height,
            frame_rate: self.frame_rate,
            duration_secs: self.frames.len() as f64 / self.frame_rate,
        }
    }

    fn frame_at(&mut self, t: f64) -> Result<Frame, DecodeError> {
        let last = self.frames.len().checked_sub(1).ok_or_else(|| {
            DecodeError::malformed("<frame sequence>", "sequence has no frames")
        })?;
        let index = ((t.max(0.0) * self.frame_rate).floor() as usize).min(last);
        Ok(self.frames[index].clone())
    }
}

/// Decoder backed by media registered in memory. Used by previews and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDecoder {
    audio: HashMap<SourceRef, DecodedAudio>,
    video: HashMap<SourceRef, FrameSequence>,
    failing: HashMap<SourceRef, String>,
}

impl InMemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(mut self, source: impl Into<String>, audio: DecodedAudio) -> Self {
        self.audio.insert(SourceRef::new(source), audio);
        self
    }

    pub fn with_video(mut self, source: impl Into<String>, video: FrameSequence) -> Self {
        self.video.insert(SourceRef::new(source), video);
        self
    }

    /// Register a source whose decode always fails with `reason`.
    pub fn with_failure(mut self, source: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failing.insert(SourceRef::new(source), reason.into());
        self
    }

    fn check_failure(&self, source: &SourceRef) -> Result<(), DecodeError> {
        match self.failing.get(source) {
            Some(reason) => Err(DecodeError::malformed(source.as_str(), reason)),
            None => Ok(()),
        }
    }
}

impl MediaDecoder for InMemoryDecoder {
    fn decode_audio(&self, source: &SourceRef) -> Result<DecodedAudio, DecodeError> {
        self.check_failure(source)?;
        self.audio.get(source).cloned().ok_or(DecodeError::NotFound {
            source_id: source.to_string(),
        })
    }

    fn open_video(&self, source: &SourceRef) -> Result<Box<dyn VideoSource>, DecodeError> {
        self.check_failure(source)?;
        self.video
            .get(source)
            .cloned()
            .map(|v| Box::new(v) as Box<dyn VideoSource>)
            .ok_or(DecodeError::NotFound {
                source_id: source.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_interpolation() {
        let audio = DecodedAudio::new(4, vec![vec![0.0, 1.0, 0.0]]);
        assert_eq!(audio.sample_at(0, 0.5), 0.5);
        assert_eq!(audio.sample_at(1, 1.0), 1.0);
        assert_eq!(audio.sample_at(0, 2.0), 0.0);
        assert_eq!(audio.sample_at(0, 7.0), 0.0);
        assert!((audio.duration_secs() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_wav_decoder_reads_int_samples() {
        let dir = tempfile::tempdir().unwrap();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.path().join("tone.wav"), spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(-16_384i16).unwrap();
        }
        writer.finalize().unwrap();

        let decoder = WavFileDecoder::new(dir.path());
        let audio = decoder.decode_audio(&SourceRef::new("tone.wav")).unwrap();
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frame_count(), 10);
        assert!((audio.channels[0][0] - 0.5).abs() < 1e-6);
        assert!((audio.channels[1][0] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_wav_decoder_reports_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("junk.wav"), b"not a wav").unwrap();
        let decoder = WavFileDecoder::new(dir.path());

        assert!(matches!(
            decoder.decode_audio(&SourceRef::new("missing.wav")),
            Err(DecodeError::NotFound { .. })
        ));
        assert!(matches!(
            decoder.decode_audio(&SourceRef::new("junk.wav")),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_frame_sequence_lookup() {
        let frames = vec![
            Frame::solid(2, 2, [1, 0, 0, 255]),
            Frame::solid(2, 2, [2, 0, 0, 255]),
        ];
        let mut seq = FrameSequence::new(frames, 10.0);
        assert_eq!(seq.frame_at(0.05).unwrap().pixel(0, 0)[0], 1);
        assert_eq!(seq.frame_at(0.15).unwrap().pixel(0, 0)[0], 2);
        assert_eq!(seq.frame_at(9.0).unwrap().pixel(0, 0)[0], 2);
        assert!((seq.info().duration_secs - 0.2).abs() < 1e-12);
    }
}
