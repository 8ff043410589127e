//! Video frame rendering and muxing.
//!
//! [`render_video`] walks the output frame clock, resolves the visible clip
//! for each frame, and hands composited frames to a [`FrameSink`]. The
//! ffmpeg-backed sink encodes raw RGBA from stdin together with the audio
//! mixdown into one container file.

use std::collections::HashSet;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use splice_common::time::FrameClock;
use splice_project_model::{
    Clip, ClipId, ClipPayload, ExportConfig, ExportFormat, Timeline, Track, TrackKind, TIME_EPSILON,
};

use crate::cache::MediaCache;
use crate::cancel::CancelToken;
use crate::compositor::{composite, Frame};
use crate::error::{RenderError, RenderResult};
use crate::graph::InvalidClip;
use crate::mixdown::MixBuffer;
use crate::wav::encode_wav;

/// Output raster and rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoRenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl VideoRenderConfig {
    pub fn from_export(config: &ExportConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
            fps: config.fps.max(1),
        }
    }
}

/// Receives ordered frames at a fixed rate plus the audio, and produces one
/// container file.
pub trait FrameSink: Send {
    fn push_frame(&mut self, frame: &Frame) -> RenderResult<()>;

    /// Complete the container with `audio`.
    fn finish(&mut self, audio: &MixBuffer) -> RenderResult<()>;

    /// Discard everything pushed so far. Must be safe to call more than once.
    fn abort(&mut self);
}

/// Collects frames in memory.
#[derive(Debug, Default)]
pub struct MemoryFrameSink {
    pub frames: Vec<Frame>,
    pub audio: Option<MixBuffer>,
    pub aborted: bool,
}

impl FrameSink for MemoryFrameSink {
    fn push_frame(&mut self, frame: &Frame) -> RenderResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self, audio: &MixBuffer) -> RenderResult<()> {
        self.audio = Some(audio.clone());
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.audio = None;
        self.aborted = true;
    }
}

/// What a finished frame walk produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoReport {
    pub frames: u64,
    pub invalid_clips: Vec<InvalidClip>,
}

/// The clip visible at `t`: later video tracks are layered above earlier
/// ones, muted tracks are hidden.
fn visible_clip(snapshot: &Timeline, t: f64) -> Option<(&Track, usize)> {
    snapshot
        .tracks
        .iter()
        .rev()
        .filter(|track| track.kind == TrackKind::Video && !track.muted)
        .find_map(|track| {
            track
                .clips
                .iter()
                .position(|c| c.contains(t))
                .map(|index| (track, index))
        })
}

struct FrameWalker<'a> {
    cache: &'a MediaCache,
    config: VideoRenderConfig,
    invalid: Vec<InvalidClip>,
    failed: HashSet<ClipId>,
}

impl FrameWalker<'_> {
    /// Source frame of `clip` at clip-relative time `local`, letterboxed and
    /// filtered. Black if the source cannot be decoded.
    fn clip_frame(&mut self, track: &Track, clip: &Clip, local: f64) -> Frame {
        let black = Frame::black(self.config.width, self.config.height);
        let ClipPayload::Video { source, filter } = &clip.payload else {
            return black;
        };
        if self.failed.contains(&clip.id) {
            return black;
        }

        let source_time = clip.source_offset + local.max(0.0) * clip.speed;
        match self.cache.frame(source, source_time) {
            Ok(frame) => {
                let mut out = frame.letterbox(self.config.width, self.config.height);
                if let Some(filter) = filter {
                    out.apply_filter(filter);
                }
                out
            }
            Err(err) => {
                tracing::warn!(
                    clip = %clip.id,
                    source = %source,
                    error = %err,
                    "Rendering black for clip: decode failed"
                );
                self.failed.insert(clip.id);
                self.invalid.push(InvalidClip {
                    clip_id: clip.id,
                    track_id: track.id,
                    reason: err.to_string(),
                });
                black
            }
        }
    }

    fn frame_at(&mut self, snapshot: &Timeline, t: f64) -> Frame {
        let Some((track, index)) = visible_clip(snapshot, t) else {
            return Frame::black(self.config.width, self.config.height);
        };
        let clip = &track.clips[index];
        let outgoing = self.clip_frame(track, clip, t - clip.start_time);

        let Some(transition) = clip.transition.filter(|tr| tr.effective_duration() > 0.0) else {
            return outgoing;
        };
        let Some(next) = track
            .clips
            .get(index + 1)
            .filter(|n| (n.start_time - clip.end_time()).abs() <= TIME_EPSILON)
        else {
            return outgoing;
        };

        let span = transition.effective_duration().min(clip.duration);
        let remaining = clip.end_time() - t;
        if remaining >= span {
            return outgoing;
        }
        let progress = (1.0 - remaining / span).clamp(0.0, 1.0);
        let incoming = self.clip_frame(track, next, 0.0);
        composite(&outgoing, &incoming, progress, &transition)
    }
}

/// Render every frame of `[0, duration)` into `sink`.
///
/// Cancellation is checked before each frame. On cancel the sink is left
/// untouched; aborting it is the caller's job.
#[tracing::instrument(skip_all, fields(width = config.width, height = config.height, fps = config.fps))]
pub fn render_video(
    snapshot: &Timeline,
    cache: &MediaCache,
    config: VideoRenderConfig,
    duration: f64,
    cancel: &CancelToken,
    sink: &mut dyn FrameSink,
    on_progress: &mut dyn FnMut(f64),
) -> RenderResult<VideoReport> {
    let clock = FrameClock::new(config.fps);
    let total = clock.frame_count(duration);
    let mut walker = FrameWalker {
        cache,
        config,
        invalid: vec![],
        failed: HashSet::new(),
    };

    for index in 0..total {
        cancel.check()?;
        let frame = walker.frame_at(snapshot, clock.time_of(index));
        sink.push_frame(&frame)?;
        on_progress((index + 1) as f64 / total as f64);
    }

    tracing::info!(frames = total, invalid_clips = walker.invalid.len(), "Video frames rendered");
    Ok(VideoReport {
        frames: total,
        invalid_clips: walker.invalid,
    })
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn codec_args(format: ExportFormat) -> Vec<&'static str> {
    match format {
        ExportFormat::Mp4H264 => vec![
            "-c:v", "libx264", "-preset", "medium", "-pix_fmt", "yuv420p", "-c:a", "aac", "-b:a",
            "192k", "-movflags", "+faststart", "-f", "mp4",
        ],
        ExportFormat::Webm => vec![
            "-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p", "-c:a", "libopus", "-b:a", "128k", "-f",
            "webm",
        ],
        ExportFormat::Wav => vec![],
    }
}

/// Encodes frames with an `ffmpeg` child process.
///
/// Frames stream as raw RGBA through stdin into a temp file beside the
/// output. [`FrameSink::finish`] writes the audio as a temp WAV, lets ffmpeg
/// mux both, and renames the result onto the output path.
pub struct FfmpegMuxer {
    output_path: PathBuf,
    format: ExportFormat,
    config: VideoRenderConfig,
    workdir: tempfile::TempDir,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
    frames: u64,
}

impl std::fmt::Debug for FfmpegMuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegMuxer")
            .field("output_path", &self.output_path)
            .field("format", &self.format)
            .field("frames", &self.frames)
            .finish()
    }
}

impl FfmpegMuxer {
    pub fn new(output_path: impl Into<PathBuf>, format: ExportFormat, config: VideoRenderConfig) -> RenderResult<Self> {
        if !format.has_video() {
            return Err(RenderError::Unsupported {
                message: format!("{format:?} carries no video"),
            });
        }
        if !command_exists("ffmpeg") {
            return Err(RenderError::Unsupported {
                message: "Video export needs ffmpeg in PATH".to_string(),
            });
        }
        let output_path = output_path.into();
        let dir = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let workdir = tempfile::Builder::new()
            .prefix(".splice-export-")
            .tempdir_in(&dir)
            .map_err(|e| RenderError::io(&dir, e))?;

        Ok(Self {
            output_path,
            format,
            config,
            workdir,
            child: None,
            stdin: None,
            stderr_task: None,
            frames: 0,
        })
    }

    fn video_path(&self) -> PathBuf {
        self.workdir.path().join("video.mkv")
    }

    /// Start the frame encoder on first use.
    fn ensure_started(&mut self) -> RenderResult<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let size = format!("{}x{}", self.config.width, self.config.height);
        let rate = self.config.fps.to_string();
        let video_path = self.video_path();

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-s", &size, "-r", &rate, "-i", "-"])
            .args(["-c:v", "ffv1"])
            .arg(&video_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| RenderError::encode(format!("Failed to start ffmpeg: {e}")))?;
        tracing::info!(pid = child.id(), size = %size, fps = self.config.fps, "ffmpeg frame encoder started");

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::encode("Failed to capture ffmpeg stderr"))?;
        // Drain stderr so ffmpeg never blocks on a full pipe.
        self.stderr_task = Some(std::thread::spawn(move || drain(stderr)));
        self.stdin = child.stdin.take();
        self.child = Some(child);
        Ok(())
    }

    fn wait_encoder(&mut self) -> RenderResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| RenderError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = self
            .stderr_task
            .take()
            .map(|task| task.join().unwrap_or_else(|_| "<failed to join stderr reader>".to_string()))
            .unwrap_or_default();
        if !status.success() {
            return Err(RenderError::encode(format!(
                "ffmpeg frame encode failed (status {status}): {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn mux(&self, audio_path: &Path) -> RenderResult<PathBuf> {
        let muxed = self.workdir.path().join(format!("out.{}", self.format.extension()));
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(self.video_path())
            .arg("-i")
            .arg(audio_path)
            .args(codec_args(self.format))
            .arg("-shortest")
            .arg(&muxed)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| RenderError::encode(format!("Failed to start ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(RenderError::encode(format!(
                "ffmpeg mux failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(muxed)
    }
}

fn drain(stderr: impl Read) -> String {
    let mut reader = BufReader::new(stderr);
    let mut output = String::new();
    match reader.read_to_string(&mut output) {
        Ok(_) => output,
        Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
    }
}

impl FrameSink for FfmpegMuxer {
    fn push_frame(&mut self, frame: &Frame) -> RenderResult<()> {
        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(RenderError::encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.config.width, self.config.height
            )));
        }
        self.ensure_started()?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RenderError::encode("ffmpeg stdin is closed"))?;
        stdin
            .write_all(&frame.rgba)
            .map_err(|e| RenderError::encode(format!("Failed writing frame to ffmpeg: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self, audio: &MixBuffer) -> RenderResult<()> {
        self.ensure_started()?;
        self.wait_encoder()?;

        let audio_path = self.workdir.path().join("audio.wav");
        std::fs::write(&audio_path, encode_wav(audio)).map_err(|e| RenderError::io(&audio_path, e))?;
        let muxed = self.mux(&audio_path)?;
        std::fs::rename(&muxed, &self.output_path).map_err(|e| RenderError::io(&self.output_path, e))?;

        tracing::info!(
            output = %self.output_path.display(),
            frames = self.frames,
            "Video export muxed"
        );
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = task.join();
        }
        tracing::debug!(frames = self.frames, "ffmpeg encoder aborted");
    }
}

impl Drop for FfmpegMuxer {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{FrameSequence, InMemoryDecoder};
    use splice_project_model::{SourceRef, Transition, TransitionKind};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn config() -> VideoRenderConfig {
        VideoRenderConfig {
            width: 4,
            height: 4,
            fps: 10,
        }
    }

    fn cache() -> MediaCache {
        MediaCache::new(
            InMemoryDecoder::new()
                .with_video("red", FrameSequence::new(vec![Frame::solid(4, 4, RED)], 10.0))
                .with_video("blue", FrameSequence::new(vec![Frame::solid(2, 2, BLUE)], 10.0))
                .with_failure("broken", "bad header"),
        )
    }

    fn video_track(clips: Vec<Clip>) -> Track {
        let mut track = Track::new(TrackKind::Video, "V1");
        track.clips = clips;
        track
    }

    fn render(timeline: &Timeline, duration: f64) -> (MemoryFrameSink, VideoReport) {
        let mut sink = MemoryFrameSink::default();
        let report = render_video(
            timeline,
            &cache(),
            config(),
            duration,
            &CancelToken::new(),
            &mut sink,
            &mut |_| {},
        )
        .unwrap();
        (sink, report)
    }

    #[test]
    fn test_gaps_render_black() {
        let mut timeline = Timeline::new();
        timeline.tracks.push(video_track(vec![Clip::video(SourceRef::new("red"), 0.5, 0.5, 10.0)]));
        let (sink, report) = render(&timeline, 1.0);
        assert_eq!(report.frames, 10);
        assert_eq!(sink.frames[0].pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(sink.frames[5].pixel(0, 0), RED);
    }

    #[test]
    fn test_later_track_is_on_top() {
        let mut timeline = Timeline::new();
        timeline.tracks.push(video_track(vec![Clip::video(SourceRef::new("red"), 0.0, 1.0, 10.0)]));
        timeline.tracks.push(video_track(vec![Clip::video(SourceRef::new("blue"), 0.0, 1.0, 10.0)]));
        let (sink, _) = render(&timeline, 0.2);
        assert_eq!(sink.frames[0].pixel(2, 2), BLUE);

        timeline.tracks[1].muted = true;
        let (sink, _) = render(&timeline, 0.2);
        assert_eq!(sink.frames[0].pixel(2, 2), RED);
    }

    #[test]
    fn test_crossfade_runs_over_trailing_edge() {
        let mut first = Clip::video(SourceRef::new("red"), 0.0, 1.0, 10.0);
        let mut tr = Transition::new(TransitionKind::Crossfade);
        tr.duration = 0.5;
        first.transition = Some(tr);
        let second = Clip::video(SourceRef::new("blue"), 1.0, 1.0, 10.0);

        let mut timeline = Timeline::new();
        timeline.tracks.push(video_track(vec![first, second]));
        let (sink, _) = render(&timeline, 2.0);

        assert_eq!(sink.frames[4].pixel(2, 2), RED);
        // Frame 7 is 0.3 s before the cut: progress 0.4.
        let mid = sink.frames[7].pixel(2, 2);
        assert!(mid[0] > 0 && mid[2] > 0, "{mid:?}");
        assert_eq!(sink.frames[10].pixel(2, 2), BLUE);
    }

    #[test]
    fn test_decode_failure_is_recorded_once() {
        let mut timeline = Timeline::new();
        timeline.tracks.push(video_track(vec![Clip::video(SourceRef::new("broken"), 0.0, 1.0, 10.0)]));
        let (sink, report) = render(&timeline, 1.0);
        assert_eq!(report.invalid_clips.len(), 1);
        assert!(sink.frames.iter().all(|f| f.pixel(0, 0) == [0, 0, 0, 255]));
    }

    #[test]
    fn test_cancel_stops_before_first_frame() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sink = MemoryFrameSink::default();
        let result = render_video(
            &Timeline::new(),
            &cache(),
            config(),
            1.0,
            &cancel,
            &mut sink,
            &mut |_| {},
        );
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert!(sink.frames.is_empty());
    }
}
