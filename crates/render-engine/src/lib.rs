//! Splice Render Engine
//!
//! Offline rendering of a timeline snapshot: note synthesis, per-track
//! effects, mixdown to 16-bit WAV, and frame compositing for video export.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Arc<Timeline> ──┐
//!                 ├── RenderGraph (fresh per export)
//! MediaCache ─────┘        │
//!                          ├── clip → fades → clip FX ─┐
//!                          │                           ├── EQ → compressor → track gain
//!                          ├── notes → voices ─────────┘              │
//!                          │                                          ▼
//!                          │                                  master gain, clamp
//!                          │                                          │
//!                          │                                          ├── WAV (atomic write)
//!                          ▼                                          │
//!                  frame walker → compositor ──────────── FrameSink ◄─┘
//!                                                             │
//!                                                             ▼
//!                                                         output.mp4
//! ```

pub mod cache;
pub mod cancel;
pub mod compositor;
pub mod decode;
pub mod dsp;
pub mod error;
pub mod export;
pub mod graph;
pub mod mixdown;
pub mod synth;
pub mod video;
pub mod wav;

pub use cache::MediaCache;
pub use cancel::CancelToken;
pub use compositor::{composite, Frame};
pub use decode::{DecodedAudio, FrameSequence, InMemoryDecoder, MediaDecoder, VideoSource, WavFileDecoder};
pub use error::{DecodeError, RenderError, RenderResult};
pub use export::*;
pub use graph::{GraphConfig, InvalidClip, RenderGraph};
pub use mixdown::{render_mixdown, render_mixdown_with_progress, MixBuffer, MixdownConfig, RenderReport};
pub use synth::{LiveSynth, ParamAutomation, ScheduledVoice};
pub use video::{render_video, FfmpegMuxer, FrameSink, MemoryFrameSink, VideoRenderConfig, VideoReport};
pub use wav::{decode_wav_pcm16, encode_wav, write_atomic};
