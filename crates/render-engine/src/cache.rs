//! Per-session media cache.
//!
//! One [`MediaCache`] is created per editor or export session and passed to
//! the renderers explicitly. Decoded audio is kept whole per source; video
//! frames go through a bounded LRU keyed by `(source id, timestamp ms)`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use splice_project_model::SourceRef;

use crate::compositor::Frame;
use crate::decode::{DecodedAudio, MediaDecoder, VideoSource};
use crate::error::DecodeError;

/// Default number of decoded frames kept in memory.
pub const DEFAULT_FRAME_CACHE_CAPACITY: usize = 256;

type FrameKey = (SourceRef, u64);

pub struct MediaCache {
    decoder: Box<dyn MediaDecoder>,
    audio: Mutex<HashMap<SourceRef, Arc<DecodedAudio>>>,
    videos: Mutex<HashMap<SourceRef, Box<dyn VideoSource>>>,
    frames: Mutex<LruCache<FrameKey, Arc<Frame>>>,
}

impl std::fmt::Debug for MediaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCache")
            .field("audio_sources", &lock(&self.audio).len())
            .field("cached_frames", &lock(&self.frames).len())
            .finish()
    }
}

/// Lock a cache map, recovering the data if another thread panicked while
/// holding it. The maps only ever hold complete entries.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MediaCache {
    pub fn new(decoder: impl MediaDecoder + 'static) -> Self {
        Self::with_frame_capacity(decoder, DEFAULT_FRAME_CACHE_CAPACITY)
    }

    pub fn with_frame_capacity(decoder: impl MediaDecoder + 'static, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            decoder: Box::new(decoder),
            audio: Mutex::new(HashMap::new()),
            videos: Mutex::new(HashMap::new()),
            frames: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Decoded audio for `source`, decoding on first use.
    ///
    /// Failures are not cached, so a fixed source is picked up on the next
    /// render.
    pub fn audio(&self, source: &SourceRef) -> Result<Arc<DecodedAudio>, DecodeError> {
        if let Some(hit) = lock(&self.audio).get(source) {
            return Ok(Arc::clone(hit));
        }
        let decoded = Arc::new(self.decoder.decode_audio(source)?);
        lock(&self.audio).insert(source.clone(), Arc::clone(&decoded));
        Ok(decoded)
    }

    /// Frame of `source` at source time `t` seconds.
    pub fn frame(&self, source: &SourceRef, t: f64) -> Result<Arc<Frame>, DecodeError> {
        let key = (source.clone(), (t.max(0.0) * 1000.0).round() as u64);
        if let Some(hit) = lock(&self.frames).get(&key) {
            return Ok(Arc::clone(hit));
        }

        let frame = {
            let mut videos = lock(&self.videos);
            if !videos.contains_key(source) {
                let opened = self.decoder.open_video(source)?;
                videos.insert(source.clone(), opened);
            }
            match videos.get_mut(source) {
                Some(video) => Arc::new(video.frame_at(t)?),
                None => {
                    return Err(DecodeError::NotFound {
                        source_id: source.to_string(),
                    })
                }
            }
        };

        lock(&self.frames).put(key, Arc::clone(&frame));
        Ok(frame)
    }

    pub fn cached_frame_count(&self) -> usize {
        lock(&self.frames).len()
    }

    /// Drop everything decoded so far.
    pub fn clear(&self) {
        lock(&self.audio).clear();
        lock(&self.videos).clear();
        lock(&self.frames).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{FrameSequence, InMemoryDecoder};

    #[test]
    fn test_audio_is_decoded_once() {
        let decoder = InMemoryDecoder::new()
            .with_audio("a", DecodedAudio::new(8_000, vec![vec![0.25; 8]]));
        let cache = MediaCache::new(decoder);
        let first = cache.audio(&SourceRef::new("a")).unwrap();
        let second = cache.audio(&SourceRef::new("a")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.audio(&SourceRef::new("b")).is_err());
    }

    #[test]
    fn test_frame_cache_is_bounded() {
        let frames = (0..10u8)
            .map(|i| Frame::solid(1, 1, [i, 0, 0, 255]))
            .collect();
        let decoder = InMemoryDecoder::new().with_video("v", FrameSequence::new(frames, 10.0));
        let cache = MediaCache::with_frame_capacity(decoder, 3);
        let source = SourceRef::new("v");

        for i in 0..10 {
            let frame = cache.frame(&source, i as f64 / 10.0).unwrap();
            assert_eq!(frame.pixel(0, 0)[0], i as u8);
        }
        assert_eq!(cache.cached_frame_count(), 3);

        cache.clear();
        assert_eq!(cache.cached_frame_count(), 0);
    }
}
