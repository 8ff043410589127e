//! Frame compositor: RGBA frames, letterboxing, and transition blends.
//!
//! [`composite`] is a pure function of its inputs. Glitch jitter comes from
//! a generator seeded by the transition options and the quantized progress,
//! so the same call always yields the same frame.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use splice_project_model::{
    SlideDirection, Transition, TransitionKind, VisualFilter, ZoomMode,
};

/// Zoom scale reached by the outgoing frame (`In`) or started from by the
/// incoming frame (`Out`).
const ZOOM_LARGE: f64 = 1.3;
const ZOOM_SMALL: f64 = 0.7;

/// Fraction of the frame extent covered by the whip-pan blur at its peak.
const WHIP_BLUR_FRACTION: f64 = 0.04;

/// Glitch intensity below which the frame is left intact.
const GLITCH_THRESHOLD: f64 = 0.3;
const GLITCH_SLICES: u32 = 12;
/// Maximum horizontal slice displacement as a fraction of the width.
const GLITCH_MAX_SHIFT: f64 = 0.1;
/// Maximum red/blue channel offset in pixels for the flash.
const GLITCH_FLASH_PX: f64 = 8.0;

/// An 8-bit RGBA frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Opaque black frame.
    pub fn black(width: u32, height: u32) -> Self {
        Self::solid(width, height, [0, 0, 0, 255])
    }

    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut rgba = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            rgba.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        let i = self.offset(x, y);
        self.rgba[i..i + 4].copy_from_slice(&color);
    }

    /// Pixel at signed coordinates, or `None` outside the frame.
    fn sample(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            None
        } else {
            Some(self.pixel(x as u32, y as u32))
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Scale to fit inside `width`×`height`, preserving aspect, centered on black.
    pub fn letterbox(&self, width: u32, height: u32) -> Frame {
        if self.width == width && self.height == height {
            return self.clone();
        }
        let mut out = Frame::black(width, height);
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return out;
        }

        let scale = (width as f64 / self.width as f64).min(height as f64 / self.height as f64);
        let fit_w = ((self.width as f64 * scale).round() as u32).clamp(1, width);
        let fit_h = ((self.height as f64 * scale).round() as u32).clamp(1, height);
        let left = (width - fit_w) / 2;
        let top = (height - fit_h) / 2;

        for y in 0..fit_h {
            let sy = ((y as f64 + 0.5) / scale) as u32;
            for x in 0..fit_w {
                let sx = ((x as f64 + 0.5) / scale) as u32;
                let color = self.pixel(sx.min(self.width - 1), sy.min(self.height - 1));
                out.set_pixel(left + x, top + y, color);
            }
        }
        out
    }

    /// Apply a colour adjustment in place.
    ///
    /// Brightness, contrast and saturation are offsets from neutral in
    /// `[-1, 1]`; temperature shifts red against blue.
    pub fn apply_filter(&mut self, filter: &VisualFilter) {
        if *filter == VisualFilter::default() {
            return;
        }
        let brightness = filter.brightness.clamp(-1.0, 1.0);
        let contrast = 1.0 + filter.contrast.clamp(-1.0, 1.0);
        let saturation = 1.0 + filter.saturation.clamp(-1.0, 1.0);
        let temperature = filter.temperature.clamp(-1.0, 1.0) * 0.1;

        for px in self.rgba.chunks_exact_mut(4) {
            let mut rgb = [
                px[0] as f64 / 255.0,
                px[1] as f64 / 255.0,
                px[2] as f64 / 255.0,
            ];
            let luma = 0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2];
            for c in &mut rgb {
                *c = luma + (*c - luma) * saturation;
                *c = (*c - 0.5) * contrast + 0.5 + brightness;
            }
            rgb[0] += temperature;
            rgb[2] -= temperature;
            for (dst, v) in px.iter_mut().zip(rgb) {
                *dst = to_byte(v * 255.0);
            }
        }
    }
}

fn to_byte(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn mix(a: [u8; 4], b: [u8; 4], t: f64) -> [u8; 4] {
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = to_byte(a[i] as f64 * (1.0 - t) + b[i] as f64 * t);
    }
    out
}

fn scale_rgb(p: [u8; 4], k: f64) -> [u8; 4] {
    [
        to_byte(p[0] as f64 * k),
        to_byte(p[1] as f64 * k),
        to_byte(p[2] as f64 * k),
        p[3],
    ]
}

const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Blend two frames at `progress` ∈ `[0, 1]` according to `transition`.
///
/// The incoming frame is letterboxed to the outgoing frame's size first.
pub fn composite(outgoing: &Frame, incoming: &Frame, progress: f64, transition: &Transition) -> Frame {
    let incoming = if incoming.width != outgoing.width || incoming.height != outgoing.height {
        incoming.letterbox(outgoing.width, outgoing.height)
    } else {
        incoming.clone()
    };
    let p = transition.easing.apply(progress);

    match transition.kind {
        TransitionKind::Cut => {
            if p < 0.5 {
                outgoing.clone()
            } else {
                incoming
            }
        }
        TransitionKind::Crossfade => crossfade(outgoing, &incoming, p),
        TransitionKind::Zoom => zoom(outgoing, &incoming, p, transition.options.zoom),
        TransitionKind::Slide => slide(outgoing, &incoming, p, transition.options.direction),
        TransitionKind::WhipPan => whip_pan(outgoing, &incoming, p, transition.options.direction),
        TransitionKind::Glitch => glitch(outgoing, &incoming, p, transition),
        TransitionKind::FadeToBlack => fade_to_black(outgoing, &incoming, p),
    }
}

fn crossfade(a: &Frame, b: &Frame, p: f64) -> Frame {
    let rgba = a
        .rgba
        .iter()
        .zip(&b.rgba)
        .map(|(&x, &y)| to_byte(x as f64 * (1.0 - p) + y as f64 * p))
        .collect();
    Frame {
        width: a.width,
        height: a.height,
        rgba,
    }
}

/// Nearest-neighbour sample of `frame` scaled by `scale` about its centre.
fn sample_scaled(frame: &Frame, x: u32, y: u32, scale: f64) -> [u8; 4] {
    let cx = frame.width as f64 / 2.0;
    let cy = frame.height as f64 / 2.0;
    let sx = ((x as f64 + 0.5 - cx) / scale + cx).floor() as i64;
    let sy = ((y as f64 + 0.5 - cy) / scale + cy).floor() as i64;
    frame.sample(sx, sy).unwrap_or(BLACK)
}

fn zoom(a: &Frame, b: &Frame, p: f64, mode: ZoomMode) -> Frame {
    let (out_scale, in_scale) = match mode {
        ZoomMode::In => (
            1.0 + (ZOOM_LARGE - 1.0) * p,
            ZOOM_SMALL + (1.0 - ZOOM_SMALL) * p,
        ),
        ZoomMode::Out => (
            1.0 - (1.0 - ZOOM_SMALL) * p,
            ZOOM_LARGE - (ZOOM_LARGE - 1.0) * p,
        ),
    };
    let mut out = Frame::black(a.width, a.height);
    for y in 0..a.height {
        for x in 0..a.width {
            let pa = sample_scaled(a, x, y, out_scale);
            let pb = sample_scaled(b, x, y, in_scale);
            out.set_pixel(x, y, mix(pa, pb, p));
        }
    }
    out
}

/// Unit step for a direction: the way the outgoing frame travels.
fn direction_step(direction: SlideDirection) -> (i64, i64) {
    match direction {
        SlideDirection::Left => (-1, 0),
        SlideDirection::Right => (1, 0),
        SlideDirection::Up => (0, -1),
        SlideDirection::Down => (0, 1),
    }
}

fn extent(frame: &Frame, direction: SlideDirection) -> f64 {
    match direction {
        SlideDirection::Left | SlideDirection::Right => frame.width as f64,
        SlideDirection::Up | SlideDirection::Down => frame.height as f64,
    }
}

fn slide(a: &Frame, b: &Frame, p: f64, direction: SlideDirection) -> Frame {
    let (dx, dy) = direction_step(direction);
    let ext = extent(a, direction);
    let shift = (p * ext).round() as i64;
    let ext = ext as i64;

    let mut out = Frame::black(a.width, a.height);
    for y in 0..a.height {
        for x in 0..a.width {
            // Outgoing is displaced by +shift along the step, incoming sits
            // one extent behind it.
            let ax = x as i64 - dx * shift;
            let ay = y as i64 - dy * shift;
            let color = a
                .sample(ax, ay)
                .or_else(|| b.sample(ax + dx * ext, ay + dy * ext))
                .unwrap_or(BLACK);
            out.set_pixel(x, y, color);
        }
    }
    out
}

fn translate(frame: &Frame, dx: i64, dy: i64) -> Frame {
    let mut out = Frame::black(frame.width, frame.height);
    for y in 0..frame.height {
        for x in 0..frame.width {
            if let Some(color) = frame.sample(x as i64 - dx, y as i64 - dy) {
                out.set_pixel(x, y, color);
            }
        }
    }
    out
}

/// Box blur along one axis.
fn motion_blur(frame: &Frame, radius: i64, horizontal: bool) -> Frame {
    if radius <= 0 {
        return frame.clone();
    }
    let mut out = frame.clone();
    for y in 0..frame.height {
        for x in 0..frame.width {
            let mut acc = [0u32; 4];
            let mut n = 0u32;
            for k in -radius..=radius {
                let (sx, sy) = if horizontal {
                    (x as i64 + k, y as i64)
                } else {
                    (x as i64, y as i64 + k)
                };
                if let Some(p) = frame.sample(sx, sy) {
                    for i in 0..4 {
                        acc[i] += p[i] as u32;
                    }
                    n += 1;
                }
            }
            let n = n.max(1);
            out.set_pixel(x, y, acc.map(|v| (v / n) as u8));
        }
    }
    out
}

fn whip_pan(a: &Frame, b: &Frame, p: f64, direction: SlideDirection) -> Frame {
    let (dx, dy) = direction_step(direction);
    let ext = extent(a, direction);
    let blur = ((p * std::f64::consts::PI).sin() * ext * WHIP_BLUR_FRACTION).round() as i64;
    let horizontal = dy == 0;

    let moved = if p < 0.5 {
        let shift = (p * ext).round() as i64;
        translate(a, dx * shift, dy * shift)
    } else {
        let shift = ((1.0 - p) * ext).round() as i64;
        translate(b, -dx * shift, -dy * shift)
    };
    motion_blur(&moved, blur, horizontal)
}

fn glitch(a: &Frame, b: &Frame, p: f64, transition: &Transition) -> Frame {
    let base = if p < 0.5 { a } else { b };
    let intensity = (p * std::f64::consts::PI).sin();
    if intensity <= GLITCH_THRESHOLD || base.width == 0 || base.height == 0 {
        return base.clone();
    }

    let quantized = (p * 1000.0).round() as u64;
    let mut rng = ChaCha8Rng::seed_from_u64(transition.options.seed ^ quantized);

    let slice_h = (base.height / GLITCH_SLICES).max(1);
    let max_shift = base.width as f64 * GLITCH_MAX_SHIFT * intensity;
    let width = base.width as i64;
    let flash = if transition.options.flash {
        (GLITCH_FLASH_PX * intensity).round() as i64
    } else {
        0
    };

    let mut out = base.clone();
    let mut top = 0;
    while top < base.height {
        let shift = (rng.random_range(-1.0..=1.0) * max_shift).round() as i64;
        let bottom = (top + slice_h).min(base.height);
        for y in top..bottom {
            for x in 0..base.width {
                let src = |offset: i64| {
                    let sx = (x as i64 - shift + offset).rem_euclid(width);
                    base.pixel(sx as u32, y)
                };
                let center = src(0);
                let color = if flash > 0 {
                    [src(flash)[0], center[1], src(-flash)[2], center[3]]
                } else {
                    center
                };
                out.set_pixel(x, y, color);
            }
        }
        top = bottom;
    }
    out
}

fn fade_to_black(a: &Frame, b: &Frame, p: f64) -> Frame {
    let (frame, k) = if p < 0.5 {
        (a, 1.0 - 2.0 * p)
    } else {
        (b, 2.0 * p - 1.0)
    };
    let mut out = frame.clone();
    for px in out.rgba.chunks_exact_mut(4) {
        let scaled = scale_rgb([px[0], px[1], px[2], px[3]], k);
        px.copy_from_slice(&scaled);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_project_model::{Easing, TransitionOptions};

    fn gradient(width: u32, height: u32, tint: u8) -> Frame {
        let mut f = Frame::black(width, height);
        for y in 0..height {
            for x in 0..width {
                f.set_pixel(x, y, [(x * 20) as u8, (y * 20) as u8, tint, 255]);
            }
        }
        f
    }

    fn all_kinds() -> impl Iterator<Item = Transition> {
        TransitionKind::ALL.into_iter().map(Transition::new)
    }

    #[test]
    fn test_crossfade_boundaries() {
        let a = gradient(8, 6, 10);
        let b = gradient(8, 6, 200);
        let t = Transition::new(TransitionKind::Crossfade);
        assert_eq!(composite(&a, &b, 0.0, &t), a);
        assert_eq!(composite(&a, &b, 1.0, &t), b);

        let mid = composite(&a, &b, 0.5, &t);
        assert_eq!(mid.pixel(0, 0)[2], 105);
    }

    #[test]
    fn test_cut_switches_at_midpoint_inclusive() {
        let a = Frame::solid(4, 4, [255, 0, 0, 255]);
        let b = Frame::solid(4, 4, [0, 0, 255, 255]);
        let t = Transition::new(TransitionKind::Cut);
        assert_eq!(composite(&a, &b, 0.499, &t), a);
        assert_eq!(composite(&a, &b, 0.5, &t), b);
    }

    #[test]
    fn test_every_kind_hits_its_endpoints() {
        let a = gradient(10, 8, 30);
        let b = gradient(10, 8, 220);
        for t in all_kinds() {
            assert_eq!(composite(&a, &b, 0.0, &t), a, "{:?} at 0", t.kind);
            assert_eq!(composite(&a, &b, 1.0, &t), b, "{:?} at 1", t.kind);
        }
    }

    #[test]
    fn test_fade_to_black_midpoint_is_black() {
        let a = Frame::solid(3, 3, [200, 100, 50, 255]);
        let b = Frame::solid(3, 3, [10, 20, 30, 255]);
        let t = Transition::new(TransitionKind::FadeToBlack);
        assert_eq!(composite(&a, &b, 0.5, &t), Frame::black(3, 3));
        assert_eq!(composite(&a, &b, 0.25, &t).pixel(1, 1), [100, 50, 25, 255]);
    }

    #[test]
    fn test_slide_splits_frame() {
        let a = Frame::solid(10, 2, [255, 0, 0, 255]);
        let b = Frame::solid(10, 2, [0, 255, 0, 255]);
        let t = Transition::new(TransitionKind::Slide);
        let f = composite(&a, &b, 0.3, &t);
        assert_eq!(f.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(f.pixel(6, 0), [255, 0, 0, 255]);
        assert_eq!(f.pixel(7, 0), [0, 255, 0, 255]);
    }

    /// Columns are all distinct, so any horizontal shift shows up.
    fn columns(width: u32, height: u32, tint: u8) -> Frame {
        let mut f = Frame::black(width, height);
        for y in 0..height {
            for x in 0..width {
                f.set_pixel(x, y, [(x * 6) as u8, (y * 10) as u8, tint, 255]);
            }
        }
        f
    }

    /// Horizontal rotation that maps `base`'s row `y` onto `out`'s, if any.
    fn row_shift(base: &Frame, out: &Frame, y: u32, max: i64) -> Option<i64> {
        let w = base.width as i64;
        (-max..=max).find(|&s| {
            (0..base.width).all(|x| {
                let sx = (x as i64 - s).rem_euclid(w) as u32;
                out.pixel(x, y) == base.pixel(sx, y)
            })
        })
    }

    fn glitch_with(seed: u64, flash: bool) -> Transition {
        Transition::new(TransitionKind::Glitch).with_options(TransitionOptions {
            seed,
            flash,
            ..TransitionOptions::default()
        })
    }

    #[test]
    fn test_glitch_is_deterministic_per_seed() {
        let a = columns(40, 24, 0);
        let b = columns(40, 24, 255);
        let t = glitch_with(1, true);
        let first = composite(&a, &b, 0.5, &t);
        assert_eq!(first, composite(&a, &b, 0.5, &t));
        assert_ne!(first, b);

        let other = composite(&a, &b, 0.5, &glitch_with(2, true));
        assert_ne!(first, other);
    }

    #[test]
    fn test_glitch_slices_move_whole_rows() {
        let a = columns(40, 24, 0);
        let b = columns(40, 24, 255);
        let out = composite(&a, &b, 0.5, &glitch_with(9, false));

        // 12 slices of 2 rows, each rotated by at most 10% of the width.
        let shifts: Vec<i64> = (0..24)
            .map(|y| row_shift(&b, &out, y, 4).expect("row is a rotation of the base"))
            .collect();
        for pair in shifts.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
        assert!(shifts.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_glitch_below_threshold_is_untouched() {
        let a = columns(40, 24, 0);
        let b = columns(40, 24, 255);
        let t = glitch_with(3, true);
        // sin(0.05π) ≈ 0.16 stays under the intensity threshold.
        assert_eq!(composite(&a, &b, 0.05, &t), a);
        assert_eq!(composite(&a, &b, 0.95, &t), b);
    }

    fn stripes(width: u32, height: u32) -> Frame {
        let mut f = Frame::black(width, height);
        for y in 0..height {
            for x in (0..width).step_by(2) {
                f.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        f
    }

    #[test]
    fn test_whip_pan_blur_peaks_mid_transition() {
        let a = stripes(50, 2);
        let b = stripes(50, 2);
        let t = Transition::new(TransitionKind::WhipPan);
        let is_sharp = |f: &Frame| f.rgba.chunks_exact(4).all(|p| p[0] == 0 || p[0] == 255);

        // Blur radius is round(sin(pπ) · 50 · 0.04): 0 near the ends, 2 at p = 0.5.
        assert!(is_sharp(&composite(&a, &b, 0.02, &t)));
        assert!(is_sharp(&composite(&a, &b, 0.98, &t)));

        let mid = composite(&a, &b, 0.5, &t);
        assert!(!is_sharp(&mid));
        // Incoming is 25px in from the right; x = 40 averages b's columns 13..=17.
        assert_eq!(mid.pixel(40, 0)[0], 102);
        assert_eq!(mid.pixel(10, 0), BLACK);
    }

    #[test]
    fn test_zoom_in_scales_outgoing_about_centre() {
        let mut a = Frame::black(20, 4);
        for y in 0..4 {
            for x in 0..20 {
                a.set_pixel(x, y, [(x * 10) as u8, 0, 0, 255]);
            }
        }
        let b = Frame::black(20, 4);
        let t = Transition::new(TransitionKind::Zoom);

        // At p = 0.5 the outgoing frame is scaled by 1.15 and mixed half-way
        // with black: the centre column holds, the edges are pulled inward.
        let mid = composite(&a, &b, 0.5, &t);
        assert_eq!(mid.pixel(10, 1)[0], 50);
        assert_eq!(mid.pixel(0, 1)[0], 5);
        assert_eq!(mid.pixel(19, 1)[0], 90);
    }

    #[test]
    fn test_easing_drives_progress() {
        let a = Frame::solid(2, 2, [0, 0, 0, 255]);
        let b = Frame::solid(2, 2, [200, 200, 200, 255]);
        let t = Transition::new(TransitionKind::Crossfade).with_easing(Easing::EaseIn);
        assert_eq!(composite(&a, &b, 0.5, &t).pixel(0, 0)[0], 50);
    }

    #[test]
    fn test_letterbox_centres_wide_source() {
        let wide = Frame::solid(8, 2, [9, 9, 9, 255]);
        let boxed = wide.letterbox(8, 8);
        assert_eq!(boxed.pixel(0, 0), BLACK);
        assert_eq!(boxed.pixel(4, 4), [9, 9, 9, 255]);
        assert_eq!(boxed.pixel(4, 7), BLACK);
    }
}
