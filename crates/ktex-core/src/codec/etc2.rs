//! ETC2 RGBA8 (colour + EAC alpha) block encoder.
//!
//! Each 4x4 block becomes 16 bytes: an 8-byte EAC alpha block followed by an
//! 8-byte colour block, both big-endian. Colour blocks only use the
//! ETC1-compatible individual and differential modes; differential bases are
//! kept in range so ETC2 decoders never reinterpret them as T/H/planar blocks.
//! Decoding is done by `texture2ddecoder`.

pub const BLOCK_SIZE: usize = 16;

/// Quality (0..=100) used for TEX output.
pub const ENCODE_QUALITY: u8 = 90;

const ETC_MODIFIERS: [[i32; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

const EAC_MODIFIERS: [[i32; 8]; 16] = [
    [-3, -6, -9, -15, 2, 5, 8, 14],
    [-3, -7, -10, -13, 2, 6, 9, 12],
    [-2, -5, -8, -13, 1, 4, 7, 12],
    [-2, -4, -6, -13, 1, 3, 5, 12],
    [-3, -6, -8, -12, 2, 5, 7, 11],
    [-3, -7, -9, -11, 2, 6, 8, 10],
    [-4, -7, -8, -11, 3, 6, 7, 10],
    [-3, -5, -8, -11, 2, 4, 7, 10],
    [-2, -6, -8, -10, 1, 5, 7, 9],
    [-2, -5, -8, -10, 1, 4, 7, 9],
    [-2, -4, -8, -10, 1, 3, 7, 9],
    [-2, -5, -7, -10, 1, 4, 6, 9],
    [-3, -4, -7, -10, 2, 3, 6, 9],
    [-1, -2, -3, -10, 0, 1, 2, 9],
    [-4, -6, -8, -9, 3, 5, 7, 8],
    [-3, -5, -7, -9, 2, 4, 6, 8],
];

// table 13, index 4 has a zero modifier
const EAC_IDENTITY_TABLE: u8 = 13;
const EAC_IDENTITY_INDEX: u8 = 4;

/// How colour error is measured while fitting a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMetric {
    /// Sum of squared per-channel differences.
    Numeric,
    /// Squared difference of luminance; used when the source has no chroma.
    Gray,
}

#[derive(Debug, Clone, Copy)]
struct Effort {
    both_flips: bool,
    refine_bases: bool,
    alpha_radius: i32,
}

impl Effort {
    fn from_quality(quality: u8) -> Self {
        Self {
            both_flips: quality >= 40,
            refine_bases: quality >= 80,
            alpha_radius: if quality >= 60 { 2 } else { 0 },
        }
    }
}

/// True when every pixel has `r == g == b`.
pub fn is_grayscale(rgba: &[u8]) -> bool {
    rgba.chunks_exact(4).all(|p| p[0] == p[1] && p[1] == p[2])
}

/// Encodes tightly packed RGBA8 pixels. Partial edge blocks repeat the last row/column.
pub fn encode_rgba8(rgba: &[u8], width: u32, height: u32, quality: u8) -> Vec<u8> {
    let metric = if is_grayscale(rgba) {
        ErrorMetric::Gray
    } else {
        ErrorMetric::Numeric
    };
    let effort = Effort::from_quality(quality);
    let (w, h) = (width as usize, height as usize);
    let (bw, bh) = (w.div_ceil(4), h.div_ceil(4));
    let mut out = Vec::with_capacity(bw * bh * BLOCK_SIZE);
    if w == 0 || h == 0 {
        return out;
    }

    for by in 0..bh {
        for bx in 0..bw {
            let mut block = [[0u8; 4]; 16];
            for py in 0..4 {
                for px in 0..4 {
                    let x = (bx * 4 + px).min(w - 1);
                    let y = (by * 4 + py).min(h - 1);
                    let i = (y * w + x) * 4;
                    block[py * 4 + px] = [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]];
                }
            }
            out.extend_from_slice(&encode_alpha_block(&block, effort).to_be_bytes());
            out.extend_from_slice(&encode_color_block(&block, metric, effort).to_be_bytes());
        }
    }
    out
}

/// Bit position of pixel (x, y) inside the index area; blocks are indexed column-major.
fn pixel_slot(x: usize, y: usize) -> usize {
    x * 4 + y
}

fn pack_alpha(base: u8, mult: u8, table: u8, indices: &[u8; 16]) -> u64 {
    let mut word = (base as u64) << 56 | (mult as u64) << 52 | (table as u64) << 48;
    for y in 0..4 {
        for x in 0..4 {
            let slot = pixel_slot(x, y);
            word |= (indices[y * 4 + x] as u64 & 0x7) << (45 - 3 * slot);
        }
    }
    word
}

fn fit_alpha(alphas: &[i32; 16], base: i32, mult: i32, table: &[i32; 8]) -> (u64, [u8; 16]) {
    let mut err = 0u64;
    let mut indices = [0u8; 16];
    for (i, &a) in alphas.iter().enumerate() {
        let mut best = (u64::MAX, 0u8);
        for (k, m) in table.iter().enumerate() {
            let v = (base + m * mult).clamp(0, 255);
            let d = (v - a).unsigned_abs() as u64;
            if d * d < best.0 {
                best = (d * d, k as u8);
            }
        }
        err += best.0;
        indices[i] = best.1;
    }
    (err, indices)
}

fn encode_alpha_block(block: &[[u8; 4]; 16], effort: Effort) -> u64 {
    let alphas: [i32; 16] = std::array::from_fn(|i| block[i][3] as i32);
    let lo = *alphas.iter().min().unwrap_or(&0);
    let hi = *alphas.iter().max().unwrap_or(&0);
    if lo == hi {
        return pack_alpha(
            lo as u8,
            1,
            EAC_IDENTITY_TABLE,
            &[EAC_IDENTITY_INDEX; 16],
        );
    }

    let mut best_err = u64::MAX;
    let mut best = 0u64;
    for (t, table) in EAC_MODIFIERS.iter().enumerate() {
        let tmin = table.iter().copied().min().unwrap_or(0);
        let tmax = table.iter().copied().max().unwrap_or(0);
        let span = tmax - tmin;
        let ideal = ((hi - lo) + span - 1) / span;
        for mult in (ideal - 1)..=(ideal + 1) {
            if !(1..=15).contains(&mult) {
                continue;
            }
            let center = (lo + hi) / 2 - (tmin + tmax) * mult / 2;
            for delta in -effort.alpha_radius..=effort.alpha_radius {
                let base = (center + delta).clamp(0, 255);
                let (err, indices) = fit_alpha(&alphas, base, mult, table);
                if err < best_err {
                    best_err = err;
                    best = pack_alpha(base as u8, mult as u8, t as u8, &indices);
                    if err == 0 {
                        return best;
                    }
                }
            }
        }
    }
    best
}

fn color_error(a: [i32; 3], b: [u8; 3], metric: ErrorMetric) -> u64 {
    let d = [
        a[0] - b[0] as i32,
        a[1] - b[1] as i32,
        a[2] - b[2] as i32,
    ];
    match metric {
        ErrorMetric::Numeric => (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]) as u64,
        ErrorMetric::Gray => {
            let l = (299 * d[0] + 587 * d[1] + 114 * d[2]) as i64;
            (l * l) as u64
        }
    }
}

fn modifier(table: usize, index: u8) -> i32 {
    let [a, b] = ETC_MODIFIERS[table];
    match index {
        0 => a,
        1 => b,
        2 => -a,
        _ => -b,
    }
}

#[derive(Debug, Clone, Copy)]
struct SubBlockFit {
    error: u64,
    table: u8,
    indices: [u8; 8],
}

/// Best table and per-pixel indices for `pixels` around the expanded `base` colour.
fn fit_sub_block(pixels: &[[u8; 3]; 8], base: [i32; 3], metric: ErrorMetric) -> SubBlockFit {
    let mut best = SubBlockFit {
        error: u64::MAX,
        table: 0,
        indices: [0; 8],
    };
    for table in 0..ETC_MODIFIERS.len() {
        let mut error = 0u64;
        let mut indices = [0u8; 8];
        for (i, p) in pixels.iter().enumerate() {
            let mut pix_best = (u64::MAX, 0u8);
            for idx in 0..4u8 {
                let m = modifier(table, idx);
                let c = [
                    (base[0] + m).clamp(0, 255),
                    (base[1] + m).clamp(0, 255),
                    (base[2] + m).clamp(0, 255),
                ];
                let e = color_error(c, *p, metric);
                if e < pix_best.0 {
                    pix_best = (e, idx);
                }
            }
            error += pix_best.0;
            indices[i] = pix_best.1;
            if error >= best.error {
                break;
            }
        }
        if error < best.error {
            best = SubBlockFit {
                error,
                table: table as u8,
                indices,
            };
        }
    }
    best
}

fn expand4(c: i32) -> i32 {
    (c << 4) | c
}

fn expand5(c: i32) -> i32 {
    (c << 3) | (c >> 2)
}

fn quantize(v: f32, bits: u32) -> i32 {
    let max = ((1 << bits) - 1) as f32;
    (v * max / 255.0).round().clamp(0.0, max) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Individual,
    Differential,
}

impl Mode {
    fn bits(self) -> u32 {
        match self {
            Mode::Individual => 4,
            Mode::Differential => 5,
        }
    }

    fn expand(self, q: [i32; 3]) -> [i32; 3] {
        match self {
            Mode::Individual => q.map(expand4),
            Mode::Differential => q.map(expand5),
        }
    }
}

fn diff_ok(a: [i32; 3], b: [i32; 3]) -> bool {
    (0..3).all(|c| (-4..=3).contains(&(b[c] - a[c])))
}

#[derive(Debug, Clone, Copy)]
struct ColorCandidate {
    error: u64,
    mode: Mode,
    flip: bool,
    bases: [[i32; 3]; 2],
    fits: [SubBlockFit; 2],
}

/// Splits the block into its two halves, returning the pixels and their (x, y) positions.
fn sub_blocks(block: &[[u8; 4]; 16], flip: bool) -> [([[u8; 3]; 8], [(usize, usize); 8]); 2] {
    let mut out = [([[0u8; 3]; 8], [(0usize, 0usize); 8]); 2];
    let mut counts = [0usize; 2];
    for y in 0..4 {
        for x in 0..4 {
            let half = if flip { usize::from(y >= 2) } else { usize::from(x >= 2) };
            let p = block[y * 4 + x];
            let n = counts[half];
            out[half].0[n] = [p[0], p[1], p[2]];
            out[half].1[n] = (x, y);
            counts[half] += 1;
        }
    }
    out
}

fn average(pixels: &[[u8; 3]; 8]) -> [f32; 3] {
    let mut sum = [0f32; 3];
    for p in pixels {
        for c in 0..3 {
            sum[c] += p[c] as f32;
        }
    }
    sum.map(|s| s / 8.0)
}

/// Tries every base within one quantization step of `start` for sub-block `which`.
fn refine_base(
    pixels: &[[u8; 3]; 8],
    mode: Mode,
    start: [i32; 3],
    other: [i32; 3],
    which: usize,
    metric: ErrorMetric,
) -> ([i32; 3], SubBlockFit) {
    let max = (1 << mode.bits()) - 1;
    let mut best_q = start;
    let mut best_fit = fit_sub_block(pixels, mode.expand(start), metric);
    for dr in -1..=1 {
        for dg in -1..=1 {
            for db in -1..=1 {
                // luminance alone cannot see chroma drift, so gray bases move together
                if metric == ErrorMetric::Gray && (dr != dg || dg != db) {
                    continue;
                }
                let q = [start[0] + dr, start[1] + dg, start[2] + db];
                if q == start || q.iter().any(|&v| v < 0 || v > max) {
                    continue;
                }
                if mode == Mode::Differential {
                    let (a, b) = if which == 0 { (q, other) } else { (other, q) };
                    if !diff_ok(a, b) {
                        continue;
                    }
                }
                let fit = fit_sub_block(pixels, mode.expand(q), metric);
                if fit.error < best_fit.error {
                    best_fit = fit;
                    best_q = q;
                }
            }
        }
    }
    (best_q, best_fit)
}

fn try_mode(
    halves: &[([[u8; 3]; 8], [(usize, usize); 8]); 2],
    mode: Mode,
    flip: bool,
    metric: ErrorMetric,
    effort: Effort,
) -> Option<ColorCandidate> {
    let mut bases = [
        average(&halves[0].0).map(|v| quantize(v, mode.bits())),
        average(&halves[1].0).map(|v| quantize(v, mode.bits())),
    ];
    if mode == Mode::Differential && !diff_ok(bases[0], bases[1]) {
        return None;
    }
    let mut fits = [
        fit_sub_block(&halves[0].0, mode.expand(bases[0]), metric),
        fit_sub_block(&halves[1].0, mode.expand(bases[1]), metric),
    ];
    if effort.refine_bases {
        for which in 0..2 {
            let other = bases[1 - which];
            let (q, fit) = refine_base(&halves[which].0, mode, bases[which], other, which, metric);
            bases[which] = q;
            fits[which] = fit;
        }
    }
    Some(ColorCandidate {
        error: fits[0].error + fits[1].error,
        mode,
        flip,
        bases,
        fits,
    })
}

fn pack_color(
    c: &ColorCandidate,
    halves: &[([[u8; 3]; 8], [(usize, usize); 8]); 2],
) -> u64 {
    let [b1, b2] = c.bases;
    let mut word: u64 = 0;
    match c.mode {
        Mode::Individual => {
            for ch in 0..3 {
                let shift = 60 - 8 * ch as u32;
                word |= (b1[ch] as u64 & 0xF) << shift;
                word |= (b2[ch] as u64 & 0xF) << (shift - 4);
            }
        }
        Mode::Differential => {
            for ch in 0..3 {
                let shift = 59 - 8 * ch as u32;
                let delta = (b2[ch] - b1[ch]) as u64 & 0x7;
                word |= (b1[ch] as u64 & 0x1F) << shift;
                word |= delta << (shift - 3);
            }
            word |= 1 << 33;
        }
    }
    word |= (c.fits[0].table as u64) << 37;
    word |= (c.fits[1].table as u64) << 34;
    if c.flip {
        word |= 1 << 32;
    }
    for half in 0..2 {
        for (i, &(x, y)) in halves[half].1.iter().enumerate() {
            let idx = c.fits[half].indices[i] as u64;
            let slot = pixel_slot(x, y);
            word |= (idx >> 1) << (16 + slot);
            word |= (idx & 1) << slot;
        }
    }
    word
}

fn encode_color_block(block: &[[u8; 4]; 16], metric: ErrorMetric, effort: Effort) -> u64 {
    let flips: &[bool] = if effort.both_flips { &[false, true] } else { &[false] };
    let mut best: Option<(ColorCandidate, [([[u8; 3]; 8], [(usize, usize); 8]); 2])> = None;
    for &flip in flips {
        let halves = sub_blocks(block, flip);
        for mode in [Mode::Differential, Mode::Individual] {
            if let Some(c) = try_mode(&halves, mode, flip, metric, effort) {
                if best.as_ref().is_none_or(|(b, _)| c.error < b.error) {
                    best = Some((c, halves));
                }
            }
        }
    }
    match best {
        Some((c, halves)) => pack_color(&c, &halves),
        // individual mode always produces a candidate
        None => unreachable!("no ETC colour candidate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_block_alpha_uses_zero_modifier() {
        let block = [[10u8, 20, 30, 77]; 16];
        let word = encode_alpha_block(&block, Effort::from_quality(ENCODE_QUALITY));
        assert_eq!(word >> 56, 77);
        assert_eq!((word >> 48) & 0xF, EAC_IDENTITY_TABLE as u64);
    }

    #[test]
    fn output_size_rounds_up_to_blocks() {
        let rgba = vec![128u8; 5 * 3 * 4];
        let out = encode_rgba8(&rgba, 5, 3, ENCODE_QUALITY);
        assert_eq!(out.len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn differential_bases_stay_in_range() {
        let mut block = [[0u8; 4]; 16];
        for (i, p) in block.iter_mut().enumerate() {
            let v = if i % 4 < 2 { 0 } else { 255 };
            *p = [v, v, v, 255];
        }
        let word = encode_color_block(&block, ErrorMetric::Gray, Effort::from_quality(90));
        if word & (1 << 33) != 0 {
            for ch in 0..3 {
                let shift = 59 - 8 * ch;
                let base = ((word >> shift) & 0x1F) as i32;
                let raw = ((word >> (shift - 3)) & 0x7) as i32;
                let delta = if raw >= 4 { raw - 8 } else { raw };
                assert!((0..=31).contains(&(base + delta)));
            }
        }
    }
}
