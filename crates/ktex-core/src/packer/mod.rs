use tracing::debug;

use crate::error::{KTexError, Result};
use crate::model::Rect;

pub mod guillotine;

pub use guillotine::GuillotinePacker;

/// Smallest power of two `>= v` (1 for 0).
pub fn ceil_pow2(mut v: u32) -> u32 {
    if v <= 1 {
        return 1;
    }
    v -= 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v + 1
}

/// Power of two closest to `v`; halfway values round up.
pub fn round_pow2(v: u32) -> u32 {
    let hi = ceil_pow2(v);
    if hi == v {
        return hi;
    }
    let lo = hi / 2;
    if v - lo < hi - v { lo } else { hi }
}

/// Starting canvas for a set of boxes: a roughly square, power-of-two area at least as wide as tall.
pub fn initial_canvas(boxes: &[(u32, u32)]) -> (u32, u32) {
    let total: u64 = boxes.iter().map(|&(w, h)| w as u64 * h as u64).sum();
    let side = (total as f64).sqrt() as u32;
    (ceil_pow2(side), round_pow2(side))
}

/// Packs every box, doubling the shorter canvas side and starting over until everything fits.
///
/// Returns the final canvas size and one top-left placement per box, in input order.
pub fn pack_growing(boxes: &[(u32, u32)], width: u32, height: u32) -> Result<((u32, u32), Vec<Rect>)> {
    let (mut width, mut height) = (width.max(1), height.max(1));
    loop {
        if let Some(placed) = GuillotinePacker::new(width, height).pack_map(boxes) {
            return Ok(((width, height), placed));
        }
        let grown = if width <= height {
            width.checked_mul(2).map(|w| (w, height))
        } else {
            height.checked_mul(2).map(|h| (width, h))
        };
        (width, height) = grown.ok_or_else(|| {
            KTexError::InvalidInput(format!("boxes do not fit any canvas up to {width}x{height}"))
        })?;
        debug!(width, height, "atlas canvas grown");
    }
}
