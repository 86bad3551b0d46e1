use image::RgbaImage;

use crate::error::{KTexError, Result};
use crate::model::Rect;

/// Copies all of `src` into `canvas` with its top-left at (dx, dy).
///
/// Pixels are replaced, not blended; parts falling outside the canvas are clipped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32) {
    let (cw, ch) = canvas.dimensions();
    for (x, y, px) in src.enumerate_pixels() {
        let (tx, ty) = (dx + x, dy + y);
        if tx < cw && ty < ch {
            canvas.put_pixel(tx, ty, *px);
        }
    }
}

/// Copies the `rect` region out of `src`.
pub fn crop_rgba(src: &RgbaImage, rect: &Rect) -> Result<RgbaImage> {
    let (w, h) = src.dimensions();
    if rect.is_empty() || rect.right() >= w || rect.bottom() >= h {
        return Err(KTexError::InvalidInput(format!(
            "region {}x{}+{}+{} lies outside the {}x{} image",
            rect.w, rect.h, rect.x, rect.y, w, h
        )));
    }
    Ok(image::imageops::crop_imm(src, rect.x, rect.y, rect.w, rect.h).to_image())
}
