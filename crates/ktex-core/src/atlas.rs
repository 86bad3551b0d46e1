//! Packing named images into one bottom-up atlas, and slicing them back out.

use std::collections::BTreeMap;

use image::{RgbaImage, imageops};
use tracing::{debug, instrument};

use crate::compositing::{blit_rgba, crop_rgba};
use crate::config::PackOptions;
use crate::error::{KTexError, Result};
use crate::model::{Atlas, Rect};
use crate::packer::{ceil_pow2, initial_canvas, pack_growing};

/// Images keyed by element name. Iteration order (by name) fixes the packing order.
pub type NamedImages = BTreeMap<String, RgbaImage>;

fn finish(canvas: RgbaImage, top_down: BTreeMap<String, Rect>) -> Atlas {
    let height = canvas.height();
    let elements = top_down
        .into_iter()
        .map(|(name, r)| (name, r.flip_vertical(height)))
        .collect();
    Atlas {
        image: imageops::flip_vertical(&canvas),
        elements,
    }
}

fn pack_single(name: &str, image: &RgbaImage) -> Atlas {
    let (w, h) = image.dimensions();
    let mut canvas = RgbaImage::new(ceil_pow2(w), ceil_pow2(h));
    blit_rgba(image, &mut canvas, 0, 0);
    let mut top_down = BTreeMap::new();
    top_down.insert(name.to_string(), Rect::new(0, 0, w, h));
    finish(canvas, top_down)
}

/// Packs `images` into a single transparent canvas.
///
/// One image gets a power-of-two canvas of its own; several are bin-packed
/// starting from a power-of-two estimate of their total area, with an optional
/// one pixel margin right of and below every element.
#[instrument(skip_all, fields(images = images.len()))]
pub fn pack_atlas(images: &NamedImages, opts: &PackOptions) -> Result<Atlas> {
    if images.is_empty() {
        return Err(KTexError::Empty);
    }
    if let Some((name, img)) = images.iter().find(|(_, img)| img.width() == 0 || img.height() == 0) {
        return Err(KTexError::InvalidInput(format!(
            "element '{name}' is empty ({}x{})",
            img.width(),
            img.height()
        )));
    }
    if images.len() == 1 {
        let (name, img) = images.iter().next().ok_or(KTexError::Empty)?;
        return Ok(pack_single(name, img));
    }

    let margin = u32::from(opts.use_margin);
    let boxes: Vec<(u32, u32)> = images
        .values()
        .map(|img| (img.width() + margin, img.height() + margin))
        .collect();
    let (start_w, start_h) = initial_canvas(&boxes);
    debug!(start_w, start_h, "initial atlas estimate");
    let ((width, height), placed) = pack_growing(&boxes, start_w, start_h)?;

    let mut canvas = RgbaImage::new(width, height);
    let mut top_down = BTreeMap::new();
    for ((name, img), slot) in images.iter().zip(placed) {
        blit_rgba(img, &mut canvas, slot.x, slot.y);
        top_down.insert(name.clone(), Rect::new(slot.x, slot.y, img.width(), img.height()));
    }
    Ok(finish(canvas, top_down))
}

/// Slices every element back out of `atlas`.
pub fn unpack_atlas(atlas: &Atlas) -> Result<NamedImages> {
    let top_down_image = imageops::flip_vertical(&atlas.image);
    let (width, height) = atlas.image.dimensions();
    let mut out = NamedImages::new();
    for (name, rect) in &atlas.elements {
        if rect.is_empty() || rect.right() >= width || rect.bottom() >= height {
            return Err(KTexError::InvalidInput(format!(
                "element '{name}' {rect:?} lies outside the {width}x{height} atlas"
            )));
        }
        let img = crop_rgba(&top_down_image, &rect.flip_vertical(height))?;
        out.insert(name.clone(), img);
    }
    Ok(out)
}
