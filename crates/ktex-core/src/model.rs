use std::collections::BTreeMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is the origin corner; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges). Empty rects are never contained.
    pub fn contains(&self, r: &Rect) -> bool {
        !self.is_empty()
            && !r.is_empty()
            && r.x >= self.x
            && r.y >= self.y
            && r.right() <= self.right()
            && r.bottom() <= self.bottom()
    }
    /// True when the two rects share at least one pixel.
    pub fn intersects(&self, r: &Rect) -> bool {
        !self.is_empty()
            && !r.is_empty()
            && self.x <= r.right()
            && r.x <= self.right()
            && self.y <= r.bottom()
            && r.y <= self.bottom()
    }
    /// Mirrors the rect across the horizontal center line of an image `height` pixels tall.
    ///
    /// Converts between top-down and bottom-up conventions; applying it twice is the identity.
    pub fn flip_vertical(&self, height: u32) -> Rect {
        // (height - 1) - bottom; saturates for rects that do not fit in `height`
        Rect::new(self.x, height.saturating_sub(self.y + self.h), self.w, self.h)
    }
}

/// Composite image plus the named element rectangles packed into it.
///
/// Both the image and the rectangles are stored bottom-up: row 0 of `image`
/// is the bottom row of the visual picture and `Rect::y` counts from the bottom edge.
#[derive(Debug, Clone)]
pub struct Atlas {
    pub image: RgbaImage,
    pub elements: BTreeMap<String, Rect>,
}

impl Atlas {
    pub fn width(&self) -> u32 {
        self.image.width()
    }
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Element bounds in UV space. `(u1, v1)` is the top-left pixel center, `(u2, v2)` the bottom-right one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UvRect {
    pub u1: f64,
    pub v1: f64,
    pub u2: f64,
    pub v2: f64,
}

/// Side-car description of an atlas: which TEX file holds it and where each element lives in UV space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasKey {
    pub atlas_filename: String,
    /// True when the atlas alpha is straight (not premultiplied).
    pub straight_alpha: bool,
    pub elements: BTreeMap<String, UvRect>,
}
