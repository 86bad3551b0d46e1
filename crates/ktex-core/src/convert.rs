//! Raster image <-> TEX conversion.
//!
//! TEX stores pixels bottom-up, so both directions flip vertically.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::codec::{self, Codec, EncodedPlane};
use crate::config::{FromTexOptions, ToTexOptions};
use crate::error::{KTexError, Result};
use crate::tex::{MipMap, PixelFormat, Tex, TexHeader};

/// Working raster before encoding: RGB8 for RGB output, RGBA8 for everything else.
#[derive(Debug, Clone)]
enum BasePlane {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl BasePlane {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            BasePlane::Rgb(img) => img.dimensions(),
            BasePlane::Rgba(img) => img.dimensions(),
        }
    }

    fn flip_vertical(&mut self) {
        match self {
            BasePlane::Rgb(img) => imageops::flip_vertical_in_place(img),
            BasePlane::Rgba(img) => imageops::flip_vertical_in_place(img),
        }
    }

    fn resized(&self, width: u32, height: u32) -> BasePlane {
        match self {
            BasePlane::Rgb(img) => BasePlane::Rgb(imageops::resize(img, width, height, FilterType::Triangle)),
            BasePlane::Rgba(img) => BasePlane::Rgba(imageops::resize(img, width, height, FilterType::Triangle)),
        }
    }

    fn raw(&self) -> &[u8] {
        match self {
            BasePlane::Rgb(img) => img.as_raw(),
            BasePlane::Rgba(img) => img.as_raw(),
        }
    }

    fn encode(&self, codec: Codec) -> MipMap {
        let (w, h) = self.dimensions();
        let channels = match self {
            BasePlane::Rgb(_) => 3,
            BasePlane::Rgba(_) => 4,
        };
        let EncodedPlane { data, pitch } = codec.encode(self.raw(), w, h, w as usize * channels);
        // dimensions were validated against u16 before the chain was built
        MipMap::new(w as u16, h as u16, pitch, data)
    }
}

/// Scales colour channels by alpha in place.
pub fn premultiply_alpha(img: &mut RgbaImage) {
    for p in img.pixels_mut() {
        let a = p[3] as u32;
        for c in 0..3 {
            p[c] = ((p[c] as u32 * a + 127) / 255) as u8;
        }
    }
}

/// Inverse of [`premultiply_alpha`]; fully transparent pixels become transparent black.
pub fn demultiply_alpha(img: &mut RgbaImage) {
    for p in img.pixels_mut() {
        let a = p[3] as u32;
        if a == 255 {
            continue;
        }
        for c in 0..3 {
            p[c] = if a == 0 {
                0
            } else {
                ((p[c] as u32 * 255 + a / 2) / a).min(255) as u8
            };
        }
    }
}

/// Sizes of every level of a full mip chain, base level first, ending at 1x1.
///
/// Each step halves both axes rounding up, so odd sizes and 1-wide axes never skip 1.
pub fn mip_chain_sizes(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut sizes = vec![(width, height)];
    let (mut w, mut h) = (width.max(1), height.max(1));
    while (w, h) != (1, 1) {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        sizes.push((w, h));
    }
    sizes
}

fn base_plane(image: &DynamicImage, opts: &ToTexOptions) -> BasePlane {
    match opts.pixel_format {
        PixelFormat::Rgb => BasePlane::Rgb(image.to_rgb8()),
        _ => {
            let mut rgba = image.to_rgba8();
            if opts.premultiply_alpha {
                premultiply_alpha(&mut rgba);
            }
            BasePlane::Rgba(rgba)
        }
    }
}

fn encode_levels(levels: &[BasePlane], codec: Codec) -> Vec<MipMap> {
    #[cfg(feature = "parallel")]
    {
        levels.par_iter().map(|l| l.encode(codec)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        levels.iter().map(|l| l.encode(codec)).collect()
    }
}

/// Converts `image` into a TEX container.
#[instrument(skip_all, fields(format = %opts.pixel_format, mips = opts.generate_mip_maps))]
pub fn to_tex(image: &DynamicImage, opts: &ToTexOptions) -> Result<Tex> {
    let (width, height) = (image.width(), image.height());
    opts.validate_image(width, height)?;
    let codec = Codec::try_from(opts.pixel_format)?;

    let mut base = base_plane(image, opts);
    base.flip_vertical();

    let levels: Vec<BasePlane> = if opts.generate_mip_maps {
        let sizes = mip_chain_sizes(width, height);
        debug!(levels = sizes.len(), "generating mip chain");
        let mut levels = Vec::with_capacity(sizes.len());
        for &(w, h) in &sizes[1..] {
            levels.push(base.resized(w, h));
        }
        levels.insert(0, base);
        levels
    } else {
        vec![base]
    };

    let mip_maps = encode_levels(&levels, codec);
    let header = TexHeader {
        pixel_format: opts.pixel_format,
        texture_type: opts.texture_type,
        ..TexHeader::default()
    };
    Ok(Tex::new(header, mip_maps))
}

/// Decodes the full-resolution level of `tex`; smaller mip levels are ignored.
///
/// Returns RGB8 for RGB containers and RGBA8 (straight alpha when demultiplying) otherwise.
pub fn from_tex(tex: &Tex, opts: &FromTexOptions) -> Result<DynamicImage> {
    let primary = tex.primary().ok_or(KTexError::Empty)?;
    let format = tex.header.pixel_format;
    let decoded = codec::decode(
        format,
        &primary.data,
        primary.width as u32,
        primary.height as u32,
        primary.pitch,
    )?;
    let image = match decoded {
        DynamicImage::ImageRgba8(mut rgba) => {
            if opts.demultiply_alpha && format.has_alpha() {
                demultiply_alpha(&mut rgba);
            }
            imageops::flip_vertical_in_place(&mut rgba);
            DynamicImage::ImageRgba8(rgba)
        }
        other => other.flipv(),
    };
    Ok(image)
}
