//! Per-format encode/decode of a single image plane.
//!
//! Every known [`PixelFormat`] maps onto one [`Codec`] variant; adding a format means
//! extending that mapping and the exhaustive matches below. Unknown formats have no
//! codec and fail with [`KTexError::Unsupported`].

pub mod etc2;

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::{KTexError, Result};
use crate::tex::PixelFormat;

/// Uncompressed layouts stored row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uncompressed {
    Rgb,
    Rgba,
}

impl Uncompressed {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Uncompressed::Rgb => 3,
            Uncompressed::Rgba => 4,
        }
    }

    /// Row stride: pixels padded up to a 32-bit boundary.
    pub fn pitch(self, width: u32) -> usize {
        (width as usize * self.bytes_per_pixel() + 3) & !3
    }
}

/// How a pixel format lays out its payload.
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    Uncompressed(Uncompressed),
    /// DXT1/3/5; squish encodes, texture2ddecoder decodes.
    S3tc(squish::Format),
    /// ETC2 RGB colour plus EAC alpha, 16 bytes per block.
    Etc2Eac,
}

impl TryFrom<PixelFormat> for Codec {
    type Error = KTexError;

    fn try_from(format: PixelFormat) -> Result<Self> {
        Ok(match format {
            PixelFormat::Rgb => Codec::Uncompressed(Uncompressed::Rgb),
            PixelFormat::Rgba => Codec::Uncompressed(Uncompressed::Rgba),
            PixelFormat::Dxt1 => Codec::S3tc(squish::Format::Bc1),
            PixelFormat::Dxt3 => Codec::S3tc(squish::Format::Bc2),
            PixelFormat::Dxt5 => Codec::S3tc(squish::Format::Bc3),
            PixelFormat::Etc2Eac => Codec::Etc2Eac,
            PixelFormat::Unknown(raw) => {
                return Err(KTexError::Unsupported(format!("unknown pixel format {raw}")));
            }
        })
    }
}

/// Encoded payload of one mip level.
#[derive(Debug, Clone)]
pub struct EncodedPlane {
    pub data: Vec<u8>,
    pub pitch: u16,
}

fn blocks(n: u32) -> usize {
    (n as usize).div_ceil(4)
}

fn s3tc_block_size(format: squish::Format) -> usize {
    match format {
        squish::Format::Bc1 => 8,
        _ => 16,
    }
}

fn to_pitch(v: usize) -> u16 {
    // stored pitch is 16 bits; encoding rejects wider rows in `ToTexOptions::validate_image`
    v as u16
}

impl Codec {
    /// Bytes per pixel of the raster this codec consumes in [`Codec::encode`].
    pub fn source_channels(self) -> usize {
        match self {
            Codec::Uncompressed(u) => u.bytes_per_pixel(),
            Codec::S3tc(_) | Codec::Etc2Eac => 4,
        }
    }

    /// Bytes per row (of pixels or of blocks) of a level `width` pixels wide.
    pub fn row_bytes(self, width: u32) -> usize {
        match self {
            Codec::Uncompressed(u) => u.pitch(width),
            Codec::S3tc(f) => blocks(width) * s3tc_block_size(f),
            Codec::Etc2Eac => blocks(width) * etc2::BLOCK_SIZE,
        }
    }

    /// Expected pitch of a level `width` pixels wide, truncated to the 16-bit field.
    pub fn pitch_for(self, width: u32) -> u16 {
        to_pitch(self.row_bytes(width))
    }

    /// Bytes a freshly encoded `width x height` level occupies.
    pub fn data_size(self, width: u32, height: u32) -> usize {
        match self {
            Codec::Uncompressed(u) => u.pitch(width) * height as usize,
            Codec::S3tc(f) => f.compressed_size(width as usize, height as usize),
            Codec::Etc2Eac => blocks(width) * blocks(height) * etc2::BLOCK_SIZE,
        }
    }

    /// Encodes a tightly described raster.
    ///
    /// `pixels` holds `height` rows of `source_pitch` bytes each, RGB8 for the
    /// RGB codec and RGBA8 for everything else.
    pub fn encode(self, pixels: &[u8], width: u32, height: u32, source_pitch: usize) -> EncodedPlane {
        let row = width as usize * self.source_channels();
        match self {
            Codec::Uncompressed(u) => {
                let pitch = u.pitch(width);
                let mut data = vec![0u8; self.data_size(width, height)];
                for y in 0..height as usize {
                    let src = &pixels[y * source_pitch..y * source_pitch + row];
                    data[y * pitch..y * pitch + row].copy_from_slice(src);
                }
                EncodedPlane {
                    data,
                    pitch: to_pitch(pitch),
                }
            }
            Codec::S3tc(f) => {
                let rgba = packed_rows(pixels, row, height, source_pitch);
                let mut data = vec![0u8; self.data_size(width, height)];
                let params = squish::Params {
                    algorithm: squish::Algorithm::ClusterFit,
                    weights: squish::COLOUR_WEIGHTS_PERCEPTUAL,
                    weigh_colour_by_alpha: false,
                };
                f.compress(&rgba, width as usize, height as usize, params, &mut data);
                EncodedPlane {
                    data,
                    pitch: self.pitch_for(width),
                }
            }
            Codec::Etc2Eac => {
                let rgba = packed_rows(pixels, row, height, source_pitch);
                let data = etc2::encode_rgba8(&rgba, width, height, etc2::ENCODE_QUALITY);
                EncodedPlane {
                    data,
                    pitch: self.pitch_for(width),
                }
            }
        }
    }

    /// Decodes a level. Block formats always yield RGBA8; RGB yields RGB8.
    pub fn decode(self, data: &[u8], width: u32, height: u32, pitch: u16) -> Result<DynamicImage> {
        let (w, h) = (width as usize, height as usize);
        match self {
            Codec::Uncompressed(u) => {
                let bpp = u.bytes_per_pixel();
                let row = w * bpp;
                let stride = pitch as usize;
                if h > 0 && (stride < row || data.len() < stride * (h - 1) + row) {
                    return Err(KTexError::InvalidInput(format!(
                        "{} bytes with pitch {} cannot hold a {}x{} {:?} level",
                        data.len(),
                        pitch,
                        width,
                        height,
                        u
                    )));
                }
                let mut out = Vec::with_capacity(row * h);
                for y in 0..h {
                    out.extend_from_slice(&data[y * stride..y * stride + row]);
                }
                let img = match u {
                    Uncompressed::Rgb => RgbImage::from_raw(width, height, out).map(DynamicImage::ImageRgb8),
                    Uncompressed::Rgba => RgbaImage::from_raw(width, height, out).map(DynamicImage::ImageRgba8),
                };
                img.ok_or_else(|| KTexError::InvalidInput("decoded buffer size mismatch".into()))
            }
            Codec::S3tc(f) => {
                let need = self.data_size(width, height);
                check_len(data, need, "DXT")?;
                let decoder: BlockDecoder = match f {
                    squish::Format::Bc1 => texture2ddecoder::decode_bc1a,
                    squish::Format::Bc2 => texture2ddecoder::decode_bc2,
                    _ => texture2ddecoder::decode_bc3,
                };
                decode_texels(decoder, &data[..need], width, height, "DXT")
            }
            Codec::Etc2Eac => {
                let need = self.data_size(width, height);
                check_len(data, need, "ETC2EAC")?;
                decode_texels(
                    texture2ddecoder::decode_etc2_rgba8,
                    &data[..need],
                    width,
                    height,
                    "ETC2EAC",
                )
            }
        }
    }
}

type BlockDecoder = fn(&[u8], usize, usize, &mut [u32]) -> std::result::Result<(), &'static str>;

/// Runs a texture2ddecoder block decoder, which emits one BGRA texel per `u32`.
fn decode_texels(decoder: BlockDecoder, data: &[u8], width: u32, height: u32, what: &str) -> Result<DynamicImage> {
    let mut texels = vec![0u32; width as usize * height as usize];
    decoder(data, width as usize, height as usize, &mut texels)
        .map_err(|e| KTexError::InvalidInput(format!("{what} decode failed: {e}")))?;
    let out = texels
        .iter()
        .flat_map(|&p| {
            [
                ((p >> 16) & 0xFF) as u8,
                ((p >> 8) & 0xFF) as u8,
                (p & 0xFF) as u8,
                (p >> 24) as u8,
            ]
        })
        .collect();
    rgba_image(width, height, out)
}

fn packed_rows(pixels: &[u8], row: usize, height: u32, source_pitch: usize) -> Vec<u8> {
    if source_pitch == row {
        return pixels[..row * height as usize].to_vec();
    }
    let mut out = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        out.extend_from_slice(&pixels[y * source_pitch..y * source_pitch + row]);
    }
    out
}

fn check_len(data: &[u8], need: usize, what: &str) -> Result<()> {
    if data.len() < need {
        return Err(KTexError::InvalidInput(format!(
            "{what} level needs {need} bytes, found {}",
            data.len()
        )));
    }
    Ok(())
}

fn rgba_image(width: u32, height: u32, out: Vec<u8>) -> Result<DynamicImage> {
    RgbaImage::from_raw(width, height, out)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| KTexError::InvalidInput("decoded buffer size mismatch".into()))
}

/// Expected pitch of a `width` pixel wide level in `format`; used to repair files that store 0.
///
/// `None` for unknown formats.
pub fn pitch_for(width: u32, format: PixelFormat) -> Option<u16> {
    Codec::try_from(format).ok().map(|c| c.pitch_for(width))
}

/// Encodes one plane for `format`. See [`Codec::encode`] for the raster layout.
pub fn encode(
    format: PixelFormat,
    pixels: &[u8],
    width: u32,
    height: u32,
    source_pitch: usize,
) -> Result<EncodedPlane> {
    Ok(Codec::try_from(format)?.encode(pixels, width, height, source_pitch))
}

/// Decodes one stored level of `format`.
pub fn decode(format: PixelFormat, data: &[u8], width: u32, height: u32, pitch: u16) -> Result<DynamicImage> {
    Codec::try_from(format)?.decode(data, width, height, pitch)
}
