use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{KTexError, Result};
use crate::tex::{PixelFormat, TextureType};

/// Options for turning a raster image into a TEX container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToTexOptions {
    pub texture_type: TextureType,
    pub pixel_format: PixelFormat,
    /// Build the smoothed mip chain down to 1x1; otherwise only the base level is stored.
    pub generate_mip_maps: bool,
    /// Store premultiplied alpha (ignored for RGB output).
    pub premultiply_alpha: bool,
}

impl Default for ToTexOptions {
    fn default() -> Self {
        Self {
            texture_type: TextureType::TwoD,
            pixel_format: PixelFormat::Dxt5,
            generate_mip_maps: true,
            premultiply_alpha: true,
        }
    }
}

impl ToTexOptions {
    /// Checks that a `width x height` image can be described by mipmap records,
    /// including its 16-bit row pitch.
    pub fn validate_image(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(KTexError::InvalidInput(format!(
                "cannot encode an empty {width}x{height} image"
            )));
        }
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(KTexError::InvalidInput(format!(
                "{width}x{height} exceeds the {} pixel limit of TEX mipmaps",
                u16::MAX
            )));
        }
        let row = Codec::try_from(self.pixel_format)?.row_bytes(width);
        if row > u16::MAX as usize {
            return Err(KTexError::InvalidInput(format!(
                "{width} pixel wide {} rows need a {row} byte pitch, more than the {} the header can store",
                self.pixel_format,
                u16::MAX
            )));
        }
        Ok(())
    }

    pub fn builder() -> ToTexOptionsBuilder {
        ToTexOptionsBuilder::new()
    }
}

/// Builder for [`ToTexOptions`].
#[derive(Debug, Default, Clone)]
pub struct ToTexOptionsBuilder {
    opts: ToTexOptions,
}

impl ToTexOptionsBuilder {
    pub fn new() -> Self {
        Self {
            opts: ToTexOptions::default(),
        }
    }
    pub fn texture_type(mut self, v: TextureType) -> Self {
        self.opts.texture_type = v;
        self
    }
    pub fn pixel_format(mut self, v: PixelFormat) -> Self {
        self.opts.pixel_format = v;
        self
    }
    pub fn mip_maps(mut self, v: bool) -> Self {
        self.opts.generate_mip_maps = v;
        self
    }
    pub fn premultiply(mut self, v: bool) -> Self {
        self.opts.premultiply_alpha = v;
        self
    }
    pub fn build(self) -> ToTexOptions {
        self.opts
    }
}

/// Options for extracting the primary image of a TEX container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FromTexOptions {
    /// Treat stored colour as premultiplied and convert it back to straight alpha.
    pub demultiply_alpha: bool,
}

impl Default for FromTexOptions {
    fn default() -> Self {
        Self {
            demultiply_alpha: true,
        }
    }
}

/// Options for atlas packing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackOptions {
    /// Reserve one extra transparent pixel right of and below every element (multi-image atlases only).
    pub use_margin: bool,
}
