//! KTEX container model: header enums, mipmap records and the container itself.
//!
//! The binary reader/writer lives in [`io`]; the bit-packed specifications
//! word is handled by [`spec_word`].

pub mod io;
pub mod spec_word;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard file extension of TEX containers.
pub const TEX_EXTENSION: &str = "tex";

/// Target platform recorded in the header.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Default,
    Pc,
    Ps3,
    Xbox360,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Self::Default, Self::Pc, Self::Ps3, Self::Xbox360];

    pub fn from_raw(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Default),
            10 => Some(Self::Ps3),
            11 => Some(Self::Xbox360),
            12 => Some(Self::Pc),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Default => 0,
            Self::Ps3 => 10,
            Self::Xbox360 => 11,
            Self::Pc => 12,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "Default",
            Self::Pc => "PC",
            Self::Ps3 => "PS3",
            Self::Xbox360 => "Xbox 360",
        })
    }
}

impl FromStr for Platform {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "pc" => Ok(Self::Pc),
            "ps3" => Ok(Self::Ps3),
            "xbox360" | "x360" => Ok(Self::Xbox360),
            _ => Err(()),
        }
    }
}

/// Encoding of the mipmap payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Dxt1,
    Dxt3,
    Dxt5,
    Rgba,
    Rgb,
    Etc2Eac,
    /// Raw value of a format this crate cannot decode. Only produced by
    /// [`io::ReadOptions::any_pixel_format`] reads.
    Unknown(u32),
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 6] = [
        Self::Dxt1,
        Self::Dxt3,
        Self::Dxt5,
        Self::Rgba,
        Self::Rgb,
        Self::Etc2Eac,
    ];

    pub fn from_raw(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Dxt1),
            1 => Some(Self::Dxt3),
            2 => Some(Self::Dxt5),
            4 => Some(Self::Rgba),
            5 => Some(Self::Rgb),
            0x12 => Some(Self::Etc2Eac),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Dxt1 => 0,
            Self::Dxt3 => 1,
            Self::Dxt5 => 2,
            Self::Rgba => 4,
            Self::Rgb => 5,
            Self::Etc2Eac => 0x12,
            Self::Unknown(v) => v,
        }
    }

    /// Whether the codecs can encode and decode this format.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Block-compressed formats store 4x4 pixel blocks.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3 | Self::Dxt5 | Self::Etc2Eac)
    }

    pub fn has_alpha(self) -> bool {
        !matches!(self, Self::Rgb)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dxt1 => "DXT1",
            Self::Dxt3 => "DXT3",
            Self::Dxt5 => "DXT5",
            Self::Rgba => "RGBA",
            Self::Rgb => "RGB",
            Self::Etc2Eac => "ETC2EAC",
            Self::Unknown(_) => "Unknown",
        })
    }
}

impl FromStr for PixelFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dxt1" | "bc1" => Ok(Self::Dxt1),
            "dxt3" | "bc2" => Ok(Self::Dxt3),
            "dxt5" | "bc3" => Ok(Self::Dxt5),
            "rgba" => Ok(Self::Rgba),
            "rgb" => Ok(Self::Rgb),
            "etc2eac" | "etc2" => Ok(Self::Etc2Eac),
            _ => Err(()),
        }
    }
}

/// Dimensionality of the texture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TextureType {
    #[serde(rename = "1d")]
    OneD,
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "cube")]
    CubeMapped,
}

impl TextureType {
    pub const ALL: [TextureType; 4] = [Self::OneD, Self::TwoD, Self::ThreeD, Self::CubeMapped];

    pub fn from_raw(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::OneD),
            1 => Some(Self::TwoD),
            2 => Some(Self::ThreeD),
            3 => Some(Self::CubeMapped),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::OneD => 0,
            Self::TwoD => 1,
            Self::ThreeD => 2,
            Self::CubeMapped => 3,
        }
    }
}

impl fmt::Display for TextureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OneD => "1D",
            Self::TwoD => "2D",
            Self::ThreeD => "3D",
            Self::CubeMapped => "Cube Mapped",
        })
    }
}

impl FromStr for TextureType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1d" => Ok(Self::OneD),
            "2d" => Ok(Self::TwoD),
            "3d" => Ok(Self::ThreeD),
            "cube" | "cubemapped" => Ok(Self::CubeMapped),
            _ => Err(()),
        }
    }
}

/// Decoded header fields. `flag_one`/`flag_two` have no known meaning and are carried verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TexHeader {
    pub platform: Platform,
    pub pixel_format: PixelFormat,
    pub texture_type: TextureType,
    pub flag_one: bool,
    pub flag_two: bool,
}

impl Default for TexHeader {
    fn default() -> Self {
        Self {
            platform: Platform::Default,
            pixel_format: PixelFormat::Dxt5,
            texture_type: TextureType::TwoD,
            flag_one: true,
            flag_two: true,
        }
    }
}

/// One level of the mip chain.
///
/// `pitch` is the byte stride of one row of encoded data (one row of 4x4 blocks
/// for compressed formats). `data.len()` is tracked separately because pitch
/// alone cannot reconstruct the size of block-compressed payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MipMap {
    pub width: u16,
    pub height: u16,
    pub pitch: u16,
    pub data: Vec<u8>,
}

/// Metadata of a mipmap as exported by dump tooling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MipMapMeta {
    pub width: u16,
    pub height: u16,
    pub pitch: u16,
}

impl MipMap {
    pub fn new(width: u16, height: u16, pitch: u16, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pitch,
            data,
        }
    }

    pub fn meta(&self) -> MipMapMeta {
        MipMapMeta {
            width: self.width,
            height: self.height,
            pitch: self.pitch,
        }
    }

    /// `{"width":..,"height":..,"pitch":..}` as pretty-printed JSON.
    pub fn metadata_json(&self) -> String {
        // MipMapMeta holds plain integers, serialization cannot fail
        serde_json::to_string_pretty(&self.meta()).unwrap_or_default()
    }
}

/// A TEX container: header plus mip chain, index 0 being full resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tex {
    pub header: TexHeader,
    pub mip_maps: Vec<MipMap>,
}

impl Tex {
    /// Largest mip chain the current header layout can describe.
    pub const MAX_MIP_MAPS: usize = 31;

    pub fn new(header: TexHeader, mip_maps: Vec<MipMap>) -> Self {
        Self { header, mip_maps }
    }

    pub fn has_mip_maps(&self) -> bool {
        !self.mip_maps.is_empty()
    }

    pub fn mip_map_count(&self) -> usize {
        self.mip_maps.len()
    }

    pub fn mip_maps(&self) -> &[MipMap] {
        &self.mip_maps
    }

    /// Full-resolution level, if any.
    pub fn primary(&self) -> Option<&MipMap> {
        self.mip_maps.first()
    }

    /// Human readable multi-line summary of the header and mip chain.
    pub fn info(&self) -> String {
        let h = &self.header;
        let mut lines = vec![
            format!("Platform: {}", h.platform),
            format!("Pixel Format: {}", h.pixel_format),
            format!("Texture Type: {}", h.texture_type),
            format!("Unknown Flag 1: {}", h.flag_one),
            format!("Unknown Flag 2: {}", h.flag_two),
            format!("Mip Maps: {}", self.mip_maps.len()),
        ];
        for mm in &self.mip_maps {
            lines.push(format!("  - {} x {}", mm.width, mm.height));
        }
        lines.join("\n")
    }
}
