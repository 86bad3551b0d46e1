//! Core library for KTEX textures and texture atlases.
//!
//! - Container: `Tex` reads both header layouts and writes the current one
//! - Codecs: RGB/RGBA, DXT1/3/5 and ETC2+EAC block data
//! - Conversion: `to_tex` / `from_tex` bridge raster images and containers (mip chain, premultiplied alpha)
//! - Atlases: `pack_atlas` / `unpack_atlas` plus `AtlasKey` for the UV side-car file
//!
//! Quick example:
//! ```ignore
//! use image::ImageReader;
//! use ktex_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut images = NamedImages::new();
//! images.insert("a".into(), ImageReader::open("a.png")?.decode()?.to_rgba8());
//! images.insert("b".into(), ImageReader::open("b.png")?.decode()?.to_rgba8());
//! let atlas = pack_atlas(&images, &PackOptions::default())?;
//! let tex = to_tex(&image::DynamicImage::ImageRgba8(atlas.image.clone()), &ToTexOptions::default())?;
//! tex.write_to_file("ui.tex")?;
//! AtlasKey::from_atlas(&atlas, "ui", false).write_to_file("ui.xml")?;
//! # Ok(()) }
//! ```

pub mod atlas;
pub mod atlas_key;
pub mod codec;
pub mod compositing;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod packer;
pub mod tex;

pub use atlas::*;
pub use config::*;
pub use convert::*;
pub use error::*;
pub use model::*;
pub use tex::io::ReadOptions;
pub use tex::{MipMap, PixelFormat, Platform, Tex, TexHeader, TextureType};

/// Convenience prelude for common types and functions.
/// Importing `ktex_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::atlas::{NamedImages, pack_atlas, unpack_atlas};
    pub use crate::atlas_key::KEY_EXTENSION;
    pub use crate::config::{FromTexOptions, PackOptions, ToTexOptions, ToTexOptionsBuilder};
    pub use crate::convert::{from_tex, to_tex};
    pub use crate::error::KTexError;
    pub use crate::model::{Atlas, AtlasKey, Rect, UvRect};
    pub use crate::tex::io::ReadOptions;
    pub use crate::tex::{MipMap, PixelFormat, Platform, TEX_EXTENSION, Tex, TexHeader, TextureType};
}
