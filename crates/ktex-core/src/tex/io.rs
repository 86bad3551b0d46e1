//! Binary reader and writer for TEX containers.
//!
//! Layout (little-endian): `b"KTEX"`, the specifications word, every mipmap's
//! `width:u16 height:u16 pitch:u16 size:u32` record, then every mipmap's data
//! in the same order.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use super::spec_word::{self, HeaderLayout, SpecFields};
use super::{MipMap, PixelFormat, Platform, Tex, TexHeader, TextureType};
use crate::codec::pitch_for;
use crate::error::{KTexError, Result};

pub const MAGIC: [u8; 4] = *b"KTEX";

/// Reader switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Keep unrecognised pixel formats as [`PixelFormat::Unknown`] instead of failing.
    /// Such containers can be inspected and dumped but not decoded.
    pub any_pixel_format: bool,
}

fn header_from_fields(fields: &SpecFields, opts: ReadOptions) -> Result<TexHeader> {
    let platform = Platform::from_raw(fields.platform)
        .ok_or_else(|| KTexError::Unsupported(format!("unknown platform {}", fields.platform)))?;
    let pixel_format = match PixelFormat::from_raw(fields.pixel_format) {
        Some(f) => f,
        None if opts.any_pixel_format => {
            debug!(raw = fields.pixel_format, "keeping unknown pixel format");
            PixelFormat::Unknown(fields.pixel_format)
        }
        None => {
            return Err(KTexError::Unsupported(format!(
                "unknown pixel format {}",
                fields.pixel_format
            )));
        }
    };
    let texture_type = TextureType::from_raw(fields.texture_type).ok_or_else(|| {
        KTexError::Unsupported(format!("unknown texture type {}", fields.texture_type))
    })?;
    Ok(TexHeader {
        platform,
        pixel_format,
        texture_type,
        flag_one: fields.flag_one,
        flag_two: fields.flag_two,
    })
}

/// Reads a complete container from `reader`, rejecting unknown pixel formats.
///
/// Trailing bytes after the last declared mipmap are logged and otherwise ignored.
pub fn read_tex<R: Read>(reader: &mut R) -> Result<Tex> {
    read_tex_with(reader, ReadOptions::default())
}

/// [`read_tex`] with explicit [`ReadOptions`].
pub fn read_tex_with<R: Read>(reader: &mut R, opts: ReadOptions) -> Result<Tex> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(KTexError::io("reading magic number"))?;
    if magic != MAGIC {
        return Err(KTexError::Unsupported(format!(
            "bad magic number {:02X?}",
            magic
        )));
    }

    let word = reader
        .read_u32::<LittleEndian>()
        .map_err(KTexError::io("reading header specifications"))?;
    let (layout, fields) = spec_word::decode(word);
    if layout == HeaderLayout::Legacy {
        debug!(word = format_args!("{word:#010x}"), "legacy header layout detected");
    }
    let header = header_from_fields(&fields, opts)?;

    let count = fields.mip_map_count as usize;
    let mut mip_maps = Vec::with_capacity(count);
    let mut sizes = Vec::with_capacity(count);
    for _ in 0..count {
        let width = reader
            .read_u16::<LittleEndian>()
            .map_err(KTexError::io("reading mipmap width"))?;
        let height = reader
            .read_u16::<LittleEndian>()
            .map_err(KTexError::io("reading mipmap height"))?;
        let mut pitch = reader
            .read_u16::<LittleEndian>()
            .map_err(KTexError::io("reading mipmap pitch"))?;
        let size = reader
            .read_u32::<LittleEndian>()
            .map_err(KTexError::io("reading mipmap data size"))?;
        if pitch == 0 {
            if let Some(expected) = pitch_for(width as u32, header.pixel_format) {
                pitch = expected;
                debug!(width, pitch, "repaired zero mipmap pitch");
            }
        }
        mip_maps.push(MipMap::new(width, height, pitch, Vec::new()));
        sizes.push(size as usize);
    }

    for (mm, size) in mip_maps.iter_mut().zip(sizes) {
        let mut data = Vec::new();
        let got = reader
            .by_ref()
            .take(size as u64)
            .read_to_end(&mut data)
            .map_err(KTexError::io("reading mipmap data"))?;
        if got != size {
            return Err(KTexError::Io {
                op: "reading mipmap data",
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("expected {size} bytes, found {got}"),
                ),
            });
        }
        mm.data = data;
    }

    let leftover = io::copy(reader, &mut io::sink())
        .map_err(KTexError::io("checking for trailing data"))?;
    if leftover > 0 {
        warn!(leftover, "TEX has unexpected data after the last mipmap");
    }

    Ok(Tex { header, mip_maps })
}

/// Serializes `tex` using the current header layout.
pub fn write_tex<W: Write>(tex: &Tex, writer: &mut W) -> Result<()> {
    if tex.mip_maps.len() > Tex::MAX_MIP_MAPS {
        return Err(KTexError::InvalidInput(format!(
            "{} mipmaps exceed the header limit of {}",
            tex.mip_maps.len(),
            Tex::MAX_MIP_MAPS
        )));
    }
    let h = &tex.header;
    let word = spec_word::encode_current(&SpecFields {
        platform: h.platform.raw(),
        pixel_format: h.pixel_format.raw(),
        texture_type: h.texture_type.raw(),
        mip_map_count: tex.mip_maps.len() as u32,
        flag_one: h.flag_one,
        flag_two: h.flag_two,
    });

    writer
        .write_all(&MAGIC)
        .map_err(KTexError::io("writing magic number"))?;
    writer
        .write_u32::<LittleEndian>(word)
        .map_err(KTexError::io("writing header specifications"))?;

    for mm in &tex.mip_maps {
        let size = u32::try_from(mm.data.len()).map_err(|_| {
            KTexError::InvalidInput(format!("mipmap data of {} bytes is too large", mm.data.len()))
        })?;
        writer
            .write_u16::<LittleEndian>(mm.width)
            .and_then(|_| writer.write_u16::<LittleEndian>(mm.height))
            .and_then(|_| writer.write_u16::<LittleEndian>(mm.pitch))
            .and_then(|_| writer.write_u32::<LittleEndian>(size))
            .map_err(KTexError::io("writing mipmap metadata"))?;
    }
    for mm in &tex.mip_maps {
        writer
            .write_all(&mm.data)
            .map_err(KTexError::io("writing mipmap data"))?;
    }
    writer.flush().map_err(KTexError::io("flushing output"))?;
    Ok(())
}

impl Tex {
    pub fn from_memory(bytes: &[u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(bytes);
        read_tex(&mut cursor)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with(path, ReadOptions::default())
    }

    pub fn from_file_with<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(KTexError::io("opening TEX file"))?;
        read_tex_with(&mut BufReader::new(file), opts)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        write_tex(self, &mut buf)?;
        Ok(buf)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(KTexError::io("creating TEX file"))?;
        write_tex(self, &mut BufWriter::new(file))
    }
}
