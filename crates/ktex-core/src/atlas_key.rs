//! Atlas keys: element rectangles in UV space, and their XML form.
//!
//! Pixel coordinates are taken at pixel centers, so a pixel `p` maps to
//! `(p + 0.5) / dim` and back with `round(uv * dim - 0.5)`. UV space is
//! top-down while atlas rectangles are bottom-up.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use image::RgbaImage;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{KTexError, Result};
use crate::model::{Atlas, AtlasKey, Rect, UvRect};
use crate::tex::TEX_EXTENSION;

/// Standard file extension of atlas keys.
pub const KEY_EXTENSION: &str = "xml";

mod xml {
    pub const ATLAS: &[u8] = b"Atlas";
    pub const TEXTURE: &[u8] = b"Texture";
    pub const ELEMENTS: &[u8] = b"Elements";
    pub const ELEMENT: &[u8] = b"Element";
    pub const STRAIGHT_ALPHA: &[u8] = b"StraightAlpha";
    pub const FILENAME: &[u8] = b"filename";
    pub const NAME: &[u8] = b"name";
    pub const U1: &[u8] = b"u1";
    pub const V1: &[u8] = b"v1";
    pub const U2: &[u8] = b"u2";
    pub const V2: &[u8] = b"v2";
}

fn tex_suffix() -> String {
    format!(".{TEX_EXTENSION}")
}

/// Appends `.tex` unless the name already carries that extension.
pub fn ensure_tex_extension(name: &str) -> String {
    if name.ends_with(&tex_suffix()) {
        name.to_string()
    } else {
        format!("{name}{}", tex_suffix())
    }
}

/// Removes a trailing `.tex`, if any.
pub fn strip_tex_extension(name: &str) -> &str {
    name.strip_suffix(&tex_suffix()).unwrap_or(name)
}

fn to_uv(p: u32, dim: u32) -> f64 {
    (p as f64 + 0.5) / dim as f64
}

fn to_px(uv: f64, dim: u32) -> i64 {
    (uv * dim as f64 - 0.5).round() as i64
}

impl AtlasKey {
    /// Describes `atlas` in UV space. The atlas file is named `<atlas_name>.tex`.
    pub fn from_atlas(atlas: &Atlas, atlas_name: &str, straight_alpha: bool) -> AtlasKey {
        let (w, h) = atlas.image.dimensions();
        let elements = atlas
            .elements
            .iter()
            .map(|(name, rect)| {
                let td = rect.flip_vertical(h);
                let uv = UvRect {
                    u1: to_uv(td.x, w),
                    v1: to_uv(td.y, h),
                    u2: to_uv(td.right(), w),
                    v2: to_uv(td.bottom(), h),
                };
                (ensure_tex_extension(name), uv)
            })
            .collect();
        AtlasKey {
            atlas_filename: format!("{atlas_name}.{TEX_EXTENSION}"),
            straight_alpha,
            elements,
        }
    }

    /// Maps the UV rectangles back onto a `width x height` atlas as bottom-up pixel rects.
    pub fn to_pixel_elements(&self, width: u32, height: u32) -> Result<BTreeMap<String, Rect>> {
        let mut out = BTreeMap::new();
        for (name, uv) in &self.elements {
            let (x1, y1) = (to_px(uv.u1, width), to_px(uv.v1, height));
            let (x2, y2) = (to_px(uv.u2, width), to_px(uv.v2, height));
            if x1 < 0 || y1 < 0 || x2 < x1 || y2 < y1 || x2 >= width as i64 || y2 >= height as i64 {
                return Err(KTexError::MalformedKey(format!(
                    "element '{name}' does not map into a {width}x{height} atlas"
                )));
            }
            let td = Rect::new(x1 as u32, y1 as u32, (x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32);
            let stripped = strip_tex_extension(name);
            if out.insert(stripped.to_string(), td.flip_vertical(height)).is_some() {
                return Err(KTexError::MalformedKey(format!(
                    "more than one element is named '{stripped}'"
                )));
            }
        }
        Ok(out)
    }

    /// Pairs the key with its decoded (bottom-up) atlas image.
    pub fn to_atlas(&self, image: RgbaImage) -> Result<Atlas> {
        let elements = self.to_pixel_elements(image.width(), image.height())?;
        Ok(Atlas { image, elements })
    }

    pub fn to_xml(&self) -> String {
        let mut s = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Atlas>\n");
        s.push_str(&format!(
            "    <Texture filename=\"{}\"/>\n",
            xml_escape(&self.atlas_filename)
        ));
        s.push_str("    <Elements>\n");
        for (name, uv) in &self.elements {
            s.push_str(&format!(
                "        <Element name=\"{}\" u1=\"{}\" u2=\"{}\" v1=\"{}\" v2=\"{}\"/>\n",
                xml_escape(name),
                uv.u1,
                uv.u2,
                uv.v1,
                uv.v2
            ));
        }
        s.push_str("    </Elements>\n");
        s.push_str(&format!(
            "    <StraightAlpha>{}</StraightAlpha>\n",
            self.straight_alpha
        ));
        s.push_str("</Atlas>\n");
        s
    }

    pub fn from_xml(xml: &str) -> Result<AtlasKey> {
        KeyParser::default().parse(xml)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AtlasKey> {
        let text = fs::read_to_string(path.as_ref()).map_err(KTexError::io("reading atlas key"))?;
        Self::from_xml(&text)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_xml()).map_err(KTexError::io("writing atlas key"))
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn malformed(msg: impl Into<String>) -> KTexError {
    KTexError::MalformedKey(msg.into())
}

#[derive(Default)]
struct KeyParser {
    stack: Vec<Vec<u8>>,
    filename: Option<String>,
    saw_elements: bool,
    elements: BTreeMap<String, UvRect>,
    straight_alpha: Option<bool>,
}

impl KeyParser {
    fn parse(mut self, xml: &str) -> Result<AtlasKey> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        loop {
            let event = reader.read_event().map_err(|e| {
                malformed(format!("XML error at byte {}: {e}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(e) => {
                    self.open(&e)?;
                    self.stack.push(e.name().as_ref().to_vec());
                }
                Event::Empty(e) => {
                    self.open(&e)?;
                    if e.name().as_ref() == xml::STRAIGHT_ALPHA && self.in_atlas_child() {
                        return Err(straight_alpha_error());
                    }
                }
                Event::Text(t) => {
                    if self.current() == Some(xml::STRAIGHT_ALPHA) && self.stack.len() == 2 {
                        let text = t.unescape().map_err(|e| malformed(e.to_string()))?;
                        self.straight_alpha = Some(match text.as_ref() {
                            "true" => true,
                            "false" => false,
                            _ => return Err(straight_alpha_error()),
                        });
                    }
                }
                Event::End(_) => {
                    if self.current() == Some(xml::STRAIGHT_ALPHA)
                        && self.stack.len() == 2
                        && self.straight_alpha.is_none()
                    {
                        return Err(straight_alpha_error());
                    }
                    self.stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }
        self.finish()
    }

    fn current(&self) -> Option<&[u8]> {
        self.stack.last().map(|v| v.as_slice())
    }

    /// True while positioned directly inside the root `<Atlas>`.
    fn in_atlas_child(&self) -> bool {
        self.stack.len() == 1
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();
        match self.stack.len() {
            0 => {
                if name != xml::ATLAS {
                    return Err(malformed("document is not an atlas key"));
                }
            }
            1 => {
                if name == xml::TEXTURE {
                    let filename = attribute(e, xml::FILENAME)?
                        .ok_or_else(|| malformed("<Texture> has no filename attribute"))?;
                    self.filename = Some(filename);
                } else if name == xml::ELEMENTS {
                    self.saw_elements = true;
                }
            }
            2 if self.current() == Some(xml::ELEMENTS) && name == xml::ELEMENT => {
                self.push_element(e)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn push_element(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = attribute(e, xml::NAME)?
            .ok_or_else(|| malformed("<Element> is missing its name attribute"))?;
        let coord = |key: &[u8]| -> Result<f64> {
            let raw = attribute(e, key)?.ok_or_else(|| {
                malformed(format!(
                    "<Element name=\"{name}\"> is missing {}",
                    String::from_utf8_lossy(key)
                ))
            })?;
            raw.trim().parse::<f64>().map_err(|_| {
                malformed(format!(
                    "<Element name=\"{name}\"> has non-numeric {}=\"{raw}\"",
                    String::from_utf8_lossy(key)
                ))
            })
        };
        let uv = UvRect {
            u1: coord(xml::U1)?,
            v1: coord(xml::V1)?,
            u2: coord(xml::U2)?,
            v2: coord(xml::V2)?,
        };
        self.elements.insert(name, uv);
        Ok(())
    }

    fn finish(self) -> Result<AtlasKey> {
        let atlas_filename = self
            .filename
            .ok_or_else(|| malformed("atlas key has no <Texture filename>"))?;
        if !self.saw_elements || self.elements.is_empty() {
            return Err(malformed("atlas key has no elements"));
        }
        let straight_alpha = self
            .straight_alpha
            .ok_or_else(|| malformed("atlas key has no <StraightAlpha>"))?;
        Ok(AtlasKey {
            atlas_filename,
            straight_alpha,
            elements: self.elements,
        })
    }
}

fn straight_alpha_error() -> KTexError {
    malformed("<StraightAlpha> is not 'true' or 'false'")
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(format!("bad attribute: {err}")))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|err| malformed(format!("bad attribute value: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
