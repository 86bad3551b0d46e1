//! The 32-bit "specifications" word of the TEX header.
//!
//! Two layouts exist. The legacy one packs narrower fields and fills the top
//! 18 bits with ones; the current one widens every field and adds a second
//! flag. Files do not record which layout they use, so [`detect_layout`]
//! guesses from the legacy padding window. A current-layout word with both
//! flags set and a mip count of 30 or 31 also has that window full of ones
//! and is read as legacy; real files depend on this behavior.

/// A bit field `width` bits wide starting `offset` bits above the LSB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: u32,
    pub width: u32,
}

impl Field {
    const fn new(offset: u32, width: u32) -> Self {
        Self { offset, width }
    }

    pub const fn mask(self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            ((1u32 << self.width) - 1) << self.offset
        }
    }

    pub const fn max_value(self) -> u32 {
        self.mask() >> self.offset
    }

    pub fn get(self, word: u32) -> u32 {
        (word & self.mask()) >> self.offset
    }

    /// Stores `value` truncated to the field width.
    pub fn set(self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value << self.offset) & self.mask())
    }
}

/// Field positions of the legacy ("pre-update") layout.
pub mod legacy {
    use super::Field;

    pub const PLATFORM: Field = Field::new(0, 3);
    pub const PIXEL_FORMAT: Field = Field::new(3, 3);
    pub const TEXTURE_TYPE: Field = Field::new(6, 3);
    pub const MIP_MAP_COUNT: Field = Field::new(9, 4);
    pub const FLAG_ONE: Field = Field::new(13, 1);
    pub const PADDING: Field = Field::new(14, 18);
}

/// Field positions of the current ("post-update") layout.
pub mod current {
    use super::Field;

    pub const PLATFORM: Field = Field::new(0, 4);
    pub const PIXEL_FORMAT: Field = Field::new(4, 5);
    pub const TEXTURE_TYPE: Field = Field::new(9, 4);
    pub const MIP_MAP_COUNT: Field = Field::new(13, 5);
    pub const FLAG_ONE: Field = Field::new(18, 1);
    pub const FLAG_TWO: Field = Field::new(19, 1);
    pub const PADDING: Field = Field::new(20, 12);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    Legacy,
    Current,
}

/// Raw field values, before they are matched against the known enumerations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecFields {
    pub platform: u32,
    pub pixel_format: u32,
    pub texture_type: u32,
    pub mip_map_count: u32,
    pub flag_one: bool,
    pub flag_two: bool,
}

pub fn detect_layout(word: u32) -> HeaderLayout {
    if legacy::PADDING.get(word) == legacy::PADDING.max_value() {
        HeaderLayout::Legacy
    } else {
        HeaderLayout::Current
    }
}

pub fn decode_legacy(word: u32) -> SpecFields {
    SpecFields {
        platform: legacy::PLATFORM.get(word),
        pixel_format: legacy::PIXEL_FORMAT.get(word),
        texture_type: legacy::TEXTURE_TYPE.get(word),
        mip_map_count: legacy::MIP_MAP_COUNT.get(word),
        flag_one: legacy::FLAG_ONE.get(word) != 0,
        flag_two: false,
    }
}

pub fn decode_current(word: u32) -> SpecFields {
    SpecFields {
        platform: current::PLATFORM.get(word),
        pixel_format: current::PIXEL_FORMAT.get(word),
        texture_type: current::TEXTURE_TYPE.get(word),
        mip_map_count: current::MIP_MAP_COUNT.get(word),
        flag_one: current::FLAG_ONE.get(word) != 0,
        flag_two: current::FLAG_TWO.get(word) != 0,
    }
}

/// Decodes with whichever layout [`detect_layout`] picks.
pub fn decode(word: u32) -> (HeaderLayout, SpecFields) {
    match detect_layout(word) {
        HeaderLayout::Legacy => (HeaderLayout::Legacy, decode_legacy(word)),
        HeaderLayout::Current => (HeaderLayout::Current, decode_current(word)),
    }
}

/// Packs `fields` in the current layout with all padding bits set.
pub fn encode_current(fields: &SpecFields) -> u32 {
    let mut word = current::PADDING.mask();
    word = current::PLATFORM.set(word, fields.platform);
    word = current::PIXEL_FORMAT.set(word, fields.pixel_format);
    word = current::TEXTURE_TYPE.set(word, fields.texture_type);
    word = current::MIP_MAP_COUNT.set(word, fields.mip_map_count);
    word = current::FLAG_ONE.set(word, fields.flag_one as u32);
    current::FLAG_TWO.set(word, fields.flag_two as u32)
}
