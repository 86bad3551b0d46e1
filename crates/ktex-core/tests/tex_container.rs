use ktex_core::codec::{self, pitch_for};
use ktex_core::prelude::*;
use ktex_core::tex::io::{MAGIC, ReadOptions, read_tex, read_tex_with};

fn tiny_mips(n: usize) -> Vec<MipMap> {
    (0..n)
        .map(|i| MipMap::new(1, 1, 4, vec![i as u8, 1, 2, 3]))
        .collect()
}

fn raw_file(word: u32, records: &[(u16, u16, u16, u32)], payload: &[u8]) -> Vec<u8> {
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&word.to_le_bytes());
    for &(w, h, p, s) in records {
        bytes.extend_from_slice(&w.to_le_bytes());
        bytes.extend_from_slice(&h.to_le_bytes());
        bytes.extend_from_slice(&p.to_le_bytes());
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn header_roundtrip_current_layout() {
    for platform in Platform::ALL {
        for pixel_format in PixelFormat::ALL {
            for texture_type in TextureType::ALL {
                for (flag_one, flag_two) in [(false, false), (true, false), (false, true), (true, true)] {
                    for mips in [0usize, 1, 7, 29, 30, 31] {
                        // both flags plus 30 or 31 mips reads as the legacy layout
                        if flag_one && flag_two && mips >= 30 {
                            continue;
                        }
                        let header = TexHeader {
                            platform,
                            pixel_format,
                            texture_type,
                            flag_one,
                            flag_two,
                        };
                        let tex = Tex::new(header, tiny_mips(mips));
                        let back = Tex::from_memory(&tex.to_bytes().unwrap()).unwrap();
                        assert_eq!(back, tex, "{header:?} with {mips} mips");
                    }
                }
            }
        }
    }
}

#[test]
fn all_zero_header_has_no_mips() {
    let tex = Tex::from_memory(&raw_file(0, &[], &[])).unwrap();
    assert!(!tex.has_mip_maps());
    assert_eq!(tex.mip_map_count(), 0);
    assert_eq!(tex.header.platform, Platform::Default);
    assert_eq!(tex.header.pixel_format, PixelFormat::Dxt1);
    assert_eq!(tex.header.texture_type, TextureType::OneD);
    assert!(!tex.header.flag_one && !tex.header.flag_two);
}

#[test]
fn legacy_word_is_detected() {
    // platform 0, DXT5, 2D, 2 mips, flagOne, 18 padding ones
    let word = (2 << 3) | (1 << 6) | (2 << 9) | (1 << 13) | (0x3FFFF << 14);
    let payload = [0u8; 16 + 16];
    let tex = Tex::from_memory(&raw_file(
        word,
        &[(4, 4, 16, 16), (2, 2, 16, 16)],
        &payload,
    ))
    .unwrap();
    assert_eq!(tex.header.pixel_format, PixelFormat::Dxt5);
    assert_eq!(tex.header.texture_type, TextureType::TwoD);
    assert!(tex.header.flag_one);
    assert!(!tex.header.flag_two);
    assert_eq!(tex.mip_map_count(), 2);
}

#[test]
fn ambiguous_current_word_reads_as_legacy() {
    let header = TexHeader {
        pixel_format: PixelFormat::Rgba,
        ..TexHeader::default()
    };
    let tex = Tex::new(header, tiny_mips(30));
    let back = Tex::from_memory(&tex.to_bytes().unwrap());
    // legacy fields pick a different pixel format / mip count out of the same bits
    assert_ne!(back.ok(), Some(tex));
}

#[test]
fn bad_magic_is_unsupported() {
    let mut bytes = raw_file(0, &[], &[]);
    bytes[..4].copy_from_slice(b"DDS ");
    let err = Tex::from_memory(&bytes).unwrap_err();
    assert!(err.is_unsupported(), "{err}");
}

#[test]
fn unknown_enum_values_are_unsupported() {
    // current layout: platform 5 is not in the table
    let err = Tex::from_memory(&raw_file(0xFFF0_0005, &[], &[])).unwrap_err();
    assert!(err.is_unsupported());
    // pixel format 3 is unassigned
    let err = Tex::from_memory(&raw_file(0xFFF0_0000 | (3 << 4), &[], &[])).unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn lenient_read_keeps_unknown_pixel_formats() {
    // pixel format 3, 2D, one mip whose pitch is left at zero
    let word = 0xFFF0_0000 | (3 << 4) | (1 << 9) | (1 << 13);
    let bytes = raw_file(word, &[(4, 4, 0, 8)], &[7u8; 8]);
    let lenient = ReadOptions {
        any_pixel_format: true,
    };
    let tex = read_tex_with(&mut bytes.as_slice(), lenient).unwrap();
    assert_eq!(tex.header.pixel_format, PixelFormat::Unknown(3));
    assert!(!tex.header.pixel_format.is_known());
    // no codec knows the stride, so the stored zero is kept
    assert_eq!(tex.mip_maps()[0].meta().pitch, 0);
    assert_eq!(tex.mip_maps()[0].data, vec![7u8; 8]);
    assert!(tex.info().contains("Pixel Format: Unknown"));

    let rewritten = tex.to_bytes().unwrap();
    assert_eq!(rewritten, bytes);
    assert!(Tex::from_memory(&rewritten).unwrap_err().is_unsupported());
}

#[test]
fn lenient_read_still_rejects_unknown_platforms() {
    let lenient = ReadOptions {
        any_pixel_format: true,
    };
    let bytes = raw_file(0xFFF0_0005, &[], &[]);
    assert!(read_tex_with(&mut bytes.as_slice(), lenient).unwrap_err().is_unsupported());
}

#[test]
fn truncated_data_is_an_io_error() {
    let word = 0xFFF0_0000 | (4 << 4) | (1 << 9) | (1 << 13);
    let err = Tex::from_memory(&raw_file(word, &[(2, 2, 8, 16)], &[0u8; 10])).unwrap_err();
    assert!(matches!(err, KTexError::Io { .. }), "{err}");
}

#[test]
fn trailing_bytes_still_read() {
    let mut tex = Tex::new(TexHeader::default(), tiny_mips(1));
    tex.header.pixel_format = PixelFormat::Rgba;
    let mut bytes = tex.to_bytes().unwrap();
    bytes.extend_from_slice(b"junk");
    assert_eq!(Tex::from_memory(&bytes).unwrap(), tex);
}

#[test]
fn zero_pitch_is_repaired_consistently_with_encode() {
    for format in PixelFormat::ALL {
        for width in [1u32, 3, 4, 5, 13, 64] {
            let height = 4;
            let pixels = vec![128u8; (width * height * 4) as usize];
            let channels = if format == PixelFormat::Rgb { 3 } else { 4 };
            let plane = codec::encode(format, &pixels, width, height, width as usize * channels).unwrap();
            assert_eq!(pitch_for(width, format), Some(plane.pitch), "{format} w={width}");

            let header = TexHeader {
                pixel_format: format,
                ..TexHeader::default()
            };
            let tex = Tex::new(header, vec![MipMap::new(width as u16, height as u16, 0, plane.data)]);
            let back = Tex::from_memory(&tex.to_bytes().unwrap()).unwrap();
            assert_eq!(back.mip_maps()[0].pitch, plane.pitch);
        }
    }
}

#[test]
fn too_many_mips_are_rejected_on_write() {
    let tex = Tex::new(TexHeader::default(), tiny_mips(Tex::MAX_MIP_MAPS + 1));
    assert!(matches!(tex.to_bytes(), Err(KTexError::InvalidInput(_))));
}

#[test]
fn reader_accepts_any_read_impl() {
    let tex = Tex::new(TexHeader::default(), tiny_mips(3));
    let bytes = tex.to_bytes().unwrap();
    let mut slice: &[u8] = &bytes;
    assert_eq!(read_tex(&mut slice).unwrap(), tex);
}

#[test]
fn file_roundtrip_and_info() {
    let dir = std::env::temp_dir().join(format!("ktex-core-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("info.{TEX_EXTENSION}"));
    let tex = Tex::new(
        TexHeader::default(),
        vec![MipMap::new(8, 4, 32, vec![0; 32]), MipMap::new(4, 2, 16, vec![0; 16])],
    );
    tex.write_to_file(&path).unwrap();
    let back = Tex::from_file(&path).unwrap();
    assert_eq!(back, tex);
    let info = back.info();
    assert!(info.contains("Pixel Format: DXT5"));
    assert!(info.contains("Mip Maps: 2"));
    assert!(info.contains("  - 4 x 2"));
    let meta: serde_json::Value = serde_json::from_str(&back.mip_maps()[0].metadata_json()).unwrap();
    assert_eq!(meta["pitch"], 32);
    std::fs::remove_dir_all(&dir).ok();
}
