use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use ktex_core::convert::{demultiply_alpha, mip_chain_sizes, premultiply_alpha};
use ktex_core::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn random_rgba(rng: &mut StdRng, w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |_, _| Rgba([rng.r#gen(), rng.r#gen(), rng.r#gen(), rng.r#gen()]))
}

fn gray_gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let v = (x * 2 + y) as u8;
        Rgba([v, v, v, 255])
    })
}

/// Smooth colour ramp whose alpha falls from 255 to 130 across the image.
fn colour_gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        Rgba([
            (64 + x * 2) as u8,
            (40 + y * 4) as u8,
            (200 - x - y) as u8,
            (255 - x - y * 2) as u8,
        ])
    })
}

fn channel_error(a: &RgbaImage, b: &RgbaImage, channel: usize) -> f64 {
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(x, y)| (x[channel] as i32 - y[channel] as i32).unsigned_abs() as u64)
        .sum();
    total as f64 / (a.width() * a.height()) as f64
}

fn mean_abs_diff(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as u64)
        .sum();
    total as f64 / a.as_raw().len() as f64
}

fn lossless(format: PixelFormat) -> ToTexOptions {
    ToTexOptions::builder()
        .pixel_format(format)
        .mip_maps(false)
        .premultiply(false)
        .build()
}

#[test]
fn rgba_roundtrip_is_exact() {
    let mut rng = StdRng::seed_from_u64(7);
    let src = random_rgba(&mut rng, 13, 7);
    let tex = to_tex(&DynamicImage::ImageRgba8(src.clone()), &lossless(PixelFormat::Rgba)).unwrap();
    assert_eq!(tex.mip_map_count(), 1);
    let out = from_tex(&tex, &FromTexOptions { demultiply_alpha: false }).unwrap();
    assert_eq!(out.to_rgba8(), src);
}

#[test]
fn rgb_roundtrip_is_exact_with_padded_rows() {
    let mut rng = StdRng::seed_from_u64(11);
    let src = RgbImage::from_fn(5, 3, |_, _| Rgb([rng.r#gen(), rng.r#gen(), rng.r#gen()]));
    let tex = to_tex(&DynamicImage::ImageRgb8(src.clone()), &lossless(PixelFormat::Rgb)).unwrap();
    let mip = &tex.mip_maps()[0];
    assert_eq!(mip.pitch, 16);
    assert_eq!(mip.data.len(), 16 * 3);
    let out = from_tex(&tex, &FromTexOptions::default()).unwrap();
    assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    assert_eq!(out.to_rgb8(), src);
}

#[test]
fn storage_is_bottom_up() {
    let mut src = RgbaImage::new(2, 2);
    src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    let tex = to_tex(&DynamicImage::ImageRgba8(src), &lossless(PixelFormat::Rgba)).unwrap();
    let data = &tex.mip_maps()[0].data;
    // the visual top row is stored last
    assert_eq!(&data[8..12], &[255, 0, 0, 255]);
    assert_eq!(&data[0..4], &[0, 0, 0, 0]);
}

#[test]
fn premultiplied_opaque_pixels_survive() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut src = random_rgba(&mut rng, 8, 8);
    for p in src.pixels_mut() {
        p[3] = 255;
    }
    let opts = ToTexOptions::builder()
        .pixel_format(PixelFormat::Rgba)
        .mip_maps(false)
        .build();
    let tex = to_tex(&DynamicImage::ImageRgba8(src.clone()), &opts).unwrap();
    let out = from_tex(&tex, &FromTexOptions::default()).unwrap();
    assert_eq!(out.to_rgba8(), src);
}

#[test]
fn premultiply_then_demultiply_is_close() {
    let mut img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 128]));
    premultiply_alpha(&mut img);
    assert_eq!(img.get_pixel(0, 0).0, [100, 50, 25, 128]);
    demultiply_alpha(&mut img);
    let p = img.get_pixel(0, 0).0;
    assert!((p[0] as i32 - 200).abs() <= 2 && (p[1] as i32 - 100).abs() <= 2);

    let mut clear = RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 0]));
    demultiply_alpha(&mut clear);
    assert_eq!(clear.get_pixel(0, 0).0, [0, 0, 0, 0]);
}

#[test]
fn block_formats_are_close() {
    let src = gray_gradient(64, 32);
    for format in [PixelFormat::Dxt1, PixelFormat::Dxt3, PixelFormat::Dxt5, PixelFormat::Etc2Eac] {
        let opts = ToTexOptions::builder().pixel_format(format).mip_maps(false).build();
        let tex = to_tex(&DynamicImage::ImageRgba8(src.clone()), &opts).unwrap();
        let out = from_tex(&tex, &FromTexOptions::default()).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), src.dimensions());
        let err = mean_abs_diff(&src, &out);
        assert!(err < 8.0, "{format}: mean error {err}");
    }
}

#[test]
fn colour_and_alpha_survive_block_formats() {
    let src = colour_gradient(64, 32);
    // (format, max mean error on R/G/B, max mean error on alpha)
    let bounds = [
        (PixelFormat::Dxt1, 8.0, None),
        (PixelFormat::Dxt3, 8.0, Some(6.0)),
        (PixelFormat::Dxt5, 8.0, Some(3.0)),
        (PixelFormat::Etc2Eac, 8.0, Some(3.0)),
    ];
    for (format, rgb_bound, alpha_bound) in bounds {
        let tex = to_tex(&DynamicImage::ImageRgba8(src.clone()), &lossless(format)).unwrap();
        let out = from_tex(&tex, &FromTexOptions { demultiply_alpha: false })
            .unwrap()
            .to_rgba8();
        for c in 0..3 {
            let err = channel_error(&src, &out, c);
            assert!(err < rgb_bound, "{format}: channel {c} mean error {err}");
        }
        match alpha_bound {
            Some(bound) => {
                let err = channel_error(&src, &out, 3);
                assert!(err < bound, "{format}: alpha mean error {err}");
            }
            // one-bit alpha: everything here is at least half opaque
            None => assert!(out.pixels().all(|p| p[3] == 255), "{format}: alpha not opaque"),
        }
    }
}

#[test]
fn opaque_images_decode_fully_opaque() {
    let mut rng = StdRng::seed_from_u64(19);
    let mut src = random_rgba(&mut rng, 8, 8);
    for p in src.pixels_mut() {
        p[3] = 255;
    }
    for format in [PixelFormat::Dxt1, PixelFormat::Dxt3, PixelFormat::Dxt5, PixelFormat::Etc2Eac] {
        let opts = ToTexOptions::builder().pixel_format(format).mip_maps(false).build();
        let tex = to_tex(&DynamicImage::ImageRgba8(src.clone()), &opts).unwrap();
        let out = from_tex(&tex, &FromTexOptions::default()).unwrap().to_rgba8();
        let alphas: Vec<u8> = out.pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, vec![255u8; 64], "{format}");
    }
}

#[test]
fn odd_sized_block_image_decodes_to_source_size() {
    for (w, h) in [(7, 5), (64, 30), (5, 1)] {
        let src = gray_gradient(w, h);
        for format in [PixelFormat::Dxt1, PixelFormat::Dxt3, PixelFormat::Dxt5, PixelFormat::Etc2Eac] {
            let opts = ToTexOptions::builder().pixel_format(format).mip_maps(false).build();
            let tex = to_tex(&DynamicImage::ImageRgba8(src.clone()), &opts).unwrap();
            let block = if format == PixelFormat::Dxt1 { 8 } else { 16 };
            let blocks = w.div_ceil(4) as usize * h.div_ceil(4) as usize;
            assert_eq!(tex.mip_maps()[0].data.len(), blocks * block, "{format} {w}x{h}");
            let out = from_tex(&tex, &FromTexOptions::default()).unwrap();
            assert_eq!((out.width(), out.height()), (w, h), "{format}");
            let err = mean_abs_diff(&src, &out.to_rgba8());
            assert!(err < 8.0, "{format} {w}x{h}: mean error {err}");
        }
    }
}

#[test]
fn mip_chain_reaches_one_by_one() {
    assert_eq!(mip_chain_sizes(5, 3), vec![(5, 3), (3, 2), (2, 1), (1, 1)]);
    assert_eq!(mip_chain_sizes(1, 8), vec![(1, 8), (1, 4), (1, 2), (1, 1)]);
    assert_eq!(mip_chain_sizes(1, 1), vec![(1, 1)]);

    let tex = to_tex(
        &DynamicImage::ImageRgba8(gray_gradient(16, 4)),
        &ToTexOptions::default(),
    )
    .unwrap();
    let dims: Vec<_> = tex.mip_maps().iter().map(|m| (m.width, m.height)).collect();
    assert_eq!(dims, vec![(16, 4), (8, 2), (4, 1), (2, 1), (1, 1)]);
    assert_eq!(tex.header.pixel_format, PixelFormat::Dxt5);
    assert_eq!(tex.header.texture_type, TextureType::TwoD);
}

#[test]
fn empty_and_oversized_images_are_rejected() {
    let opts = ToTexOptions::default();
    assert!(matches!(
        to_tex(&DynamicImage::ImageRgba8(RgbaImage::new(0, 4)), &opts),
        Err(KTexError::InvalidInput(_))
    ));
    assert!(opts.validate_image(70_000, 1).is_err());
    assert!(opts.validate_image(1, 65_535).is_ok());
}

#[test]
fn rows_wider_than_the_pitch_field_are_rejected() {
    // DXT5: 4095 blocks of 16 bytes fit in a u16 pitch, 4096 do not
    let dxt5 = ToTexOptions::default();
    assert!(dxt5.validate_image(16_380, 4).is_ok());
    assert!(matches!(dxt5.validate_image(16_381, 4), Err(KTexError::InvalidInput(_))));

    let rgb = ToTexOptions::builder().pixel_format(PixelFormat::Rgb).build();
    assert!(rgb.validate_image(21_844, 1).is_ok());
    assert!(rgb.validate_image(21_845, 1).is_err());

    let dxt1 = ToTexOptions::builder().pixel_format(PixelFormat::Dxt1).build();
    assert!(dxt1.validate_image(32_764, 4).is_ok());
    assert!(dxt1.validate_image(32_765, 4).is_err());
}

#[test]
fn unknown_pixel_formats_cannot_be_encoded_or_decoded() {
    let opts = ToTexOptions::builder().pixel_format(PixelFormat::Unknown(3)).build();
    assert!(matches!(
        to_tex(&DynamicImage::ImageRgba8(gray_gradient(4, 4)), &opts),
        Err(KTexError::Unsupported(_))
    ));

    let header = TexHeader {
        pixel_format: PixelFormat::Unknown(3),
        ..TexHeader::default()
    };
    let tex = Tex::new(header, vec![MipMap::new(4, 4, 16, vec![0; 16])]);
    assert!(matches!(from_tex(&tex, &FromTexOptions::default()), Err(KTexError::Unsupported(_))));
}

#[test]
fn container_without_mips_cannot_be_decoded() {
    let tex = Tex::new(TexHeader::default(), Vec::new());
    assert!(matches!(from_tex(&tex, &FromTexOptions::default()), Err(KTexError::Empty)));
}
