use image::{Rgba, RgbaImage};
use ktex_core::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn noise(rng: &mut StdRng, w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |_, _| Rgba([rng.r#gen(), rng.r#gen(), rng.r#gen(), 255]))
}

fn random_set(rng: &mut StdRng, n: usize, max_side: u32) -> NamedImages {
    (0..n)
        .map(|i| {
            let w = rng.gen_range(1..=max_side);
            let h = rng.gen_range(1..=max_side);
            (format!("img{i:03}"), noise(rng, w, h))
        })
        .collect()
}

fn assert_complete_and_disjoint(atlas: &Atlas, images: &NamedImages) {
    assert_eq!(atlas.elements.len(), images.len());
    let rects: Vec<_> = atlas.elements.values().copied().collect();
    for (name, r) in &atlas.elements {
        let img = &images[name];
        assert_eq!((r.w, r.h), img.dimensions(), "{name}");
        assert!(r.right() < atlas.width() && r.bottom() < atlas.height(), "{name} {r:?}");
    }
    for (i, a) in rects.iter().enumerate() {
        for b in &rects[i + 1..] {
            assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
        }
    }
}

#[test]
fn random_sets_pack_completely_and_unpack_exactly() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..20 {
        let n = rng.gen_range(2..40);
        let images = random_set(&mut rng, n, 48);
        let atlas = pack_atlas(&images, &PackOptions::default()).unwrap();
        assert_complete_and_disjoint(&atlas, &images);
        assert!(atlas.width().is_power_of_two() && atlas.height().is_power_of_two());
        let back = unpack_atlas(&atlas).unwrap();
        assert_eq!(back, images, "round {round}");
    }
}

#[test]
fn two_sixteen_squares() {
    let mut images = NamedImages::new();
    images.insert("a".into(), RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255])));
    images.insert("b".into(), RgbaImage::from_pixel(16, 16, Rgba([0, 0, 255, 255])));
    let atlas = pack_atlas(&images, &PackOptions::default()).unwrap();
    let (w, h) = (atlas.width(), atlas.height());
    assert!((w >= 32 && h >= 16) || (w >= 16 && h >= 32), "{w}x{h}");
    assert_complete_and_disjoint(&atlas, &images);
    assert_eq!(unpack_atlas(&atlas).unwrap(), images);
}

#[test]
fn single_image_gets_pow2_canvas_at_origin() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut images = NamedImages::new();
    images.insert("solo".into(), noise(&mut rng, 5, 3));
    let atlas = pack_atlas(&images, &PackOptions { use_margin: true }).unwrap();
    assert_eq!((atlas.width(), atlas.height()), (8, 4));
    // top-left origin, expressed bottom-up
    assert_eq!(atlas.elements["solo"], Rect::new(0, 1, 5, 3));
    assert_eq!(unpack_atlas(&atlas).unwrap(), images);
}

#[test]
fn atlas_image_is_stored_bottom_up() {
    let mut images = NamedImages::new();
    let mut img = RgbaImage::new(2, 2);
    img.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
    images.insert("x".into(), img);
    let atlas = pack_atlas(&images, &PackOptions::default()).unwrap();
    assert_eq!(atlas.image.get_pixel(0, 1).0, [1, 2, 3, 4]);
}

#[test]
fn margin_keeps_elements_apart() {
    let mut rng = StdRng::seed_from_u64(99);
    let images = random_set(&mut rng, 24, 20);
    let atlas = pack_atlas(&images, &PackOptions { use_margin: true }).unwrap();
    assert_complete_and_disjoint(&atlas, &images);
    let height = atlas.height();
    let grown: Vec<Rect> = atlas
        .elements
        .values()
        .map(|r| {
            let td = r.flip_vertical(height);
            Rect::new(td.x, td.y, td.w + 1, td.h + 1)
        })
        .collect();
    for (i, a) in grown.iter().enumerate() {
        for b in &grown[i + 1..] {
            assert!(!a.intersects(b), "{a:?} touches {b:?}");
        }
    }
    assert_eq!(unpack_atlas(&atlas).unwrap(), images);
}

#[test]
fn packing_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(42);
    let images = random_set(&mut rng, 16, 32);
    let a = pack_atlas(&images, &PackOptions::default()).unwrap();
    let b = pack_atlas(&images, &PackOptions::default()).unwrap();
    assert_eq!(a.elements, b.elements);
    assert_eq!(a.image, b.image);
}

#[test]
fn rejects_empty_inputs() {
    assert!(matches!(
        pack_atlas(&NamedImages::new(), &PackOptions::default()),
        Err(KTexError::Empty)
    ));
    let mut images = NamedImages::new();
    images.insert("a".into(), RgbaImage::new(4, 4));
    images.insert("zero".into(), RgbaImage::new(0, 4));
    assert!(matches!(
        pack_atlas(&images, &PackOptions::default()),
        Err(KTexError::InvalidInput(_))
    ));
}

#[test]
fn unpack_rejects_rects_outside_the_image() {
    let mut atlas = Atlas {
        image: RgbaImage::new(8, 8),
        elements: Default::default(),
    };
    atlas.elements.insert("big".into(), Rect::new(4, 0, 8, 2));
    assert!(matches!(unpack_atlas(&atlas), Err(KTexError::InvalidInput(_))));
}
