use glyphcast::config::GlyphcastConfig;
use glyphcast::convert::{AsciiConverter, PixelBuffer, Rgb};
use glyphcast::random::XorShift64;

fn converter(cols: u32, rows: u32) -> AsciiConverter {
    let mut config = GlyphcastConfig::default();
    config.grid.cols = cols;
    config.grid.rows = rows;
    AsciiConverter::from_config(&config).expect("default config should build converter")
}

fn noise(width: u32, height: u32, seed: u64) -> PixelBuffer {
    let mut rng = XorShift64::from_seed(seed);
    let pixels = (0..width * height * 4)
        .map(|_| (rng.next_u64() >> 56) as u8)
        .collect();
    PixelBuffer::new(width, height, pixels).expect("noise buffer should build")
}

#[test]
fn fully_transparent_frames_are_all_background() {
    for (cols, rows) in [(1, 1), (7, 3), (40, 25)] {
        let grid = converter(cols, rows)
            .convert(&PixelBuffer::transparent(cols, rows).expect("buffer should build"))
            .expect("conversion should succeed");
        assert!(grid.iter().all(|(_, _, cell)| grid.is_background(cell)));
        assert_eq!(grid.lines().len(), rows as usize);
    }
}

#[test]
fn white_two_by_two_selects_top_glyph() {
    let grid = converter(2, 2)
        .convert(&PixelBuffer::new(2, 2, vec![255; 16]).expect("buffer should build"))
        .expect("conversion should succeed");
    for (_, _, cell) in grid.iter() {
        assert_eq!(cell.glyph, '7');
        assert_eq!(cell.color, Rgb::new(255, 255, 255));
    }
}

#[test]
fn tier_never_decreases_as_grey_level_rises() {
    let converter = converter(256, 1);
    let pixels = (0..=255u8)
        .flat_map(|level| [level, level, level, 255])
        .collect::<Vec<_>>();
    let grid = converter
        .convert(&PixelBuffer::new(256, 1, pixels).expect("buffer should build"))
        .expect("conversion should succeed");

    let tiers = grid
        .cells()
        .iter()
        .map(|cell| cell.tier.expect("opaque pixels have a tier"))
        .collect::<Vec<_>>();
    assert!(tiers.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(tiers.first(), Some(&0));
    assert_eq!(tiers.last(), Some(&(converter.ramp().len() - 1)));
}

#[test]
fn opaque_colors_respect_floor() {
    let converter = converter(32, 32);
    let grid = converter
        .convert(&noise(32, 32, 99))
        .expect("conversion should succeed");
    for (_, _, cell) in grid.iter() {
        if cell.tier.is_none() {
            continue;
        }
        let base = cell.base_color;
        assert!(base.r >= 40 && base.g >= 40 && base.b >= 40, "{base:?}");
        assert!((0.0..=1.0).contains(&cell.brightness));
    }
}

#[test]
fn converting_the_same_frame_twice_is_identical() {
    let converter = converter(24, 12);
    let buffer = noise(24, 12, 5);
    let first = converter.convert(&buffer).expect("conversion should succeed");
    let second = converter.convert(&buffer).expect("conversion should succeed");
    assert_eq!(first, second);
    assert_eq!(first.to_text(), second.to_text());
}
