//! RGBA frame to glyph-cell conversion.
//!
//! The converter is pure: the same buffer and configuration always produce
//! the same grid, so it can run on a worker thread without shared state.

use crate::config::{ColorConfig, GlyphcastConfig, TintConfig};
use crate::error::ConvertError;
use crate::ramp::{GlyphRamp, RampError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn map(self, mut f: impl FnMut(u8) -> u8) -> Self {
        Self::new(f(self.r), f(self.g), f(self.b))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

/// One `width x height` RGBA snapshot, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ConvertError> {
        let expected = rgba_len(width, height)?;
        if pixels.len() != expected {
            return Err(ConvertError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Fully transparent buffer.
    pub fn transparent(width: u32, height: u32) -> Result<Self, ConvertError> {
        let len = rgba_len(width, height)?;
        Self::new(width, height, vec![0; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn rgba(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 4;
        let pixel = self.pixels.get(idx..idx + 4)?;
        Some([pixel[0], pixel[1], pixel[2], pixel[3]])
    }
}

fn rgba_len(width: u32, height: u32) -> Result<usize, ConvertError> {
    if width == 0 || height == 0 {
        return Err(ConvertError::DimensionsInvalid { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|count| count.checked_mul(4))
        .ok_or(ConvertError::DimensionsInvalid { width, height })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub glyph: char,
    /// Ramp index, `None` for transparent pixels.
    pub tier: Option<usize>,
    pub brightness: f32,
    /// Floor/contrast adjusted color before depth tint.
    pub base_color: Rgb,
    pub color: Rgb,
}

impl Cell {
    pub fn transparent(background_glyph: char) -> Self {
        Self {
            glyph: background_glyph,
            tier: None,
            brightness: 0.0,
            base_color: Rgb::BLACK,
            color: Rgb::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid {
    cols: u32,
    rows: u32,
    background_glyph: char,
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn background_glyph(&self) -> char {
        self.background_glyph
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<&Cell> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.cells.get((y * self.cols + x) as usize)
    }

    pub fn is_background(&self, cell: &Cell) -> bool {
        cell.glyph == self.background_glyph
    }

    /// Iterates `(x, y, cell)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &Cell)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, cell)| (idx as u32 % cols, idx as u32 / cols, cell))
    }

    pub fn lines(&self) -> Vec<String> {
        self.cells
            .chunks(self.cols as usize)
            .map(|row| row.iter().map(|cell| cell.glyph).collect())
            .collect()
    }

    pub fn to_text(&self) -> String {
        let mut value = self.lines().join("\n");
        value.push('\n');
        value
    }
}

/// Brightness floor plus contrast curve, applied per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjust {
    pub luma: [f32; 3],
    pub contrast: f32,
    pub min_brightness: f32,
    pub min_color: u8,
}

impl From<ColorConfig> for ColorAdjust {
    fn from(config: ColorConfig) -> Self {
        Self {
            luma: config.luma,
            contrast: config.contrast,
            min_brightness: config.min_brightness,
            min_color: config.min_color,
        }
    }
}

impl ColorAdjust {
    pub fn brightness(&self, r: u8, g: u8, b: u8) -> f32 {
        (self.luma[0] * f32::from(r) + self.luma[1] * f32::from(g) + self.luma[2] * f32::from(b))
            / 255.0
    }

    /// Output is always within `[min_color, 255]`.
    pub fn adjust_channel(&self, channel: u8) -> u8 {
        let normalized = f32::from(channel) / 255.0;
        let brightened = normalized * (1.0 - self.min_brightness) + self.min_brightness;
        let contrasted = ((brightened - 0.5) * self.contrast + 0.5).clamp(0.0, 1.0);
        let scaled = (contrasted * 255.0).round() as u8;
        scaled.max(self.min_color)
    }

    pub fn adjust(&self, r: u8, g: u8, b: u8) -> Rgb {
        Rgb::new(
            self.adjust_channel(r),
            self.adjust_channel(g),
            self.adjust_channel(b),
        )
    }
}

/// Glyph-keyed color shift: faint glyphs wash toward white, shade glyphs
/// sink toward black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTint {
    pub faint_glyph: char,
    pub lighten: f32,
    pub shade_glyph: char,
    pub darken: f32,
}

impl From<TintConfig> for DepthTint {
    fn from(config: TintConfig) -> Self {
        Self {
            faint_glyph: config.faint_glyph,
            lighten: config.lighten,
            shade_glyph: config.shade_glyph,
            darken: config.darken,
        }
    }
}

impl DepthTint {
    pub fn apply(&self, glyph: char, color: Rgb) -> Rgb {
        if glyph == self.shade_glyph {
            let factor = self.darken;
            return color.map(|c| (f32::from(c) * factor).round() as u8);
        }
        if glyph == self.faint_glyph {
            let factor = self.lighten;
            return color.map(|c| {
                let c = f32::from(c);
                (c + (255.0 - c) * factor).round().min(255.0) as u8
            });
        }
        color
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsciiConverter {
    cols: u32,
    rows: u32,
    ramp: GlyphRamp,
    adjust: ColorAdjust,
    tint: DepthTint,
    background_glyph: char,
}

impl AsciiConverter {
    pub fn new(
        cols: u32,
        rows: u32,
        ramp: GlyphRamp,
        adjust: ColorAdjust,
        tint: DepthTint,
        background_glyph: char,
    ) -> Self {
        Self {
            cols,
            rows,
            ramp,
            adjust,
            tint,
            background_glyph,
        }
    }

    pub fn from_config(config: &GlyphcastConfig) -> Result<Self, RampError> {
        Ok(Self::new(
            config.grid.cols,
            config.grid.rows,
            GlyphRamp::new(config.ramp.clone())?,
            config.color.into(),
            config.tint.into(),
            config.display.background_glyph,
        ))
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn ramp(&self) -> &GlyphRamp {
        &self.ramp
    }

    pub fn adjust(&self) -> &ColorAdjust {
        &self.adjust
    }

    pub fn tint(&self) -> &DepthTint {
        &self.tint
    }

    pub fn convert(&self, buffer: &PixelBuffer) -> Result<CellGrid, ConvertError> {
        if buffer.width() != self.cols || buffer.height() != self.rows {
            return Err(ConvertError::GridMismatch {
                width: buffer.width(),
                height: buffer.height(),
                cols: self.cols,
                rows: self.rows,
            });
        }
        let expected = rgba_len(self.cols, self.rows)?;
        let pixels = buffer.pixels();
        if pixels.len() != expected {
            return Err(ConvertError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }

        let cells = pixels
            .chunks_exact(4)
            .map(|rgba| self.convert_pixel(rgba[0], rgba[1], rgba[2], rgba[3]))
            .collect();

        Ok(CellGrid {
            cols: self.cols,
            rows: self.rows,
            background_glyph: self.background_glyph,
            cells,
        })
    }

    pub fn convert_pixel(&self, r: u8, g: u8, b: u8, a: u8) -> Cell {
        if a == 0 {
            return Cell::transparent(self.background_glyph);
        }

        let brightness = self.adjust.brightness(r, g, b);
        let base_color = self.adjust.adjust(r, g, b);
        let (tier, glyph) = self.ramp.select(brightness);
        Cell {
            glyph,
            tier: Some(tier),
            brightness: brightness.clamp(0.0, 1.0),
            base_color,
            color: self.tint.apply(glyph, base_color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AsciiConverter, ColorAdjust, DepthTint, PixelBuffer, Rgb};
    use crate::config::GlyphcastConfig;
    use crate::error::ConvertError;

    fn converter(cols: u32, rows: u32) -> AsciiConverter {
        let mut config = GlyphcastConfig::default();
        config.grid.cols = cols;
        config.grid.rows = rows;
        AsciiConverter::from_config(&config).expect("default config should build converter")
    }

    #[test]
    fn white_pixels_select_top_glyph_at_full_color() {
        let converter = converter(2, 2);
        let buffer = PixelBuffer::new(2, 2, vec![255; 16]).expect("buffer should build");
        let grid = converter.convert(&buffer).expect("conversion should succeed");

        for (_, _, cell) in grid.iter() {
            assert_eq!(cell.glyph, '7');
            assert_eq!(cell.tier, Some(6));
            assert!((cell.brightness - 1.0).abs() < 1e-4);
            assert_eq!(cell.color, Rgb::WHITE);
        }
    }

    #[test]
    fn transparent_pixels_become_background() {
        let converter = converter(3, 2);
        let buffer = PixelBuffer::transparent(3, 2).expect("buffer should build");
        let grid = converter.convert(&buffer).expect("conversion should succeed");
        assert!(grid.cells().iter().all(|cell| grid.is_background(cell)));
        assert!(grid.cells().iter().all(|cell| cell.tier.is_none()));
        assert_eq!(grid.to_text(), "   \n   \n");
    }

    #[test]
    fn black_opaque_pixel_floors_color() {
        let converter = converter(1, 1);
        let cell = converter.convert_pixel(0, 0, 0, 255);
        assert_eq!(cell.glyph, ' ');
        assert_eq!(cell.tier, Some(0));
        // 0.1 floor -> round(25.5) = 26, lifted to min_color 40.
        assert_eq!(cell.base_color, Rgb::new(40, 40, 40));
    }

    #[test]
    fn faint_glyph_is_lightened_toward_white() {
        let converter = converter(1, 1);
        // Brightness 20/255 ~ 0.078 lands on '.'.
        let cell = converter.convert_pixel(20, 20, 20, 255);
        assert_eq!(cell.glyph, '.');
        let base = converter.adjust().adjust_channel(20);
        let expected = (f32::from(base) + (255.0 - f32::from(base)) * 0.6).round() as u8;
        assert_eq!(cell.color, Rgb::new(expected, expected, expected));
        assert!(cell.color.r > cell.base_color.r);
    }

    #[test]
    fn shade_glyph_is_darkened() {
        let tint = DepthTint {
            faint_glyph: '.',
            lighten: 0.6,
            shade_glyph: '■',
            darken: 0.4,
        };
        assert_eq!(tint.apply('■', Rgb::new(200, 100, 50)), Rgb::new(80, 40, 20));
        assert_eq!(tint.apply('7', Rgb::new(200, 100, 50)), Rgb::new(200, 100, 50));
    }

    #[test]
    fn adjust_channel_stays_within_floor_and_max() {
        let adjust = ColorAdjust {
            luma: [0.299, 0.587, 0.114],
            contrast: 2.5,
            min_brightness: 0.1,
            min_color: 40,
        };
        for channel in 0..=255u8 {
            let value = adjust.adjust_channel(channel);
            assert!(value >= 40, "channel {channel} fell below floor");
        }
        assert_eq!(adjust.adjust_channel(255), 255);
    }

    #[test]
    fn rejects_buffer_with_wrong_length() {
        let error = PixelBuffer::new(2, 2, vec![0; 15]).expect_err("short buffer should fail");
        assert_eq!(
            error,
            ConvertError::BufferSize {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn pixel_lookup_outside_buffer_is_none() {
        let pixels = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let buffer = PixelBuffer::new(2, 1, pixels).expect("buffer should build");
        assert_eq!(buffer.rgba(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(buffer.rgba(2, 0), None);
        assert_eq!(buffer.rgba(0, 1), None);
    }

    #[test]
    fn rejects_buffer_with_wrong_dimensions() {
        let converter = converter(4, 4);
        let buffer = PixelBuffer::transparent(2, 8).expect("buffer should build");
        assert!(matches!(
            converter.convert(&buffer),
            Err(ConvertError::GridMismatch { .. })
        ));
    }

    #[test]
    fn conversion_is_repeatable() {
        let converter = converter(8, 4);
        let pixels = (0..8 * 4 * 4).map(|i| (i * 37 % 256) as u8).collect::<Vec<_>>();
        let buffer = PixelBuffer::new(8, 4, pixels).expect("buffer should build");
        let first = converter.convert(&buffer).expect("conversion should succeed");
        let second = converter.convert(&buffer).expect("conversion should succeed");
        assert_eq!(first, second);
    }
}
