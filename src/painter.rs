use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use fontdue::{Font, FontSettings};
use sha2::{Digest, Sha256};
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::config::FontConfig;
use crate::convert::Rgb;
use crate::glyph_atlas::{GlyphAtlas, GLYPH_HEIGHT, GLYPH_WIDTH};

/// Rasterizes single glyphs into a pixmap.
pub trait GlyphPainter: Send {
    fn supports(&self, glyph: char) -> bool;

    /// Paints `glyph` with its top-left corner at `(x, y)` backing pixels,
    /// scaled to a `size` pixel square cell.
    fn paint(&mut self, pixmap: &mut Pixmap, x: i32, y: i32, size: u32, glyph: char, color: Rgb);

    fn label(&self) -> String;
}

pub fn painter_for(font: Option<&FontConfig>) -> Result<Box<dyn GlyphPainter>> {
    match font {
        Some(font) => Ok(Box::new(FontPainter::from_config(font)?)),
        None => Ok(Box::new(AtlasPainter::new())),
    }
}

pub fn ensure_glyphs_supported(painter: &dyn GlyphPainter, glyphs: &[char]) -> Result<()> {
    let missing = glyphs
        .iter()
        .copied()
        .filter(|glyph| !painter.supports(*glyph))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "{} cannot draw glyph(s) {:?}; configure display.font or change the ramp",
            painter.label(),
            missing
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct AtlasPainter {
    atlas: GlyphAtlas,
}

impl AtlasPainter {
    pub fn new() -> Self {
        Self {
            atlas: GlyphAtlas::new(),
        }
    }
}

impl GlyphPainter for AtlasPainter {
    fn supports(&self, glyph: char) -> bool {
        self.atlas.contains(glyph)
    }

    fn paint(&mut self, pixmap: &mut Pixmap, x: i32, y: i32, size: u32, glyph: char, color: Rgb) {
        let size = size.max(1);
        for cy in 0..size {
            let glyph_y = ((cy * GLYPH_HEIGHT) / size).min(GLYPH_HEIGHT - 1);
            for cx in 0..size {
                let glyph_x = ((cx * GLYPH_WIDTH) / size).min(GLYPH_WIDTH - 1);
                if self.atlas.sample(glyph, glyph_x, glyph_y) {
                    blend_pixel(pixmap, x + cx as i32, y + cy as i32, color, 255);
                }
            }
        }
    }

    fn label(&self) -> String {
        "built-in glyph atlas".to_owned()
    }
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    xmin: i32,
    ymin: i32,
    bitmap: Vec<u8>,
}

pub struct FontPainter {
    font: Font,
    name: String,
    glyph_cache: HashMap<(char, u32), GlyphBitmap>,
}

impl FontPainter {
    pub fn from_config(config: &FontConfig) -> Result<Self> {
        let bytes = read_verified_font_bytes(&config.path, config.sha256.as_deref())?;
        Self::from_bytes(bytes, &config.path.display().to_string())
    }

    pub fn from_bytes(bytes: Vec<u8>, name: &str) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font {name}: {error}"))?;
        Ok(Self {
            font,
            name: name.to_owned(),
            glyph_cache: HashMap::new(),
        })
    }

    fn bitmap(&mut self, glyph: char, size: u32) -> &GlyphBitmap {
        let font = &self.font;
        self.glyph_cache.entry((glyph, size)).or_insert_with(|| {
            let (metrics, bitmap) = font.rasterize(glyph, size as f32);
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                xmin: metrics.xmin,
                ymin: metrics.ymin,
                bitmap,
            }
        })
    }
}

impl GlyphPainter for FontPainter {
    fn supports(&self, glyph: char) -> bool {
        glyph == ' ' || self.font.lookup_glyph_index(glyph) != 0
    }

    fn paint(&mut self, pixmap: &mut Pixmap, x: i32, y: i32, size: u32, glyph: char, color: Rgb) {
        let size = size.max(1);
        // Baseline sits at the ascent so cells align like text with a top baseline.
        let ascent = self
            .font
            .horizontal_line_metrics(size as f32)
            .map(|metrics| metrics.ascent)
            .unwrap_or(size as f32);
        let glyph_bitmap = self.bitmap(glyph, size).clone();
        let origin_x = x + glyph_bitmap.xmin;
        let origin_y =
            y + (ascent.round() as i32) - glyph_bitmap.height as i32 - glyph_bitmap.ymin;

        for row in 0..glyph_bitmap.height {
            for col in 0..glyph_bitmap.width {
                let mask = glyph_bitmap.bitmap[row * glyph_bitmap.width + col];
                if mask == 0 {
                    continue;
                }
                blend_pixel(
                    pixmap,
                    origin_x + col as i32,
                    origin_y + row as i32,
                    color,
                    mask,
                );
            }
        }
    }

    fn label(&self) -> String {
        format!("font {}", self.name)
    }
}

pub fn read_verified_font_bytes(path: &Path, expected_sha256: Option<&str>) -> Result<Vec<u8>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file {}", path.display()))?;
    if let Some(expected) = expected_sha256 {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            bail!(
                "font hash mismatch for {}: expected {}, got {}",
                path.display(),
                expected.trim(),
                actual
            );
        }
    }
    Ok(bytes)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub fn blend_pixel(pixmap: &mut Pixmap, x: i32, y: i32, color: Rgb, coverage: u8) {
    if x < 0 || y < 0 || x as u32 >= pixmap.width() || y as u32 >= pixmap.height() {
        return;
    }
    if coverage == 0 {
        return;
    }

    let alpha = u16::from(coverage);
    let inv_alpha = 255 - alpha;
    let index = (y as u32 * pixmap.width() + x as u32) as usize;
    let Some(pixel) = pixmap.pixels_mut().get_mut(index) else {
        return;
    };

    let mix = |src: u8, dst: u8| -> u8 {
        ((u16::from(src) * alpha + u16::from(dst) * inv_alpha + 127) / 255) as u8
    };
    let out_a = (alpha + (u16::from(pixel.alpha()) * inv_alpha + 127) / 255) as u8;
    let out_r = mix(color.r, pixel.red()).min(out_a);
    let out_g = mix(color.g, pixel.green()).min(out_a);
    let out_b = mix(color.b, pixel.blue()).min(out_a);

    if let Some(out) = PremultipliedColorU8::from_rgba(out_r, out_g, out_b, out_a) {
        *pixel = out;
    }
}
