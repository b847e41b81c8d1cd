use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use image::{ImageFormat, RgbaImage};
use tiny_skia::{Color, Pixmap};

use crate::convert::Rgb;
use crate::error::ExportError;
use crate::geometry::Geometry;
use crate::painter::GlyphPainter;
use crate::renderer::GlyphSurface;

/// Raster drawing surface at backing resolution.
pub struct Canvas {
    pixmap: Pixmap,
    geometry: Geometry,
    painter: Box<dyn GlyphPainter>,
    export_filename: String,
}

impl Canvas {
    pub fn new(
        geometry: Geometry,
        painter: Box<dyn GlyphPainter>,
        export_filename: impl Into<String>,
    ) -> Result<Self> {
        let pixmap = allocate(&geometry)?;
        Ok(Self {
            pixmap,
            geometry,
            painter,
            export_filename: export_filename.into(),
        })
    }

    /// Reallocates only when the backing size actually changed.
    pub fn resize(&mut self, geometry: Geometry) -> Result<bool> {
        let (width, height) = geometry.backing_size();
        let changed = width != self.pixmap.width() || height != self.pixmap.height();
        if changed {
            self.pixmap = allocate(&geometry)?;
        }
        self.geometry = geometry;
        Ok(changed)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn export_filename(&self) -> &str {
        &self.export_filename
    }

    /// Straight-alpha RGBA copy of the surface.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        rgba
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        let image = RgbaImage::from_raw(self.width(), self.height(), self.to_rgba())
            .ok_or(ExportError::EmptySurface)?;
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn write_png(&self, path: &Path) -> Result<(), ExportError> {
        let bytes = self.encode_png()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ExportError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, bytes).map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the surface under the fixed export file name.
    pub fn export_png(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.export_filename);
        self.write_png(&path)?;
        tracing::info!(path = %path.display(), width = self.width(), height = self.height(), "exported surface");
        Ok(path)
    }
}

fn allocate(geometry: &Geometry) -> Result<Pixmap> {
    let (width, height) = geometry.backing_size();
    Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate canvas pixmap {}x{}", width, height))
}

impl GlyphSurface for Canvas {
    fn clear(&mut self, color: Rgb) {
        self.pixmap
            .fill(Color::from_rgba8(color.r, color.g, color.b, 255));
    }

    fn draw_glyph(&mut self, x: f32, y: f32, glyph: char, color: Rgb) {
        let dpr = self.geometry.device_pixel_ratio;
        let size = (self.geometry.font_size() * dpr).round().max(1.0) as u32;
        let px = (x * dpr).round() as i32;
        let py = (y * dpr).round() as i32;
        self.painter
            .paint(&mut self.pixmap, px, py, size, glyph, color);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::Canvas;
    use crate::convert::Rgb;
    use crate::geometry::{Geometry, Viewport};
    use crate::painter::AtlasPainter;
    use crate::renderer::GlyphSurface;

    fn canvas(dpr: f32) -> Canvas {
        let geometry = Geometry::compute(
            Viewport {
                width: 100,
                height: 40,
                device_pixel_ratio: dpr,
            },
            4,
            4,
            [1.2, 1.2],
        );
        Canvas::new(geometry, Box::new(AtlasPainter::new()), "ascii-art.png")
            .expect("canvas should allocate")
    }

    #[test]
    fn backing_size_follows_device_pixel_ratio() {
        let single = canvas(1.0);
        let double = canvas(2.0);
        assert_eq!((single.width(), single.height()), (48, 48));
        assert_eq!((double.width(), double.height()), (96, 96));
    }

    #[test]
    fn resize_only_reallocates_on_size_change() {
        let mut canvas = canvas(1.0);
        let same = *canvas.geometry();
        assert!(!canvas.resize(same).expect("resize should succeed"));
        let mut bigger = same;
        bigger.char_height = 20;
        bigger.char_width = 20;
        assert!(canvas.resize(bigger).expect("resize should succeed"));
        assert_eq!(canvas.width(), 96);
    }

    #[test]
    fn export_writes_png_under_fixed_name() {
        let mut canvas = canvas(1.0);
        canvas.clear(Rgb::WHITE);
        canvas.draw_glyph(0.0, 0.0, '■', Rgb::BLACK);

        let dir = tempdir().expect("tempdir should create");
        let path = canvas.export_png(dir.path()).expect("export should succeed");
        assert_eq!(path.file_name().and_then(|name| name.to_str()), Some("ascii-art.png"));

        let decoded = image::open(&path).expect("png should decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (48, 48));
        assert_eq!(decoded.get_pixel(5, 5).0, [0, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn export_into_unwritable_location_is_an_error() {
        let canvas = canvas(1.0);
        let dir = tempdir().expect("tempdir should create");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").expect("blocker should write");
        let error = canvas
            .export_png(&blocker.join("nested"))
            .expect_err("export under a file should fail");
        assert_eq!(error.code(), "EXPORT_WRITE_FAILED");
    }
}
