//! Upstream frame sources. Each tick a producer hands the pipeline one
//! `cols x rows` RGBA buffer.

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::config::MotionConfig;
use crate::convert::PixelBuffer;

pub trait FrameProducer: Send {
    fn label(&self) -> String;

    fn produce(&mut self, scene: &SceneState, cols: u32, rows: u32) -> Result<PixelBuffer>;
}

/// Where frames come from, as written on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Torus,
    Image(PathBuf),
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("torus") {
            return Ok(Self::Torus);
        }
        if let Some(path) = value.strip_prefix("image:") {
            if path.trim().is_empty() {
                bail!("invalid --source '{}': image path is empty", raw);
            }
            return Ok(Self::Image(PathBuf::from(path.trim())));
        }
        bail!(
            "invalid --source '{}': expected 'torus' or 'image:<path>'",
            raw
        )
    }

    pub fn build(&self) -> Result<Box<dyn FrameProducer>> {
        match self {
            Self::Torus => Ok(Box::new(TorusProducer::new())),
            Self::Image(path) => Ok(Box::new(ImageProducer::open(path)?)),
        }
    }
}

/// Smoothed rotation state driven by ticks and pointer position.
#[derive(Debug, Clone)]
pub struct SceneState {
    motion: MotionConfig,
    spin_speed: f32,
    target_spin: f32,
    rotation_y: f32,
    tilt_x: f32,
    tilt_z: f32,
    target_tilt_x: f32,
    target_tilt_z: f32,
    disposed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SceneState {
    pub fn new(motion: MotionConfig) -> Self {
        Self {
            motion,
            spin_speed: motion.idle_spin,
            target_spin: motion.idle_spin,
            rotation_y: 0.0,
            tilt_x: 0.0,
            tilt_z: 0.0,
            target_tilt_x: 0.0,
            target_tilt_z: 0.0,
            disposed: false,
        }
    }

    /// One tick of smoothing toward the pointer-driven targets.
    pub fn advance(&mut self) {
        if self.disposed {
            return;
        }
        self.spin_speed += (self.target_spin - self.spin_speed) * self.motion.spin_smoothness;
        self.rotation_y = (self.rotation_y + self.spin_speed).rem_euclid(TAU);
        self.tilt_x += (self.target_tilt_x - self.tilt_x) * self.motion.tilt_smoothness;
        self.tilt_z += (self.target_tilt_z - self.tilt_z) * self.motion.tilt_smoothness;
    }

    /// Pointer position normalized to `[0, 1]` across the display.
    pub fn on_pointer(&mut self, nx: f32, ny: f32) {
        if self.disposed {
            return;
        }
        let mouse_x = nx.clamp(0.0, 1.0) * 2.0 - 1.0;
        let mouse_y = -(ny.clamp(0.0, 1.0) * 2.0 - 1.0);
        self.target_tilt_x = mouse_y * self.motion.max_tilt;
        self.target_tilt_z = -mouse_x * self.motion.max_tilt;
        self.target_spin = if nx > 0.5 {
            self.motion.pointer_spin
        } else {
            -self.motion.pointer_spin
        };
    }

    pub fn rotation(&self) -> Rotation {
        Rotation {
            x: self.motion.base_tilt + self.tilt_x,
            y: self.rotation_y,
            z: self.tilt_z,
        }
    }

    pub fn spin_speed(&self) -> f32 {
        self.spin_speed
    }

    pub fn target_spin(&self) -> f32 {
        self.target_spin
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// A still image resampled to the grid. Scene motion does not apply.
pub struct ImageProducer {
    source: RgbaImage,
    name: String,
    cached: Option<(u32, u32, Vec<u8>)>,
}

impl ImageProducer {
    pub fn open(path: &Path) -> Result<Self> {
        let source = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgba8();
        Ok(Self::from_image(source, &path.display().to_string()))
    }

    pub fn from_image(source: RgbaImage, name: &str) -> Self {
        Self {
            source,
            name: name.to_owned(),
            cached: None,
        }
    }
}

impl FrameProducer for ImageProducer {
    fn label(&self) -> String {
        format!("image {}", self.name)
    }

    fn produce(&mut self, _scene: &SceneState, cols: u32, rows: u32) -> Result<PixelBuffer> {
        let stale = !matches!(&self.cached, Some((c, r, _)) if *c == cols && *r == rows);
        if stale {
            let resized = imageops::resize(&self.source, cols, rows, FilterType::Nearest);
            self.cached = Some((cols, rows, resized.into_raw()));
        }
        let pixels = self
            .cached
            .as_ref()
            .map(|(_, _, pixels)| pixels.clone())
            .unwrap_or_default();
        Ok(PixelBuffer::new(cols, rows, pixels)?)
    }
}

/// Procedural lit torus on a transparent background.
#[derive(Debug, Clone)]
pub struct TorusProducer {
    major_radius: f32,
    minor_radius: f32,
    light: [f32; 3],
    ambient: f32,
}

impl Default for TorusProducer {
    fn default() -> Self {
        Self::new()
    }
}

impl TorusProducer {
    pub fn new() -> Self {
        Self {
            major_radius: 2.0,
            minor_radius: 1.0,
            light: normalize([-0.4, 0.6, 0.7]),
            ambient: 0.12,
        }
    }
}

impl FrameProducer for TorusProducer {
    fn label(&self) -> String {
        "procedural torus".to_owned()
    }

    fn produce(&mut self, scene: &SceneState, cols: u32, rows: u32) -> Result<PixelBuffer> {
        let width = cols as usize;
        let height = rows as usize;
        let mut pixels = vec![0u8; width * height * 4];
        let mut depth = vec![f32::NEG_INFINITY; width * height];

        let outer = self.major_radius + self.minor_radius;
        let scale = 0.45 * cols.min(rows) as f32 / outer;
        let center_x = cols as f32 / 2.0;
        let center_y = rows as f32 / 2.0;
        let rotation = scene.rotation();

        // Two samples per output pixel along each parameter.
        let ring_steps = (TAU * outer * scale * 2.0).ceil().max(16.0) as u32;
        let tube_steps = (TAU * self.minor_radius * scale * 2.0).ceil().max(8.0) as u32;

        for i in 0..ring_steps {
            let phi = i as f32 / ring_steps as f32 * TAU;
            let (sin_phi, cos_phi) = phi.sin_cos();
            for j in 0..tube_steps {
                let theta = j as f32 / tube_steps as f32 * TAU;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let ring = self.major_radius + self.minor_radius * cos_theta;
                let point = rotate(
                    [ring * cos_phi, ring * sin_phi, self.minor_radius * sin_theta],
                    rotation,
                );
                let normal = rotate(
                    [cos_theta * cos_phi, cos_theta * sin_phi, sin_theta],
                    rotation,
                );

                let sx = (center_x + point[0] * scale).floor();
                let sy = (center_y - point[1] * scale).floor();
                if sx < 0.0 || sy < 0.0 || sx >= cols as f32 || sy >= rows as f32 {
                    continue;
                }
                let idx = sy as usize * width + sx as usize;
                if point[2] <= depth[idx] {
                    continue;
                }
                depth[idx] = point[2];

                let diffuse = dot(normal, self.light).max(0.0);
                let level = (self.ambient + (1.0 - self.ambient) * diffuse).clamp(0.0, 1.0);
                let value = (level * 255.0).round() as u8;
                pixels[idx * 4..idx * 4 + 4].copy_from_slice(&[value, value, value, 255]);
            }
        }

        Ok(PixelBuffer::new(cols, rows, pixels)?)
    }
}

/// Euler XYZ order: z is applied first, x last.
fn rotate(v: [f32; 3], rotation: Rotation) -> [f32; 3] {
    let (sz, cz) = rotation.z.sin_cos();
    let v = [v[0] * cz - v[1] * sz, v[0] * sz + v[1] * cz, v[2]];
    let (sy, cy) = rotation.y.sin_cos();
    let v = [v[0] * cy + v[2] * sy, v[1], -v[0] * sy + v[2] * cy];
    let (sx, cx) = rotation.x.sin_cos();
    [v[0], v[1] * cx - v[2] * sx, v[1] * sx + v[2] * cx]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = dot(v, v).sqrt();
    if len == 0.0 {
        return v;
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::{FrameProducer, ImageProducer, SceneState, SourceSpec, TorusProducer};
    use crate::config::MotionConfig;

    #[test]
    fn scene_eases_toward_pointer_targets() {
        let mut scene = SceneState::new(MotionConfig::default());
        assert!((scene.rotation().x - 0.275).abs() < 1e-6);

        scene.on_pointer(1.0, 0.0);
        assert!((scene.target_spin() - 0.005).abs() < 1e-6);
        scene.advance();
        // 0.003 + (0.005 - 0.003) * 0.05
        assert!((scene.spin_speed() - 0.0031).abs() < 1e-6);
        let rotation = scene.rotation();
        assert!((rotation.x - (0.275 + 0.12 * 0.06)).abs() < 1e-6);
        assert!((rotation.z + 0.12 * 0.06).abs() < 1e-6);

        scene.on_pointer(0.2, 0.5);
        assert!((scene.target_spin() + 0.005).abs() < 1e-6);
    }

    #[test]
    fn disposed_scene_stops_moving() {
        let mut scene = SceneState::new(MotionConfig::default());
        scene.dispose();
        let before = scene.rotation();
        scene.on_pointer(1.0, 1.0);
        scene.advance();
        assert_eq!(scene.rotation(), before);
        assert!(scene.is_disposed());
    }

    #[test]
    fn torus_has_transparent_corners_and_lit_body() {
        let scene = SceneState::new(MotionConfig::default());
        let mut producer = TorusProducer::new();
        let buffer = producer.produce(&scene, 40, 40).expect("torus should render");
        assert_eq!(buffer.rgba(0, 0).map(|pixel| pixel[3]), Some(0));
        assert_eq!(buffer.rgba(39, 39).map(|pixel| pixel[3]), Some(0));
        let opaque = buffer
            .pixels()
            .chunks_exact(4)
            .filter(|pixel| pixel[3] == 255)
            .count();
        assert!(opaque > 100, "only {opaque} opaque pixels");
        assert!(buffer
            .pixels()
            .chunks_exact(4)
            .any(|pixel| pixel[3] == 255 && pixel[0] > 128));
    }

    #[test]
    fn image_is_resampled_to_grid() {
        let mut image = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        for y in 0..4 {
            for x in 0..8 {
                image.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let mut producer = ImageProducer::from_image(image, "half");
        let scene = SceneState::new(MotionConfig::default());
        let buffer = producer.produce(&scene, 4, 2).expect("image should resample");
        assert_eq!(buffer.rgba(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(buffer.rgba(3, 1).map(|pixel| pixel[3]), Some(0));
    }

    #[test]
    fn source_spec_parses_both_forms() {
        assert_eq!(SourceSpec::parse("torus").expect("torus parses"), SourceSpec::Torus);
        assert_eq!(
            SourceSpec::parse("image:foo.png").expect("image parses"),
            SourceSpec::Image("foo.png".into())
        );
        assert!(SourceSpec::parse("image:").is_err());
        assert!(SourceSpec::parse("video:x").is_err());
    }
}
