use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::ramp::{GlyphRamp, RampEntry};

pub const DEFAULT_EXPORT_FILENAME: &str = "ascii-art.png";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlyphcastConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    #[serde(default = "default_ramp")]
    pub ramp: Vec<RampEntry>,
    #[serde(default)]
    pub color: ColorConfig,
    #[serde(default)]
    pub tint: TintConfig,
    #[serde(default)]
    pub hover: HoverConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Default for GlyphcastConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            target_fps: default_target_fps(),
            ramp: default_ramp(),
            color: ColorConfig::default(),
            tint: TintConfig::default(),
            hover: HoverConfig::default(),
            display: DisplayConfig::default(),
            motion: MotionConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GridConfig {
    pub cols: u32,
    pub rows: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: 150,
            rows: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ColorConfig {
    /// Rec.601 weights for r, g, b.
    pub luma: [f32; 3],
    pub contrast: f32,
    pub min_brightness: f32,
    pub min_color: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            luma: [0.299, 0.587, 0.114],
            contrast: 1.0,
            min_brightness: 0.1,
            min_color: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TintConfig {
    pub faint_glyph: char,
    /// Fraction of the distance to white, 0 = unchanged.
    pub lighten: f32,
    pub shade_glyph: char,
    /// Multiplier toward black, 1 = unchanged.
    pub darken: f32,
}

impl Default for TintConfig {
    fn default() -> Self {
        Self {
            faint_glyph: '.',
            lighten: 0.6,
            shade_glyph: '/',
            darken: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HoverConfig {
    pub glyph: char,
    pub radius: f32,
    pub max_trail_length: usize,
    pub decay_rate: f32,
    pub fade_ms: u64,
    pub boost_count: usize,
    pub boost: f32,
    pub base_probability: f32,
    pub quiescence_ms: u64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            glyph: '■',
            radius: 10.0,
            max_trail_length: 20,
            decay_rate: 0.75,
            fade_ms: 1500,
            boost_count: 3,
            boost: 1.5,
            base_probability: 0.6,
            quiescence_ms: 100,
        }
    }
}

impl HoverConfig {
    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DisplayConfig {
    pub background: [u8; 3],
    pub background_glyph: char,
    pub spacing: [f32; 2],
    pub resize_throttle_ms: u64,
    pub device_pixel_ratio: f32,
    pub viewport_height: u32,
    pub stall_ticks: u32,
    pub font: Option<FontConfig>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            background_glyph: ' ',
            spacing: [1.2, 1.2],
            resize_throttle_ms: 100,
            device_pixel_ratio: 1.0,
            viewport_height: 900,
            stall_ticks: 32,
            font: None,
        }
    }
}

impl DisplayConfig {
    pub fn resize_throttle(&self) -> Duration {
        Duration::from_millis(self.resize_throttle_ms)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MotionConfig {
    pub base_tilt: f32,
    pub max_tilt: f32,
    pub tilt_smoothness: f32,
    pub idle_spin: f32,
    pub pointer_spin: f32,
    pub spin_smoothness: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            base_tilt: 0.275,
            max_tilt: 0.12,
            tilt_smoothness: 0.06,
            idle_spin: 0.003,
            pointer_spin: 0.005,
            spin_smoothness: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExportConfig {
    pub filename: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename: DEFAULT_EXPORT_FILENAME.to_owned(),
        }
    }
}

fn default_target_fps() -> u32 {
    16
}

pub fn default_ramp() -> Vec<RampEntry> {
    [
        (0.0, ' '),
        (0.04, '.'),
        (0.3, '3'),
        (0.5, '7'),
        (0.7, '□'),
        (0.85, '■'),
        (0.9, '7'),
    ]
    .into_iter()
    .map(|(threshold, glyph)| RampEntry { threshold, glyph })
    .collect()
}

impl GlyphcastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid.cols == 0 || self.grid.rows == 0 {
            bail!(
                "grid must be positive, got {}x{}",
                self.grid.cols,
                self.grid.rows
            );
        }
        if self.target_fps == 0 {
            bail!("target_fps must be > 0");
        }

        GlyphRamp::new(self.ramp.clone()).context("invalid ramp")?;

        let color = &self.color;
        if color.luma.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            bail!("color.luma weights must be finite and non-negative");
        }
        if !(0.0..=1.0).contains(&color.min_brightness) {
            bail!("color.min_brightness must be within [0, 1]");
        }
        if !color.contrast.is_finite() || color.contrast < 0.0 {
            bail!("color.contrast must be finite and non-negative");
        }

        if !(0.0..=1.0).contains(&self.tint.lighten) || !(0.0..=1.0).contains(&self.tint.darken) {
            bail!("tint.lighten and tint.darken must be within [0, 1]");
        }

        let hover = &self.hover;
        if !(hover.radius > 0.0) {
            bail!("hover.radius must be > 0");
        }
        if !(hover.decay_rate > 0.0 && hover.decay_rate <= 1.0) {
            bail!("hover.decay_rate must be within (0, 1]");
        }
        if hover.max_trail_length == 0 {
            bail!("hover.max_trail_length must be > 0");
        }
        if hover.fade_ms == 0 {
            bail!("hover.fade_ms must be > 0");
        }
        if hover.glyph == self.display.background_glyph {
            bail!("hover.glyph cannot be the background glyph");
        }

        let display = &self.display;
        if display.spacing.iter().any(|factor| !(*factor >= 1.0)) {
            bail!("display.spacing factors must be >= 1");
        }
        if !(display.device_pixel_ratio > 0.0) {
            bail!("display.device_pixel_ratio must be > 0");
        }
        if display.viewport_height == 0 {
            bail!("display.viewport_height must be > 0");
        }
        if display.stall_ticks == 0 {
            bail!("display.stall_ticks must be > 0");
        }

        let filename = self.export.filename.trim();
        if filename.is_empty() || filename.contains(['/', '\\']) {
            bail!(
                "export.filename must be a bare file name, got '{}'",
                self.export.filename
            );
        }

        Ok(())
    }

    /// Every glyph the renderer may draw.
    pub fn drawable_glyphs(&self) -> Vec<char> {
        let mut glyphs = self
            .ramp
            .iter()
            .map(|entry| entry.glyph)
            .chain([self.hover.glyph, self.tint.faint_glyph, self.tint.shade_glyph])
            .filter(|glyph| *glyph != self.display.background_glyph)
            .collect::<Vec<_>>();
        glyphs.sort_unstable();
        glyphs.dedup();
        glyphs
    }
}

pub fn load_config(path: &Path) -> Result<GlyphcastConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut config = parse_config(&contents)
        .with_context(|| format!("failed to load config {}", path.display()))?;

    if let Some(font) = config.display.font.as_mut() {
        if font.path.is_relative() {
            let root = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            font.path = root.join(&font.path);
        }
    }

    config.validate()?;
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<GlyphcastConfig> {
    if contents.trim().is_empty() {
        return Ok(GlyphcastConfig::default());
    }
    serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("failed to parse yaml at {}: {}", location, error)
    })
}

/// Parses a `COLSxROWS` grid size.
pub fn parse_grid_size(raw: &str) -> Result<(u32, u32)> {
    let value = raw.trim();
    let (cols_raw, rows_raw) = value
        .split_once('x')
        .or_else(|| value.split_once('X'))
        .ok_or_else(|| anyhow!("invalid --size '{}': expected COLSxROWS", raw))?;
    let cols = cols_raw
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid --size '{}': cols must be an integer", raw))?;
    let rows = rows_raw
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid --size '{}': rows must be an integer", raw))?;
    if cols == 0 || rows == 0 {
        bail!("invalid --size '{}': cols/rows must be > 0", raw);
    }
    Ok((cols, rows))
}
