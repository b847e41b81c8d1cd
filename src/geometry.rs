use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

/// Character-cell layout shared by drawing and pointer mapping.
///
/// All positions are logical (CSS-like) pixels; only the backing size is
/// multiplied by the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub cols: u32,
    pub rows: u32,
    pub char_width: u32,
    pub char_height: u32,
    pub spacing_x: f32,
    pub spacing_y: f32,
    pub device_pixel_ratio: f32,
}

impl Geometry {
    /// Square glyphs sized so `rows` lines fit the viewport height.
    pub fn compute(viewport: Viewport, cols: u32, rows: u32, spacing: [f32; 2]) -> Self {
        let char_height = (viewport.height / rows.max(1)).max(1);
        Self {
            cols,
            rows,
            char_width: char_height,
            char_height,
            spacing_x: spacing[0],
            spacing_y: spacing[1],
            device_pixel_ratio: viewport.device_pixel_ratio,
        }
    }

    /// One logical pixel per cell, for surfaces already addressed in cells.
    pub fn unit(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            char_width: 1,
            char_height: 1,
            spacing_x: 1.0,
            spacing_y: 1.0,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn step_x(&self) -> f32 {
        self.char_width as f32 * self.spacing_x
    }

    pub fn step_y(&self) -> f32 {
        self.char_height as f32 * self.spacing_y
    }

    pub fn font_size(&self) -> f32 {
        self.char_height as f32
    }

    pub fn cell_origin(&self, x: u32, y: u32) -> (f32, f32) {
        (x as f32 * self.step_x(), y as f32 * self.step_y())
    }

    pub fn logical_size(&self) -> (u32, u32) {
        (
            (self.cols as f32 * self.step_x()).round() as u32,
            (self.rows as f32 * self.step_y()).round() as u32,
        )
    }

    pub fn backing_size(&self) -> (u32, u32) {
        let (width, height) = self.logical_size();
        (
            ((width as f32) * self.device_pixel_ratio).round().max(1.0) as u32,
            ((height as f32) * self.device_pixel_ratio).round().max(1.0) as u32,
        )
    }

    /// Maps a logical pointer position to grid coordinates. Positions left
    /// of or above the surface map to negative cells.
    pub fn pointer_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.step_x()).floor() as i32,
            (y / self.step_y()).floor() as i32,
        )
    }
}

/// Lets at most one resize through per interval.
#[derive(Debug, Clone)]
pub struct ResizeThrottle {
    interval: Duration,
    last_applied: Option<Instant>,
}

impl ResizeThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_applied: None,
        }
    }

    /// Returns true when the caller should recompute now.
    pub fn admit(&mut self, now: Instant) -> bool {
        let ready = match self.last_applied {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if ready {
            self.last_applied = Some(now);
        }
        ready
    }
}
