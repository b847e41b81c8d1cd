//! Draws converted grids and owns the pointer-trail state behind the hover
//! overlay.

use std::time::Instant;

use crate::config::GlyphcastConfig;
use crate::convert::{CellGrid, DepthTint, Rgb};
use crate::geometry::{Geometry, ResizeThrottle, Viewport};
use crate::random::UnitRandom;
use crate::trail::{HoverField, PointerState, PointerTracker};

/// Target for one draw pass. Positions are logical pixels.
pub trait GlyphSurface {
    fn clear(&mut self, color: Rgb);
    fn draw_glyph(&mut self, x: f32, y: f32, glyph: char, color: Rgb);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub drawn: usize,
    pub highlighted: usize,
}

pub struct AsciiRenderer {
    geometry: Geometry,
    spacing: [f32; 2],
    throttle: ResizeThrottle,
    tracker: PointerTracker,
    hover: HoverField,
    hover_glyph: char,
    tint: DepthTint,
    background: Rgb,
    rng: Box<dyn UnitRandom + Send>,
    last_grid: Option<CellGrid>,
}

impl AsciiRenderer {
    pub fn new(
        config: &GlyphcastConfig,
        geometry: Geometry,
        rng: Box<dyn UnitRandom + Send>,
    ) -> Self {
        Self {
            geometry,
            spacing: config.display.spacing,
            throttle: ResizeThrottle::new(config.display.resize_throttle()),
            tracker: PointerTracker::from_config(&config.hover),
            hover: HoverField::from(&config.hover),
            hover_glyph: config.hover.glyph,
            tint: config.tint.into(),
            background: config.display.background.into(),
            rng,
            last_grid: None,
        }
    }

    /// Renderer sized from a viewport the way a pixel display is.
    pub fn for_viewport(
        config: &GlyphcastConfig,
        viewport: Viewport,
        rng: Box<dyn UnitRandom + Send>,
    ) -> Self {
        let geometry = Geometry::compute(
            viewport,
            config.grid.cols,
            config.grid.rows,
            config.display.spacing,
        );
        Self::new(config, geometry, rng)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn tracker(&self) -> &PointerTracker {
        &self.tracker
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn last_grid(&self) -> Option<&CellGrid> {
        self.last_grid.as_ref()
    }

    /// Recomputes geometry unless a recompute happened within the throttle
    /// interval. Returns true when the geometry was recomputed.
    pub fn resize(&mut self, viewport: Viewport, now: Instant) -> bool {
        if !self.throttle.admit(now) {
            tracing::debug!(
                width = viewport.width,
                height = viewport.height,
                "resize throttled"
            );
            return false;
        }
        self.geometry = Geometry::compute(
            viewport,
            self.geometry.cols,
            self.geometry.rows,
            self.spacing,
        );
        tracing::debug!(
            char_height = self.geometry.char_height,
            dpr = viewport.device_pixel_ratio,
            "geometry recomputed"
        );
        true
    }

    /// Pointer position in logical pixels relative to the surface origin.
    pub fn pointer_moved(&mut self, x: f32, y: f32, now: Instant) -> bool {
        let cell = self.geometry.pointer_to_cell(x, y);
        self.tracker.on_pointer_move(cell, now)
    }

    pub fn pointer_left(&mut self) {
        self.tracker.on_pointer_leave();
    }

    pub fn poll_pointer(&mut self, now: Instant) -> PointerState {
        self.tracker.poll(now)
    }

    /// Draws `grid` and keeps it for later redraws.
    pub fn present(
        &mut self,
        grid: CellGrid,
        surface: &mut dyn GlyphSurface,
        now: Instant,
    ) -> DrawStats {
        let stats = self.render(&grid, surface, now);
        self.last_grid = Some(grid);
        stats
    }

    /// Draws the most recent grid again, for example after a resize.
    pub fn redraw(&mut self, surface: &mut dyn GlyphSurface, now: Instant) -> Option<DrawStats> {
        let grid = self.last_grid.take()?;
        let stats = self.render(&grid, surface, now);
        self.last_grid = Some(grid);
        Some(stats)
    }

    pub fn render(
        &mut self,
        grid: &CellGrid,
        surface: &mut dyn GlyphSurface,
        now: Instant,
    ) -> DrawStats {
        surface.clear(self.background);
        let mut stats = DrawStats::default();

        for (x, y, cell) in grid.iter() {
            if grid.is_background(cell) {
                continue;
            }
            let highlighted = !self.tracker.trail().is_empty()
                && self
                    .hover
                    .should_highlight(self.tracker.trail(), x, y, now, &mut self.rng);
            let (glyph, color) = if highlighted {
                stats.highlighted += 1;
                (
                    self.hover_glyph,
                    self.tint.apply(self.hover_glyph, cell.base_color),
                )
            } else {
                (cell.glyph, cell.color)
            };
            let (px, py) = self.geometry.cell_origin(x, y);
            surface.draw_glyph(px, py, glyph, color);
            stats.drawn += 1;
        }

        stats
    }
}
