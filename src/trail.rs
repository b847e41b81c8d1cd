//! Pointer trail and the probabilistic hover highlight built on it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::HoverConfig;
use crate::random::UnitRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailPoint {
    pub x: i32,
    pub y: i32,
    pub timestamp: Instant,
}

/// Newest-first bounded history of pointer grid cells.
#[derive(Debug, Clone)]
pub struct MouseTrail {
    points: VecDeque<TrailPoint>,
    capacity: usize,
}

impl MouseTrail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, point: TrailPoint) {
        self.points.push_front(point);
        self.points.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn newest(&self) -> Option<&TrailPoint> {
        self.points.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrailPoint> + '_ {
        self.points.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    Idle,
    Moving { last_motion: Instant },
}

/// Tracks pointer motion in grid coordinates.
///
/// Idle never clears the trail; old points fade through the hover
/// time weighting instead.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    state: PointerState,
    last_cell: Option<(i32, i32)>,
    trail: MouseTrail,
    quiescence: Duration,
}

impl PointerTracker {
    pub fn new(max_trail_length: usize, quiescence: Duration) -> Self {
        Self {
            state: PointerState::Idle,
            last_cell: None,
            trail: MouseTrail::new(max_trail_length),
            quiescence,
        }
    }

    pub fn from_config(config: &HoverConfig) -> Self {
        Self::new(config.max_trail_length, config.quiescence())
    }

    /// Returns true when a new trail point was recorded.
    pub fn on_pointer_move(&mut self, cell: (i32, i32), now: Instant) -> bool {
        let changed = self.last_cell != Some(cell);
        if changed {
            self.trail.push(TrailPoint {
                x: cell.0,
                y: cell.1,
                timestamp: now,
            });
            self.last_cell = Some(cell);
        }
        self.state = PointerState::Moving { last_motion: now };
        changed
    }

    pub fn on_pointer_leave(&mut self) {
        self.state = PointerState::Idle;
    }

    /// Applies the quiescence timeout.
    pub fn poll(&mut self, now: Instant) -> PointerState {
        if let PointerState::Moving { last_motion } = self.state {
            if now.saturating_duration_since(last_motion) >= self.quiescence {
                self.state = PointerState::Idle;
            }
        }
        self.state
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.state, PointerState::Moving { .. })
    }

    pub fn last_cell(&self) -> Option<(i32, i32)> {
        self.last_cell
    }

    pub fn trail(&self) -> &MouseTrail {
        &self.trail
    }
}

/// Spatial, positional and temporal weighting for the hover swap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverField {
    pub radius: f32,
    pub decay_rate: f32,
    pub fade: Duration,
    pub boost_count: usize,
    pub boost: f32,
    pub base_probability: f32,
}

impl From<&HoverConfig> for HoverField {
    fn from(config: &HoverConfig) -> Self {
        Self {
            radius: config.radius,
            decay_rate: config.decay_rate,
            fade: config.fade(),
            boost_count: config.boost_count,
            boost: config.boost,
            base_probability: config.base_probability,
        }
    }
}

impl HoverField {
    /// Probability contributed by the trail point at `index`, `None` when
    /// the point is outside the hover radius. Values above 1 are left as is.
    pub fn probability(
        &self,
        x: u32,
        y: u32,
        index: usize,
        point: &TrailPoint,
        now: Instant,
    ) -> Option<f64> {
        let dx = f64::from(x) - f64::from(point.x);
        let dy = f64::from(y) - f64::from(point.y);
        let distance = (dx * dx + dy * dy).sqrt();
        let radius = f64::from(self.radius);
        if distance > radius {
            return None;
        }

        let normalized = distance / radius;
        let spatial = 1.0 - normalized * normalized;
        let age = f64::from(self.decay_rate).powi(index.min(i32::MAX as usize) as i32);
        let elapsed = now.saturating_duration_since(point.timestamp).as_secs_f64();
        let time = (1.0 - elapsed / self.fade.as_secs_f64()).max(0.0);
        let boost = if index < self.boost_count {
            f64::from(self.boost)
        } else {
            1.0
        };

        Some(spatial * age * time * boost * f64::from(self.base_probability))
    }

    /// Walks the trail newest first; the first point whose draw lands under
    /// its probability wins.
    pub fn should_highlight(
        &self,
        trail: &MouseTrail,
        x: u32,
        y: u32,
        now: Instant,
        rng: &mut dyn UnitRandom,
    ) -> bool {
        for (index, point) in trail.iter().enumerate() {
            let Some(probability) = self.probability(x, y, index, point, now) else {
                continue;
            };
            if probability <= 0.0 {
                continue;
            }
            if rng.next_unit() < probability {
                return true;
            }
        }
        false
    }
}
