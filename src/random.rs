//! Uniform random sources for the hover overlay.
//!
//! The overlay only needs draws in `[0, 1)`; keeping the source behind a
//! trait lets tests script exact decisions.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait UnitRandom {
    /// Next sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// Tiny PRNG (xorshift64*).
#[derive(Debug, Clone, Copy)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// `seed = 0` is remapped so the generator cannot lock into zeros.
    pub const fn from_seed(seed: u64) -> Self {
        let mixed = seed ^ 0x9E37_79B9_7F4A_7C15;
        let state = if mixed == 0 {
            0xA076_1D64_78BD_642F
        } else {
            mixed
        };
        Self { state }
    }

    /// Seeded from the wall clock.
    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Self::from_seed(nanos)
    }

    #[inline(always)]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}

impl UnitRandom for XorShift64 {
    fn next_unit(&mut self) -> f64 {
        // Top 53 bits fill an f64 mantissa exactly.
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    samples: Vec<f64>,
    cursor: usize,
    draws: usize,
}

impl ScriptedRandom {
    pub fn new(samples: Vec<f64>) -> Self {
        assert!(!samples.is_empty(), "scripted random needs at least one sample");
        Self {
            samples,
            cursor: 0,
            draws: 0,
        }
    }

    pub fn constant(sample: f64) -> Self {
        Self::new(vec![sample])
    }

    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl UnitRandom for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        let sample = self.samples[self.cursor];
        self.cursor = (self.cursor + 1) % self.samples.len();
        self.draws += 1;
        sample
    }
}

impl<R: UnitRandom + ?Sized> UnitRandom for Box<R> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}
