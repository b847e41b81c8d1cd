use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RampEntry {
    pub threshold: f32,
    pub glyph: char,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RampError {
    #[error("ramp must contain at least one entry")]
    Empty,
    #[error("ramp threshold {threshold} at index {index} is outside [0, 1)")]
    OutOfRange { index: usize, threshold: f32 },
    #[error("ramp thresholds must be strictly increasing (index {index}: {threshold} <= {previous})")]
    NotIncreasing {
        index: usize,
        threshold: f32,
        previous: f32,
    },
}

/// Brightness to glyph mapping, ordered by ascending threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRamp {
    entries: Vec<RampEntry>,
}

impl GlyphRamp {
    pub fn new(entries: Vec<RampEntry>) -> Result<Self, RampError> {
        if entries.is_empty() {
            return Err(RampError::Empty);
        }

        for (index, entry) in entries.iter().enumerate() {
            if !(0.0..1.0).contains(&entry.threshold) {
                return Err(RampError::OutOfRange {
                    index,
                    threshold: entry.threshold,
                });
            }
            if index > 0 {
                let previous = entries[index - 1].threshold;
                if entry.threshold <= previous {
                    return Err(RampError::NotIncreasing {
                        index,
                        threshold: entry.threshold,
                        previous,
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RampEntry] {
        &self.entries
    }

    /// Tier index of the greatest threshold not above `brightness`.
    ///
    /// Brightness below the first threshold (or NaN) falls back to tier 0.
    pub fn tier(&self, brightness: f32) -> usize {
        self.entries
            .iter()
            .rposition(|entry| brightness >= entry.threshold)
            .unwrap_or(0)
    }

    pub fn select(&self, brightness: f32) -> (usize, char) {
        let tier = self.tier(brightness);
        (tier, self.entries[tier].glyph)
    }
}
