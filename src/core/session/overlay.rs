//! Live emotion overlay shown while a session records.

use serde::Serialize;

use crate::core::emotion::{
    DEFAULT_LEVELS, EmotionLevel, EmotionSource, EmotionVector, StabilityConfig,
    StabilityFilter, TimestampedReading, scale_vector,
};

/// Display payload for one reading: scores sorted for display, their
/// indicator levels and the stabilized descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionOverlay {
    pub source: EmotionSource,
    pub emotions: EmotionVector,
    pub levels: Vec<EmotionLevel>,
    pub descriptor: Option<String>,
}

/// One stability filter per source, so faces and voice don't fight over a
/// single label.
#[derive(Debug, Clone)]
pub struct OverlayState {
    levels: u32,
    facial: StabilityFilter,
    vocal: StabilityFilter,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new(StabilityConfig::default(), DEFAULT_LEVELS)
    }
}

impl OverlayState {
    pub fn new(stability: StabilityConfig, levels: u32) -> Self {
        Self {
            levels,
            facial: StabilityFilter::new(stability),
            vocal: StabilityFilter::new(stability),
        }
    }

    pub fn render(&mut self, reading: &TimestampedReading) -> EmotionOverlay {
        let filter = match reading.source {
            EmotionSource::Facial => &mut self.facial,
            EmotionSource::Vocal => &mut self.vocal,
        };
        let descriptor = filter.update(&reading.emotions).label;

        let sorted: EmotionVector = reading
            .emotions
            .sorted_by_score()
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
            .into();
        let levels = scale_vector(&sorted, self.levels);

        EmotionOverlay {
            source: reading.source,
            emotions: sorted,
            levels,
            descriptor,
        }
    }

    pub fn reset(&mut self) {
        self.facial.reset();
        self.vocal.reset();
    }
}
