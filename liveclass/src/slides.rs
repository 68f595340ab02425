//! Presentation slide cursor

use crate::config::DEFAULT_TOTAL_SLIDES;
use serde::{Deserialize, Serialize};

/// 1-based position in a fixed-size deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDeck {
    current: u32,
    total: u32,
}

impl SlideDeck {
    /// A deck of `total` slides positioned on the first one
    pub fn new(total: u32) -> Self {
        Self {
            current: 1,
            total: total.max(1),
        }
    }

    /// Current slide, starting at 1
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Number of slides
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Advance one slide, stopping at the last
    pub fn next(&mut self) -> u32 {
        self.current = (self.current + 1).min(self.total);
        self.current
    }

    /// Go back one slide, stopping at the first
    pub fn previous(&mut self) -> u32 {
        self.current = self.current.saturating_sub(1).max(1);
        self.current
    }

    /// Back to the first slide
    pub fn reset(&mut self) {
        self.current = 1;
    }
}

impl Default for SlideDeck {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_SLIDES)
    }
}
