//! Audio decoding and the decode cache
//!
//! Decoding is blocking work; callers run it under `spawn_blocking` and hand
//! the resulting [`Track`] back to the session as plain data.

pub mod cache;
pub mod decoder;

pub use cache::{CacheOutcome, DecodeCache};
pub use decoder::SymphoniaLoader;

use crate::error::Result;
use std::path::Path;

/// Decoded audio, interleaved
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Track {
    /// Number of sample frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Channel mean per frame
    pub fn mono(&self) -> Vec<f32> {
        match self.channels {
            0 => Vec::new(),
            1 => self.samples.clone(),
            n => self
                .samples
                .chunks(n as usize)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

/// Source of decoded audio
pub trait AudioLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Track>;
}
