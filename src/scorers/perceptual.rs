//! Perceptual image hashing for near-duplicate detection.
//!
//! The hash is computed from a tiny grayscale thumbnail:
//!
//! 1. Decode the image to 8-bit luminance and resize it to an `N x N` grid.
//! 2. Quantize every cell into `2^b` levels using the thumbnail's own
//!    minimum and maximum, so global brightness and contrast changes do not
//!    change the hash.
//! 3. Concatenate the `b`-bit levels in row-major order into one integer.
//!
//! Images whose thumbnails are equal on every cell share a hash and end up in
//! the same group. Coarser grids and fewer levels group more aggressively.

use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::{ScoreOutcome, ScoreResult, Scorer};
use crate::config::ConfigError;
use crate::scanner::SourceFile;

/// Maximum number of bits a perceptual hash may occupy.
pub const MAX_HASH_BITS: u32 = 128;

/// Grid size and quantization depth of one perceptual hash variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimhashConfig {
    /// Thumbnail edge length `N`; the grid has `N * N` cells.
    pub grid: u32,
    /// Bits per cell `b`; each cell is quantized into `2^b` levels.
    pub level_bits: u32,
}

impl SimhashConfig {
    /// Create a configuration.
    #[must_use]
    pub const fn new(grid: u32, level_bits: u32) -> Self {
        Self { grid, level_bits }
    }

    /// Scorer identifier, e.g. `simhash64x4` for an 8x8 grid with 4 levels.
    #[must_use]
    pub fn name(&self) -> String {
        format!("simhash{}x{}", self.grid * self.grid, self.levels())
    }

    /// Number of quantization levels.
    #[must_use]
    pub fn levels(&self) -> u32 {
        1 << self.level_bits
    }

    /// Width of the hash in bits.
    #[must_use]
    pub fn total_bits(&self) -> u32 {
        self.grid * self.grid * self.level_bits
    }

    /// Check that the hash fits the fixed-width integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPerceptual`] for an empty grid, an
    /// unsupported level depth, or a hash wider than [`MAX_HASH_BITS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPerceptual {
            grid: self.grid,
            level_bits: self.level_bits,
            reason: reason.to_string(),
        };
        if self.grid == 0 {
            return Err(invalid("grid must be at least 1"));
        }
        if !(1..=8).contains(&self.level_bits) {
            return Err(invalid("level_bits must be between 1 and 8"));
        }
        if self.grid > 11 || self.total_bits() > MAX_HASH_BITS {
            return Err(invalid("hash is wider than 128 bits"));
        }
        Ok(())
    }
}

/// The grid variants run by default: 4x4 to 8x8, with 4 and 2 levels.
#[must_use]
pub fn default_configs() -> Vec<SimhashConfig> {
    let mut configs = Vec::new();
    for level_bits in [2, 1] {
        for grid in 4..=8 {
            configs.push(SimhashConfig::new(grid, level_bits));
        }
    }
    configs
}

/// Quantize cell values into `levels` buckets by min-max normalization.
///
/// `level = (v - min) / ((max - min) / levels)`, clamped to `levels - 1`.
/// A flat input (`max == min`) quantizes every cell to level 0.
#[must_use]
pub fn quantize(cells: &[u8], levels: u32) -> Vec<u32> {
    let (Some(&min), Some(&max)) = (cells.iter().min(), cells.iter().max()) else {
        return Vec::new();
    };
    if max == min {
        return vec![0; cells.len()];
    }
    let range = u32::from(max - min);
    cells
        .iter()
        .map(|&v| (u32::from(v - min) * levels / range).min(levels - 1))
        .collect()
}

/// Compute the hash of a luminance image for one configuration.
#[must_use]
pub fn simhash(luma: &GrayImage, config: SimhashConfig) -> u128 {
    let thumb = imageops::resize(luma, config.grid, config.grid, FilterType::Triangle);
    quantize(thumb.as_raw(), config.levels())
        .into_iter()
        .fold(0u128, |acc, level| {
            (acc << config.level_bits) | u128::from(level)
        })
}

/// Render a hash as fixed-width lowercase hex with a `0x` prefix.
#[must_use]
pub fn hash_hex(value: u128, total_bits: u32) -> String {
    let width = total_bits.div_ceil(4) as usize;
    format!("0x{value:0width$x}")
}

/// Scorer for one perceptual hash variant.
#[derive(Debug, Clone)]
pub struct PerceptualScorer {
    config: SimhashConfig,
    id: String,
}

impl PerceptualScorer {
    /// Create a scorer for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error of `config`.
    pub fn new(config: SimhashConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id: config.name(),
            config,
        })
    }

    /// Configuration of this scorer.
    #[must_use]
    pub fn config(&self) -> SimhashConfig {
        self.config
    }
}

impl Scorer for PerceptualScorer {
    fn id(&self) -> &str {
        &self.id
    }

    fn compute(&self, file: &SourceFile) -> ScoreOutcome {
        let Some(luma) = file.luma()? else {
            return Ok(None);
        };
        if luma.width() == 0 || luma.height() == 0 {
            return Ok(None);
        }
        let value = simhash(luma, self.config);
        Ok(Some(ScoreResult::Key(hash_hex(
            value,
            self.config.total_bits(),
        ))))
    }
}
