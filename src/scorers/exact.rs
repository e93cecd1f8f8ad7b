//! Exact duplicate detection with BLAKE3.

use super::{ScoreOutcome, ScoreResult, Scorer};
use crate::scanner::SourceFile;

/// Scorer identifier of the exact-hash scorer.
pub const BLAKE3_ID: &str = "blake3";

/// Hashes the full file contents with BLAKE3.
///
/// Any readable file gets a result, image or not.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Scorer;

impl Scorer for Blake3Scorer {
    fn id(&self) -> &str {
        BLAKE3_ID
    }

    fn compute(&self, file: &SourceFile) -> ScoreOutcome {
        let bytes = file.bytes()?;
        Ok(Some(ScoreResult::Key(
            blake3::hash(bytes).to_hex().to_string(),
        )))
    }
}
