//! Pluggable scoring strategies.
//!
//! Every scorer turns one [`SourceFile`] into an optional [`ScoreResult`]
//! and knows how to group and rank the records it scored:
//!
//! - [`exact`]: BLAKE3 content hash (exact duplicates)
//! - [`perceptual`]: quantized-luminance grid hash (near duplicates)
//! - [`classifier`]: batched external content classifier (severity buckets)
//! - [`severity`]: weighted-tier bucketing of classifier output
//!
//! Scorers are collected in a [`ScorerRegistry`], which guarantees that
//! identifiers are unique before any file is touched.

pub mod classifier;
pub mod exact;
pub mod perceptual;
pub mod severity;

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::record::{FileRecord, RankKey};
use crate::scanner::{ScanError, SourceFile};

pub use classifier::{Classifier, ClassifierScorer, CommandClassifier};
pub use exact::Blake3Scorer;
pub use perceptual::{PerceptualScorer, SimhashConfig};
pub use severity::{Severity, SeverityRule, SeverityTable};

/// Output of one scorer for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreResult {
    /// A single grouping key, e.g. a hash value.
    Key(String),
    /// Per-class metrics, e.g. classifier probabilities.
    Metrics(BTreeMap<String, f64>),
}

/// Outcome of scoring one file.
///
/// `Ok(None)` means the file cannot be scored (not an image, corrupt,
/// unsupported format). It is persisted so the file is not retried.
/// `Err` is a recoverable processing error; it is logged and retried on the
/// next run.
pub type ScoreOutcome = Result<Option<ScoreResult>, ScoreError>;

/// How a scorer's groups are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerKind {
    /// Groups are duplicate sets; singletons are dropped and the first member
    /// of every group is the reference member.
    Duplicates,
    /// Groups are reporting buckets; every scored record is shown.
    Buckets,
}

/// Errors that can occur while scoring a file.
#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    /// The file could not be read.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The scoring backend failed.
    #[error("{scorer} backend failed: {message}")]
    Backend {
        /// Scorer identifier
        scorer: String,
        /// Description of the failure
        message: String,
    },
}

/// A scoring strategy.
pub trait Scorer {
    /// Stable identifier, unique within a run. Used as the cache field name
    /// and in report file names.
    fn id(&self) -> &str;

    /// How this scorer's groups are presented.
    fn kind(&self) -> ScorerKind {
        ScorerKind::Duplicates
    }

    /// Score a single file.
    fn compute(&self, file: &SourceFile) -> ScoreOutcome;

    /// Score several files at once. Outcomes are returned in input order.
    fn compute_batch(&self, files: &[&SourceFile]) -> Vec<ScoreOutcome> {
        files.iter().map(|file| self.compute(file)).collect()
    }

    /// Grouping key of a scored record.
    fn group_key(&self, _record: &FileRecord, result: &ScoreResult) -> Option<String> {
        match result {
            ScoreResult::Key(key) => Some(key.clone()),
            ScoreResult::Metrics(_) => None,
        }
    }

    /// Attach scorer-specific attributes to a record before ranking.
    fn annotate(&self, record: FileRecord, _result: &ScoreResult) -> FileRecord {
        record
    }

    /// Ranking key of a record within its group; lower ranks first.
    fn ranking_key(&self, record: &FileRecord) -> RankKey {
        RankKey::quality(record)
    }
}

/// The set of scorers used by one pipeline run.
pub struct ScorerRegistry {
    scorers: Vec<Box<dyn Scorer>>,
}

impl std::fmt::Debug for ScorerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScorerRegistry")
            .field("scorers", &self.ids())
            .finish()
    }
}

impl ScorerRegistry {
    /// Build a registry, rejecting duplicate identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateScorer`] for the first repeated id.
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for scorer in &scorers {
            if !seen.insert(scorer.id().to_string()) {
                return Err(ConfigError::DuplicateScorer(scorer.id().to_string()));
            }
        }
        Ok(Self { scorers })
    }

    /// Look up a scorer by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn Scorer> {
        self.scorers
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.as_ref())
    }

    /// All scorers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Scorer> {
        self.scorers.iter().map(|s| s.as_ref())
    }

    /// All identifiers in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.scorers.iter().map(|s| s.id()).collect()
    }

    /// Number of registered scorers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    /// Whether no scorer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }
}
