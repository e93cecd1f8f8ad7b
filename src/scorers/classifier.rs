//! Content classification through an external, pre-trained model.
//!
//! The model itself is out of process. [`CommandClassifier`] runs a program
//! once per batch with the file paths as trailing arguments and expects a
//! JSON object on stdout:
//!
//! ```json
//! { "/photos/a.jpg": { "drawings": 0.01, "neutral": 0.9, "porn": 0.02, "sexy": 0.07 } }
//! ```
//!
//! A path missing from the output has no result. A failed invocation is a
//! recoverable error for every file of that batch.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::severity::{Severity, SeverityTable};
use super::{ScoreError, ScoreOutcome, ScoreResult, Scorer, ScorerKind};
use crate::record::{FileRecord, RankKey};
use crate::scanner::SourceFile;

/// Attribute name under which the aggregate severity score is stored.
pub const SCORE_ATTRIBUTE: &str = "score";

/// Class probabilities for one file.
pub type ClassScores = BTreeMap<String, f64>;

/// Scorer identifier for a classifier model, e.g. `classifier-nsfw_mobilenet`.
#[must_use]
pub fn scorer_id(model: &str) -> String {
    format!("classifier-{model}")
}

/// A batch classification backend.
pub trait Classifier {
    /// Stable model name, used in scorer ids and cache fields.
    fn model(&self) -> &str;

    /// Classify a batch of files.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the whole batch failed.
    fn classify(&self, paths: &[&Path]) -> Result<HashMap<PathBuf, ClassScores>, String>;
}

/// Classifier backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
    model: String,
}

impl CommandClassifier {
    /// Create a classifier running `program args... paths...`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            model: model.into(),
        }
    }
}

impl Classifier for CommandClassifier {
    fn model(&self) -> &str {
        &self.model
    }

    fn classify(&self, paths: &[&Path]) -> Result<HashMap<PathBuf, ClassScores>, String> {
        log::debug!(
            "Running {} on a batch of {} files",
            self.program.display(),
            paths.len()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(paths)
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.program.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            ));
        }

        let parsed: HashMap<String, ClassScores> = serde_json::from_slice(&output.stdout)
            .map_err(|e| format!("invalid classifier output: {e}"))?;
        Ok(parsed
            .into_iter()
            .map(|(path, scores)| (PathBuf::from(path), scores))
            .collect())
    }
}

/// Scorer that buckets files by classifier severity.
pub struct ClassifierScorer<C: Classifier> {
    id: String,
    classifier: C,
    table: SeverityTable,
}

impl<C: Classifier> ClassifierScorer<C> {
    /// Wrap a classifier with a severity table.
    pub fn new(classifier: C, table: SeverityTable) -> Self {
        Self {
            id: scorer_id(classifier.model()),
            classifier,
            table,
        }
    }

    /// Severity of a record from its attributes.
    #[must_use]
    pub fn severity(&self, record: &FileRecord) -> Severity {
        self.table.evaluate(&record.attributes)
    }
}

impl<C: Classifier> Scorer for ClassifierScorer<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::Buckets
    }

    fn compute(&self, file: &SourceFile) -> ScoreOutcome {
        self.compute_batch(&[file]).pop().unwrap_or(Ok(None))
    }

    fn compute_batch(&self, files: &[&SourceFile]) -> Vec<ScoreOutcome> {
        let paths: Vec<&Path> = files.iter().map(|f| f.path.as_path()).collect();
        match self.classifier.classify(&paths) {
            Ok(mut scores) => files
                .iter()
                .map(|f| Ok(scores.remove(&f.path).map(ScoreResult::Metrics)))
                .collect(),
            Err(message) => {
                log::error!("{} batch of {} files failed: {}", self.id, files.len(), message);
                files
                    .iter()
                    .map(|_| {
                        Err(ScoreError::Backend {
                            scorer: self.id.clone(),
                            message: message.clone(),
                        })
                    })
                    .collect()
            }
        }
    }

    fn group_key(&self, _record: &FileRecord, result: &ScoreResult) -> Option<String> {
        match result {
            ScoreResult::Metrics(metrics) => Some(self.table.evaluate(metrics).label),
            ScoreResult::Key(_) => None,
        }
    }

    fn annotate(&self, record: FileRecord, result: &ScoreResult) -> FileRecord {
        let ScoreResult::Metrics(metrics) = result else {
            return record;
        };
        let score = self.table.evaluate(metrics).score;
        record
            .with_attributes(metrics.clone())
            .with_attributes([(SCORE_ATTRIBUTE.to_string(), score)])
    }

    fn ranking_key(&self, record: &FileRecord) -> RankKey {
        let severity = self.severity(record);
        RankKey::Severity {
            bucket: severity.label,
            score: severity.score,
            size: record.size_bytes,
        }
    }
}
