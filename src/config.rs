//! Application configuration management.
//!
//! Settings are layered with `figment`, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory when present
//! 3. `IMGTRIAGE_*` environment variables (`__` separates nested keys)
//! 4. Command-line flags, applied by the caller after loading
//!
//! Everything is validated by [`Config::validate`] before any file is
//! touched, and the validated configuration builds the scorer registry and
//! walker settings for a run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::actions::cleanup::{CleanupOptions, DEFAULT_SIZE_THRESHOLD};
use crate::scanner::{normalize_path, WalkerConfig};
use crate::scorers::classifier::scorer_id;
use crate::scorers::exact::BLAKE3_ID;
use crate::scorers::perceptual::default_configs;
use crate::scorers::severity::{default_rules, DEFAULT_FALLBACK_LABEL};
use crate::scorers::{
    Blake3Scorer, ClassifierScorer, CommandClassifier, PerceptualScorer, Scorer, ScorerRegistry,
    SeverityRule, SeverityTable, SimhashConfig,
};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "IMGTRIAGE_";

/// Default cache file name, created in the scanned root.
pub const DEFAULT_CACHE_FILE: &str = "imgtriage-cache.json";

/// Errors detected while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The same scorer identifier was registered twice.
    #[error("Duplicate scorer id: {0}")]
    DuplicateScorer(String),

    /// A perceptual hash configuration is out of range.
    #[error("Invalid perceptual hash (grid {grid}, level_bits {level_bits}): {reason}")]
    InvalidPerceptual {
        /// Grid edge length
        grid: u32,
        /// Bits per cell
        level_bits: u32,
        /// What is wrong
        reason: String,
    },

    /// A setting has an invalid value.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Setting name
        field: String,
        /// What is wrong
        reason: String,
    },

    /// One option of a pair was given without the other.
    #[error("{given} requires {missing}")]
    MissingPairedOption {
        /// The option that was set
        given: &'static str,
        /// The option that is missing
        missing: &'static str,
    },

    /// A scorer id does not name any configured scorer.
    #[error("Unknown scorer '{id}'{}", did_you_mean(.suggestion))]
    UnknownScorer {
        /// The unknown id
        id: String,
        /// Closest known id, if any is similar enough
        suggestion: Option<String>,
    },

    /// A skip pattern is not a valid regular expression.
    #[error("Invalid skip pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern text
        pattern: String,
        /// The regex error
        #[source]
        source: regex::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The layered configuration could not be extracted.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Settings of the external classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Program to run; paths are appended after `args`
    pub command: Option<PathBuf>,
    /// Leading arguments passed to the program
    pub args: Vec<String>,
    /// Model name, used in the scorer id
    pub model: Option<String>,
    /// Number of paths per invocation
    pub batch_size: usize,
    /// Label used when no severity rule matches
    pub fallback_label: String,
    /// Severity rules, evaluated highest weight first
    pub severity: Vec<SeverityRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            model: None,
            batch_size: 64,
            fallback_label: DEFAULT_FALLBACK_LABEL.to_string(),
            severity: default_rules(),
        }
    }
}

impl ClassifierConfig {
    /// Scorer id of the configured model, if any.
    #[must_use]
    pub fn scorer_id(&self) -> Option<String> {
        self.model.as_deref().map(scorer_id)
    }
}

/// Report layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory for report pages, relative to the root; the root itself
    /// when unset
    pub dir: Option<PathBuf>,
    /// File name prefix of every page
    pub prefix: String,
    /// Maximum rows per page
    pub rows_per_page: usize,
    /// Maximum members per row in duplicate reports
    pub duplicate_items_per_row: usize,
    /// Maximum members per row in classifier reports
    pub bucket_items_per_row: usize,
    /// Thumbnail width of a reference member in pixels
    pub cell_width: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "imgtriage".to_string(),
            rows_per_page: 100,
            duplicate_items_per_row: 10,
            bucket_items_per_row: 7,
            cell_width: 160,
        }
    }
}

/// Settings of the `cleanup` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Files smaller than this many bytes are moved
    pub size_threshold: u64,
    /// File name regexes of files that are moved
    pub patterns: Vec<String>,
    /// Mirror the source layout under the destination
    pub keep_structure: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            patterns: Vec::new(),
            keep_structure: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache file name, relative to the scanned root
    pub cache_file: PathBuf,
    /// Scorer ids to run; all duplicate scorers when empty
    pub scorers: Vec<String>,
    /// Perceptual hash variants
    pub perceptual: Vec<SimhashConfig>,
    /// Follow symbolic links during traversal
    pub follow_symlinks: bool,
    /// Skip hidden files and directories
    pub skip_hidden: bool,
    /// Minimum file size in bytes
    pub min_size: Option<u64>,
    /// Maximum file size in bytes
    pub max_size: Option<u64>,
    /// Stop after this many files
    pub max_files: Option<usize>,
    /// File extensions that are never scanned
    pub skip_extensions: Vec<String>,
    /// File name regexes that are never scanned
    pub skip_patterns: Vec<String>,
    /// Log a progress line every this many files
    pub progress_every: usize,
    /// Scorer whose duplicate groups are relocated
    pub move_scorer: Option<String>,
    /// Destination root for relocated duplicates
    pub move_to: Option<PathBuf>,
    /// External classifier settings
    pub classifier: ClassifierConfig,
    /// Report layout settings
    pub report: ReportConfig,
    /// Junk removal settings
    pub cleanup: CleanupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            scorers: Vec::new(),
            perceptual: default_configs(),
            follow_symlinks: false,
            skip_hidden: false,
            min_size: None,
            max_size: None,
            max_files: None,
            skip_extensions: ["DS_Store", "py", "html", "json", "txt"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            skip_patterns: Vec::new(),
            progress_every: 1000,
            move_scorer: None,
            move_to: None,
            classifier: ClassifierConfig::default(),
            report: ReportConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// # Arguments
    ///
    /// * `explicit` - A config file that must exist; when `None` the
    ///   platform default file is used if present
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing or any layer fails
    /// to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    log::debug!("Looking for config at {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Platform-specific default config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "imgtriage", "imgtriage")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Every scorer id this configuration can build, in registration order.
    #[must_use]
    pub fn available_scorer_ids(&self) -> Vec<String> {
        let mut ids = vec![BLAKE3_ID.to_string()];
        ids.extend(self.perceptual.iter().map(SimhashConfig::name));
        ids.extend(self.classifier.scorer_id());
        ids
    }

    /// Scorer ids selected for a run.
    ///
    /// An empty selection means every duplicate scorer (exact and
    /// perceptual). The classifier only runs when selected by id.
    #[must_use]
    pub fn selected_scorer_ids(&self) -> Vec<String> {
        if self.scorers.is_empty() {
            let mut ids = vec![BLAKE3_ID.to_string()];
            ids.extend(self.perceptual.iter().map(SimhashConfig::name));
            ids
        } else {
            self.scorers.clone()
        }
    }

    /// Check the configuration for errors before any file I/O.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for cfg in &self.perceptual {
            cfg.validate()?;
        }

        let available = self.available_scorer_ids();
        let mut seen = HashSet::new();
        for id in &available {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::DuplicateScorer(id.clone()));
            }
        }

        let mut selected = HashSet::new();
        for id in &self.scorers {
            if !selected.insert(id.as_str()) {
                return Err(ConfigError::DuplicateScorer(id.clone()));
            }
            check_known(id, &available)?;
        }

        for (field, value) in [
            ("report.rows_per_page", self.report.rows_per_page),
            (
                "report.duplicate_items_per_row",
                self.report.duplicate_items_per_row,
            ),
            ("report.bucket_items_per_row", self.report.bucket_items_per_row),
            ("classifier.batch_size", self.classifier.batch_size),
            ("progress_every", self.progress_every),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if self.report.cell_width == 0 {
            return Err(ConfigError::InvalidValue {
                field: "report.cell_width".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(ConfigError::InvalidValue {
                    field: "min_size".to_string(),
                    reason: format!("{min} is larger than max_size {max}"),
                });
            }
        }

        match (&self.move_scorer, &self.move_to) {
            (Some(_), None) => {
                return Err(ConfigError::MissingPairedOption {
                    given: "move_scorer",
                    missing: "move_to",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingPairedOption {
                    given: "move_to",
                    missing: "move_scorer",
                })
            }
            (Some(id), Some(_)) => {
                check_known(id, &self.selected_scorer_ids())?;
                if self.classifier.scorer_id().as_ref() == Some(id) {
                    return Err(ConfigError::InvalidValue {
                        field: "move_scorer".to_string(),
                        reason: "classifier buckets are not duplicate groups".to_string(),
                    });
                }
            }
            (None, None) => {}
        }

        if self.classifier.model.is_some() && self.classifier.command.is_none() {
            return Err(ConfigError::MissingPairedOption {
                given: "classifier.model",
                missing: "classifier.command",
            });
        }
        if self.classifier.command.is_some() && self.classifier.model.is_none() {
            return Err(ConfigError::MissingPairedOption {
                given: "classifier.command",
                missing: "classifier.model",
            });
        }
        if let Some(model) = &self.classifier.model {
            check_model_name(model)?;
        }
        self.severity_table()?;

        for pattern in self.skip_patterns.iter().chain(&self.cleanup.patterns) {
            compile_pattern(pattern)?;
        }
        Ok(())
    }

    /// Options for a cleanup run over `src_root`.
    ///
    /// Only the walk filters of the scan settings apply; size limits are
    /// replaced by the cleanup threshold.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid skip or cleanup pattern.
    pub fn cleanup_options(&self, src_root: &Path) -> Result<CleanupOptions, ConfigError> {
        let mut walker = self.walker_config(src_root)?;
        walker.min_size = None;
        walker.max_size = None;
        Ok(CleanupOptions {
            size_threshold: self.cleanup.size_threshold,
            patterns: self
                .cleanup
                .patterns
                .iter()
                .map(|p| compile_pattern(p))
                .collect::<Result<_, _>>()?,
            keep_structure: self.cleanup.keep_structure,
            walker,
        })
    }

    /// Severity table built from the classifier rules.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid rule.
    pub fn severity_table(&self) -> Result<SeverityTable, ConfigError> {
        SeverityTable::new(
            self.classifier.severity.clone(),
            &self.classifier.fallback_label,
        )
    }

    /// Build the registry of selected scorers.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown, duplicate or invalid scorer.
    pub fn build_registry(&self) -> Result<ScorerRegistry, ConfigError> {
        let available = self.available_scorer_ids();
        let mut scorers: Vec<Box<dyn Scorer>> = Vec::new();

        for id in self.selected_scorer_ids() {
            if id == BLAKE3_ID {
                scorers.push(Box::new(Blake3Scorer));
            } else if let Some(cfg) = self.perceptual.iter().find(|c| c.name() == id) {
                scorers.push(Box::new(PerceptualScorer::new(*cfg)?));
            } else if self.classifier.scorer_id().as_ref() == Some(&id) {
                scorers.push(Box::new(self.classifier_scorer()?));
            } else {
                check_known(&id, &available)?;
            }
        }
        ScorerRegistry::new(scorers)
    }

    fn classifier_scorer(&self) -> Result<ClassifierScorer<CommandClassifier>, ConfigError> {
        let (Some(command), Some(model)) = (&self.classifier.command, &self.classifier.model)
        else {
            return Err(ConfigError::MissingPairedOption {
                given: "classifier.model",
                missing: "classifier.command",
            });
        };
        let classifier = CommandClassifier::new(command, self.classifier.args.clone(), model);
        Ok(ClassifierScorer::new(classifier, self.severity_table()?))
    }

    /// Walker settings for a run over `root`.
    ///
    /// The report directory and the move destination are excluded, so
    /// generated pages and moved duplicates are never scanned again.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid skip pattern.
    pub fn walker_config(&self, root: &Path) -> Result<WalkerConfig, ConfigError> {
        let skip_patterns = self
            .skip_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        let mut skip_dirs: Vec<PathBuf> = self
            .report
            .dir
            .iter()
            .map(|dir| root.join(dir))
            .collect();
        if let Some(move_to) = &self.move_to {
            let target = move_to
                .canonicalize()
                .or_else(|_| std::path::absolute(move_to).map(|p| normalize_path(&p)))
                .unwrap_or_else(|_| move_to.clone());
            if target.starts_with(root) {
                skip_dirs.push(target);
            }
        }

        Ok(WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            min_size: self.min_size,
            max_size: self.max_size,
            skip_extensions: self
                .skip_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            skip_patterns,
            skip_dirs,
        })
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(", did you mean '{s}'?"))
        .unwrap_or_default()
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Model names become part of scorer ids and page names, where `-`
/// separates the parts.
fn check_model_name(model: &str) -> Result<(), ConfigError> {
    if !model.is_empty() && model.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: "classifier.model".to_string(),
        reason: format!("'{model}' may only contain ASCII letters, digits and '_'"),
    })
}

fn check_known(id: &str, known: &[String]) -> Result<(), ConfigError> {
    if known.iter().any(|k| k == id) {
        return Ok(());
    }
    Err(ConfigError::UnknownScorer {
        id: id.to_string(),
        suggestion: suggest(id, known),
    })
}

/// Closest known name by Jaro-Winkler similarity, if reasonably close.
#[must_use]
pub fn suggest(input: &str, known: &[String]) -> Option<String> {
    known
        .iter()
        .map(|k| (strsim::jaro_winkler(input, k), k))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, k)| k.clone())
}
