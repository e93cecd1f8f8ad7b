//! Weighted-tier bucketing of classifier output.
//!
//! A classifier returns one probability per class, and several classes are
//! often present at once. Instead of taking the argmax, every class is run
//! through an ordered rule table:
//!
//! - a class is *present* when its probability reaches the rule threshold,
//! - its contribution to the aggregate score is `weight * probability`,
//! - the bucket is the label of the heaviest present rule,
//! - flag rules (e.g. `face`) never pick the bucket; each present flag
//!   prefixes the label instead.
//!
//! Labels carry their tier as a leading number (`0-safe`, `3-explicit`) so
//! sorting labels as strings sorts them by severity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Label used when no non-flag rule matches.
pub const DEFAULT_FALLBACK_LABEL: &str = "0-safe";

/// Maximum number of flag rules in one table.
pub const MAX_FLAGS: usize = 32;

/// Labels end up in report file names: no separators, no `..`.
fn check_label(label: &str) -> Result<(), String> {
    if label.is_empty() {
        Err("is empty".to_string())
    } else if label.contains(['/', '\\', '\0']) {
        Err(format!("'{label}' contains a path separator"))
    } else if label.contains("..") {
        Err(format!("'{label}' contains '..'"))
    } else {
        Ok(())
    }
}

/// One row of the severity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityRule {
    /// Classifier class name
    pub class: String,
    /// Minimum probability for the class to count as present
    pub threshold: f64,
    /// Weight of the class in the aggregate score; rules are evaluated
    /// highest weight first
    pub weight: f64,
    /// Bucket label, or the label prefix for flag rules
    pub label: String,
    /// Whether this rule is a flag that prefixes the label
    #[serde(default)]
    pub flag: bool,
}

impl SeverityRule {
    /// Create a bucket rule.
    #[must_use]
    pub fn bucket(class: &str, threshold: f64, weight: f64, label: &str) -> Self {
        Self {
            class: class.to_string(),
            threshold,
            weight,
            label: label.to_string(),
            flag: false,
        }
    }

    /// Create a flag rule.
    #[must_use]
    pub fn flag(class: &str, threshold: f64, weight: f64, label: &str) -> Self {
        Self {
            flag: true,
            ..Self::bucket(class, threshold, weight, label)
        }
    }
}

/// Result of evaluating one record against the table.
#[derive(Debug, Clone, PartialEq)]
pub struct Severity {
    /// Full bucket label including flag prefixes
    pub label: String,
    /// Weighted sum over every present class
    pub score: f64,
    /// Bitmask of present flag rules, in table order
    pub flags: u32,
}

/// Ordered rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityTable {
    rules: Vec<SeverityRule>,
    fallback: String,
}

impl SeverityTable {
    /// Build a table. Rules are ordered by descending weight; rules with
    /// equal weight keep their given order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a label that cannot be part
    /// of a file name, a negative weight or threshold, or more than
    /// [`MAX_FLAGS`] flag rules.
    pub fn new(mut rules: Vec<SeverityRule>, fallback: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: "severity".to_string(),
            reason,
        };
        if let Err(reason) = check_label(fallback) {
            return Err(invalid(format!("fallback label {reason}")));
        }
        for rule in &rules {
            if let Err(reason) = check_label(&rule.label) {
                return Err(invalid(format!("label of rule '{}' {reason}", rule.class)));
            }
            if rule.weight < 0.0 || rule.threshold < 0.0 {
                return Err(invalid(format!(
                    "rule for '{}' has a negative weight or threshold",
                    rule.class
                )));
            }
        }
        if rules.iter().filter(|r| r.flag).count() > MAX_FLAGS {
            return Err(invalid(format!("more than {MAX_FLAGS} flag rules")));
        }
        rules.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        Ok(Self {
            rules,
            fallback: fallback.to_string(),
        })
    }

    /// The table consolidated from the nsfw_mobilenet class set
    /// (`drawings`, `hentai`, `neutral`, `porn`, `sexy`) plus a `face` flag.
    #[must_use]
    pub fn nsfw_default() -> Self {
        Self {
            rules: default_rules(),
            fallback: DEFAULT_FALLBACK_LABEL.to_string(),
        }
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[SeverityRule] {
        &self.rules
    }

    /// Label used when no bucket rule matches.
    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Evaluate a metric set.
    #[must_use]
    pub fn evaluate(&self, metrics: &BTreeMap<String, f64>) -> Severity {
        let mut score = 0.0;
        let mut flags = 0u32;
        let mut primary: Option<&str> = None;
        let mut flag_index = 0;

        for rule in &self.rules {
            let bit = if rule.flag {
                flag_index += 1;
                Some(1u32 << (flag_index - 1))
            } else {
                None
            };
            let Some(&probability) = metrics.get(&rule.class) else {
                continue;
            };
            if probability < rule.threshold {
                continue;
            }
            score += rule.weight * probability;
            match bit {
                Some(bit) => flags |= bit,
                None => {
                    if primary.is_none() {
                        primary = Some(rule.label.as_str());
                    }
                }
            }
        }

        let mut parts: Vec<&str> = self
            .rules
            .iter()
            .filter(|r| r.flag)
            .enumerate()
            .filter(|(i, _)| flags & (1 << i) != 0)
            .map(|(_, r)| r.label.as_str())
            .collect();
        parts.push(primary.unwrap_or(self.fallback.as_str()));

        Severity {
            label: parts.join("-"),
            score,
            flags,
        }
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self::nsfw_default()
    }
}

/// Default rules, already in evaluation order.
#[must_use]
pub fn default_rules() -> Vec<SeverityRule> {
    vec![
        SeverityRule::bucket("porn", 0.1, 1.0, "3-explicit"),
        SeverityRule::bucket("hentai", 0.1, 0.9, "3-explicit"),
        SeverityRule::bucket("sexy", 0.3, 0.5, "2-suggestive"),
        SeverityRule::bucket("drawings", 0.5, 0.1, "1-drawing"),
        SeverityRule::flag("face", 0.5, 0.0, "face"),
    ]
}
