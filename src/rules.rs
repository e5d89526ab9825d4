//! Compliance Rule Set - Versioned Policy Data
//!
//! Rule tables are data, not code. Legal and brand teams ship updated
//! JSON rule sets without touching the validator or the solver.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRuleSet {
    pub ruleset_version: String,
    pub engine_min_version: String,
    #[serde(default)]
    pub forbidden_terms: Vec<ForbiddenCategory>,
    /// Ordered. The scan stops at the first matching pattern.
    #[serde(default)]
    pub price_patterns: Vec<String>,
    #[serde(default)]
    pub allowed_tags: Vec<String>,
    #[serde(default)]
    pub alcohol_keywords: Vec<String>,
    #[serde(default)]
    pub cta_policy: CtaPolicy,
    #[serde(default)]
    pub clubcard_policy: ClubcardPolicy,
    #[serde(default)]
    pub lep_policy: LepPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForbiddenCategory {
    pub category: String,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaPolicy {
    pub max_chars: usize,
}

impl Default for CtaPolicy {
    fn default() -> Self {
        Self { max_chars: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubcardPolicy {
    /// Phrases that must accompany any mention of "clubcard".
    pub required_phrases: Vec<String>,
    /// "ends DD/MM" token that must appear alongside clubcard copy.
    pub ends_pattern: String,
    /// Shape check for the brief's clubcardDate field.
    pub date_shape: String,
}

impl Default for ClubcardPolicy {
    fn default() -> Self {
        Self {
            required_phrases: vec![
                "selected stores".to_string(),
                "clubcard/app required".to_string(),
            ],
            ends_pattern: r"ends\s+\d{1,2}/\d{1,2}".to_string(),
            date_shape: r"^\d{1,2}/\d{1,2}$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LepPolicy {
    pub required_background: String,
    pub text_color: String,
}

impl Default for LepPolicy {
    fn default() -> Self {
        Self {
            required_background: "#FFFFFF".to_string(),
            text_color: "#00539F".to_string(),
        }
    }
}

impl Default for ComplianceRuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ComplianceRuleSet {
    /// The compiled-in rule tables, derived from Appendix A & B.
    pub fn builtin() -> Self {
        Self {
            ruleset_version: "1.0.0".to_string(),
            engine_min_version: "1.0.0".to_string(),
            forbidden_terms: vec![
                category("competitions", &[
                    "competition", "winner", "win a", "chance to win", "prize", "enter now",
                ]),
                category("financial", &[
                    "money back", "money-back", "guarantee", "best price", "cheapest",
                    "price match",
                ]),
                category("claims", &[
                    "survey", "voted", "rated", "number one", "no. 1", "best ever",
                ]),
                category("sustainability", &[
                    "green", "sustainable", "eco-friendly", "environmentally", "planet",
                    "earth", "carbon neutral",
                ]),
                category("charity", &[
                    "charity", "donate", "donation", "partnership",
                ]),
                category("terms", &[
                    "terms and conditions", "t&cs", "see website for details",
                    "exclusions apply",
                ]),
                category("tag-phrasing", &[
                    "exclusive at tesco", "only in tesco", "tesco exclusive",
                ]),
            ],
            price_patterns: vec![
                r"(\$|£|€)\d+".to_string(),
                r"\d+(\.\d{1,2})?%".to_string(),
                r"\b\d+p\b".to_string(),
                r"\bfree\b".to_string(),
                r"\bdiscount\b".to_string(),
                r"\bdeal\b".to_string(),
                r"\boffer\b".to_string(),
                r"\bsale\b".to_string(),
                r"\bsave\b".to_string(),
                r"\blimited time\b".to_string(),
                r"\bhalf price\b".to_string(),
                r"\bbogof\b".to_string(),
            ],
            allowed_tags: vec![
                "Only at Tesco".to_string(),
                "Available at Tesco".to_string(),
                "Selected stores. While stocks last".to_string(),
                "Available in selected stores".to_string(),
            ],
            alcohol_keywords: vec![
                "beer", "lager", "ale", "stout", "cider", "wine", "prosecco",
                "champagne", "vodka", "gin", "whisky", "whiskey", "rum", "brandy",
                "tequila", "liqueur", "spirits",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            cta_policy: CtaPolicy::default(),
            clubcard_policy: ClubcardPolicy::default(),
            lep_policy: LepPolicy::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, RuleSetError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load the newest engine-compatible rule set from a directory of
    /// JSON files. Falls back to the builtin tables when the directory
    /// holds nothing usable.
    pub fn load_from_dir(dir: &Path, engine_version: &str) -> Result<Self, RuleSetError> {
        let engine = semver::Version::parse(engine_version)
            .map_err(|_| RuleSetError::BadVersion(engine_version.to_string()))?;

        let mut best: Option<(semver::Version, Self)> = None;
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if !path.extension().map_or(false, |e| e == "json") {
                    continue;
                }
                let Ok(candidate) = Self::from_file(&path) else {
                    continue;
                };
                let Ok(version) = semver::Version::parse(&candidate.ruleset_version) else {
                    continue;
                };
                let Ok(min) = semver::Version::parse(&candidate.engine_min_version) else {
                    continue;
                };
                if min > engine {
                    continue;
                }
                match &best {
                    Some((current, _)) if *current >= version => {}
                    _ => best = Some((version, candidate)),
                }
            }
        }
        Ok(best.map(|(_, rules)| rules).unwrap_or_else(Self::builtin))
    }

    pub fn is_tag_allowed(&self, tag: &str) -> bool {
        self.allowed_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn mentions_alcohol(&self, lowercased_text: &str) -> bool {
        self.alcohol_keywords
            .iter()
            .any(|k| lowercased_text.contains(k.as_str()))
    }

    /// Compile the pattern tables once, up front. A malformed pattern
    /// in a shipped rule set is a configuration error, surfaced here
    /// rather than mid-scan.
    pub fn compile(&self) -> Result<CompiledPatterns, RuleSetError> {
        let price_patterns = self
            .price_patterns
            .iter()
            .map(|p| compile_one(p).map(|r| (p.clone(), r)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledPatterns {
            price_patterns,
            clubcard_ends: compile_one(&self.clubcard_policy.ends_pattern)?,
            clubcard_date_shape: compile_one(&self.clubcard_policy.date_shape)?,
        })
    }
}

fn compile_one(pattern: &str) -> Result<Regex, RuleSetError> {
    Regex::new(pattern).map_err(|source| RuleSetError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Regex tables compiled from a rule set, carried by the validator.
#[derive(Debug)]
pub struct CompiledPatterns {
    /// Ordered (source, compiled) pairs; first match wins.
    pub price_patterns: Vec<(String, Regex)>,
    pub clubcard_ends: Regex,
    pub clubcard_date_shape: Regex,
}

fn category(name: &str, terms: &[&str]) -> ForbiddenCategory {
    ForbiddenCategory {
        category: name.to_string(),
        terms: terms.iter().map(|t| t.to_string()).collect(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed rule set: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid version string: {0}")]
    BadVersion(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_populated() {
        let rules = ComplianceRuleSet::builtin();
        assert!(!rules.forbidden_terms.is_empty());
        assert!(!rules.price_patterns.is_empty());
        assert_eq!(rules.allowed_tags.len(), 4);
    }

    #[test]
    fn tag_allow_list_is_case_insensitive() {
        let rules = ComplianceRuleSet::builtin();
        assert!(rules.is_tag_allowed("only at tesco"));
        assert!(!rules.is_tag_allowed("Exclusive at Tesco"));
    }

    #[test]
    fn load_from_dir_prefers_newest_compatible() {
        let dir = tempfile::tempdir().unwrap();

        let mut old = ComplianceRuleSet::builtin();
        old.ruleset_version = "1.0.0".to_string();
        old.allowed_tags = vec!["Old Tag".to_string()];
        fs::write(
            dir.path().join("v1.json"),
            serde_json::to_string(&old).unwrap(),
        )
        .unwrap();

        let mut new = ComplianceRuleSet::builtin();
        new.ruleset_version = "1.2.0".to_string();
        new.allowed_tags = vec!["New Tag".to_string()];
        fs::write(
            dir.path().join("v12.json"),
            serde_json::to_string(&new).unwrap(),
        )
        .unwrap();

        let mut future = ComplianceRuleSet::builtin();
        future.ruleset_version = "2.0.0".to_string();
        future.engine_min_version = "99.0.0".to_string();
        fs::write(
            dir.path().join("v2.json"),
            serde_json::to_string(&future).unwrap(),
        )
        .unwrap();

        let loaded = ComplianceRuleSet::load_from_dir(dir.path(), "1.0.0").unwrap();
        assert_eq!(loaded.ruleset_version, "1.2.0");
        assert_eq!(loaded.allowed_tags, vec!["New Tag".to_string()]);
    }

    #[test]
    fn load_from_empty_dir_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ComplianceRuleSet::load_from_dir(dir.path(), "1.0.0").unwrap();
        assert_eq!(loaded.ruleset_version, "1.0.0");
    }
}
