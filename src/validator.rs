//! Compliance Validation - The Gate
//!
//! Nothing is drawn unless this gate passes. All checks run before
//! aggregating; no error is auto-corrected or silently dropped. The
//! one scan that stops early is the price-pattern scan, which reports
//! only its first match.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::brief::{CreativeBrief, EffectiveBrief, ValueTileType, TemplateKind};
use crate::detector::{ContentDetector, FindingKind, HeuristicDetector};
use crate::formats::FormatProfile;
use crate::rules::{ComplianceRuleSet, CompiledPatterns, RuleSetError};

/// Stable short tokens a UI can localize or style.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    StructureMissing,
    ForbiddenTerm,
    TileConstraint,
    LepViolation,
    TagMissing,
    TagCollision,
    PeopleDetected,
    AlcoholLockup,
}

impl IssueCode {
    /// Soft failures pause generation pending a user acknowledgement
    /// flag; hard failures block outright.
    pub fn is_soft(self) -> bool {
        matches!(self, IssueCode::PeopleDetected | IssueCode::AlcoholLockup)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    /// Set only for mandates that fail one specific output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ValidationIssue {
    fn global(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            format: None,
        }
    }

    fn for_format(code: IssueCode, message: impl Into<String>, format: &str) -> Self {
        Self {
            code,
            message: message.into(),
            format: Some(format.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// True when no brief-level error remains. Format-scoped tag
    /// mandates do not flip this; they fail their single format.
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub requires_confirmation: bool,
    pub requires_compliance: bool,
    /// One per product image, in input order. The solver reads these,
    /// never the shared brief.
    pub effective_briefs: Vec<EffectiveBrief>,
}

impl ValidationReport {
    /// Formats ruled out by a format-scoped mandate.
    pub fn rejected_formats(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter_map(|issue| issue.format.as_deref())
            .collect()
    }

    pub fn format_issue(&self, format_id: &str) -> Option<&ValidationIssue> {
        self.errors
            .iter()
            .find(|issue| issue.format.as_deref() == Some(format_id))
    }
}

/// Validator orchestrates the rule tables and the content detectors.
pub struct ComplianceValidator {
    rules: ComplianceRuleSet,
    patterns: CompiledPatterns,
    detector: Box<dyn ContentDetector>,
}

impl ComplianceValidator {
    pub fn new(rules: ComplianceRuleSet) -> Result<Self, RuleSetError> {
        Self::with_detector(rules, Box::new(HeuristicDetector::default()))
    }

    pub fn with_detector(
        rules: ComplianceRuleSet,
        detector: Box<dyn ContentDetector>,
    ) -> Result<Self, RuleSetError> {
        let patterns = rules.compile()?;
        Ok(Self {
            rules,
            patterns,
            detector,
        })
    }

    pub fn rules(&self) -> &ComplianceRuleSet {
        &self.rules
    }

    /// Run every check, aggregate every issue, produce per-product
    /// effective briefs. Runs exactly once per batch.
    pub fn validate(
        &self,
        brief: &CreativeBrief,
        products: &[RgbaImage],
        formats: &[FormatProfile],
    ) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_structure(brief, &mut errors);
        self.check_tiles(brief, &mut errors);
        self.check_template(brief, &mut errors);
        self.check_tags(brief, formats, &mut errors);
        self.check_clubcard(brief, &mut errors);
        let text_alcohol = self.check_text(brief, &mut errors, &mut warnings);
        let effective_briefs =
            self.check_images(brief, products, text_alcohol, &mut errors, &mut warnings);

        let valid = errors.iter().all(|issue| issue.format.is_some());
        let requires_confirmation = errors.iter().any(|issue| issue.code.is_soft());
        let requires_compliance =
            brief.is_alcohol || text_alcohol || effective_briefs.iter().any(|e| e.is_alcohol);

        ValidationReport {
            valid,
            errors,
            warnings,
            requires_confirmation,
            requires_compliance,
            effective_briefs,
        }
    }

    fn check_structure(&self, brief: &CreativeBrief, errors: &mut Vec<ValidationIssue>) {
        if brief.main_message.trim().is_empty() {
            errors.push(ValidationIssue::global(
                IssueCode::StructureMissing,
                "Main message is required",
            ));
        }
        if brief.sub_message.trim().is_empty() {
            errors.push(ValidationIssue::global(
                IssueCode::StructureMissing,
                "Sub message is required",
            ));
        }
    }

    fn check_tiles(&self, brief: &CreativeBrief, errors: &mut Vec<ValidationIssue>) {
        match brief.value_tile_type {
            ValueTileType::New => {
                if let Some(text) = &brief.value_tile_text {
                    if !text.trim().eq_ignore_ascii_case("new") {
                        errors.push(ValidationIssue::global(
                            IssueCode::TileConstraint,
                            format!("'New' tile is a locked asset; got text '{}'", text),
                        ));
                    }
                }
            }
            ValueTileType::WhiteValueTile => {
                let has_digit = brief
                    .value_tile_text
                    .as_deref()
                    .map_or(false, |t| t.chars().any(|c| c.is_ascii_digit()));
                if !has_digit {
                    errors.push(ValidationIssue::global(
                        IssueCode::TileConstraint,
                        "White value tile carries a price and must contain a digit",
                    ));
                }
            }
            ValueTileType::ClubcardValueTile | ValueTileType::None => {}
        }
    }

    fn check_template(&self, brief: &CreativeBrief, errors: &mut Vec<ValidationIssue>) {
        if brief.template != TemplateKind::Lep {
            return;
        }
        if let Some(color) = &brief.background_color {
            let required = &self.rules.lep_policy.required_background;
            if !color.trim().eq_ignore_ascii_case(required) {
                errors.push(ValidationIssue::global(
                    IssueCode::LepViolation,
                    format!(
                        "LEP template locks the background to {}; got '{}'",
                        required, color
                    ),
                ));
            }
        }
    }

    fn check_tags(
        &self,
        brief: &CreativeBrief,
        formats: &[FormatProfile],
        errors: &mut Vec<ValidationIssue>,
    ) {
        if brief.has_tag() && !self.rules.is_tag_allowed(brief.tesco_tag.trim()) {
            errors.push(ValidationIssue::global(
                IssueCode::TagCollision,
                format!("Tag '{}' is not on the allow-list", brief.tesco_tag.trim()),
            ));
        }
        for profile in formats {
            if profile.tag_required && !brief.has_tag() {
                errors.push(ValidationIssue::for_format(
                    IssueCode::TagMissing,
                    format!("Format '{}' mandates a Tesco tag", profile.id),
                    &profile.id,
                ));
            }
        }
    }

    fn check_clubcard(&self, brief: &CreativeBrief, errors: &mut Vec<ValidationIssue>) {
        if brief.value_tile_type != ValueTileType::ClubcardValueTile {
            return;
        }
        if brief.has_cta() {
            errors.push(ValidationIssue::global(
                IssueCode::TileConstraint,
                "Clubcard tile and CTA are mutually exclusive",
            ));
        }
        let date_ok = brief
            .clubcard_date
            .as_deref()
            .map_or(false, |d| self.patterns.clubcard_date_shape.is_match(d.trim()));
        if !date_ok {
            errors.push(ValidationIssue::global(
                IssueCode::StructureMissing,
                "Clubcard tile requires an end date in DD/MM form",
            ));
        }
        if brief
            .clubcard_price
            .as_deref()
            .map_or(true, |p| p.trim().is_empty())
        {
            errors.push(ValidationIssue::global(
                IssueCode::StructureMissing,
                "Clubcard tile requires a Clubcard price",
            ));
        }
    }

    /// Free-text scan. Returns whether the copy itself commits the
    /// creative to the alcohol lockup.
    fn check_text(
        &self,
        brief: &CreativeBrief,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) -> bool {
        let text = brief.combined_text();

        if text.contains('*') {
            errors.push(ValidationIssue::global(
                IssueCode::ForbiddenTerm,
                "Footnote markers (*) are not permitted; no disclaimers",
            ));
        }

        // Every term hit is its own entry so the caller can show an
        // itemized list.
        for group in &self.rules.forbidden_terms {
            for term in &group.terms {
                if text.contains(term.as_str()) {
                    errors.push(ValidationIssue::global(
                        IssueCode::ForbiddenTerm,
                        format!("Forbidden term '{}' ({})", term, group.category),
                    ));
                }
            }
        }

        // First price/urgency pattern wins; reported once.
        if let Some((source, _)) = self
            .patterns
            .price_patterns
            .iter()
            .find(|(_, regex)| regex.is_match(&text))
        {
            errors.push(ValidationIssue::global(
                IssueCode::ForbiddenTerm,
                format!("Price or urgency call-out matched '{}'", source),
            ));
        }

        if text.contains("clubcard") {
            for phrase in &self.rules.clubcard_policy.required_phrases {
                if !text.contains(phrase.as_str()) {
                    errors.push(ValidationIssue::global(
                        IssueCode::StructureMissing,
                        format!("Clubcard copy must include '{}'", phrase),
                    ));
                }
            }
            if !self.patterns.clubcard_ends.is_match(&text) {
                errors.push(ValidationIssue::global(
                    IssueCode::StructureMissing,
                    "Clubcard copy must include an 'ends DD/MM' date",
                ));
            }
        }

        if brief.cta_text.trim().chars().count() > self.rules.cta_policy.max_chars {
            warnings.push(ValidationIssue::global(
                IssueCode::TileConstraint,
                format!(
                    "CTA text exceeds {} characters; badge copy may be illegible",
                    self.rules.cta_policy.max_chars
                ),
            ));
        }

        let mentions = self.rules.mentions_alcohol(&text);
        if mentions && !brief.is_alcohol && !brief.confirm_drinkaware {
            errors.push(ValidationIssue::global(
                IssueCode::AlcoholLockup,
                "Copy references alcohol; drinkaware confirmation required",
            ));
        }
        mentions && (brief.is_alcohol || brief.confirm_drinkaware)
    }

    /// Per-image scan. Builds the per-product effective briefs; an
    /// alcohol confirmation lands on one product's overlay and never
    /// on the shared brief.
    fn check_images(
        &self,
        brief: &CreativeBrief,
        products: &[RgbaImage],
        text_alcohol: bool,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) -> Vec<EffectiveBrief> {
        let mut any_alcohol_finding = false;
        let mut effective: Vec<EffectiveBrief> = Vec::with_capacity(products.len());

        for (index, product) in products.iter().enumerate() {
            let mut item = if text_alcohol {
                EffectiveBrief::with_alcohol(brief)
            } else {
                EffectiveBrief::new(brief)
            };

            match self.detector.detect(product) {
                Some(finding) if finding.kind == FindingKind::People => {
                    if !brief.confirm_people {
                        errors.push(ValidationIssue::global(
                            IssueCode::PeopleDetected,
                            format!("Product {}: {}", index + 1, finding.message),
                        ));
                    }
                }
                Some(finding) if finding.kind == FindingKind::Alcohol => {
                    any_alcohol_finding = true;
                    if brief.confirm_drinkaware || brief.is_alcohol {
                        item.is_alcohol = true;
                    } else {
                        errors.push(ValidationIssue::global(
                            IssueCode::AlcoholLockup,
                            format!("Product {}: {}", index + 1, finding.message),
                        ));
                    }
                }
                _ => {}
            }

            effective.push(item);
        }

        if brief.is_alcohol && !any_alcohol_finding && !text_alcohol && !products.is_empty() {
            warnings.push(ValidationIssue::global(
                IssueCode::AlcoholLockup,
                "Brief declares alcohol; drinkaware lockup will be rendered",
            ));
        }

        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatRegistry;

    fn validator() -> ComplianceValidator {
        ComplianceValidator::new(ComplianceRuleSet::builtin()).unwrap()
    }

    fn brief(main: &str, sub: &str, cta: &str) -> CreativeBrief {
        CreativeBrief {
            main_message: main.to_string(),
            sub_message: sub.to_string(),
            cta_text: cta.to_string(),
            ..CreativeBrief::default()
        }
    }

    fn formats() -> Vec<FormatProfile> {
        FormatRegistry::builtin().list().into_iter().cloned().collect()
    }

    #[test]
    fn every_forbidden_term_is_its_own_error() {
        let v = validator();
        let b = brief(
            "Win a prize in our competition",
            "Donate to charity, go green",
            "",
        );
        let report = v.validate(&b, &[], &[]);
        let term_hits = report
            .errors
            .iter()
            .filter(|e| e.code == IssueCode::ForbiddenTerm)
            .count();
        assert!(term_hits >= 5, "expected itemized hits, got {}", term_hits);
        assert!(!report.valid);
    }

    #[test]
    fn price_patterns_report_first_match_only() {
        let v = validator();
        let b = brief("Save 20% on this deal", "Big sale, free gift", "");
        let report = v.validate(&b, &[], &[]);
        let price_hits = report
            .errors
            .iter()
            .filter(|e| e.code == IssueCode::ForbiddenTerm && e.message.contains("call-out"))
            .count();
        assert_eq!(price_hits, 1);
    }

    #[test]
    fn clubcard_copy_demands_companion_phrases() {
        let v = validator();
        let b = brief("Great with Clubcard", "Every day", "");
        let report = v.validate(&b, &[], &[]);
        let missing = report
            .errors
            .iter()
            .filter(|e| e.code == IssueCode::StructureMissing)
            .count();
        // Two phrases plus the ends date token.
        assert_eq!(missing, 3);

        let ok = brief(
            "Great with Clubcard",
            "Selected stores. Clubcard/app required. Ends 12/09",
            "",
        );
        let report = v.validate(&ok, &[], &[]);
        assert!(report
            .errors
            .iter()
            .all(|e| e.code != IssueCode::StructureMissing));
    }

    #[test]
    fn tag_missing_is_scoped_to_the_mandating_format() {
        let v = validator();
        let b = brief("Fresh Taste", "Every Day", "");
        let report = v.validate(&b, &[], &formats());
        assert!(report.valid, "tag mandate must not kill the whole batch");
        assert_eq!(report.rejected_formats(), vec!["pinterest"]);
    }

    #[test]
    fn alcohol_copy_arms_the_drinkaware_gate() {
        let v = validator();
        let b = brief("Crisp summer cider", "Serve chilled", "");
        let report = v.validate(&b, &[], &[]);
        assert!(!report.valid);
        assert!(report.requires_confirmation);
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == IssueCode::AlcoholLockup));

        let confirmed = CreativeBrief {
            confirm_drinkaware: true,
            ..b
        };
        let report = v.validate(&confirmed, &[], &[]);
        assert!(report.valid);
    }

    #[test]
    fn long_cta_is_a_warning_not_a_failure() {
        let v = validator();
        let b = brief(
            "Fresh Taste",
            "Every Day",
            "An exceedingly verbose call to action badge",
        );
        let report = v.validate(&b, &[], &[]);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }
}
