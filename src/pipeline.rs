//! Generation Pipeline - Single Entry Point
//!
//! CRITICAL: generate MUST run the compliance gate internally, exactly
//! once per batch, before any layout work. No bypass.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::brief::{CreativeBrief, EffectiveBrief};
use crate::formats::{FormatProfile, FormatRegistry};
use crate::hashing::{compute_batch_hash, compute_plan_hash};
use crate::layout::{ArtSource, LayoutSolver, RenderPlan};
use crate::rules::{ComplianceRuleSet, RuleSetError};
use crate::validator::{ComplianceValidator, ValidationReport};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Rule set error: {0}")]
    RuleSet(#[from] RuleSetError),

    #[error("Rule set {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Outcome for one (product, format) cell. A layout rejection in one
/// cell never aborts its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FormatOutcome {
    Plan { plan: RenderPlan, plan_hash: String },
    Rejected { error: String },
}

impl FormatOutcome {
    pub fn plan(&self) -> Option<&RenderPlan> {
        match self {
            FormatOutcome::Plan { plan, .. } => Some(plan),
            FormatOutcome::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOutcome {
    pub product_index: usize,
    pub formats: BTreeMap<String, FormatOutcome>,
}

/// Outcome of a dimension-only plan request: the gate's report plus
/// one outcome per target format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub report: ValidationReport,
    pub formats: BTreeMap<String, FormatOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub ruleset_version: String,
    pub batch_hash: String,
    pub report: ValidationReport,
    /// Empty unless the report came back valid. All-or-nothing gate.
    pub products: Vec<ProductOutcome>,
}

/// The generation pipeline - single entry point for all batch work
pub struct GenerationPipeline {
    formats: FormatRegistry,
    validator: ComplianceValidator,
    solver: LayoutSolver,
}

impl GenerationPipeline {
    pub fn new(
        rules: ComplianceRuleSet,
        formats: FormatRegistry,
    ) -> Result<Self, PipelineError> {
        Self::check_engine_version(&rules)?;
        Ok(Self {
            formats,
            validator: ComplianceValidator::new(rules)?,
            solver: LayoutSolver::default(),
        })
    }

    pub fn with_components(
        formats: FormatRegistry,
        validator: ComplianceValidator,
        solver: LayoutSolver,
    ) -> Result<Self, PipelineError> {
        Self::check_engine_version(validator.rules())?;
        Ok(Self {
            formats,
            validator,
            solver,
        })
    }

    pub fn list_formats(&self) -> Vec<&FormatProfile> {
        self.formats.list()
    }

    pub fn get_format(&self, id: &str) -> Option<&FormatProfile> {
        self.formats.get(id)
    }

    pub fn rules(&self) -> &ComplianceRuleSet {
        self.validator.rules()
    }

    /// Validate a brief against its bound imagery and target formats.
    ///
    /// This is the ONLY validation entry point.
    pub fn validate_brief(
        &self,
        brief: &CreativeBrief,
        products: &[RgbaImage],
        format_ids: &[String],
    ) -> Result<ValidationReport, PipelineError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let profiles = self.resolve_formats(format_ids)?;
        Ok(self.validator.validate(brief, products, &profiles))
    }

    /// Run a full batch: gate once, then solve every product x format.
    ///
    /// CRITICAL: This ALWAYS runs the gate internally. No bypass
    /// possible, and it runs exactly once for the whole batch.
    pub fn generate(
        &self,
        brief: &CreativeBrief,
        products: &[RgbaImage],
        logo: &RgbaImage,
        format_ids: &[String],
    ) -> Result<BatchResult, PipelineError> {
        let profiles = self.resolve_formats(format_ids)?;
        let report = self.validate_brief(brief, products, format_ids)?;

        let mut result = BatchResult {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            ruleset_version: self.rules().ruleset_version.clone(),
            batch_hash: compute_batch_hash(
                brief,
                &self.rules().ruleset_version,
                ENGINE_VERSION,
            )?,
            report,
            products: Vec::new(),
        };

        if !result.report.valid {
            return Ok(result);
        }

        let logo_art = ArtSource::from_image(logo);
        for (index, product) in products.iter().enumerate() {
            let effective = &result.report.effective_briefs[index];
            let product_art = ArtSource::from_image(product);
            let formats =
                self.solve_formats(effective, &profiles, &product_art, &logo_art, &result.report)?;
            result.products.push(ProductOutcome {
                product_index: index,
                formats,
            });
        }

        Ok(result)
    }

    /// Dimension-only planning path for callers that hold art geometry
    /// but not pixels. Runs the same gate as generate.
    pub fn plan(
        &self,
        brief: &CreativeBrief,
        product: ArtSource,
        logo: ArtSource,
        format_ids: &[String],
    ) -> Result<PlanResponse, PipelineError> {
        let profiles = self.resolve_formats(format_ids)?;
        let report = self.validate_brief(brief, &[], format_ids)?;

        let mut formats = BTreeMap::new();
        if report.valid {
            let effective = EffectiveBrief {
                brief: brief.clone(),
                is_alcohol: report.requires_compliance,
            };
            formats = self.solve_formats(&effective, &profiles, &product, &logo, &report)?;
        }
        Ok(PlanResponse { report, formats })
    }

    fn solve_formats(
        &self,
        effective: &EffectiveBrief,
        profiles: &[FormatProfile],
        product: &ArtSource,
        logo: &ArtSource,
        report: &ValidationReport,
    ) -> Result<BTreeMap<String, FormatOutcome>, PipelineError> {
        let mut formats = BTreeMap::new();
        for profile in profiles {
            if let Some(issue) = report.format_issue(&profile.id) {
                formats.insert(
                    profile.id.clone(),
                    FormatOutcome::Rejected {
                        error: issue.message.clone(),
                    },
                );
                continue;
            }
            let outcome = match self.solver.solve(effective, profile, product, logo) {
                Ok(plan) => {
                    let plan_hash = compute_plan_hash(&plan)?;
                    FormatOutcome::Plan { plan, plan_hash }
                }
                Err(err) => FormatOutcome::Rejected {
                    error: err.to_string(),
                },
            };
            formats.insert(profile.id.clone(), outcome);
        }
        Ok(formats)
    }

    fn resolve_formats(&self, format_ids: &[String]) -> Result<Vec<FormatProfile>, PipelineError> {
        if format_ids.is_empty() {
            return Ok(self.formats.list().into_iter().cloned().collect());
        }
        format_ids
            .iter()
            .map(|id| {
                self.formats
                    .get(id)
                    .cloned()
                    .ok_or_else(|| PipelineError::UnknownFormat(id.clone()))
            })
            .collect()
    }

    fn check_engine_version(rules: &ComplianceRuleSet) -> Result<(), PipelineError> {
        let engine = semver::Version::parse(ENGINE_VERSION).map_err(|_| {
            PipelineError::RuleSet(RuleSetError::BadVersion(ENGINE_VERSION.to_string()))
        })?;
        let min = semver::Version::parse(&rules.engine_min_version).map_err(|_| {
            PipelineError::RuleSet(RuleSetError::BadVersion(rules.engine_min_version.clone()))
        })?;
        if engine < min {
            return Err(PipelineError::EngineVersionMismatch(
                rules.ruleset_version.clone(),
                rules.engine_min_version.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }
        Ok(())
    }
}
