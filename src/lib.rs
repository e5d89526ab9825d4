//! CreativeGate Core - Compliance Gate and Layout Engine
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Nothing Renders Unproven
//! 2. Rules Are Data
//! 3. Placement Is Deterministic
//! 4. Safe Zones Are Reserved
//! 5. Errors Accumulate, Never Vanish

pub mod brief;
pub mod rules;
pub mod formats;
pub mod detector;
pub mod validator;
pub mod layout;
pub mod hashing;
pub mod pipeline;

pub use brief::{BadgeShape, CreativeBrief, EffectiveBrief, TemplateKind, ValueTileType};
pub use detector::{ContentDetector, ContentFinding, FindingKind, HeuristicDetector};
pub use formats::{FormatProfile, FormatRegistry};
pub use hashing::{canonical_json, compute_batch_hash, compute_plan_hash};
pub use layout::{ArtSource, LayoutError, LayoutSolver, PlacedElement, RenderPlan};
pub use pipeline::{BatchResult, FormatOutcome, GenerationPipeline, PipelineError, PlanResponse};
pub use rules::ComplianceRuleSet;
pub use validator::{ComplianceValidator, IssueCode, ValidationIssue, ValidationReport};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
