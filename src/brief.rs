//! Creative Brief - Declared Intent
//!
//! A brief is validated once per batch and then read-only.
//! Per-product adjustments live on the EffectiveBrief overlay.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ValueTileType {
    #[default]
    None,
    New,
    WhiteValueTile,
    ClubcardValueTile,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Standard,
    /// Low Everyday Price - locked white background, brand blue text,
    /// logo beside the product.
    Lep,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BadgeShape {
    #[default]
    Circle,
    Roundel,
    Ribbon,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeBrief {
    pub main_message: String,
    pub sub_message: String,
    #[serde(default)]
    pub cta_text: String,
    /// Tag drawn verbatim from the allow-list, or the sentinel "none".
    #[serde(default = "default_tag")]
    pub tesco_tag: String,
    #[serde(default)]
    pub value_tile_type: ValueTileType,
    /// Text rendered on the value tile ("New" is a locked asset,
    /// white value tiles carry a price).
    #[serde(default)]
    pub value_tile_text: Option<String>,
    /// DD/MM, required for Clubcard tiles.
    #[serde(default)]
    pub clubcard_date: Option<String>,
    #[serde(default)]
    pub clubcard_price: Option<String>,
    #[serde(default)]
    pub regular_price: Option<String>,
    #[serde(default)]
    pub template: TemplateKind,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub badge_shape: BadgeShape,
    #[serde(default)]
    pub badge_color: Option<String>,
    #[serde(default)]
    pub is_alcohol: bool,
    #[serde(default)]
    pub confirm_people: bool,
    #[serde(default)]
    pub confirm_drinkaware: bool,
}

fn default_tag() -> String {
    TAG_NONE.to_string()
}

/// Sentinel meaning "no tag requested".
pub const TAG_NONE: &str = "none";

impl CreativeBrief {
    pub fn has_tag(&self) -> bool {
        !self.tesco_tag.trim().is_empty() && self.tesco_tag.trim() != TAG_NONE
    }

    pub fn has_cta(&self) -> bool {
        !self.cta_text.trim().is_empty()
    }

    /// The lowercased text surface the compliance scan runs over.
    pub fn combined_text(&self) -> String {
        format!("{} {} {}", self.main_message, self.sub_message, self.cta_text).to_lowercase()
    }
}

/// Per-product read-only overlay produced by validation.
///
/// An alcohol confirmation on one product must never leak into the
/// briefs of sibling products in the same batch, so the flag lives
/// here rather than on the shared CreativeBrief.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveBrief {
    pub brief: CreativeBrief,
    pub is_alcohol: bool,
}

impl EffectiveBrief {
    pub fn new(brief: &CreativeBrief) -> Self {
        Self {
            brief: brief.clone(),
            is_alcohol: brief.is_alcohol,
        }
    }

    pub fn with_alcohol(brief: &CreativeBrief) -> Self {
        Self {
            brief: brief.clone(),
            is_alcohol: true,
        }
    }
}
