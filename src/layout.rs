//! Layout Stack Solving - Deterministic Placement
//!
//! Two anchored stacks and a center product band. The bottom stack
//! grows upward from the safe-zone floor (lockup, tag, disclaimer),
//! the top stack grows downward from the safe-zone ceiling (logo,
//! headline, subhead), and the product fills the viewport left
//! between them. Geometry that cannot satisfy the non-overlap and
//! safe-zone invariants is rejected, never degraded.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brief::{BadgeShape, EffectiveBrief, TemplateKind, ValueTileType};
use crate::formats::FormatProfile;

/// Default canvas fill when the brief does not pick one.
pub const DEFAULT_BACKGROUND: &str = "#A8DAEF";
const INK_PRIMARY: &str = "#1E1E28";
const INK_SECONDARY: &str = "#3C3C46";
const DRINKAWARE_TEXT: &str = "Please drink responsibly. drinkaware.co.uk for the facts";
const MIN_TEXT_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ElementRole {
    Background,
    Logo,
    Headline,
    Subhead,
    Product,
    Sidekick,
    TescoTag,
    ClubcardDisclaimer,
    AlcoholLockup,
    ValueTile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SidekickKind {
    CtaBadge,
    ClubcardTile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementContent {
    Fill {
        color: String,
    },
    Text {
        text: String,
        color: String,
        size: u32,
    },
    /// Product or logo raster; the role disambiguates which.
    Art,
    Badge {
        text: String,
        shape: BadgeShape,
        color: String,
    },
    Tile {
        kind: ValueTileType,
        text: Option<String>,
    },
    PriceTile {
        clubcard_price: String,
        regular_price: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacedElement {
    pub role: ElementRole,
    pub bounds: Rect,
    pub content: ElementContent,
}

/// The rasterizer's whole contract: place exactly these boxes with
/// exactly this content, in this paint order, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub elements: Vec<PlacedElement>,
}

/// Intrinsic dimensions of a decoded art asset. The solver only needs
/// geometry; pixels stay with the rasterizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArtSource {
    pub width: u32,
    pub height: u32,
}

impl ArtSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn from_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Measurement seam. The default measurer is a deterministic
/// approximation; a real glyph shaper can be swapped in without
/// touching the solver.
pub trait TextMetrics {
    /// Rendered (width, height) of a single line at a point size.
    fn measure(&self, text: &str, size: u32) -> (u32, u32);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTextMetrics;

impl TextMetrics for HeuristicTextMetrics {
    fn measure(&self, text: &str, size: u32) -> (u32, u32) {
        let chars = text.chars().count() as u32;
        let width = (chars * size * 56).div_ceil(100);
        let height = (size * 5).div_ceil(4);
        (width, height)
    }
}

/// Average brightness of a canvas region, in [0, 1]. Abstracts solid
/// color fills and raster backgrounds; the lockup contrast choice is
/// the one place layout reads pixel content.
pub trait CanvasSampler {
    fn mean_luminance(&self, region: &Rect) -> f32;
}

pub struct SolidCanvas {
    luminance: f32,
}

impl SolidCanvas {
    pub fn from_hex(color: &str) -> Self {
        let (r, g, b) = parse_hex(color).unwrap_or((168, 218, 239));
        Self {
            luminance: relative_luminance(r, g, b),
        }
    }
}

impl CanvasSampler for SolidCanvas {
    fn mean_luminance(&self, _region: &Rect) -> f32 {
        self.luminance
    }
}

pub struct RasterCanvas<'a> {
    image: &'a RgbaImage,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(image: &'a RgbaImage) -> Self {
        Self { image }
    }
}

impl CanvasSampler for RasterCanvas<'_> {
    fn mean_luminance(&self, region: &Rect) -> f32 {
        let x1 = region.right().min(self.image.width());
        let y1 = region.bottom().min(self.image.height());
        if region.x >= x1 || region.y >= y1 {
            return 1.0;
        }
        let mut total = 0.0f32;
        for y in region.y..y1 {
            for x in region.x..x1 {
                let [r, g, b, _] = self.image.get_pixel(x, y).0;
                total += relative_luminance(r, g, b);
            }
        }
        total / ((x1 - region.x) * (y1 - region.y)) as f32
    }
}

fn relative_luminance(r: u8, g: u8, b: u8) -> f32 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Viewport collapsed to {available}px, below the {floor}px floor")]
    ViewportTooSmall { available: u32, floor: u32 },

    #[error("Clubcard tile reached layout without an end date")]
    MissingClubcardDate,

    #[error("Text cannot fit the format even at minimum size: '{0}'")]
    TextTooLong(String),

    #[error("Art asset has degenerate dimensions")]
    EmptyArt,

    #[error("{0:?} extends outside the safe area")]
    OutsideSafeZone(ElementRole),

    #[error("Placed elements {0:?} and {1:?} overlap")]
    Overlap(ElementRole, ElementRole),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Reject any viewport shorter than this.
    pub viewport_floor: u32,
    pub product_viewport_fraction: f32,
    pub lockup_min_height: u32,
    pub lockup_height_fraction: f32,
    pub luminance_threshold: f32,
    pub stack_gap: u32,
    pub sidekick_gap: u32,
    pub logo_width_fraction: f32,
    pub headline_size_fraction: f32,
    pub subhead_size_fraction: f32,
    pub tag_size_fraction: f32,
    pub disclaimer_size_fraction: f32,
    pub badge_width_fraction: f32,
    pub price_tile_width_fraction: f32,
    pub sticker_width_fraction: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport_floor: 50,
            product_viewport_fraction: 0.85,
            lockup_min_height: 60,
            lockup_height_fraction: 0.08,
            luminance_threshold: 0.5,
            stack_gap: 20,
            sidekick_gap: 24,
            logo_width_fraction: 0.15,
            headline_size_fraction: 0.06,
            subhead_size_fraction: 0.035,
            tag_size_fraction: 0.025,
            disclaimer_size_fraction: 0.02,
            badge_width_fraction: 0.18,
            price_tile_width_fraction: 0.20,
            sticker_width_fraction: 0.16,
        }
    }
}

pub struct LayoutSolver {
    metrics: Box<dyn TextMetrics>,
    config: LayoutConfig,
}

impl Default for LayoutSolver {
    fn default() -> Self {
        Self::new(Box::new(HeuristicTextMetrics))
    }
}

impl LayoutSolver {
    pub fn new(metrics: Box<dyn TextMetrics>) -> Self {
        Self {
            metrics,
            config: LayoutConfig::default(),
        }
    }

    pub fn with_config(metrics: Box<dyn TextMetrics>, config: LayoutConfig) -> Self {
        Self { metrics, config }
    }

    /// Solve against the brief's own solid background fill.
    pub fn solve(
        &self,
        effective: &EffectiveBrief,
        profile: &FormatProfile,
        product: &ArtSource,
        logo: &ArtSource,
    ) -> Result<RenderPlan, LayoutError> {
        let canvas = SolidCanvas::from_hex(&self.background_color(effective));
        self.solve_on(effective, profile, product, logo, &canvas)
    }

    /// Solve against an arbitrary canvas (raster backgrounds).
    pub fn solve_on(
        &self,
        effective: &EffectiveBrief,
        profile: &FormatProfile,
        product: &ArtSource,
        logo: &ArtSource,
        canvas: &dyn CanvasSampler,
    ) -> Result<RenderPlan, LayoutError> {
        if product.width == 0 || product.height == 0 || logo.width == 0 || logo.height == 0 {
            return Err(LayoutError::EmptyArt);
        }

        let brief = &effective.brief;
        let is_lep = brief.template == TemplateKind::Lep;
        let (w, h) = (profile.width, profile.height);
        let (safe_top, safe_floor) = profile.safe_band();
        let margin = profile.margin;
        let content_width = w.saturating_sub(2 * margin);

        let text_color = if is_lep {
            crate::rules::LepPolicy::default().text_color
        } else {
            INK_PRIMARY.to_string()
        };
        let sub_color = if is_lep {
            text_color.clone()
        } else {
            INK_SECONDARY.to_string()
        };

        let mut elements = vec![PlacedElement {
            role: ElementRole::Background,
            bounds: Rect::new(0, 0, w, h),
            content: ElementContent::Fill {
                color: self.background_color(effective),
            },
        }];
        let mut bottom_stack = Vec::new();

        // --- Bottom stack, built upward from the safe-zone floor ---
        let mut bottom = safe_floor;

        if effective.is_alcohol {
            let lockup_h = ((h as f32 * self.config.lockup_height_fraction) as u32)
                .max(self.config.lockup_min_height);
            let bounds = Rect::new(margin, bottom.saturating_sub(lockup_h), content_width, lockup_h);
            let lum = canvas.mean_luminance(&bounds);
            let color = if lum < self.config.luminance_threshold {
                "#FFFFFF"
            } else {
                "#000000"
            };
            bottom_stack.push(PlacedElement {
                role: ElementRole::AlcoholLockup,
                bounds,
                content: ElementContent::Text {
                    text: DRINKAWARE_TEXT.to_string(),
                    color: color.to_string(),
                    size: scaled_size(h, self.config.disclaimer_size_fraction),
                },
            });
            bottom = bounds.y.saturating_sub(self.config.stack_gap);
        }

        if brief.has_tag() {
            let size = scaled_size(h, self.config.tag_size_fraction);
            let tag = brief.tesco_tag.trim().to_string();
            let (size, tw, th) = self.fit_text(&tag, size, content_width)?;
            let bounds = Rect::new(centered_x(w, tw), bottom.saturating_sub(th), tw, th);
            bottom_stack.push(PlacedElement {
                role: ElementRole::TescoTag,
                bounds,
                content: ElementContent::Text {
                    text: tag,
                    color: text_color.clone(),
                    size,
                },
            });
            bottom = bounds.y.saturating_sub(self.config.stack_gap);
        }

        if brief.value_tile_type == ValueTileType::ClubcardValueTile {
            // The validator enforces this; the solver refuses to trust it.
            let date = brief
                .clubcard_date
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .ok_or(LayoutError::MissingClubcardDate)?;
            let text = format!("Selected stores. Clubcard/app required. Ends {}", date);
            let size = scaled_size(h, self.config.disclaimer_size_fraction);
            let (size, tw, th) = self.fit_text(&text, size, content_width)?;
            let bounds = Rect::new(centered_x(w, tw), bottom.saturating_sub(th), tw, th);
            bottom_stack.push(PlacedElement {
                role: ElementRole::ClubcardDisclaimer,
                bounds,
                content: ElementContent::Text {
                    text,
                    color: text_color.clone(),
                    size,
                },
            });
            bottom = bounds.y.saturating_sub(self.config.stack_gap);
        }

        // --- Top stack, built downward from the safe-zone ceiling ---
        let mut top = safe_top + margin;

        if !is_lep {
            let lw = (w as f32 * self.config.logo_width_fraction) as u32;
            let lh = ((lw as f32 / logo.aspect()) as u32).max(1);
            elements.push(PlacedElement {
                role: ElementRole::Logo,
                bounds: Rect::new(centered_x(w, lw), top, lw, lh),
                content: ElementContent::Art,
            });
            top += lh + self.config.stack_gap;
        }

        let headline = brief.main_message.trim().to_uppercase();
        let size = scaled_size(h, self.config.headline_size_fraction);
        let (size, tw, th) = self.fit_text(&headline, size, content_width)?;
        elements.push(PlacedElement {
            role: ElementRole::Headline,
            bounds: Rect::new(centered_x(w, tw), top, tw, th),
            content: ElementContent::Text {
                text: headline,
                color: text_color.clone(),
                size,
            },
        });
        top += th + self.config.stack_gap;

        let subhead = brief.sub_message.trim().to_string();
        let size = scaled_size(h, self.config.subhead_size_fraction);
        let (size, tw, th) = self.fit_text(&subhead, size, content_width)?;
        elements.push(PlacedElement {
            role: ElementRole::Subhead,
            bounds: Rect::new(centered_x(w, tw), top, tw, th),
            content: ElementContent::Text {
                text: subhead,
                color: sub_color,
                size,
            },
        });
        top += th + self.config.stack_gap;

        // --- Center band ---
        let viewport_h = bottom.saturating_sub(top);
        if viewport_h < self.config.viewport_floor {
            return Err(LayoutError::ViewportTooSmall {
                available: viewport_h,
                floor: self.config.viewport_floor,
            });
        }

        self.place_product_band(
            effective,
            profile,
            product,
            logo,
            is_lep,
            top,
            viewport_h,
            &mut elements,
        );

        elements.append(&mut bottom_stack);

        // --- Fixed-position sticker layer ---
        if let Some(sticker) = self.sticker(effective, profile) {
            elements.push(sticker);
        }

        let plan = RenderPlan {
            format: profile.id.clone(),
            width: w,
            height: h,
            elements,
        };
        self.check_invariants(&plan, profile)?;
        Ok(plan)
    }

    fn background_color(&self, effective: &EffectiveBrief) -> String {
        if effective.brief.template == TemplateKind::Lep {
            return crate::rules::LepPolicy::default().required_background;
        }
        effective
            .brief
            .background_color
            .as_deref()
            .map(str::trim)
            .filter(|c| parse_hex(c).is_some())
            .unwrap_or(DEFAULT_BACKGROUND)
            .to_string()
    }

    /// Product centered in the viewport, companions to its right.
    /// Overflow shrinks the whole group uniformly; the product never
    /// leaves center.
    #[allow(clippy::too_many_arguments)]
    fn place_product_band(
        &self,
        effective: &EffectiveBrief,
        profile: &FormatProfile,
        product: &ArtSource,
        logo: &ArtSource,
        is_lep: bool,
        top: u32,
        viewport_h: u32,
        elements: &mut Vec<PlacedElement>,
    ) {
        let brief = &effective.brief;
        let w = profile.width;
        let margin = profile.margin as f32;

        let mut product_h = viewport_h as f32 * self.config.product_viewport_fraction;
        let mut product_w = product_h * product.aspect();

        // Companions placed right of the product, in order.
        struct Companion {
            role: ElementRole,
            width: f32,
            height: f32,
            content: ElementContent,
        }
        let mut companions = Vec::new();

        if is_lep {
            let lw = w as f32 * self.config.logo_width_fraction;
            companions.push(Companion {
                role: ElementRole::Logo,
                width: lw,
                height: lw / logo.aspect(),
                content: ElementContent::Art,
            });
        }

        if brief.value_tile_type == ValueTileType::ClubcardValueTile {
            let tile_w = w as f32 * self.config.price_tile_width_fraction;
            companions.push(Companion {
                role: ElementRole::Sidekick,
                width: tile_w,
                height: tile_w * 0.6,
                content: ElementContent::PriceTile {
                    clubcard_price: brief
                        .clubcard_price
                        .clone()
                        .unwrap_or_default(),
                    regular_price: brief.regular_price.clone(),
                },
            });
        } else if brief.has_cta() {
            let badge_w = w as f32 * self.config.badge_width_fraction;
            companions.push(Companion {
                role: ElementRole::Sidekick,
                width: badge_w,
                height: badge_w,
                content: ElementContent::Badge {
                    text: brief.cta_text.trim().to_string(),
                    shape: brief.badge_shape,
                    color: brief
                        .badge_color
                        .clone()
                        .unwrap_or_else(|| "#DAA520".to_string()),
                },
            });
        }

        let gap = self.config.sidekick_gap as f32;
        let trailing: f32 = companions
            .iter()
            .map(|c| gap + c.width)
            .sum();

        // Half the product plus everything to its right must fit
        // between the centerline and the right margin.
        let budget = w as f32 / 2.0 - margin;
        let need = product_w / 2.0 + trailing;
        let mut scale = if need > budget { budget / need } else { 1.0 };

        // A wide lone product is still bounded by both margins.
        if companions.is_empty() {
            let max_w = w as f32 - 2.0 * margin;
            if product_w > max_w {
                scale = scale.min(max_w / product_w);
            }
        }

        product_w *= scale;
        product_h *= scale;

        let px = (w as f32 - product_w) / 2.0;
        let py = top as f32 + (viewport_h as f32 - product_h) / 2.0;
        elements.push(PlacedElement {
            role: ElementRole::Product,
            bounds: Rect::new(
                px as u32,
                py as u32,
                product_w.max(1.0) as u32,
                product_h.max(1.0) as u32,
            ),
            content: ElementContent::Art,
        });

        let mut cursor = px + product_w + gap * scale;
        for companion in companions {
            let cw = companion.width * scale;
            let ch = companion.height * scale;
            let cy = py + (product_h - ch) / 2.0;
            elements.push(PlacedElement {
                role: companion.role,
                bounds: Rect::new(cursor as u32, cy as u32, cw.max(1.0) as u32, ch.max(1.0) as u32),
                content: companion.content,
            });
            cursor += cw + gap * scale;
        }
    }

    /// Stickers live on their own layer, anchored to the top-left
    /// safe corner, independent of the flow stacks.
    fn sticker(
        &self,
        effective: &EffectiveBrief,
        profile: &FormatProfile,
    ) -> Option<PlacedElement> {
        let brief = &effective.brief;
        let kind = brief.value_tile_type;
        if !matches!(kind, ValueTileType::New | ValueTileType::WhiteValueTile) {
            return None;
        }
        let side = (profile.width as f32 * self.config.sticker_width_fraction) as u32;
        let bounds = Rect::new(profile.margin, profile.safe_top + profile.margin, side, side);
        Some(PlacedElement {
            role: ElementRole::ValueTile,
            bounds,
            content: ElementContent::Tile {
                kind,
                text: brief.value_tile_text.clone(),
            },
        })
    }

    fn fit_text(
        &self,
        text: &str,
        start_size: u32,
        max_width: u32,
    ) -> Result<(u32, u32, u32), LayoutError> {
        let mut size = start_size.max(MIN_TEXT_SIZE);
        loop {
            let (tw, th) = self.metrics.measure(text, size);
            if tw <= max_width {
                return Ok((size, tw.max(1), th.max(1)));
            }
            if size <= MIN_TEXT_SIZE {
                return Err(LayoutError::TextTooLong(text.to_string()));
            }
            size = size.saturating_sub(2).max(MIN_TEXT_SIZE);
        }
    }

    /// Defence in depth: a plan that violates the reserved-zone
    /// contract is rejected outright, never shipped degraded.
    fn check_invariants(&self, plan: &RenderPlan, profile: &FormatProfile) -> Result<(), LayoutError> {
        let (safe_top, safe_floor) = profile.safe_band();
        let placed: Vec<&PlacedElement> = plan
            .elements
            .iter()
            .filter(|e| e.role != ElementRole::Background)
            .collect();

        for element in &placed {
            let b = &element.bounds;
            if b.y < safe_top || b.bottom() > safe_floor || b.right() > profile.width {
                return Err(LayoutError::OutsideSafeZone(element.role));
            }
        }
        for (i, a) in placed.iter().enumerate() {
            for b in placed.iter().skip(i + 1) {
                if a.bounds.intersects(&b.bounds) {
                    return Err(LayoutError::Overlap(a.role, b.role));
                }
            }
        }
        Ok(())
    }
}

fn scaled_size(height: u32, fraction: f32) -> u32 {
    ((height as f32 * fraction) as u32).max(MIN_TEXT_SIZE)
}

fn centered_x(width: u32, element_width: u32) -> u32 {
    width.saturating_sub(element_width) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brief::CreativeBrief;
    use crate::formats::FormatRegistry;

    fn effective(brief: CreativeBrief) -> EffectiveBrief {
        EffectiveBrief::new(&brief)
    }

    fn base_brief() -> CreativeBrief {
        CreativeBrief {
            main_message: "Fresh Taste".to_string(),
            sub_message: "Every Day".to_string(),
            ..CreativeBrief::default()
        }
    }

    fn solve_for(format: &str, brief: CreativeBrief) -> Result<RenderPlan, LayoutError> {
        let solver = LayoutSolver::default();
        let registry = FormatRegistry::builtin();
        solver.solve(
            &effective(brief),
            registry.get(format).unwrap(),
            &ArtSource::new(600, 800),
            &ArtSource::new(400, 200),
        )
    }

    #[test]
    fn plans_place_all_mandatory_roles() {
        let plan = solve_for("facebook_feed", base_brief()).unwrap();
        let roles: Vec<_> = plan.elements.iter().map(|e| e.role).collect();
        assert!(roles.contains(&ElementRole::Background));
        assert!(roles.contains(&ElementRole::Logo));
        assert!(roles.contains(&ElementRole::Headline));
        assert!(roles.contains(&ElementRole::Subhead));
        assert!(roles.contains(&ElementRole::Product));
    }

    #[test]
    fn solver_is_bit_identical_across_calls() {
        let a = solve_for("instagram_story", base_brief()).unwrap();
        let b = solve_for("instagram_story", base_brief()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn story_format_respects_safe_zones() {
        let plan = solve_for("instagram_story", base_brief()).unwrap();
        for element in plan.elements.iter().filter(|e| e.role != ElementRole::Background) {
            assert!(element.bounds.y >= 200, "{:?} above safe top", element.role);
            assert!(
                element.bounds.bottom() <= 1920 - 250,
                "{:?} below safe floor",
                element.role
            );
        }
    }

    #[test]
    fn sidekick_never_pushes_product_off_center() {
        let mut brief = base_brief();
        brief.cta_text = "Shop now".to_string();
        let plan = solve_for("facebook_feed", brief).unwrap();
        let product = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::Product)
            .unwrap();
        let center = product.bounds.x + product.bounds.width / 2;
        assert!((center as i64 - 540).abs() <= 1);

        let sidekick = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::Sidekick)
            .unwrap();
        assert!(sidekick.bounds.x > product.bounds.right());
        assert!(sidekick.bounds.right() <= 1080 - 40);
    }

    #[test]
    fn wide_product_with_sidekick_shrinks_to_fit() {
        let mut brief = base_brief();
        brief.cta_text = "Try me".to_string();
        let solver = LayoutSolver::default();
        let registry = FormatRegistry::builtin();
        let plan = solver
            .solve(
                &effective(brief),
                registry.get("facebook_feed").unwrap(),
                &ArtSource::new(1600, 800),
                &ArtSource::new(400, 200),
            )
            .unwrap();
        let sidekick = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::Sidekick)
            .unwrap();
        assert!(sidekick.bounds.right() <= 1080 - 40);
    }

    #[test]
    fn collapsed_viewport_is_rejected() {
        let solver = LayoutSolver::default();
        let profile = FormatProfile {
            safe_top: 400,
            safe_bottom: 400,
            ..FormatProfile::new("cramped", 800, 900)
        };
        let result = solver.solve(
            &effective(base_brief()),
            &profile,
            &ArtSource::new(600, 800),
            &ArtSource::new(400, 200),
        );
        assert!(matches!(
            result,
            Err(LayoutError::ViewportTooSmall { .. })
        ));
    }

    #[test]
    fn clubcard_without_date_is_rejected_by_the_solver_itself() {
        let mut brief = base_brief();
        brief.value_tile_type = ValueTileType::ClubcardValueTile;
        brief.clubcard_price = Some("£5".to_string());
        let result = solve_for("facebook_feed", brief);
        assert!(matches!(result, Err(LayoutError::MissingClubcardDate)));
    }

    #[test]
    fn clubcard_tile_becomes_the_sidekick_with_disclaimer() {
        let mut brief = base_brief();
        brief.value_tile_type = ValueTileType::ClubcardValueTile;
        brief.clubcard_date = Some("12/09".to_string());
        brief.clubcard_price = Some("£5".to_string());
        let plan = solve_for("facebook_feed", brief).unwrap();
        let disclaimer = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::ClubcardDisclaimer)
            .expect("disclaimer placed");
        match &disclaimer.content {
            ElementContent::Text { text, .. } => assert!(text.ends_with("Ends 12/09")),
            other => panic!("unexpected content {:?}", other),
        }
        assert!(plan
            .elements
            .iter()
            .any(|e| e.role == ElementRole::Sidekick
                && matches!(e.content, ElementContent::PriceTile { .. })));
    }

    #[test]
    fn alcohol_lockup_text_contrasts_with_background() {
        let mut brief = base_brief();
        brief.is_alcohol = true;
        brief.background_color = Some("#101018".to_string());
        let plan = solve_for("facebook_feed", brief).unwrap();
        let lockup = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::AlcoholLockup)
            .unwrap();
        match &lockup.content {
            ElementContent::Text { color, .. } => assert_eq!(color, "#FFFFFF"),
            other => panic!("unexpected content {:?}", other),
        }

        let mut brief = base_brief();
        brief.is_alcohol = true;
        brief.background_color = Some("#F4F4F4".to_string());
        let plan = solve_for("facebook_feed", brief).unwrap();
        let lockup = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::AlcoholLockup)
            .unwrap();
        match &lockup.content {
            ElementContent::Text { color, .. } => assert_eq!(color, "#000000"),
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn lep_overrides_background_text_and_logo_position() {
        let mut brief = base_brief();
        brief.template = TemplateKind::Lep;
        brief.background_color = Some("#FFFFFF".to_string());
        let plan = solve_for("facebook_feed", brief).unwrap();

        match &plan.elements[0].content {
            ElementContent::Fill { color } => assert_eq!(color, "#FFFFFF"),
            other => panic!("unexpected content {:?}", other),
        }
        let headline = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::Headline)
            .unwrap();
        match &headline.content {
            ElementContent::Text { color, .. } => assert_eq!(color, "#00539F"),
            other => panic!("unexpected content {:?}", other),
        }
        let product = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::Product)
            .unwrap();
        let logo = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::Logo)
            .unwrap();
        assert!(logo.bounds.x > product.bounds.right(), "LEP logo sits right of product");
    }

    #[test]
    fn sticker_tile_rides_its_own_layer() {
        let mut brief = base_brief();
        brief.value_tile_type = ValueTileType::New;
        brief.value_tile_text = Some("New".to_string());
        let plan = solve_for("facebook_feed", brief).unwrap();
        let tile = plan
            .elements
            .iter()
            .find(|e| e.role == ElementRole::ValueTile)
            .unwrap();
        assert_eq!(tile.bounds.x, 40);
        assert_eq!(tile.bounds.y, 40);
    }

    #[test]
    fn no_pairwise_overlaps_in_any_builtin_format() {
        let registry = FormatRegistry::builtin();
        for profile in registry.list() {
            let plan = solve_for(&profile.id, base_brief()).unwrap();
            let placed: Vec<_> = plan
                .elements
                .iter()
                .filter(|e| e.role != ElementRole::Background)
                .collect();
            for (i, a) in placed.iter().enumerate() {
                for b in placed.iter().skip(i + 1) {
                    assert!(
                        !a.bounds.intersects(&b.bounds),
                        "{:?} overlaps {:?} in {}",
                        a.role,
                        b.role,
                        profile.id
                    );
                }
            }
        }
    }
}
