//! Format Profiles - Output Surface Geometry
//!
//! Safe zones exist because downstream platforms overlay their own UI
//! at the top and bottom of story-type surfaces.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub type FormatId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormatProfile {
    pub id: FormatId,
    pub width: u32,
    pub height: u32,
    /// Pixels at the top reserved for platform UI.
    #[serde(default)]
    pub safe_top: u32,
    /// Pixels at the bottom reserved for platform UI.
    #[serde(default)]
    pub safe_bottom: u32,
    /// Uniform content padding inside the safe band.
    #[serde(default = "default_margin")]
    pub margin: u32,
    /// Platforms like Pinterest mandate a Tesco tag on every creative.
    #[serde(default)]
    pub tag_required: bool,
}

fn default_margin() -> u32 {
    40
}

impl FormatProfile {
    pub fn new(id: &str, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            width,
            height,
            safe_top: 0,
            safe_bottom: 0,
            margin: default_margin(),
            tag_required: false,
        }
    }

    /// Vertical interval content may occupy.
    pub fn safe_band(&self) -> (u32, u32) {
        let top = self.safe_top.min(self.height);
        let bottom = self.height.saturating_sub(self.safe_bottom).max(top);
        (top, bottom)
    }
}

/// Format registry - loads and caches output profiles
pub struct FormatRegistry {
    formats: HashMap<FormatId, FormatProfile>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// The shipped surface table.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FormatProfile::new("facebook_feed", 1080, 1080));
        registry.register(FormatProfile {
            safe_top: 200,
            safe_bottom: 250,
            ..FormatProfile::new("instagram_story", 1080, 1920)
        });
        registry.register(FormatProfile::new("landscape", 1920, 1080));
        registry.register(FormatProfile {
            tag_required: true,
            ..FormatProfile::new("pinterest", 1000, 1500)
        });
        registry
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::builtin();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    if let Ok(content) = fs::read_to_string(&path) {
                        if let Ok(profile) = serde_json::from_str::<FormatProfile>(&content) {
                            registry.register(profile);
                        }
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&FormatProfile> {
        self.formats.get(id)
    }

    pub fn list(&self) -> Vec<&FormatProfile> {
        let mut all: Vec<_> = self.formats.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn register(&mut self, profile: FormatProfile) {
        self.formats.insert(profile.id.clone(), profile);
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_formats_present() {
        let registry = FormatRegistry::builtin();
        assert!(registry.get("facebook_feed").is_some());
        assert!(registry.get("instagram_story").is_some());
        assert!(registry.get("landscape").is_some());
        assert!(registry.get("pinterest").unwrap().tag_required);
    }

    #[test]
    fn story_safe_band_excludes_platform_ui() {
        let registry = FormatRegistry::builtin();
        let story = registry.get("instagram_story").unwrap();
        assert_eq!(story.safe_band(), (200, 1670));
    }

    #[test]
    fn degenerate_safe_zones_clamp() {
        let profile = FormatProfile {
            safe_top: 600,
            safe_bottom: 600,
            ..FormatProfile::new("tiny", 400, 1000)
        };
        let (top, bottom) = profile.safe_band();
        assert!(bottom >= top);
    }
}
