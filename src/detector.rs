//! Content Detection - Heuristic Risk Scanning
//!
//! Two explainable detectors, no learned classifier: a skin-region
//! face pass and an edge/contour bottle pass. People findings take
//! priority over alcohol findings; only the first triggering condition
//! per image is reported. That ordering is policy, not an omission.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    People,
    Alcohol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFinding {
    pub kind: FindingKind,
    pub message: String,
}

/// Capability seam: the validator only sees this trait, so the
/// heuristics can be swapped for a learned classifier later.
pub trait ContentDetector {
    fn detect(&self, image: &RgbaImage) -> Option<ContentFinding>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Minimum face size as a fraction of the image's short side.
    pub min_face_fraction: f32,
    /// Skin fill ratio a window must clear to count as a candidate.
    pub skin_fill_threshold: f32,
    /// Candidate windows a cluster needs before it fires. Tuned high:
    /// precision over recall for this gate.
    pub min_neighbors: usize,
    /// Edge magnitude threshold for the bottle pass.
    pub edge_threshold: u16,
    /// Contour area bounds as fractions of image area.
    pub min_area_fraction: f32,
    pub max_area_fraction: f32,
    /// Bounding-box aspect (h/w) band for bottle candidates.
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Extent (filled contour area / bbox area) band. A solid
    /// rectangle sits near 1.0; a necked silhouette does not.
    pub min_extent: f32,
    pub max_extent: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_face_fraction: 0.12,
            skin_fill_threshold: 0.5,
            min_neighbors: 6,
            edge_threshold: 60,
            min_area_fraction: 0.005,
            max_area_fraction: 0.90,
            min_aspect: 1.5,
            max_aspect: 6.5,
            min_extent: 0.40,
            max_extent: 0.85,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicDetector {
    config: DetectorConfig,
}

impl HeuristicDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    fn detect_people(&self, image: &RgbaImage) -> bool {
        let (w, h) = image.dimensions();
        if w < 32 || h < 32 {
            return false;
        }

        let skin = skin_mask(image);
        let window = ((w.min(h) as f32 * self.config.min_face_fraction) as u32).max(24);
        let stride = (window / 4).max(1);

        let mut centers: Vec<(u32, u32)> = Vec::new();
        let mut y = 0;
        while y + window <= h {
            let mut x = 0;
            while x + window <= w {
                let fill = window_fill(&skin, w, x, y, window);
                if fill >= self.config.skin_fill_threshold {
                    centers.push((x + window / 2, y + window / 2));
                }
                x += stride;
            }
            y += stride;
        }

        // Neighbor aggregation: a lone candidate window never fires.
        let radius = window as i64;
        centers.iter().any(|&(cx, cy)| {
            let neighbors = centers
                .iter()
                .filter(|&&(ox, oy)| {
                    let dx = cx as i64 - ox as i64;
                    let dy = cy as i64 - oy as i64;
                    dx * dx + dy * dy <= radius * radius
                })
                .count();
            neighbors >= self.config.min_neighbors
        })
    }

    fn detect_alcohol(&self, image: &RgbaImage) -> bool {
        let (w, h) = image.dimensions();
        if w < 16 || h < 16 {
            return false;
        }

        let gray = grayscale(image);
        let edges = edge_map(&gray, self.config.edge_threshold);
        let dilated = dilate(&edges, w as usize, h as usize);
        let components = connected_components(&dilated, w as usize, h as usize);

        let image_area = (w * h) as f32;
        components.iter().any(|c| {
            let filled = c.filled_area as f32;
            let fraction = filled / image_area;
            if fraction < self.config.min_area_fraction
                || fraction > self.config.max_area_fraction
            {
                return false;
            }
            let bw = (c.max_x - c.min_x + 1) as f32;
            let bh = (c.max_y - c.min_y + 1) as f32;
            let aspect = bh / bw;
            let extent = filled / (bw * bh);
            aspect >= self.config.min_aspect
                && aspect <= self.config.max_aspect
                && extent >= self.config.min_extent
                && extent <= self.config.max_extent
        })
    }
}

impl ContentDetector for HeuristicDetector {
    fn detect(&self, image: &RgbaImage) -> Option<ContentFinding> {
        if self.detect_people(image) {
            return Some(ContentFinding {
                kind: FindingKind::People,
                message: "Person detected in artwork; explicit confirmation required"
                    .to_string(),
            });
        }
        if self.detect_alcohol(image) {
            return Some(ContentFinding {
                kind: FindingKind::Alcohol,
                message: "Bottle-like silhouette detected; drinkaware confirmation required"
                    .to_string(),
            });
        }
        None
    }
}

/// Classic explainable skin rule over RGB.
fn skin_mask(image: &RgbaImage) -> Vec<bool> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            if a < 128 {
                return false;
            }
            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            r > 95
                && g > 40
                && b > 20
                && max - min > 15
                && (r as i16 - g as i16).abs() > 15
                && r > g
                && r > b
        })
        .collect()
}

fn window_fill(mask: &[bool], width: u32, x: u32, y: u32, window: u32) -> f32 {
    let mut hits = 0u32;
    for row in y..y + window {
        let base = (row * width + x) as usize;
        hits += mask[base..base + window as usize]
            .iter()
            .filter(|&&s| s)
            .count() as u32;
    }
    hits as f32 / (window * window) as f32
}

fn grayscale(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        image::Luma([luma as u8])
    })
}

/// Sobel gradient magnitude thresholded into a binary edge map.
fn edge_map(gray: &GrayImage, threshold: u16) -> Vec<bool> {
    let (w, h) = gray.dimensions();
    let mut edges = vec![false; (w * h) as usize];
    if w < 3 || h < 3 {
        return edges;
    }
    let at = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as i32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = -at(x - 1, y - 1) + at(x + 1, y - 1) - 2 * at(x - 1, y)
                + 2 * at(x + 1, y)
                - at(x - 1, y + 1)
                + at(x + 1, y + 1);
            let gy = -at(x - 1, y - 1) - 2 * at(x, y - 1) - at(x + 1, y - 1)
                + at(x - 1, y + 1)
                + 2 * at(x, y + 1)
                + at(x + 1, y + 1);
            let magnitude = ((gx.abs() + gy.abs()) / 2) as u16;
            if magnitude >= threshold {
                edges[(y * w + x) as usize] = true;
            }
        }
    }
    edges
}

/// 3x3 dilation bridges broken contours before component extraction.
fn dilate(edges: &[bool], w: usize, h: usize) -> Vec<bool> {
    let mut out = vec![false; w * h];
    for y in 0..h {
        for x in 0..w {
            if !edges[y * w + x] {
                continue;
            }
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let ny = y as i64 + dy;
                    let nx = x as i64 + dx;
                    if ny >= 0 && ny < h as i64 && nx >= 0 && nx < w as i64 {
                        out[ny as usize * w + nx as usize] = true;
                    }
                }
            }
        }
    }
    out
}

struct Component {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
    /// Row-span filled area, the analogue of an external contour's
    /// enclosed area.
    filled_area: usize,
}

fn connected_components(mask: &[bool], w: usize, h: usize) -> Vec<Component> {
    let mut visited = vec![false; w * h];
    let mut components = Vec::new();

    for start in 0..w * h {
        if !mask[start] || visited[start] {
            continue;
        }
        let mut stack = vec![start];
        visited[start] = true;
        // Per-row horizontal extremes for the span fill.
        let mut rows: std::collections::HashMap<usize, (usize, usize)> =
            std::collections::HashMap::new();
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0usize, 0usize);

        while let Some(index) = stack.pop() {
            let x = index % w;
            let y = index / w;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            rows.entry(y)
                .and_modify(|(lo, hi)| {
                    *lo = (*lo).min(x);
                    *hi = (*hi).max(x);
                })
                .or_insert((x, x));

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let ny = y as i64 + dy;
                    let nx = x as i64 + dx;
                    if ny < 0 || ny >= h as i64 || nx < 0 || nx >= w as i64 {
                        continue;
                    }
                    let neighbor = ny as usize * w + nx as usize;
                    if mask[neighbor] && !visited[neighbor] {
                        visited[neighbor] = true;
                        stack.push(neighbor);
                    }
                }
            }
        }

        let filled_area = rows.values().map(|(lo, hi)| hi - lo + 1).sum();
        components.push(Component {
            min_x,
            min_y,
            max_x,
            max_y,
            filled_area,
        });
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn blank(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn fill_rect(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 4]) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba(color));
            }
        }
    }

    #[test]
    fn uniform_image_yields_nothing() {
        let detector = HeuristicDetector::default();
        let img = blank(200, 200, [255, 255, 255, 255]);
        assert!(detector.detect(&img).is_none());
    }

    #[test]
    fn necked_silhouette_flags_alcohol() {
        let detector = HeuristicDetector::default();
        let mut img = blank(200, 200, [255, 255, 255, 255]);
        // Bottle body with a narrower neck on top.
        fill_rect(&mut img, 75, 80, 125, 180, [50, 50, 60, 255]);
        fill_rect(&mut img, 94, 20, 106, 80, [50, 50, 60, 255]);

        let finding = detector.detect(&img).expect("bottle silhouette should flag");
        assert_eq!(finding.kind, FindingKind::Alcohol);
    }

    #[test]
    fn solid_tall_rectangle_is_not_a_bottle() {
        // Fills its bounding box, so extent sits above the band.
        let detector = HeuristicDetector::default();
        let mut img = blank(200, 200, [255, 255, 255, 255]);
        fill_rect(&mut img, 80, 20, 120, 180, [50, 50, 60, 255]);
        assert!(detector.detect(&img).is_none());
    }

    #[test]
    fn square_shape_is_not_a_bottle() {
        let detector = HeuristicDetector::default();
        let mut img = blank(200, 200, [255, 255, 255, 255]);
        fill_rect(&mut img, 50, 50, 150, 150, [50, 50, 60, 255]);
        assert!(detector.detect(&img).is_none());
    }

    #[test]
    fn skin_region_flags_people() {
        let detector = HeuristicDetector::default();
        let mut img = blank(300, 300, [255, 255, 255, 255]);
        // Large skin-toned disc.
        let (cx, cy, r) = (150i64, 150i64, 80i64);
        for y in 0..300i64 {
            for x in 0..300i64 {
                if (x - cx) * (x - cx) + (y - cy) * (y - cy) <= r * r {
                    img.put_pixel(x as u32, y as u32, Rgba([224, 172, 140, 255]));
                }
            }
        }
        let finding = detector.detect(&img).expect("skin region should flag");
        assert_eq!(finding.kind, FindingKind::People);
    }

    #[test]
    fn people_takes_priority_over_alcohol() {
        let detector = HeuristicDetector::default();
        let mut img = blank(300, 300, [255, 255, 255, 255]);
        // Both a skin disc and a bottle silhouette in one frame.
        let (cx, cy, r) = (80i64, 80i64, 60i64);
        for y in 0..300i64 {
            for x in 0..300i64 {
                if (x - cx) * (x - cx) + (y - cy) * (y - cy) <= r * r {
                    img.put_pixel(x as u32, y as u32, Rgba([224, 172, 140, 255]));
                }
            }
        }
        fill_rect(&mut img, 200, 130, 240, 250, [50, 50, 60, 255]);
        fill_rect(&mut img, 214, 70, 226, 130, [50, 50, 60, 255]);

        let finding = detector.detect(&img).unwrap();
        assert_eq!(finding.kind, FindingKind::People);
    }
}
