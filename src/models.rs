use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use serde::Serialize;
use std::fmt;

/// Per-pixel colony ownership: 0 is background, every positive value is one colony
pub type LabelMap = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Axis-aligned box in (row, col) coordinates; `max_*` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_col - self.min_col
    }

    pub fn height(&self) -> u32 {
        self.max_row - self.min_row
    }

    /// Grow by `pad` pixels on every side, clamped to a `width` x `height` image
    pub fn expand(&self, pad: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox {
            min_row: self.min_row.saturating_sub(pad),
            min_col: self.min_col.saturating_sub(pad),
            max_row: (self.max_row + pad).min(height),
            max_col: (self.max_col + pad).min(width),
        }
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.min_row && row < self.max_row && col >= self.min_col && col < self.max_col
    }
}

/// Geometric properties of one labeled region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColonyRegion {
    pub label: u32,
    /// Pixel count
    pub area: u32,
    pub perimeter: f64,
    /// (row, col)
    pub centroid: (f64, f64),
    pub bounding_box: BoundingBox,
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
    /// area / convex_area
    pub solidity: f64,
    pub convex_area: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColonyForm {
    Circular,
    Oval,
    Irregular,
    Filamentous,
}

impl ColonyForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColonyForm::Circular => "circular",
            ColonyForm::Oval => "oval",
            ColonyForm::Irregular => "irregular",
            ColonyForm::Filamentous => "filamentous",
        }
    }
}

impl fmt::Display for ColonyForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColonyMargin {
    Entire,
    Undulate,
    Lobate,
    Serrate,
}

impl ColonyMargin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColonyMargin::Entire => "entire",
            ColonyMargin::Undulate => "undulate",
            ColonyMargin::Lobate => "lobate",
            ColonyMargin::Serrate => "serrate",
        }
    }
}

impl fmt::Display for ColonyMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from least to most opaque
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityClass {
    VerySparse,
    Sparse,
    Medium,
    Dense,
    VeryDense,
}

impl DensityClass {
    /// 0 for very sparse up to 4 for very dense
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DensityClass::VerySparse => "very_sparse",
            DensityClass::Sparse => "sparse",
            DensityClass::Medium => "medium",
            DensityClass::Dense => "dense",
            DensityClass::VeryDense => "very_dense",
        }
    }
}

impl fmt::Display for DensityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MorphologyRecord {
    /// 4π·area/perimeter², capped at 1.0
    pub circularity: f64,
    pub aspect_ratio: f64,
    pub convexity: f64,
    pub form: ColonyForm,
    pub margin: ColonyMargin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorRecord {
    /// sRGB
    pub dominant_color: [u8; 3],
    /// CIE L*a*b*
    pub lab_color: [f32; 3],
    /// Cluster id shared by colonies of similar colour within one image
    pub color_cluster: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityRecord {
    pub opacity_score: f64,
    pub texture_score: f64,
    pub density_gradient: f64,
    pub density_class: DensityClass,
    /// Mean HSV saturation in [0, 1]
    pub saturation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    /// `None` when morphology was skipped
    pub morphology_score: Option<f64>,
    pub form_score: Option<f64>,
    pub size_score: f64,
    /// `None` when density was skipped
    pub density_score: Option<f64>,
    pub novelty_score: f64,
    /// Composite interest, normalized to [0, 1] across the run
    pub bio_interest: f64,
    /// 1-based position after diversity re-ranking
    pub rank: usize,
}

/// Everything known about one colony, keyed by its label.
///
/// Analyses that were skipped leave their record as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColonyFeatures {
    pub region: ColonyRegion,
    pub morphology: Option<MorphologyRecord>,
    pub color: Option<ColorRecord>,
    pub density: Option<DensityRecord>,
    pub score: Option<ScoreRecord>,
}

impl ColonyFeatures {
    pub fn new(region: ColonyRegion) -> Self {
        Self {
            region,
            morphology: None,
            color: None,
            density: None,
            score: None,
        }
    }

    pub fn label(&self) -> u32 {
        self.region.label
    }

    pub fn bio_interest(&self) -> f64 {
        self.score.as_ref().map(|s| s.bio_interest).unwrap_or(0.0)
    }

    /// Flatten into a serializable row
    pub fn to_row(&self, sample: Option<&str>) -> ColonyRow {
        let region = &self.region;
        let morphology = self.morphology.as_ref();
        let color = self.color.as_ref();
        let density = self.density.as_ref();
        let score = self.score.as_ref();

        ColonyRow {
            sample: sample.map(str::to_string),
            label: region.label,
            area: region.area,
            perimeter: region.perimeter,
            centroid_row: region.centroid.0,
            centroid_col: region.centroid.1,
            bounding_box: region.bounding_box,
            major_axis_length: region.major_axis_length,
            minor_axis_length: region.minor_axis_length,
            solidity: region.solidity,
            convex_area: region.convex_area,
            circularity: morphology.map(|m| m.circularity),
            aspect_ratio: morphology.map(|m| m.aspect_ratio),
            convexity: morphology.map(|m| m.convexity),
            form: morphology.map(|m| m.form),
            margin: morphology.map(|m| m.margin),
            dominant_color: color.map(|c| c.dominant_color),
            lab_color: color.map(|c| c.lab_color),
            color_cluster: color.map(|c| c.color_cluster),
            opacity_score: density.map(|d| d.opacity_score),
            texture_score: density.map(|d| d.texture_score),
            density_gradient: density.map(|d| d.density_gradient),
            density_class: density.map(|d| d.density_class),
            saturation: density.map(|d| d.saturation),
            morphology_score: score.and_then(|s| s.morphology_score),
            form_score: score.and_then(|s| s.form_score),
            size_score: score.map(|s| s.size_score),
            density_score: score.and_then(|s| s.density_score),
            novelty_score: score.map(|s| s.novelty_score),
            bio_interest: score.map(|s| s.bio_interest),
            rank: score.map(|s| s.rank),
        }
    }
}

/// Names accepted by [`ColonyRow::numeric`]
pub const NUMERIC_FEATURES: &[&str] = &[
    "area",
    "perimeter",
    "major_axis_length",
    "minor_axis_length",
    "solidity",
    "convex_area",
    "circularity",
    "aspect_ratio",
    "convexity",
    "opacity_score",
    "texture_score",
    "density_gradient",
    "saturation",
    "morphology_score",
    "form_score",
    "size_score",
    "density_score",
    "novelty_score",
    "bio_interest",
];

/// One colony as a flat table row, joined across every analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColonyRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    pub label: u32,
    pub area: u32,
    pub perimeter: f64,
    pub centroid_row: f64,
    pub centroid_col: f64,
    pub bounding_box: BoundingBox,
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
    pub solidity: f64,
    pub convex_area: u32,
    pub circularity: Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub convexity: Option<f64>,
    pub form: Option<ColonyForm>,
    pub margin: Option<ColonyMargin>,
    pub dominant_color: Option<[u8; 3]>,
    pub lab_color: Option<[f32; 3]>,
    pub color_cluster: Option<usize>,
    pub opacity_score: Option<f64>,
    pub texture_score: Option<f64>,
    pub density_gradient: Option<f64>,
    pub density_class: Option<DensityClass>,
    pub saturation: Option<f64>,
    pub morphology_score: Option<f64>,
    pub form_score: Option<f64>,
    pub size_score: Option<f64>,
    pub density_score: Option<f64>,
    pub novelty_score: Option<f64>,
    pub bio_interest: Option<f64>,
    pub rank: Option<usize>,
}

impl ColonyRow {
    /// Look up a numeric feature by name; `None` if unknown or not computed
    pub fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "area" => Some(self.area as f64),
            "perimeter" => Some(self.perimeter),
            "major_axis_length" => Some(self.major_axis_length),
            "minor_axis_length" => Some(self.minor_axis_length),
            "solidity" => Some(self.solidity),
            "convex_area" => Some(self.convex_area as f64),
            "circularity" => self.circularity,
            "aspect_ratio" => self.aspect_ratio,
            "convexity" => self.convexity,
            "opacity_score" => self.opacity_score,
            "texture_score" => self.texture_score,
            "density_gradient" => self.density_gradient,
            "saturation" => self.saturation,
            "morphology_score" => self.morphology_score,
            "form_score" => self.form_score,
            "size_score" => self.size_score,
            "density_score" => self.density_score,
            "novelty_score" => self.novelty_score,
            "bio_interest" => self.bio_interest,
            _ => None,
        }
    }

    pub fn sample_name(&self) -> &str {
        self.sample.as_deref().unwrap_or("")
    }
}

/// Headline numbers for one analysed image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_colonies: usize,
    pub average_area: f64,
    /// `None` when density analysis was skipped
    pub dense_colonies: Option<usize>,
    /// `None` when morphology analysis was skipped
    pub circular_colonies: Option<usize>,
    pub color_clusters: Option<usize>,
}

/// Which optional analyses contributed to a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StagesRun {
    pub morphology: bool,
    pub color: bool,
    pub density: bool,
}

/// Everything produced by one single-image run
#[derive(Debug, Clone)]
pub struct ResultBundle {
    pub original_image: RgbImage,
    pub processed_image: RgbImage,
    pub plate_mask: GrayImage,
    /// Cleaned foreground before watershed splitting and size filtering
    pub binary_mask: GrayImage,
    pub label_map: LabelMap,
    /// One entry per label, ascending
    pub colonies: Vec<ColonyFeatures>,
    /// Number of global colour clusters, if colour analysis ran
    pub color_clusters: Option<usize>,
    /// Labels of the selected top colonies, best first
    pub top_colonies: Vec<u32>,
    pub stages: StagesRun,
}

impl ResultBundle {
    pub fn total_colonies(&self) -> usize {
        self.colonies.len()
    }

    pub fn colony(&self, label: u32) -> Option<&ColonyFeatures> {
        self.colonies.iter().find(|c| c.label() == label)
    }

    /// The top-N selection in rank order
    pub fn top(&self) -> Vec<&ColonyFeatures> {
        self.top_colonies
            .iter()
            .filter_map(|label| self.colony(*label))
            .collect()
    }

    pub fn rows(&self) -> Vec<ColonyRow> {
        self.colonies.iter().map(|c| c.to_row(None)).collect()
    }

    pub fn summary(&self) -> RunSummary {
        let total = self.colonies.len();
        let average_area = if total == 0 {
            0.0
        } else {
            self.colonies.iter().map(|c| c.region.area as f64).sum::<f64>() / total as f64
        };

        let dense_colonies = self.stages.density.then(|| {
            self.colonies
                .iter()
                .filter(|c| matches!(c.density.as_ref().map(|d| d.density_class), Some(DensityClass::Dense)))
                .count()
        });
        let circular_colonies = self.stages.morphology.then(|| {
            self.colonies
                .iter()
                .filter(|c| matches!(c.morphology.as_ref().map(|m| m.form), Some(ColonyForm::Circular)))
                .count()
        });

        RunSummary {
            total_colonies: total,
            average_area,
            dense_colonies,
            circular_colonies,
            color_clusters: self.color_clusters,
        }
    }
}
