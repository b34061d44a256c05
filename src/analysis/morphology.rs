use std::f64::consts::PI;

use crate::models::{ColonyForm, ColonyMargin, ColonyRegion, MorphologyRecord};

const CIRCULAR_MIN_CIRCULARITY: f64 = 0.85;
const CIRCULAR_MAX_ASPECT: f64 = 1.3;
const OVAL_MIN_CIRCULARITY: f64 = 0.6;
const OVAL_MAX_ASPECT: f64 = 2.0;
const FILAMENTOUS_MIN_ASPECT: f64 = 3.0;

const ENTIRE_MIN_CONVEXITY: f64 = 0.95;
const UNDULATE_MIN_CONVEXITY: f64 = 0.85;
const LOBATE_MIN_CONVEXITY: f64 = 0.7;

/// 4π·area/perimeter², capped at 1; 0 for a region without a boundary length
pub fn circularity(area: u32, perimeter: f64) -> f64 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    (4.0 * PI * area as f64 / (perimeter * perimeter)).clamp(0.0, 1.0)
}

/// Major over minor axis; the minor axis is floored at one pixel
pub fn aspect_ratio(major: f64, minor: f64) -> f64 {
    major / minor.max(1.0)
}

/// First matching rule wins
pub fn classify_form(circularity: f64, aspect_ratio: f64) -> ColonyForm {
    if circularity >= CIRCULAR_MIN_CIRCULARITY && aspect_ratio <= CIRCULAR_MAX_ASPECT {
        ColonyForm::Circular
    } else if circularity >= OVAL_MIN_CIRCULARITY && aspect_ratio <= OVAL_MAX_ASPECT {
        ColonyForm::Oval
    } else if aspect_ratio > FILAMENTOUS_MIN_ASPECT {
        ColonyForm::Filamentous
    } else {
        ColonyForm::Irregular
    }
}

pub fn classify_margin(convexity: f64) -> ColonyMargin {
    if convexity >= ENTIRE_MIN_CONVEXITY {
        ColonyMargin::Entire
    } else if convexity >= UNDULATE_MIN_CONVEXITY {
        ColonyMargin::Undulate
    } else if convexity >= LOBATE_MIN_CONVEXITY {
        ColonyMargin::Lobate
    } else {
        ColonyMargin::Serrate
    }
}

/// Shape descriptors and classes for one colony
pub fn analyze_region(region: &ColonyRegion) -> MorphologyRecord {
    let circularity = circularity(region.area, region.perimeter);
    let aspect_ratio = aspect_ratio(region.major_axis_length, region.minor_axis_length);
    let convexity = if region.convex_area == 0 {
        1.0
    } else {
        (region.area as f64 / region.convex_area as f64).min(1.0)
    };

    MorphologyRecord {
        circularity,
        aspect_ratio,
        convexity,
        form: classify_form(circularity, aspect_ratio),
        margin: classify_margin(convexity),
    }
}
