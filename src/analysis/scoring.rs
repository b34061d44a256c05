//! Composite "bio interest" scoring and diversity-aware top-N selection.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::AnalysisConfig;
use crate::models::{ColonyFeatures, ScoreRecord};

pub const MORPHOLOGY_WEIGHT: f64 = 0.30;
pub const FORM_WEIGHT: f64 = 0.20;
pub const SIZE_WEIGHT: f64 = 0.15;
pub const DENSITY_WEIGHT: f64 = 0.20;
pub const NOVELTY_WEIGHT: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub n_top: usize,
    pub penalty_factor: f64,
    pub min_size: u32,
    pub max_size: u32,
}

impl From<&AnalysisConfig> for ScoringParams {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            n_top: config.n_top_colonies,
            penalty_factor: config.penalty_factor,
            min_size: config.min_colony_size,
            max_size: config.max_colony_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    /// Same order as the input colonies
    pub scores: Vec<ScoreRecord>,
    /// Labels of the selected colonies, best first
    pub top: Vec<u32>,
}

/// Higher for less circular, less convex, more elongated shapes
pub fn shape_interest(circularity: f64, convexity: f64, aspect_ratio: f64) -> f64 {
    (1.0 - circularity) + (1.0 - convexity) + (aspect_ratio - 1.0).clamp(0.0, 3.0) / 3.0
}

/// Peaks at the geometric middle of the size range, 0 at either end
pub fn size_score(area: u32, min_size: u32, max_size: u32) -> f64 {
    let lo = (min_size.max(1) as f64).ln();
    let hi = (max_size.max(1) as f64).ln();
    let half_width = (hi - lo) / 2.0;
    if half_width <= 0.0 {
        return 1.0;
    }
    let centre = (hi + lo) / 2.0;
    let z = ((area.max(1) as f64).ln() - centre) / half_width;
    (1.0 - z * z).clamp(0.0, 1.0)
}

/// Percentile rank with ties averaged: the largest value gets 1.0
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        // 1-based positions start..=end share their average
        let average = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = average / n as f64;
        }
        start = end + 1;
    }
    ranks
}

/// 1 - frequency of each item's key within the run
fn rarity<K: std::hash::Hash + Eq>(keys: &[K]) -> Vec<f64> {
    let mut counts: HashMap<&K, usize> = HashMap::new();
    for k in keys {
        *counts.entry(k).or_default() += 1;
    }
    let n = keys.len() as f64;
    keys.iter().map(|k| 1.0 - counts[k] as f64 / n).collect()
}

/// Morphology and colour coordinates used for similarity, each roughly in [0, 1]
fn similarity_vector(colony: &ColonyFeatures) -> Vec<Option<f64>> {
    let mut v = Vec::with_capacity(6);
    match &colony.morphology {
        Some(m) => {
            v.push(Some(m.circularity));
            v.push(Some(m.convexity));
            v.push(Some((m.aspect_ratio - 1.0).clamp(0.0, 3.0) / 3.0));
        }
        None => v.extend([None, None, None]),
    }
    match &colony.color {
        Some(c) => {
            v.push(Some(c.lab_color[0] as f64 / 100.0));
            v.push(Some((c.lab_color[1] as f64 + 128.0) / 255.0));
            v.push(Some((c.lab_color[2] as f64 + 128.0) / 255.0));
        }
        None => v.extend([None, None, None]),
    }
    v
}

/// 1 - normalised Euclidean distance over the parts both colonies have; 0 if none
fn similarity(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let (sum_sq, dims) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some((*x)? - (*y)?))
        .fold((0.0, 0usize), |(s, d), diff| (s + diff * diff, d + 1));
    if dims == 0 {
        return 0.0;
    }
    (1.0 - (sum_sq / dims as f64).sqrt()).clamp(0.0, 1.0)
}

/// Descending by score, label ascending on ties
fn by_score_then_label(scores: &[f64], labels: &[u32]) -> impl Fn(&usize, &usize) -> Ordering {
    move |&a, &b| scores[b].total_cmp(&scores[a]).then(labels[a].cmp(&labels[b]))
}

/// Score every colony and pick the top `n_top` with diversity pressure
pub fn score_colonies(colonies: &[ColonyFeatures], params: &ScoringParams) -> ScoringOutcome {
    let n = colonies.len();
    if n == 0 {
        return ScoringOutcome {
            scores: Vec::new(),
            top: Vec::new(),
        };
    }
    let labels: Vec<u32> = colonies.iter().map(|c| c.label()).collect();
    let has_morphology = colonies.iter().all(|c| c.morphology.is_some());

    // scores of a skipped stage stay None and weigh nothing
    let morphology_scores: Vec<Option<f64>> = if has_morphology {
        let interest: Vec<f64> = colonies
            .iter()
            .filter_map(|c| c.morphology.as_ref())
            .map(|m| shape_interest(m.circularity, m.convexity, m.aspect_ratio))
            .collect();
        percentile_ranks(&interest).into_iter().map(Some).collect()
    } else {
        vec![None; n]
    };

    let form_scores: Vec<Option<f64>> = if has_morphology {
        let forms: Vec<_> = colonies.iter().map(|c| c.morphology.as_ref().map(|m| m.form)).collect();
        rarity(&forms).into_iter().map(Some).collect()
    } else {
        vec![None; n]
    };

    let size_scores: Vec<f64> = colonies
        .iter()
        .map(|c| size_score(c.region.area, params.min_size, params.max_size))
        .collect();

    let density_scores: Vec<Option<f64>> = colonies
        .iter()
        .map(|c| c.density.as_ref().map(|d| d.density_class.ordinal() as f64 / 4.0))
        .collect();

    let novelty_scores = if colonies.iter().any(|c| c.morphology.is_some() || c.color.is_some()) {
        let keys: Vec<_> = colonies
            .iter()
            .map(|c| {
                (
                    c.morphology.as_ref().map(|m| m.form),
                    c.color.as_ref().map(|col| col.color_cluster),
                )
            })
            .collect();
        rarity(&keys)
    } else {
        vec![0.0; n]
    };

    let raw: Vec<f64> = (0..n)
        .map(|i| {
            MORPHOLOGY_WEIGHT * morphology_scores[i].unwrap_or(0.0)
                + FORM_WEIGHT * form_scores[i].unwrap_or(0.0)
                + SIZE_WEIGHT * size_scores[i]
                + DENSITY_WEIGHT * density_scores[i].unwrap_or(0.0)
                + NOVELTY_WEIGHT * novelty_scores[i]
        })
        .collect();
    let bio = normalize(&raw);

    let top = select_top(colonies, &bio, &labels, params);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(by_score_then_label(&bio, &labels));
    let mut ranks = vec![0usize; n];
    let mut next_rank = 1;
    for &i in &top {
        ranks[i] = next_rank;
        next_rank += 1;
    }
    for &i in &order {
        if ranks[i] == 0 {
            ranks[i] = next_rank;
            next_rank += 1;
        }
    }

    let scores = (0..n)
        .map(|i| ScoreRecord {
            morphology_score: morphology_scores[i],
            form_score: form_scores[i],
            size_score: size_scores[i],
            density_score: density_scores[i],
            novelty_score: novelty_scores[i],
            bio_interest: bio[i],
            rank: ranks[i],
        })
        .collect();

    ScoringOutcome {
        scores,
        top: top.into_iter().map(|i| labels[i]).collect(),
    }
}

/// Min-max to [0, 1]; a constant vector is only clamped
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range < 1e-12 {
        return values.iter().map(|v| v.clamp(0.0, 1.0)).collect();
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Indices of the selected colonies, best first
fn select_top(colonies: &[ColonyFeatures], bio: &[f64], labels: &[u32], params: &ScoringParams) -> Vec<usize> {
    let top_n = params.n_top.min(colonies.len());
    let mut order: Vec<usize> = (0..colonies.len()).collect();
    order.sort_by(by_score_then_label(bio, labels));

    if params.penalty_factor <= 0.0 {
        order.truncate(top_n);
        return order;
    }
    if top_n == 0 {
        return Vec::new();
    }

    let threshold = 1.0 - 0.5 * params.penalty_factor;
    let vectors: Vec<Vec<Option<f64>>> = colonies.iter().map(similarity_vector).collect();

    // (index, effective score)
    let mut selected: Vec<(usize, f64)> = Vec::with_capacity(top_n);
    for &candidate in &order {
        let max_similarity = selected
            .iter()
            .map(|&(s, _)| similarity(&vectors[candidate], &vectors[s]))
            .fold(0.0, f64::max);
        let effective = if max_similarity > threshold {
            bio[candidate] * (1.0 - params.penalty_factor * max_similarity)
        } else {
            bio[candidate]
        };

        if selected.len() < top_n {
            selected.push((candidate, effective));
            continue;
        }
        // weakest selected entry; the later (lower-ranked) one on ties
        let Some((weakest, weakest_score)) = selected
            .iter()
            .enumerate()
            .map(|(pos, &(_, eff))| (pos, eff))
            .fold(None, |acc: Option<(usize, f64)>, cur| match acc {
                Some(best) if best.1 < cur.1 => Some(best),
                _ => Some(cur),
            })
        else {
            continue;
        };
        if effective > weakest_score {
            selected[weakest] = (candidate, effective);
        }
    }

    selected.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then(bio[b.0].total_cmp(&bio[a.0]))
            .then(labels[a.0].cmp(&labels[b.0]))
    });
    selected.into_iter().map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BoundingBox, ColonyForm, ColonyMargin, ColonyRegion, ColorRecord, DensityClass, DensityRecord,
        MorphologyRecord,
    };

    fn colony(label: u32, area: u32, circularity: f64, form: ColonyForm, lab: [f32; 3]) -> ColonyFeatures {
        let mut c = ColonyFeatures::new(ColonyRegion {
            label,
            area,
            perimeter: 40.0,
            centroid: (0.0, 0.0),
            bounding_box: BoundingBox { min_row: 0, min_col: 0, max_row: 10, max_col: 10 },
            major_axis_length: 12.0,
            minor_axis_length: 10.0,
            solidity: 0.97,
            convex_area: area,
        });
        c.morphology = Some(MorphologyRecord {
            circularity,
            aspect_ratio: 1.2,
            convexity: 0.97,
            form,
            margin: ColonyMargin::Entire,
        });
        c.color = Some(ColorRecord {
            dominant_color: [0, 0, 0],
            lab_color: lab,
            color_cluster: 0,
        });
        c.density = Some(DensityRecord {
            opacity_score: 2.5,
            texture_score: 1.0,
            density_gradient: 0.0,
            density_class: DensityClass::Dense,
            saturation: 0.1,
        });
        c
    }

    fn params(n_top: usize, penalty_factor: f64) -> ScoringParams {
        ScoringParams {
            n_top,
            penalty_factor,
            min_size: 15,
            max_size: 10_000,
        }
    }

    fn sample_run() -> Vec<ColonyFeatures> {
        vec![
            colony(1, 400, 0.95, ColonyForm::Circular, [60.0, 5.0, 5.0]),
            colony(2, 420, 0.94, ColonyForm::Circular, [60.5, 5.0, 5.0]),
            colony(3, 90, 0.40, ColonyForm::Irregular, [30.0, 40.0, -20.0]),
            colony(4, 2500, 0.70, ColonyForm::Oval, [80.0, -10.0, 30.0]),
            colony(5, 410, 0.93, ColonyForm::Circular, [61.0, 5.0, 5.0]),
            colony(6, 30, 0.20, ColonyForm::Filamentous, [50.0, 0.0, 0.0]),
        ]
    }

    #[test]
    fn percentile_ranks_average_ties() {
        assert_eq!(percentile_ranks(&[3.0, 1.0, 2.0]), vec![1.0, 1.0 / 3.0, 2.0 / 3.0]);
        assert_eq!(percentile_ranks(&[5.0, 5.0]), vec![0.75, 0.75]);
    }

    #[test]
    fn size_score_peaks_mid_range() {
        let mid = ((15.0f64).ln() + (10_000.0f64).ln()) / 2.0;
        let peak = mid.exp().round() as u32;
        assert!(size_score(peak, 15, 10_000) > 0.99);
        assert_eq!(size_score(15, 15, 10_000), 0.0);
        assert_eq!(size_score(10_000, 15, 10_000), 0.0);
        assert!(size_score(100, 15, 10_000) < size_score(peak, 15, 10_000));
    }

    #[test]
    fn bio_interest_is_normalized() {
        let outcome = score_colonies(&sample_run(), &params(3, 0.5));
        let bio: Vec<f64> = outcome.scores.iter().map(|s| s.bio_interest).collect();
        assert!(bio.iter().all(|b| (0.0..=1.0).contains(b)));
        assert!(bio.iter().any(|&b| b == 0.0));
        assert!(bio.iter().any(|&b| b == 1.0));
    }

    #[test]
    fn zero_penalty_is_a_pure_sort() {
        let run = sample_run();
        let outcome = score_colonies(&run, &params(4, 0.0));

        let mut expected: Vec<(f64, u32)> = outcome
            .scores
            .iter()
            .zip(&run)
            .map(|(s, c)| (s.bio_interest, c.label()))
            .collect();
        expected.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        let expected: Vec<u32> = expected.into_iter().take(4).map(|(_, l)| l).collect();
        assert_eq!(outcome.top, expected);
    }

    #[test]
    fn top_n_is_capped_at_colony_count() {
        let run: Vec<_> = sample_run().into_iter().take(3).collect();
        let outcome = score_colonies(&run, &params(5, 0.5));
        assert_eq!(outcome.top.len(), 3);
    }

    #[test]
    fn every_colony_gets_a_unique_rank() {
        let outcome = score_colonies(&sample_run(), &params(2, 1.0));
        let mut ranks: Vec<usize> = outcome.scores.iter().map(|s| s.rank).collect();
        ranks.sort();
        assert_eq!(ranks, (1..=6).collect::<Vec<_>>());
    }

    #[test]
    fn diversity_penalty_demotes_near_duplicates() {
        // three near-identical colonies with the best scores, one distinct
        // runner-up and one clearly uninteresting colony
        let mut run = vec![
            colony(1, 400, 0.30, ColonyForm::Irregular, [60.0, 5.0, 5.0]),
            colony(2, 400, 0.30, ColonyForm::Irregular, [60.0, 5.0, 5.0]),
            colony(3, 400, 0.30, ColonyForm::Irregular, [60.0, 5.0, 5.0]),
            colony(4, 400, 0.80, ColonyForm::Oval, [20.0, 60.0, -40.0]),
            colony(5, 15, 0.95, ColonyForm::Circular, [90.0, -30.0, 50.0]),
        ];
        for c in run.iter_mut().take(3) {
            c.density.as_mut().unwrap().density_class = DensityClass::VeryDense;
        }
        run[4].density.as_mut().unwrap().density_class = DensityClass::VerySparse;

        let pure = score_colonies(&run, &params(2, 0.0));
        assert_eq!(pure.top, vec![1, 2]);

        let diverse = score_colonies(&run, &params(2, 1.0));
        assert!(diverse.top.contains(&4), "got {:?}", diverse.top);
        assert_eq!(diverse.top[0], 1);
    }

    #[test]
    fn skipped_analyses_contribute_nothing() {
        let mut run = sample_run();
        for c in &mut run {
            c.morphology = None;
            c.color = None;
            c.density = None;
        }
        let outcome = score_colonies(&run, &params(3, 0.5));
        for s in &outcome.scores {
            assert_eq!(s.morphology_score, None);
            assert_eq!(s.form_score, None);
            assert_eq!(s.density_score, None);
            assert_eq!(s.novelty_score, 0.0);
        }
        assert_eq!(outcome.top.len(), 3);
    }

    #[test]
    fn skipping_density_keeps_shape_scores() {
        let mut run = sample_run();
        for c in &mut run {
            c.density = None;
        }
        let outcome = score_colonies(&run, &params(3, 0.5));
        for s in &outcome.scores {
            assert_eq!(s.density_score, None);
            assert!(s.morphology_score.is_some());
            assert!(s.form_score.is_some());
        }
    }

    #[test]
    fn empty_run() {
        let outcome = score_colonies(&[], &params(5, 0.5));
        assert!(outcome.scores.is_empty() && outcome.top.is_empty());
    }
}
