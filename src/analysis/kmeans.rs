//! Seeded k-means with k-means++ initialisation.
//!
//! Every run is a pure function of (data, k, seed, n_init): one `StdRng` is
//! seeded once and consumed in a fixed order across all initialisations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_MAX_ITER: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per input point
    pub assignments: Vec<usize>,
    pub centers: Vec<Vec<f64>>,
    /// Sum of squared distances to the assigned centre
    pub inertia: f64,
}

impl KMeansFit {
    /// Number of points per cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.len()];
        for &a in &self.assignments {
            sizes[a] += 1;
        }
        sizes
    }
}

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
    n_init: usize,
    max_iter: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seed: 0,
            n_init: 1,
            max_iter: DEFAULT_MAX_ITER,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of independent initialisations; the lowest inertia wins
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Cluster `data`. `k` is capped at the number of points.
    /// Returns `None` for empty data or `k == 0`.
    pub fn fit(&self, data: &[Vec<f64>]) -> Option<KMeansFit> {
        let k = self.k.min(data.len());
        if k == 0 {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;
        for _ in 0..self.n_init {
            let centers = init_plus_plus(data, k, &mut rng);
            let fit = lloyd(data, centers, self.max_iter);
            // strict comparison keeps the earliest of equally good runs
            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest centre and its squared distance; ties go to the lower index
fn nearest(point: &[f64], centers: &[Vec<f64>]) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn init_plus_plus(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(data[rng.random_range(0..data.len())].clone());

    let mut closest: Vec<f64> = data.iter().map(|p| squared_distance(p, &centers[0])).collect();
    while centers.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total <= 0.0 {
            rng.random_range(0..data.len())
        } else {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = data.len() - 1;
            for (i, d) in closest.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        };
        let center = data[next].clone();
        for (d, p) in closest.iter_mut().zip(data) {
            *d = d.min(squared_distance(p, &center));
        }
        centers.push(center);
    }
    centers
}

fn lloyd(data: &[Vec<f64>], mut centers: Vec<Vec<f64>>, max_iter: usize) -> KMeansFit {
    let dims = data[0].len();
    let mut assignments = vec![usize::MAX; data.len()];

    for _ in 0..max_iter {
        let mut changed = false;
        for (a, p) in assignments.iter_mut().zip(data) {
            let (idx, _) = nearest(p, &centers);
            if *a != idx {
                *a = idx;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0; dims]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (&a, p) in assignments.iter().zip(data) {
            counts[a] += 1;
            for (s, v) in sums[a].iter_mut().zip(p) {
                *s += v;
            }
        }
        // an emptied cluster keeps its previous centre
        for ((center, sum), count) in centers.iter_mut().zip(sums).zip(counts) {
            if count > 0 {
                *center = sum.into_iter().map(|s| s / count as f64).collect();
            }
        }
    }

    let inertia = assignments
        .iter()
        .zip(data)
        .map(|(&a, p)| squared_distance(p, &centers[a]))
        .sum();
    KMeansFit {
        assignments,
        centers,
        inertia,
    }
}

/// Renumber cluster ids by order of first appearance; returns the new ids and
/// the number of distinct clusters used.
pub fn renumber_by_appearance(assignments: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: Vec<Option<usize>> = Vec::new();
    let mut next = 0;
    let renumbered = assignments
        .iter()
        .map(|&a| {
            if a >= mapping.len() {
                mapping.resize(a + 1, None);
            }
            *mapping[a].get_or_insert_with(|| {
                next += 1;
                next - 1
            })
        })
        .collect();
    (renumbered, next)
}
