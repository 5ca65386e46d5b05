//! Uniform manifold approximation and projection.
//!
//! Compact UMAP: an exact Euclidean k-NN graph, smooth-kNN calibration
//! of per-point bandwidths, a symmetrized fuzzy union, and the standard
//! attraction/repulsion SGD with negative sampling. The exact neighbor
//! search is quadratic in the number of epochs, which is ample for
//! per-subject session data.

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Curve coefficients fitted for min_dist = 0.1, spread = 1.0.
const CURVE_A: f64 = 1.576_943_460_405_378;
const CURVE_B: f64 = 0.895_060_878_122_785_9;

const INIT_RANGE: f64 = 10.0;
const GRAD_CLIP: f64 = 4.0;
const MIN_SIGMA: f64 = 1e-3;

#[derive(Debug, Clone, Copy)]
pub struct UmapParams {
    /// Output dimensionality of the embedding.
    pub n_components: usize,
    pub n_neighbors: usize,
    pub seed: u64,
    /// SGD epochs over the edge set.
    pub n_iters: usize,
    pub learning_rate: f64,
    pub negative_samples: usize,
}

impl UmapParams {
    pub fn new(n_components: usize, n_neighbors: usize, seed: u64) -> Self {
        Self {
            n_components,
            n_neighbors,
            seed,
            n_iters: 200,
            learning_rate: 1.0,
            negative_samples: 5,
        }
    }
}

/// Embed `data` (observations x features) into `params.n_components`
/// dimensions. Deterministic for a fixed seed.
pub fn embed(data: &Array2<f64>, params: &UmapParams) -> Array2<f64> {
    let n = data.nrows();
    if n == 0 {
        return Array2::zeros((0, params.n_components));
    }
    let k = params.n_neighbors.min(n.saturating_sub(1)).max(1);

    let (neighbors, distances) = knn(data, k);
    let weights = smooth_knn_weights(&distances, k);
    let edges = symmetrize(&neighbors, &weights, n);
    optimize(n, &edges, params)
}

/// Exact k nearest neighbors per row, excluding the row itself.
fn knn(data: &Array2<f64>, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let n = data.nrows();
    let mut neighbors = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);
    for i in 0..n {
        let row_i = data.row(i);
        let mut candidates: Vec<(f64, usize)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| {
                let d: f64 = row_i
                    .iter()
                    .zip(data.row(j).iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (d.sqrt(), j)
            })
            .collect();
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(k);
        neighbors.push(candidates.iter().map(|(_, j)| *j).collect());
        distances.push(candidates.iter().map(|(d, _)| *d).collect());
    }
    (neighbors, distances)
}

/// Per-point membership strengths via the smooth-kNN bandwidth search.
fn smooth_knn_weights(distances: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let target = (k as f64).log2().max(f64::MIN_POSITIVE);
    distances
        .iter()
        .map(|dists| {
            let rho = dists
                .iter()
                .copied()
                .find(|d| *d > 0.0)
                .unwrap_or(0.0);
            let sigma = solve_sigma(dists, rho, target);
            dists
                .iter()
                .map(|d| (-((d - rho).max(0.0)) / sigma).exp())
                .collect()
        })
        .collect()
}

fn solve_sigma(dists: &[f64], rho: f64, target: f64) -> f64 {
    let mut lo = 0.0;
    let mut hi = f64::INFINITY;
    let mut mid = 1.0;
    for _ in 0..64 {
        let sum: f64 = dists
            .iter()
            .map(|d| (-((d - rho).max(0.0)) / mid).exp())
            .sum();
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }
    mid.max(MIN_SIGMA)
}

/// Fuzzy union of the directed graph: w = a + b - a*b.
fn symmetrize(neighbors: &[Vec<usize>], weights: &[Vec<f64>], n: usize) -> Vec<(usize, usize, f64)> {
    let mut directed = std::collections::HashMap::new();
    for (i, (nbrs, ws)) in neighbors.iter().zip(weights.iter()).enumerate() {
        for (&j, &w) in nbrs.iter().zip(ws.iter()) {
            directed.insert((i, j), w);
        }
    }
    let mut edges = Vec::new();
    for i in 0..n {
        for (&j, &w_ij) in neighbors[i].iter().zip(weights[i].iter()) {
            if j < i && directed.contains_key(&(j, i)) {
                continue; // handled from the other endpoint
            }
            let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
            let w = w_ij + w_ji - w_ij * w_ji;
            if w > 0.0 {
                edges.push((i, j, w));
            }
        }
    }
    edges
}

/// Weighted-edge SGD layout with negative sampling.
fn optimize(n: usize, edges: &[(usize, usize, f64)], params: &UmapParams) -> Array2<f64> {
    let dim = params.n_components;
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut embedding = Array2::from_shape_fn((n, dim), |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
    if edges.is_empty() {
        return embedding;
    }

    let max_weight = edges
        .iter()
        .map(|(_, _, w)| *w)
        .fold(f64::MIN_POSITIVE, f64::max);
    // an edge with weight w is applied every max_weight / w iterations
    let epochs_per_sample: Vec<f64> = edges.iter().map(|(_, _, w)| max_weight / w).collect();
    let mut next_due: Vec<f64> = epochs_per_sample.clone();

    for iter in 1..=params.n_iters {
        let alpha = params.learning_rate * (1.0 - iter as f64 / params.n_iters as f64);
        for (e, &(i, j, _)) in edges.iter().enumerate() {
            if next_due[e] > iter as f64 {
                continue;
            }
            next_due[e] += epochs_per_sample[e];
            apply_attraction(&mut embedding, i, j, alpha);
            for _ in 0..params.negative_samples {
                let other = rng.gen_range(0..n);
                if other == i {
                    continue;
                }
                apply_repulsion(&mut embedding, i, other, alpha);
            }
        }
    }
    embedding
}

fn apply_attraction(embedding: &mut Array2<f64>, i: usize, j: usize, alpha: f64) {
    let dim = embedding.ncols();
    let mut d2 = 0.0;
    for c in 0..dim {
        let diff = embedding[[i, c]] - embedding[[j, c]];
        d2 += diff * diff;
    }
    if d2 <= 0.0 {
        return;
    }
    let coeff = (-2.0 * CURVE_A * CURVE_B * d2.powf(CURVE_B - 1.0))
        / (1.0 + CURVE_A * d2.powf(CURVE_B));
    for c in 0..dim {
        let grad = clip(coeff * (embedding[[i, c]] - embedding[[j, c]])) * alpha;
        embedding[[i, c]] += grad;
        embedding[[j, c]] -= grad;
    }
}

fn apply_repulsion(embedding: &mut Array2<f64>, i: usize, j: usize, alpha: f64) {
    let dim = embedding.ncols();
    let mut d2 = 0.0;
    for c in 0..dim {
        let diff = embedding[[i, c]] - embedding[[j, c]];
        d2 += diff * diff;
    }
    let coeff = (2.0 * CURVE_B) / ((0.001 + d2) * (1.0 + CURVE_A * d2.powf(CURVE_B)));
    for c in 0..dim {
        let grad = clip(coeff * (embedding[[i, c]] - embedding[[j, c]])) * alpha;
        embedding[[i, c]] += grad;
    }
}

fn clip(value: f64) -> f64 {
    value.clamp(-GRAD_CLIP, GRAD_CLIP)
}
