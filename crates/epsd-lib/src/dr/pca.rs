//! Principal component analysis via covariance eigendecomposition.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};

/// Fitted PCA model.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Column-wise principal axes, shape (n_features, n_components),
    /// ordered by decreasing explained variance.
    pub components: Array2<f64>,
    /// Eigenvalue of each retained component.
    pub explained_variance: Vec<f64>,
    mean: Array1<f64>,
}

impl Pca {
    /// Fit on `data` (observations x features). The number of retained
    /// components is capped at the feature count.
    pub fn fit(data: &Array2<f64>, n_components: usize) -> Self {
        let (n, d) = data.dim();
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(d));
        let centered = data - &mean;
        let denom = (n.max(2) - 1) as f64;
        let cov = centered.t().dot(&centered) / denom;

        // nalgebra's symmetric eigensolver; eigenvalues come unordered
        let mut matrix = DMatrix::<f64>::zeros(d, d);
        for i in 0..d {
            for j in 0..d {
                matrix[(i, j)] = cov[[i, j]];
            }
        }
        let eigen = SymmetricEigen::new(matrix);
        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&i, &j| {
            eigen.eigenvalues[j]
                .partial_cmp(&eigen.eigenvalues[i])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let k = n_components.min(d);
        let mut components = Array2::<f64>::zeros((d, k));
        let mut explained_variance = Vec::with_capacity(k);
        for (col, &idx) in order.iter().take(k).enumerate() {
            explained_variance.push(eigen.eigenvalues[idx]);
            for row in 0..d {
                components[[row, col]] = eigen.eigenvectors[(row, idx)];
            }
        }
        Self {
            components,
            explained_variance,
            mean,
        }
    }

    /// Project `data` onto the fitted components.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean).dot(&self.components)
    }
}

/// Fit and project in one step.
pub fn fit_transform(data: &Array2<f64>, n_components: usize) -> Array2<f64> {
    Pca::fit(data, n_components).transform(data)
}
