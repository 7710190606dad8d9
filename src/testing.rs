//! Simulated data shared by the unit tests.
use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

pub(crate) struct Simulation {
    pub mediators: Array2<f64>,
    /// Balanced binary exposure, n x 1.
    pub exposure: Array2<f64>,
    pub outcome: Array1<f64>,
    pub confounders: Array2<f64>,
    /// Mediators affected by the exposure and affecting the outcome.
    pub causal: Vec<usize>,
}

/// `M = x b^T + W L^T + E` with a handful of causal mediators driving a
/// continuous outcome.
pub(crate) fn simulate(n: usize, p: usize, k: usize, seed: u64) -> Simulation {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();

    let exposure = Array2::from_shape_fn((n, 1), |(i, _)| (i % 2) as f64);
    let confounders = Array2::from_shape_fn((n, k), |_| normal.sample(&mut rng));
    let loadings = Array2::from_shape_fn((p, k), |_| normal.sample(&mut rng));
    let causal: Vec<usize> = (0..(p / 20).max(2).min(p)).collect();

    let mut mediators = confounders.dot(&loadings.t());
    mediators.mapv_inplace(|v| v + normal.sample(&mut rng));
    for &j in &causal {
        let mut col = mediators.column_mut(j);
        col.scaled_add(2.0, &exposure.column(0));
    }

    let mut outcome = Array1::from_shape_fn(n, |_| normal.sample(&mut rng));
    for &j in &causal {
        outcome.scaled_add(0.5, &mediators.column(j));
    }

    Simulation {
        mediators,
        exposure,
        outcome,
        confounders,
        causal,
    }
}
