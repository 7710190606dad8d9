//! Latent factor mixed model (LFMM) regression.
//!
//! The association stages only see the [`LatentFactorRegression`] trait:
//! `fit` estimates latent confounders from the mediator matrix and the
//! exposure design, `test` runs the per-mediator regressions against a set
//! of predictors while adjusting for those confounders.
//!
//! [`RidgeLfmm`] is the bundled implementation. It estimates the latent
//! factors with a ridge-penalized low-rank decomposition and tests
//! associations with ordinary least squares on `[1 | X | C | U]`.
use crate::genomic_control::{calibrate_fscores, calibrate_zscores};
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use ndarray_linalg::{Eigh, UPLO};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest accepted eigenvalue ratio of a column-scaled Gram matrix.
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Linear algebra error: {0}")]
    LinAlg(String),
    #[error("Design matrix is rank deficient: {0}")]
    RankDeficient(String),
    #[error("Invalid dimensions: {0}")]
    Dimensions(String),
    #[error("Distribution error: {0}")]
    Distribution(String),
    #[error("Latent factor estimation failed: {0}")]
    Convergence(String),
    #[error("Ridge penalty must be finite and positive, got {0}")]
    InvalidPenalty(f64),
}

/// The fitted latent structure shared by both association stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentFactorModel {
    /// Latent factor scores, n x K. These are the confounders entered in
    /// every test regression.
    pub u: Array2<f64>,
    /// Mediator loadings on the latent factors, p x K.
    pub v: Array2<f64>,
    /// Ridge estimates of the exposure effects, p x d.
    pub effect_sizes: Array2<f64>,
    pub k: usize,
    pub lambda: f64,
}

/// Statistics returned by one `test` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStatistics {
    /// One row when testing the full design, otherwise one row per
    /// predictor column; one column per mediator.
    pub pvalues: Array2<f64>,
    /// t statistics of each predictor column, d x p.
    pub zscores: Array2<f64>,
    /// Partial F statistic of all predictor columns, per mediator.
    pub fscores: Array1<f64>,
    pub adj_r_squared: Array1<f64>,
    /// Genomic inflation factor of each p-value row.
    pub gif: Array1<f64>,
}

pub trait LatentFactorRegression {
    fn fit(
        &self,
        response: ArrayView2<'_, f64>,
        predictors: ArrayView2<'_, f64>,
        k: usize,
    ) -> Result<LatentFactorModel, ModelError>;

    fn test(
        &self,
        model: &LatentFactorModel,
        response: ArrayView2<'_, f64>,
        predictors: ArrayView2<'_, f64>,
        covariates: Option<ArrayView2<'_, f64>>,
        full: bool,
        genomic_control: bool,
    ) -> Result<TestStatistics, ModelError>;
}

/// Ridge LFMM estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeLfmm {
    lambda: f64,
}

impl RidgeLfmm {
    pub fn new(lambda: f64) -> Result<Self, ModelError> {
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(ModelError::InvalidPenalty(lambda));
        }
        Ok(RidgeLfmm { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Default for RidgeLfmm {
    fn default() -> Self {
        RidgeLfmm { lambda: 1e-5 }
    }
}

impl LatentFactorRegression for RidgeLfmm {
    fn fit(
        &self,
        response: ArrayView2<'_, f64>,
        predictors: ArrayView2<'_, f64>,
        k: usize,
    ) -> Result<LatentFactorModel, ModelError> {
        let (n, p) = response.dim();
        if predictors.ncols() == 0 {
            return Err(ModelError::Dimensions("no exposure columns to fit".into()));
        }
        if predictors.nrows() != n {
            return Err(ModelError::Dimensions(format!(
                "{} predictor rows for {} samples",
                predictors.nrows(),
                n
            )));
        }
        if k == 0 || k > n.min(p) {
            return Err(ModelError::Dimensions(format!(
                "K = {k} latent factors for a {n} x {p} response"
            )));
        }
        log::info!(
            "Fitting ridge LFMM: {} samples, {} mediators, K = {}, lambda = {}",
            n,
            p,
            k,
            self.lambda
        );

        // 1. Center responses and predictors
        let y = center_columns(response)?;
        let x = center_columns(predictors)?;

        // 2. Projection onto the exposure span, P*A = X (X^T X)^-1 X^T A
        let xtx_inv = gram_inverse(&x)?;
        let project = |a: &Array2<f64>| x.dot(&xtx_inv.dot(&x.t().dot(a)));

        // 3. Shrink the exposure span: Z = (I - a*P) Y
        let shrink = 1.0 - (self.lambda / (self.lambda + 1.0)).sqrt();
        let z = &y - &(project(&y) * shrink);

        // 4. Rank-K decomposition of the shrunken responses
        let (left, singular, loadings) = truncated_svd(&z, k)?;
        log::debug!("Leading singular values: {:?}", singular.to_vec());

        // 5. Scores U = (I - a*P)^-1 u S, using (I - aP)^-1 = I + a/(1-a) P
        let us = &left * &singular;
        let scores = &us + &(project(&us) * (shrink / (1.0 - shrink)));

        // 6. Ridge effect sizes on the confounder-adjusted responses
        let adjusted = &y - &scores.dot(&loadings.t());
        let mut ridge = x.t().dot(&x);
        ridge.diag_mut().mapv_inplace(|v| v + self.lambda);
        let ridge_inv = gram_inverse_of(&ridge)?;
        let effect_sizes = adjusted.t().dot(&x).dot(&ridge_inv);

        Ok(LatentFactorModel {
            u: scores,
            v: loadings,
            effect_sizes,
            k,
            lambda: self.lambda,
        })
    }

    fn test(
        &self,
        model: &LatentFactorModel,
        response: ArrayView2<'_, f64>,
        predictors: ArrayView2<'_, f64>,
        covariates: Option<ArrayView2<'_, f64>>,
        full: bool,
        genomic_control: bool,
    ) -> Result<TestStatistics, ModelError> {
        let (n, p) = response.dim();
        let d = predictors.ncols();
        if d == 0 {
            return Err(ModelError::Dimensions("no predictor columns to test".into()));
        }
        for (what, rows) in [
            ("predictors", predictors.nrows()),
            ("latent factors", model.u.nrows()),
            ("covariates", covariates.map_or(n, |c| c.nrows())),
        ] {
            if rows != n {
                return Err(ModelError::Dimensions(format!(
                    "{rows} {what} rows for {n} samples"
                )));
            }
        }

        let covariates = covariates.and_then(drop_constant_columns);
        let intercept = Array2::<f64>::ones((n, 1));

        // Full design [1 | X | C | U] and null design [1 | C | U]
        let mut full_blocks = vec![intercept.view(), predictors.view()];
        let mut null_blocks = vec![intercept.view()];
        if let Some(c) = &covariates {
            full_blocks.push(c.view());
            null_blocks.push(c.view());
        }
        full_blocks.push(model.u.view());
        null_blocks.push(model.u.view());
        let a1 = concatenate(Axis(1), &full_blocks).map_err(|e| ModelError::Dimensions(e.to_string()))?;
        let a0 = concatenate(Axis(1), &null_blocks).map_err(|e| ModelError::Dimensions(e.to_string()))?;

        if a1.ncols() >= n {
            return Err(ModelError::Dimensions(format!(
                "{} design columns leave no residual degrees of freedom with {} samples",
                a1.ncols(),
                n
            )));
        }
        let df = n - a1.ncols();
        log::debug!("Testing {} mediators against {} predictor(s), residual df = {}", p, d, df);

        let fit1 = OlsFit::new(&a1, response)?;
        let fit0 = OlsFit::new(&a0, response)?;
        let tss = column_sums_of_squares(&center_columns(response)?);

        // t statistics of the predictor columns (rows 1..=d of the coefficients)
        let mut zscores = Array2::zeros((d, p));
        for i in 0..d {
            let unscaled = fit1.gram_inv[[i + 1, i + 1]];
            let coef = fit1.coefficients.row(i + 1);
            for j in 0..p {
                let sigma2 = fit1.rss[j] / df as f64;
                zscores[[i, j]] = coef[j] / (sigma2 * unscaled).sqrt();
            }
        }

        let fscores = Array1::from_shape_fn(p, |j| {
            ((fit0.rss[j] - fit1.rss[j]) / d as f64) / (fit1.rss[j] / df as f64)
        });
        let adj_r_squared = Array1::from_shape_fn(p, |j| {
            1.0 - (fit1.rss[j] / df as f64) / (tss[j] / (n - 1) as f64)
        });

        let (pvalues, gif) = if full {
            let (pv, gif) = calibrate_fscores(fscores.view(), d, df, genomic_control)?;
            (pv.insert_axis(Axis(0)), Array1::from_elem(1, gif))
        } else {
            let mut pv = Array2::zeros((d, p));
            let mut gif = Array1::zeros(d);
            for i in 0..d {
                let (row, g) = calibrate_zscores(zscores.row(i), genomic_control)?;
                pv.row_mut(i).assign(&row);
                gif[i] = g;
            }
            (pv, gif)
        };

        Ok(TestStatistics {
            pvalues,
            zscores,
            fscores,
            adj_r_squared,
            gif,
        })
    }
}

/// Least squares fit of every response column on one shared design.
struct OlsFit {
    coefficients: Array2<f64>,
    gram_inv: Array2<f64>,
    rss: Array1<f64>,
}

impl OlsFit {
    fn new(design: &Array2<f64>, response: ArrayView2<'_, f64>) -> Result<Self, ModelError> {
        let gram_inv = gram_inverse(design)?;
        let coefficients = gram_inv.dot(&design.t().dot(&response));
        let residuals = &response - &design.dot(&coefficients);
        let rss = column_sums_of_squares(&residuals);
        Ok(OlsFit {
            coefficients,
            gram_inv,
            rss,
        })
    }
}

fn column_sums_of_squares(a: &Array2<f64>) -> Array1<f64> {
    let sums: Vec<f64> = (0..a.ncols())
        .into_par_iter()
        .map(|j| a.column(j).iter().map(|v| v * v).sum())
        .collect();
    Array1::from_vec(sums)
}

fn center_columns(a: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
    let means = a
        .mean_axis(Axis(0))
        .ok_or_else(|| ModelError::Dimensions("cannot center a matrix with no rows".into()))?;
    Ok(&a - &means)
}

/// Removes covariate columns that carry no information beyond the intercept.
fn drop_constant_columns(covariates: ArrayView2<'_, f64>) -> Option<Array2<f64>> {
    let keep: Vec<usize> = (0..covariates.ncols())
        .filter(|&j| {
            let col = covariates.column(j);
            let constant = col.iter().all(|&v| v == col[0]);
            if constant {
                log::warn!("Dropping constant covariate column {}", j + 1);
            }
            !constant
        })
        .collect();
    if keep.is_empty() {
        None
    } else {
        Some(covariates.select(Axis(1), &keep))
    }
}

/// (A^T A)^-1 with a rank check.
fn gram_inverse(a: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
    gram_inverse_of(&a.t().dot(a))
}

/// Inverse of a symmetric positive semi-definite matrix. The matrix is
/// scaled to unit diagonal before the eigen decomposition so the rank check
/// does not depend on column units.
fn gram_inverse_of(gram: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
    if let Some(j) = gram.diag().iter().position(|&v| v <= 0.0) {
        return Err(ModelError::RankDeficient(format!("column {} is identically zero", j + 1)));
    }
    let scale = gram.diag().mapv(|v| 1.0 / v.sqrt());
    let scaled = gram * &scale.view().insert_axis(Axis(1)) * &scale.view().insert_axis(Axis(0));

    let (eigvals, eigvecs) = scaled
        .eigh(UPLO::Lower)
        .map_err(|e| ModelError::LinAlg(e.to_string()))?;
    let largest = eigvals[eigvals.len() - 1];
    if eigvals[0] <= largest * RANK_TOLERANCE {
        return Err(ModelError::RankDeficient(format!(
            "condition ratio {:.3e} below {:.0e}",
            eigvals[0] / largest,
            RANK_TOLERANCE
        )));
    }

    let inv_scaled = (&eigvecs / &eigvals).dot(&eigvecs.t());
    Ok(inv_scaled * &scale.view().insert_axis(Axis(1)) * &scale.view().insert_axis(Axis(0)))
}

/// Leading `k` singular triplets of `z`, from the eigen decomposition of the
/// smaller of `Z Z^T` and `Z^T Z`.
fn truncated_svd(
    z: &Array2<f64>,
    k: usize,
) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>), ModelError> {
    let (n, p) = z.dim();
    let wide = n <= p;
    let gram = if wide { z.dot(&z.t()) } else { z.t().dot(z) };
    let (eigvals, eigvecs) = gram
        .eigh(UPLO::Lower)
        .map_err(|e| ModelError::LinAlg(e.to_string()))?;

    // eigh returns ascending eigenvalues
    let m = eigvals.len();
    let order: Vec<usize> = (m - k..m).rev().collect();
    let singular: Array1<f64> = order.iter().map(|&i| eigvals[i].max(0.0).sqrt()).collect();
    if singular[0] == 0.0 || singular[k - 1] <= singular[0] * 1e-12 {
        return Err(ModelError::Convergence(format!(
            "residual mediator matrix has rank below K = {k}"
        )));
    }

    let top = eigvecs.select(Axis(1), &order);
    let other = (if wide { z.t().dot(&top) } else { z.dot(&top) }) / &singular;
    if wide {
        Ok((top, singular, other))
    } else {
        Ok((other, singular, top))
    }
}
