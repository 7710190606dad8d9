//! Genomic control: rescales association statistics by an inflation factor
//! estimated from the median of their empirical distribution, then converts
//! them to upper-tail p-values.
use crate::lfmm::ModelError;
use ndarray::{Array1, ArrayView1};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

/// Median of the finite values, `NaN` when there are none.
pub fn median<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    }
}

fn upper_tail<D: ContinuousCDF<f64, f64>>(dist: &D, x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x == f64::INFINITY {
        0.0
    } else if x <= 0.0 {
        1.0
    } else {
        dist.sf(x)
    }
}

/// Calibrates z-scores against χ²₁. Returns the p-values and the inflation
/// factor (1 when `genomic_control` is off).
pub fn calibrate_zscores(
    zscores: ArrayView1<'_, f64>,
    genomic_control: bool,
) -> Result<(Array1<f64>, f64), ModelError> {
    let chi2 = ChiSquared::new(1.0).map_err(|e| ModelError::Distribution(e.to_string()))?;
    let squared = zscores.mapv(|z| z * z);
    let gif = if genomic_control {
        median(squared.iter().copied()) / chi2.inverse_cdf(0.5)
    } else {
        1.0
    };
    let pvalues = squared.mapv(|s| upper_tail(&chi2, s / gif));
    Ok((pvalues, gif))
}

/// Calibrates partial F statistics against F(df1, df2).
pub fn calibrate_fscores(
    fscores: ArrayView1<'_, f64>,
    df1: usize,
    df2: usize,
    genomic_control: bool,
) -> Result<(Array1<f64>, f64), ModelError> {
    let f = FisherSnedecor::new(df1 as f64, df2 as f64)
        .map_err(|e| ModelError::Distribution(e.to_string()))?;
    let gif = if genomic_control {
        median(fscores.iter().copied()) / f.inverse_cdf(0.5)
    } else {
        1.0
    };
    let pvalues = fscores.mapv(|s| upper_tail(&f, s / gif));
    Ok((pvalues, gif))
}
