//! Module for running the two association stages.
//!
//! Stage 1 fits the latent factor model once on mediators ~ exposure and
//! tests it. Stage 2 reuses that fit to test mediators ~ exposure + outcome
//! and keeps only the statistics of the outcome column.
use crate::lfmm::{LatentFactorModel, LatentFactorRegression, ModelError, TestStatistics};
use crate::normalize::{DesignColumn, ExposureDesign, OutcomeSpec};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-mediator statistics of one tested row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationResult {
    pub pvalues: Array1<f64>,
    /// t statistics, present when the tested row is a single predictor
    /// column.
    pub zscores: Option<Array1<f64>>,
    pub fscores: Array1<f64>,
    pub adj_r_squared: Array1<f64>,
    pub gif: f64,
}

impl AssociationResult {
    fn from_row(stats: TestStatistics, row: usize, zscore_row: Option<usize>) -> Self {
        AssociationResult {
            pvalues: stats.pvalues.row(row).to_owned(),
            zscores: zscore_row.map(|r| stats.zscores.row(r).to_owned()),
            fscores: stats.fscores,
            adj_r_squared: stats.adj_r_squared,
            gif: stats.gif[row],
        }
    }
}

/// Stage-1 statistics with one row per exposure design column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerVariableAssociation {
    pub columns: Vec<DesignColumn>,
    /// d x p
    pub pvalues: Array2<f64>,
    /// d x p
    pub zscores: Array2<f64>,
    pub gif: Array1<f64>,
}

impl PerVariableAssociation {
    pub fn pvalues_for(&self, column_id: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c.id == column_id)
            .map(|i| self.pvalues.row(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DesignColumn, ArrayView1<'_, f64>)> {
        self.columns.iter().zip(self.pvalues.rows())
    }
}

#[derive(Debug, Clone)]
pub struct Stage1Output {
    pub model: LatentFactorModel,
    pub global: AssociationResult,
    pub per_variable: Option<PerVariableAssociation>,
}

/// Mediators ~ exposure (+ covariates).
///
/// The latent factor model is fitted once. The omnibus test always runs with
/// the full design; per-variable p-values need a second `test` call because
/// one call only yields one aggregation. With a single design column the
/// second call repeats the omnibus test, so the per-variable entry equals the
/// global result.
pub fn run_stage1<R: LatentFactorRegression + ?Sized>(
    regression: &R,
    mediators: ArrayView2<'_, f64>,
    exposure: &ExposureDesign,
    k: usize,
    covariates: Option<ArrayView2<'_, f64>>,
    each_var_pval: bool,
) -> Result<Stage1Output, ModelError> {
    let x = exposure.matrix.view();
    let single = exposure.ncols() == 1;

    let model = regression.fit(mediators, x, k)?;

    let stats = regression.test(&model, mediators, x, covariates, true, true)?;
    let global = AssociationResult::from_row(stats, 0, single.then_some(0));
    log::info!("Stage 1 omnibus test done, GIF = {:.4}", global.gif);

    let per_variable = if each_var_pval {
        let stats = regression.test(&model, mediators, x, covariates, single, true)?;
        log::info!(
            "Stage 1 per-variable test done for {} design column(s)",
            exposure.ncols()
        );
        Some(PerVariableAssociation {
            columns: exposure.columns.clone(),
            pvalues: stats.pvalues,
            zscores: stats.zscores,
            gif: stats.gif,
        })
    } else {
        None
    };

    Ok(Stage1Output {
        model,
        global,
        per_variable,
    })
}

/// What a Stage-2 predictor column stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorRole {
    Exposure(usize),
    Outcome,
}

/// Predictors `[exposure design | outcome]` with the role of each column.
struct Stage2Design {
    matrix: Array2<f64>,
    roles: Vec<PredictorRole>,
}

impl Stage2Design {
    fn new(exposure: &ExposureDesign, outcome: &OutcomeSpec) -> Result<Self, ModelError> {
        let outcome_col = outcome.values.view().insert_axis(Axis(1));
        let matrix = concatenate(Axis(1), &[exposure.matrix.view(), outcome_col])
            .map_err(|e| ModelError::Dimensions(format!("exposure and outcome: {e}")))?;
        let roles = (0..exposure.ncols())
            .map(PredictorRole::Exposure)
            .chain(std::iter::once(PredictorRole::Outcome))
            .collect();
        Ok(Stage2Design { matrix, roles })
    }

    fn row_of(&self, role: PredictorRole) -> Option<usize> {
        self.roles.iter().position(|&r| r == role)
    }
}

/// Stage-1 covariates extended with the supplementary ones.
fn stage2_covariates(
    covariates: Option<ArrayView2<'_, f64>>,
    suppl_covariates: Option<ArrayView2<'_, f64>>,
) -> Result<Option<Array2<f64>>, ModelError> {
    match (covariates, suppl_covariates) {
        (Some(c), Some(s)) => concatenate(Axis(1), &[c.view(), s.view()])
            .map(Some)
            .map_err(|e| ModelError::Dimensions(format!("covariates and supplementary covariates: {e}"))),
        (Some(c), None) => Ok(Some(c.to_owned())),
        (None, Some(s)) => Ok(Some(s.to_owned())),
        (None, None) => Ok(None),
    }
}

/// Mediators ~ exposure + outcome (+ covariates + supplementary covariates),
/// adjusted for the latent factors fitted in Stage 1.
pub fn run_stage2<R: LatentFactorRegression + ?Sized>(
    regression: &R,
    model: &LatentFactorModel,
    mediators: ArrayView2<'_, f64>,
    exposure: &ExposureDesign,
    outcome: &OutcomeSpec,
    covariates: Option<ArrayView2<'_, f64>>,
    suppl_covariates: Option<ArrayView2<'_, f64>>,
) -> Result<AssociationResult, ModelError> {
    let design = Stage2Design::new(exposure, outcome)?;
    let covariates = stage2_covariates(covariates, suppl_covariates)?;

    let stats = regression.test(
        model,
        mediators,
        design.matrix.view(),
        covariates.as_ref().map(|c| c.view()),
        false,
        true,
    )?;

    for (i, column) in exposure.columns.iter().enumerate() {
        if let Some(r) = design.row_of(PredictorRole::Exposure(i)) {
            log::debug!("Stage 2 exposure column {} GIF = {:.4}", column.id, stats.gif[r]);
        }
    }

    let row = design
        .row_of(PredictorRole::Outcome)
        .ok_or_else(|| ModelError::Dimensions("no outcome column in the Stage 2 design".into()))?;
    let result = AssociationResult::from_row(stats, row, Some(row));
    log::info!("Stage 2 test done, outcome GIF = {:.4}", result.gif);
    Ok(result)
}
