//! # hdmed
//!
//! Mediator screening for high-dimensional mediation analysis.
//!
//! `run_as` tests every mediator (an omics feature such as a CpG site) for
//! association with an exposure and with an outcome, adjusting both stages
//! for unobserved confounding through a latent factor regression:
//!
//! 1. Stage 1: mediators ~ exposure (+ covariates). The latent factor model
//!    is fitted here, once.
//! 2. Stage 2: mediators ~ exposure + outcome (+ covariates + supplementary
//!    covariates), reusing the Stage-1 factors.
//! 3. Max2: per mediator, `max(p1, p2)²`.
//!
//! Everything ends up in a `Step1Result`, which can be written to disk with
//! bincode and handed to a downstream effect-estimation step.

pub mod association;
pub mod config;
pub mod error;
pub mod genomic_control;
pub mod input;
pub mod lfmm;
pub mod max2;
pub mod normalize;
pub mod result;

#[cfg(test)]
mod testing;

pub use config::AsConfig;
pub use error::MediationError;
pub use input::{AnalysisInput, Column, DataTable, Factor, Mediators, Variable};
pub use lfmm::{LatentFactorModel, LatentFactorRegression, ModelError, RidgeLfmm, TestStatistics};
pub use max2::Max2Result;
pub use result::Step1Result;

use association::{run_stage1, run_stage2};
use max2::{combine, combine_each_var};
use result::{InputRecord, Stage1Association};
use serde::{Deserialize, Serialize};

/// Classification of one exposure variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Continuous,
    Binary,
    Categorical,
}

impl std::str::FromStr for VariableType {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" | "c" => Ok(VariableType::Continuous),
            "binary" | "b" => Ok(VariableType::Binary),
            "categorical" | "cat" => Ok(VariableType::Categorical),
            _ => Err("Unknown variable type. Use 'continuous', 'binary', or 'categorical'."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeType {
    Binary,
    Continuous,
}

impl std::str::FromStr for OutcomeType {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binary" | "b" => Ok(OutcomeType::Binary),
            "continuous" | "c" => Ok(OutcomeType::Continuous),
            _ => Err("Unknown outcome type. Use 'binary' or 'continuous'."),
        }
    }
}

/// Runs both association stages with the ridge latent factor backend and
/// combines them with Max2.
pub fn run_as(input: &AnalysisInput, config: &AsConfig) -> Result<Step1Result, MediationError> {
    let lfmm = RidgeLfmm::new(config.lambda)?;
    run_as_with(&lfmm, input, config)
}

/// Same as [`run_as`] with a caller-supplied regression backend.
///
/// Input validation happens before the backend is called, so malformed
/// inputs never reach it.
pub fn run_as_with<R>(
    regression: &R,
    input: &AnalysisInput,
    config: &AsConfig,
) -> Result<Step1Result, MediationError>
where
    R: LatentFactorRegression + Sync + ?Sized,
{
    match config.n_threads {
        Some(n_threads) => {
            log::info!("Running on a dedicated pool of {} threads", n_threads);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()?;
            pool.install(|| analyse(regression, input, config.each_var_pval))
        }
        None => analyse(regression, input, config.each_var_pval),
    }
}

fn analyse<R: LatentFactorRegression + ?Sized>(
    regression: &R,
    input: &AnalysisInput,
    each_var_pval: bool,
) -> Result<Step1Result, MediationError> {
    let inputs = normalize::normalize(input)?;
    let covariates = inputs.covariates.as_ref().map(|c| c.view());
    let suppl_covariates = inputs.suppl_covariates.as_ref().map(|c| c.view());

    log::info!(
        "Stage 1: {} mediators ~ exposure ({} design column(s)), K = {}",
        inputs.mediators.ncols(),
        inputs.exposure.ncols(),
        inputs.k
    );
    let stage1 = run_stage1(
        regression,
        inputs.mediators,
        &inputs.exposure,
        inputs.k,
        covariates,
        each_var_pval,
    )?;

    log::info!("Stage 2: mediators ~ exposure + outcome");
    let stage2 = run_stage2(
        regression,
        &stage1.model,
        inputs.mediators,
        &inputs.exposure,
        &inputs.outcome,
        covariates,
        suppl_covariates,
    )?;

    let max2 = combine(
        inputs.mediator_ids,
        stage1.global.pvalues.view(),
        stage2.pvalues.view(),
    )?;
    let max2_each_var = stage1
        .per_variable
        .as_ref()
        .map(|per_var| combine_each_var(inputs.mediator_ids, per_var, stage2.pvalues.view()))
        .transpose()?;
    log::info!(
        "Max2 done: {} of {} mediators below 0.05",
        max2.iter().filter(|(_, p)| *p < 0.05).count(),
        max2.len()
    );

    let record = InputRecord {
        exposure: input.exposure.clone(),
        exposure_spec: inputs.exposure.spec,
        exposure_columns: inputs.exposure.columns,
        outcome: input.outcome.clone(),
        outcome_type: inputs.outcome.outcome_type,
        covariates: input.covariates.clone(),
        suppl_covariates: input.suppl_covariates.clone(),
        k: inputs.k,
    };

    Ok(Step1Result::new(
        inputs.mediator_ids.to_vec(),
        Stage1Association {
            result: stage1.global,
            per_variable: stage1.per_variable,
            model: stage1.model,
        },
        stage2,
        max2,
        max2_each_var,
        record,
    ))
}
