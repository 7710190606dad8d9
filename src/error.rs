//! Error taxonomy surfaced by `run_as` and its stages.
use crate::lfmm::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediationError {
    #[error("Invalid exposure: {0}")]
    InvalidExposureType(String),
    #[error("Exposure variable '{variable}' has {levels} distinct level(s); a categorical exposure needs at least 2")]
    DegenerateExposure { variable: String, levels: usize },
    #[error("Unsupported outcome: {0}")]
    UnsupportedOutcomeType(String),
    #[error("Invalid mediator matrix: {0}")]
    InvalidMediatorMatrix(String),
    #[error("The number of latent factors K must be provided")]
    MissingLatentFactorCount,
    #[error("The number of latent factors K must be a positive integer, got {0}")]
    InvalidLatentFactorCount(f64),
    #[error("Invalid covariates in '{argument}': {reason}")]
    InvalidCovariates { argument: String, reason: String },
    #[error("Row count mismatch for '{argument}': expected {expected} samples, found {found}")]
    ShapeMismatch {
        argument: String,
        expected: usize,
        found: usize,
    },
    #[error("Latent factor regression failed: {0}")]
    RegressionFitFailure(#[from] ModelError),
    #[error("Could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl MediationError {
    pub(crate) fn shape(argument: &str, expected: usize, found: usize) -> Self {
        MediationError::ShapeMismatch {
            argument: argument.to_string(),
            expected,
            found,
        }
    }

    pub(crate) fn covariates(argument: &str, reason: impl Into<String>) -> Self {
        MediationError::InvalidCovariates {
            argument: argument.to_string(),
            reason: reason.into(),
        }
    }
}
