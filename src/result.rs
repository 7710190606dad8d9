//! The record returned by `run_as`.
//!
//! `Step1Result` bundles both association stages, the Max2 combination and a
//! copy of the analysed inputs. It is serialized with bincode so a later step
//! can pick it up from disk, the same way a fitted model travels between
//! pipeline steps.
use crate::association::{AssociationResult, PerVariableAssociation};
use crate::error::MediationError;
use crate::input::{DataTable, Variable};
use crate::lfmm::LatentFactorModel;
use crate::max2::{Max2Result, VariableMax2};
use crate::normalize::{DesignColumn, ExposureSpec};
use crate::OutcomeType;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Stage-1 statistics with the latent factor fit they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Association {
    pub result: AssociationResult,
    pub per_variable: Option<PerVariableAssociation>,
    pub model: LatentFactorModel,
}

impl Stage1Association {
    /// Latent factor scores, n x K.
    pub fn u(&self) -> &Array2<f64> {
        &self.model.u
    }

    /// Mediator loadings, p x K.
    pub fn v(&self) -> &Array2<f64> {
        &self.model.v
    }
}

/// The inputs as they were analysed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub exposure: Variable,
    pub exposure_spec: ExposureSpec,
    pub exposure_columns: Vec<DesignColumn>,
    pub outcome: Variable,
    pub outcome_type: OutcomeType,
    pub covariates: Option<DataTable>,
    pub suppl_covariates: Option<DataTable>,
    pub k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step1Result {
    mediator_ids: Vec<String>,
    as_1: Stage1Association,
    as_2: AssociationResult,
    max2: Max2Result,
    max2_each_var: Option<Vec<VariableMax2>>,
    input: InputRecord,
}

impl Step1Result {
    pub(crate) fn new(
        mediator_ids: Vec<String>,
        as_1: Stage1Association,
        as_2: AssociationResult,
        max2: Max2Result,
        max2_each_var: Option<Vec<VariableMax2>>,
        input: InputRecord,
    ) -> Self {
        Step1Result {
            mediator_ids,
            as_1,
            as_2,
            max2,
            max2_each_var,
            input,
        }
    }

    pub fn mediator_ids(&self) -> &[String] {
        &self.mediator_ids
    }

    /// Mediators ~ exposure.
    pub fn as_1(&self) -> &Stage1Association {
        &self.as_1
    }

    /// Mediators ~ exposure + outcome, outcome row.
    pub fn as_2(&self) -> &AssociationResult {
        &self.as_2
    }

    pub fn max2(&self) -> &Max2Result {
        &self.max2
    }

    /// One Max2 result per exposure design column, when per-variable
    /// p-values were requested.
    pub fn max2_each_var(&self) -> Option<&[VariableMax2]> {
        self.max2_each_var.as_deref()
    }

    pub fn input(&self) -> &InputRecord {
        &self.input
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), MediationError> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, MediationError> {
        Ok(bincode::deserialize_from(reader)?)
    }
}
