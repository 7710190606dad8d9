//! Max-squared combination of the two stage p-values.
//!
//! A mediator is only supported when both paths are significant, so the
//! joint p-value is bounded by the larger of the two and squared.
use crate::association::PerVariableAssociation;
use crate::error::MediationError;
use crate::normalize::DesignColumn;
use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// `max(p1, p2)²`; `NaN` when either input is `NaN`.
pub fn max_squared(p1: f64, p2: f64) -> f64 {
    if p1.is_nan() || p2.is_nan() {
        return f64::NAN;
    }
    let m = p1.max(p2);
    m * m
}

/// Combined p-values keyed by mediator identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Max2Result {
    mediator_ids: Vec<String>,
    pvalues: Array1<f64>,
}

impl Max2Result {
    pub fn mediator_ids(&self) -> &[String] {
        &self.mediator_ids
    }

    pub fn pvalues(&self) -> ArrayView1<'_, f64> {
        self.pvalues.view()
    }

    pub fn len(&self) -> usize {
        self.pvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pvalues.is_empty()
    }

    /// Scans the identifiers, so each call is linear in the number of
    /// mediators. Build [`Max2Result::lookup`] once for repeated queries.
    pub fn get(&self, mediator_id: &str) -> Option<f64> {
        self.mediator_ids
            .iter()
            .position(|id| id == mediator_id)
            .map(|j| self.pvalues[j])
    }

    /// Hashed identifier to p-value map.
    pub fn lookup(&self) -> HashMap<&str, f64> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.mediator_ids
            .iter()
            .map(String::as_str)
            .zip(self.pvalues.iter().copied())
    }

    /// Mediators by increasing p-value, `NaN` last.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
            (false, false) => a.1.total_cmp(&b.1),
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
        });
        ranked
    }
}

/// Combines Stage-1 and Stage-2 p-values mediator by mediator.
pub fn combine(
    mediator_ids: &[String],
    stage1: ArrayView1<'_, f64>,
    stage2: ArrayView1<'_, f64>,
) -> Result<Max2Result, MediationError> {
    if stage1.len() != mediator_ids.len() {
        return Err(MediationError::shape("stage 1 p-values", mediator_ids.len(), stage1.len()));
    }
    if stage2.len() != mediator_ids.len() {
        return Err(MediationError::shape("stage 2 p-values", mediator_ids.len(), stage2.len()));
    }
    let pvalues = Zip::from(&stage1)
        .and(&stage2)
        .map_collect(|&p1, &p2| max_squared(p1, p2));
    Ok(Max2Result {
        mediator_ids: mediator_ids.to_vec(),
        pvalues,
    })
}

/// Max2 of one exposure design column against the Stage-2 outcome p-values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMax2 {
    pub column: DesignColumn,
    pub max2: Max2Result,
}

pub fn combine_each_var(
    mediator_ids: &[String],
    per_variable: &PerVariableAssociation,
    stage2: ArrayView1<'_, f64>,
) -> Result<Vec<VariableMax2>, MediationError> {
    per_variable
        .iter()
        .map(|(column, pvalues)| {
            Ok(VariableMax2 {
                column: column.clone(),
                max2: combine(mediator_ids, pvalues, stage2)?,
            })
        })
        .collect()
}
