//! Input normalization: classifies the exposure and outcome once, expands
//! them into numeric design matrices and validates every shape before any
//! regression is attempted.
use crate::error::MediationError;
use crate::input::{AnalysisInput, Column, DataTable, Factor, Mediators, StorageType, Variable};
use crate::{OutcomeType, VariableType};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Describes one column of the expanded exposure design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignColumn {
    /// Synthetic identifier (`Var_1`, `Var_2`, …) in design order.
    pub id: String,
    /// Name of the exposure variable the column was expanded from.
    pub variable: String,
    /// Indicator level for categorical expansions.
    pub level: Option<String>,
}

/// A single classified exposure variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureVariable {
    pub name: String,
    pub storage: StorageType,
    pub var_type: VariableType,
    /// Canonical level order, reference level first. Categorical only.
    pub levels: Option<Vec<String>>,
    /// Carried over from an ordered factor. Levels are still expanded as
    /// unordered indicators.
    pub ordered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExposureSpec {
    Continuous(ExposureVariable),
    Binary(ExposureVariable),
    Categorical(ExposureVariable),
    Multivariate(Vec<ExposureVariable>),
}

impl ExposureSpec {
    fn scalar(variable: ExposureVariable) -> Self {
        match variable.var_type {
            VariableType::Continuous => ExposureSpec::Continuous(variable),
            VariableType::Binary => ExposureSpec::Binary(variable),
            VariableType::Categorical => ExposureSpec::Categorical(variable),
        }
    }

    pub fn variables(&self) -> &[ExposureVariable] {
        match self {
            ExposureSpec::Continuous(v) | ExposureSpec::Binary(v) | ExposureSpec::Categorical(v) => {
                std::slice::from_ref(v)
            }
            ExposureSpec::Multivariate(vars) => vars,
        }
    }

    pub fn is_multivariate(&self) -> bool {
        matches!(self, ExposureSpec::Multivariate(_))
    }
}

/// The resolved exposure: its classification plus the n × d design matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureDesign {
    pub spec: ExposureSpec,
    pub matrix: Array2<f64>,
    pub columns: Vec<DesignColumn>,
}

impl ExposureDesign {
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSpec {
    pub outcome_type: OutcomeType,
    pub storage: StorageType,
    pub values: Array1<f64>,
}

/// Validated inputs ready for the two association stages.
#[derive(Debug)]
pub struct NormalizedInputs<'a> {
    pub exposure: ExposureDesign,
    pub outcome: OutcomeSpec,
    pub mediators: ArrayView2<'a, f64>,
    pub mediator_ids: &'a [String],
    pub k: usize,
    pub covariates: Option<Array2<f64>>,
    pub suppl_covariates: Option<Array2<f64>>,
}

pub fn normalize(input: &AnalysisInput) -> Result<NormalizedInputs<'_>, MediationError> {
    let mediators = validate_mediators(&input.mediators)?;
    let n = mediators.nrows();

    let exposure = classify_exposure(&input.exposure, n)?;
    let outcome = classify_outcome(&input.outcome, n)?;
    let k = resolve_k(input.k)?;

    let covariates = input
        .covariates
        .as_ref()
        .map(|t| covariate_matrix(t, "covar", n))
        .transpose()?;
    let suppl_covariates = input
        .suppl_covariates
        .as_ref()
        .map(|t| covariate_matrix(t, "suppl_covar", n))
        .transpose()?;

    log::debug!(
        "Normalized inputs: {} samples, {} mediators, {} exposure design column(s), K = {}",
        n,
        mediators.ncols(),
        exposure.ncols(),
        k
    );

    Ok(NormalizedInputs {
        exposure,
        outcome,
        mediators,
        mediator_ids: &input.mediators.ids,
        k,
        covariates,
        suppl_covariates,
    })
}

fn validate_mediators(mediators: &Mediators) -> Result<ArrayView2<'_, f64>, MediationError> {
    let (n, p) = mediators.values.dim();
    if n == 0 || p == 0 {
        return Err(MediationError::InvalidMediatorMatrix(format!(
            "expected a non-empty matrix, got {n} x {p}"
        )));
    }
    if mediators.ids.len() != p {
        return Err(MediationError::InvalidMediatorMatrix(format!(
            "{} identifiers for {} columns",
            mediators.ids.len(),
            p
        )));
    }
    let n_missing = mediators.values.iter().filter(|v| !v.is_finite()).count();
    if n_missing > 0 {
        return Err(MediationError::InvalidMediatorMatrix(format!(
            "{n_missing} missing or non-finite value(s)"
        )));
    }
    let mut seen = HashSet::with_capacity(p);
    if let Some(dup) = mediators.ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(MediationError::InvalidMediatorMatrix(format!(
            "duplicated identifier '{dup}'"
        )));
    }
    Ok(mediators.values.view())
}

fn resolve_k(k: Option<f64>) -> Result<usize, MediationError> {
    let k = k.ok_or(MediationError::MissingLatentFactorCount)?;
    if !k.is_finite() || k.trunc() < 1.0 {
        return Err(MediationError::InvalidLatentFactorCount(k));
    }
    if k.fract() != 0.0 {
        log::warn!("K = {} is not an integer, truncating to {}", k, k.trunc());
    }
    Ok(k.trunc() as usize)
}

/// Classifies the exposure and builds its design matrix.
pub fn classify_exposure(exposure: &Variable, n: usize) -> Result<ExposureDesign, MediationError> {
    let (spec, blocks) = match exposure {
        Variable::Table(table) if table.ncols() > 1 => {
            log::info!("Exposure is a table of {} variables: multivariate", table.ncols());
            let mut variables = Vec::with_capacity(table.ncols());
            let mut blocks = Vec::with_capacity(table.ncols());
            for col in &table.columns {
                let (variable, block) =
                    classify_column(&col.name, &col.column, n, &format!("exposure${}", col.name))?;
                variables.push(variable);
                blocks.push(block);
            }
            (ExposureSpec::Multivariate(variables), blocks)
        }
        Variable::Table(table) => {
            let col = table.columns.first().ok_or_else(|| {
                MediationError::InvalidExposureType("exposure table has no columns".into())
            })?;
            log::info!("Exposure is a single-column table, classified by its column");
            let (variable, block) = classify_column(&col.name, &col.column, n, "exposure")?;
            (ExposureSpec::scalar(variable), vec![block])
        }
        Variable::Vector(column) => {
            let (variable, block) = classify_column("exposure", column, n, "exposure")?;
            (ExposureSpec::scalar(variable), vec![block])
        }
    };

    let d: usize = blocks.iter().map(|b| b.values.ncols()).sum();
    let mut matrix = Array2::zeros((n, d));
    let mut columns = Vec::with_capacity(d);
    let mut offset = 0;
    for block in blocks {
        for (j, level) in block.levels.into_iter().enumerate() {
            matrix.column_mut(offset + j).assign(&block.values.column(j));
            columns.push(DesignColumn {
                id: format!("Var_{}", offset + j + 1),
                variable: block.variable.clone(),
                level,
            });
        }
        offset += block.values.ncols();
    }

    Ok(ExposureDesign {
        spec,
        matrix,
        columns,
    })
}

/// Design columns contributed by one exposure variable.
struct DesignBlock {
    variable: String,
    values: Array2<f64>,
    levels: Vec<Option<String>>,
}

fn classify_column(
    name: &str,
    column: &Column,
    n: usize,
    argument: &str,
) -> Result<(ExposureVariable, DesignBlock), MediationError> {
    if column.is_empty() {
        return Err(MediationError::InvalidExposureType(format!(
            "'{name}' has no values"
        )));
    }
    if column.len() != n {
        return Err(MediationError::shape(argument, n, column.len()));
    }
    let storage = column.storage();

    let categorical = match column {
        Column::Character(values) => Some(levels_from_labels(values)),
        Column::Factor(factor) => Some(levels_from_factor(name, factor)?),
        _ => None,
    };

    if let Some((levels, codes)) = categorical {
        if levels.len() < 2 {
            return Err(MediationError::DegenerateExposure {
                variable: name.to_string(),
                levels: levels.len(),
            });
        }
        log::info!(
            "Exposure '{}' is categorical with {} levels, reference level '{}'",
            name,
            levels.len(),
            levels[0]
        );
        let mut values = Array2::zeros((n, levels.len() - 1));
        for (i, &code) in codes.iter().enumerate() {
            if code > 0 {
                values[[i, code - 1]] = 1.0;
            }
        }
        let block = DesignBlock {
            variable: name.to_string(),
            values,
            levels: levels[1..].iter().cloned().map(Some).collect(),
        };
        let variable = ExposureVariable {
            name: name.to_string(),
            storage,
            var_type: VariableType::Categorical,
            levels: Some(levels),
            ordered: matches!(column, Column::Factor(f) if f.ordered),
        };
        return Ok((variable, block));
    }

    let values = numeric_values(column).ok_or_else(|| {
        MediationError::InvalidExposureType(format!("'{name}' contains missing values"))
    })?;
    let var_type = if is_binary(&values) {
        VariableType::Binary
    } else {
        VariableType::Continuous
    };
    log::info!("Exposure '{}' is {:?} ({:?} storage)", name, var_type, storage);

    let block = DesignBlock {
        variable: name.to_string(),
        values: values.insert_axis(ndarray::Axis(1)),
        levels: vec![None],
    };
    let variable = ExposureVariable {
        name: name.to_string(),
        storage,
        var_type,
        levels: None,
        ordered: false,
    };
    Ok((variable, block))
}

/// Sorted distinct labels, and each sample's index into them.
fn levels_from_labels(values: &[String]) -> (Vec<String>, Vec<usize>) {
    let index: BTreeMap<&str, usize> = values
        .iter()
        .map(String::as_str)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, l)| (l, i))
        .collect();
    let codes = values.iter().map(|v| index[v.as_str()]).collect();
    let levels = index.keys().map(|l| l.to_string()).collect();
    (levels, codes)
}

/// Declared level order with unused levels dropped.
fn levels_from_factor(
    name: &str,
    factor: &Factor,
) -> Result<(Vec<String>, Vec<usize>), MediationError> {
    if let Some(&bad) = factor.codes.iter().find(|&&c| c >= factor.levels.len()) {
        return Err(MediationError::InvalidExposureType(format!(
            "factor '{}' has code {} outside its {} levels",
            name,
            bad,
            factor.levels.len()
        )));
    }
    let mut used = vec![false; factor.levels.len()];
    for &c in &factor.codes {
        used[c] = true;
    }
    let mut remap = vec![0; factor.levels.len()];
    let mut levels = Vec::new();
    for (i, level) in factor.levels.iter().enumerate() {
        if used[i] {
            remap[i] = levels.len();
            levels.push(level.clone());
        }
    }
    let codes = factor.codes.iter().map(|&c| remap[c]).collect();
    Ok((levels, codes))
}

/// Numeric view of a numeric, integer or logical column; `None` when a value
/// is missing or the column is not numeric.
fn numeric_values(column: &Column) -> Option<Array1<f64>> {
    match column {
        Column::Numeric(v) if v.iter().all(|x| x.is_finite()) => Some(Array1::from_vec(v.clone())),
        Column::Integer(v) => Some(v.iter().map(|&x| x as f64).collect()),
        Column::Logical(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
        _ => None,
    }
}

fn is_binary(values: &Array1<f64>) -> bool {
    values.iter().all(|&v| v == 0.0 || v == 1.0)
}

pub fn classify_outcome(outcome: &Variable, n: usize) -> Result<OutcomeSpec, MediationError> {
    let column = match outcome {
        Variable::Vector(column) => column,
        Variable::Table(table) if table.ncols() == 1 => &table.columns[0].column,
        Variable::Table(table) => {
            return Err(MediationError::UnsupportedOutcomeType(format!(
                "outcome must be a single column, got {}",
                table.ncols()
            )))
        }
    };
    let storage = column.storage();
    if matches!(storage, StorageType::Character | StorageType::Factor) {
        return Err(MediationError::UnsupportedOutcomeType(format!(
            "{storage:?} outcome, expected logical or numeric values"
        )));
    }
    if column.is_empty() {
        return Err(MediationError::UnsupportedOutcomeType("outcome has no values".into()));
    }
    if column.len() != n {
        return Err(MediationError::shape("outcome", n, column.len()));
    }
    let values = numeric_values(column).ok_or_else(|| {
        MediationError::UnsupportedOutcomeType("outcome contains missing values".into())
    })?;

    let outcome_type = if storage == StorageType::Logical || is_binary(&values) {
        OutcomeType::Binary
    } else {
        OutcomeType::Continuous
    };
    log::info!("Outcome is {:?} ({:?} storage)", outcome_type, storage);

    Ok(OutcomeSpec {
        outcome_type,
        storage,
        values,
    })
}

fn covariate_matrix(
    table: &DataTable,
    argument: &str,
    n: usize,
) -> Result<Array2<f64>, MediationError> {
    if table.ncols() == 0 {
        return Err(MediationError::covariates(argument, "no columns"));
    }
    let mut matrix = Array2::zeros((n, table.ncols()));
    for (j, col) in table.columns.iter().enumerate() {
        if col.column.len() != n {
            return Err(MediationError::shape(argument, n, col.column.len()));
        }
        let values = match &col.column {
            Column::Numeric(_) | Column::Integer(_) => numeric_values(&col.column),
            other => {
                return Err(MediationError::covariates(
                    argument,
                    format!("column '{}' is {:?}, expected numeric", col.name, other.storage()),
                ))
            }
        }
        .ok_or_else(|| {
            MediationError::covariates(argument, format!("column '{}' has missing values", col.name))
        })?;
        matrix.column_mut(j).assign(&values);
    }
    log::debug!("{}: {} x {} covariate matrix", argument, n, table.ncols());
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Mediators;
    use ndarray::array;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn input_with(exposure: Variable, outcome: Variable, n: usize) -> AnalysisInput {
        let mediators = Mediators::with_default_ids(Array2::from_shape_fn((n, 3), |(i, j)| {
            (i * 3 + j) as f64
        }));
        AnalysisInput::new(exposure, outcome, mediators, 2)
    }

    #[test]
    fn test_four_level_factor_expands_to_three_columns() {
        let f = Factor::from_labels(&["A", "B", "C", "D", "A", "C"]);
        let design = classify_exposure(&Variable::Vector(Column::Factor(f)), 6).unwrap();

        assert_eq!(design.ncols(), 3);
        assert!(matches!(design.spec, ExposureSpec::Categorical(_)));
        let levels: Vec<_> = design.columns.iter().map(|c| c.level.clone().unwrap()).collect();
        assert_eq!(levels, vec!["B", "C", "D"]);
        assert_eq!(design.matrix.row(0).to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(design.matrix.row(3).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(design.matrix.row(5).to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_character_vector_is_categorical() {
        let column = Column::Character(labels(&["low", "high", "high", "low"]));
        let design = classify_exposure(&Variable::Vector(column), 4).unwrap();
        let var = &design.spec.variables()[0];
        assert_eq!(var.var_type, VariableType::Categorical);
        assert_eq!(var.levels.as_deref().unwrap(), &labels(&["high", "low"])[..]);
        assert_eq!(design.matrix.column(0).to_vec(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_factor_reference_follows_declared_levels() {
        let f = Factor::with_levels(&["A", "B", "C"], labels(&["C", "B", "A"]));
        let design = classify_exposure(&Variable::Vector(Column::Factor(f)), 3).unwrap();
        assert_eq!(design.spec.variables()[0].levels.as_ref().unwrap()[0], "C");
        assert_eq!(design.columns[0].level.as_deref(), Some("B"));
    }

    #[test]
    fn test_unused_factor_levels_are_dropped() {
        let f = Factor::with_levels(&["A", "A", "C"], labels(&["A", "B", "C"]));
        let design = classify_exposure(&Variable::Vector(Column::Factor(f)), 3).unwrap();
        assert_eq!(design.ncols(), 1);
        assert_eq!(design.columns[0].level.as_deref(), Some("C"));
    }

    #[test]
    fn test_single_level_factor_is_degenerate() {
        let f = Factor::from_labels(&["A", "A", "A"]);
        let err = classify_exposure(&Variable::Vector(Column::Factor(f)), 3).unwrap_err();
        assert!(matches!(
            err,
            MediationError::DegenerateExposure { levels: 1, .. }
        ));
    }

    #[test]
    fn test_single_label_character_vector_is_degenerate() {
        let column = Column::Character(labels(&["case", "case", "case"]));
        let err = classify_exposure(&column.into(), 3).unwrap_err();
        match err {
            MediationError::DegenerateExposure { variable, levels } => {
                assert_eq!(variable, "exposure");
                assert_eq!(levels, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_factor_code_outside_levels_rejected() {
        let f = Factor::with_levels(&["x", "z", "x"], labels(&["x", "y"]));
        let err = classify_exposure(&Column::Factor(f).into(), 3).unwrap_err();
        assert!(matches!(err, MediationError::InvalidExposureType(_)));
    }

    #[test]
    fn test_ordered_factor_flag_is_recorded() {
        let ordered = Factor::from_labels(&["lo", "hi", "lo"]).ordered();
        let design = classify_exposure(&Column::Factor(ordered).into(), 3).unwrap();
        assert!(design.spec.variables()[0].ordered);

        let plain = Factor::from_labels(&["lo", "hi", "lo"]);
        let design = classify_exposure(&Column::Factor(plain).into(), 3).unwrap();
        assert!(!design.spec.variables()[0].ordered);
    }

    #[test]
    fn test_numeric_exposure_binary_or_continuous() {
        let bin = classify_exposure(&Column::Numeric(vec![0.0, 1.0, 1.0]).into(), 3).unwrap();
        assert!(matches!(bin.spec, ExposureSpec::Binary(_)));

        let cont = classify_exposure(&Column::Numeric(vec![0.5, 1.0, 2.0]).into(), 3).unwrap();
        assert!(matches!(cont.spec, ExposureSpec::Continuous(_)));
        assert_eq!(cont.columns[0].id, "Var_1");

        let ints = classify_exposure(&Column::Integer(vec![1, 0, 1]).into(), 3).unwrap();
        assert_eq!(ints.spec.variables()[0].storage, StorageType::Integer);
        assert!(matches!(ints.spec, ExposureSpec::Binary(_)));
    }

    #[test]
    fn test_single_column_table_matches_vector() {
        let values = vec![0.3, 1.2, -0.4, 2.2];
        let vector = classify_exposure(&Column::Numeric(values.clone()).into(), 4).unwrap();
        let table = DataTable::new().with_column("age", Column::Numeric(values));
        let wrapped = classify_exposure(&table.into(), 4).unwrap();

        assert_eq!(vector.matrix, wrapped.matrix);
        assert!(matches!(wrapped.spec, ExposureSpec::Continuous(_)));
        assert_eq!(wrapped.columns[0].variable, "age");
    }

    #[test]
    fn test_multivariate_columns_classified_independently() {
        let table = DataTable::new()
            .with_column("dose", Column::Numeric(vec![0.1, 0.5, 0.9, 1.3]))
            .with_column("site", Column::Factor(Factor::from_labels(&["x", "y", "z", "x"])))
            .with_column("smoker", Column::Logical(vec![true, false, false, true]));
        let design = classify_exposure(&table.into(), 4).unwrap();

        assert!(design.spec.is_multivariate());
        let types: Vec<_> = design.spec.variables().iter().map(|v| v.var_type).collect();
        assert_eq!(
            types,
            vec![VariableType::Continuous, VariableType::Categorical, VariableType::Binary]
        );
        assert_eq!(design.ncols(), 4);
        let ids: Vec<_> = design.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Var_1", "Var_2", "Var_3", "Var_4"]);
        assert_eq!(design.columns[3].variable, "smoker");
        assert_eq!(design.matrix.column(3).to_vec(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_exposure_with_missing_values_rejected() {
        let err = classify_exposure(&Column::Numeric(vec![1.0, f64::NAN]).into(), 2).unwrap_err();
        assert!(matches!(err, MediationError::InvalidExposureType(_)));

        let err = classify_exposure(&Variable::Table(DataTable::new()), 2).unwrap_err();
        assert!(matches!(err, MediationError::InvalidExposureType(_)));
    }

    #[test]
    fn test_multivariate_column_length_names_column() {
        let table = DataTable::new()
            .with_column("dose", Column::Numeric(vec![0.1, 0.5, 0.9]))
            .with_column("site", Column::Character(labels(&["x", "y"])));
        match classify_exposure(&table.into(), 3).unwrap_err() {
            MediationError::ShapeMismatch {
                argument,
                expected,
                found,
            } => {
                assert_eq!(argument, "exposure$site");
                assert_eq!((expected, found), (3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_outcome_float_binary_matches_logical() {
        let float = classify_outcome(&Column::Numeric(vec![0.0, 1.0, 1.0, 0.0]).into(), 4).unwrap();
        let logical =
            classify_outcome(&Column::Logical(vec![false, true, true, false]).into(), 4).unwrap();
        assert_eq!(float.outcome_type, OutcomeType::Binary);
        assert_eq!(logical.outcome_type, OutcomeType::Binary);
        assert_eq!(float.values, logical.values);
    }

    #[test]
    fn test_outcome_rejections() {
        let cont = classify_outcome(&Column::Numeric(vec![0.2, 1.0]).into(), 2).unwrap();
        assert_eq!(cont.outcome_type, OutcomeType::Continuous);

        let err = classify_outcome(&Column::Character(labels(&["a", "b"])).into(), 2).unwrap_err();
        assert!(matches!(err, MediationError::UnsupportedOutcomeType(_)));

        let two = DataTable::new()
            .with_column("a", Column::Numeric(vec![0.0, 1.0]))
            .with_column("b", Column::Numeric(vec![0.0, 1.0]));
        let err = classify_outcome(&two.into(), 2).unwrap_err();
        assert!(matches!(err, MediationError::UnsupportedOutcomeType(_)));
    }

    #[test]
    fn test_outcome_with_missing_value_rejected() {
        let err = classify_outcome(&Column::Numeric(vec![0.2, f64::NAN, 1.4]).into(), 3).unwrap_err();
        assert!(matches!(err, MediationError::UnsupportedOutcomeType(_)));

        let input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.5, f64::INFINITY, 2.0]).into(),
            3,
        );
        assert!(matches!(
            normalize(&input).unwrap_err(),
            MediationError::UnsupportedOutcomeType(_)
        ));
    }

    #[test]
    fn test_k_resolution() {
        assert_eq!(resolve_k(Some(4.0)).unwrap(), 4);
        assert_eq!(resolve_k(Some(3.7)).unwrap(), 3);
        assert!(matches!(resolve_k(None), Err(MediationError::MissingLatentFactorCount)));
        assert!(matches!(
            resolve_k(Some(0.5)),
            Err(MediationError::InvalidLatentFactorCount(_))
        ));
    }

    #[test]
    fn test_row_mismatch_names_argument() {
        let input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.0, 1.0, 2.0, 3.0]).into(),
            4,
        );
        match normalize(&input).unwrap_err() {
            MediationError::ShapeMismatch {
                argument,
                expected,
                found,
            } => {
                assert_eq!(argument, "exposure");
                assert_eq!((expected, found), (4, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_covariates_must_be_numeric() {
        let covar = DataTable::new()
            .with_column("age", Column::Numeric(vec![30.0, 41.0, 52.0]))
            .with_column("sex", Column::Character(labels(&["f", "m", "f"])));
        let input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.5, 1.0, 2.0]).into(),
            3,
        )
        .with_covariates(covar);
        assert!(matches!(
            normalize(&input).unwrap_err(),
            MediationError::InvalidCovariates { .. }
        ));
    }

    #[test]
    fn test_covariate_missing_value_rejected() {
        let covar = DataTable::new().with_column("bmi", Column::Numeric(vec![21.0, f64::NAN, 25.5]));
        let input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.5, 1.0, 2.0]).into(),
            3,
        )
        .with_covariates(covar);
        match normalize(&input).unwrap_err() {
            MediationError::InvalidCovariates { argument, reason } => {
                assert_eq!(argument, "covar");
                assert!(reason.contains("bmi"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_covariate_rows_checked() {
        let covar = DataTable::from_matrix(&array![[1.0], [2.0], [3.0], [4.0]], None);
        let input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.5, 1.0, 2.0]).into(),
            3,
        )
        .with_covariates(covar);
        match normalize(&input).unwrap_err() {
            MediationError::ShapeMismatch {
                argument,
                expected,
                found,
            } => {
                assert_eq!(argument, "covar");
                assert_eq!((expected, found), (3, 4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_suppl_covariate_rows_checked() {
        let suppl = DataTable::from_matrix(&array![[1.0], [2.0]], None);
        let input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.5, 1.0, 2.0]).into(),
            3,
        )
        .with_suppl_covariates(suppl);
        match normalize(&input).unwrap_err() {
            MediationError::ShapeMismatch { argument, .. } => assert_eq!(argument, "suppl_covar"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mediator_validation() {
        let mut input = input_with(
            Column::Numeric(vec![0.0, 1.0, 2.0]).into(),
            Column::Numeric(vec![0.5, 1.0, 2.0]).into(),
            3,
        );
        input.mediators.values[[1, 1]] = f64::NAN;
        assert!(matches!(
            normalize(&input).unwrap_err(),
            MediationError::InvalidMediatorMatrix(_)
        ));

        input.mediators.values[[1, 1]] = 0.0;
        input.mediators.ids[2] = "M1".into();
        assert!(matches!(
            normalize(&input).unwrap_err(),
            MediationError::InvalidMediatorMatrix(_)
        ));
    }
}
