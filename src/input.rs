//! Raw, untransformed inputs to an analysis.
//!
//! These types mirror what a caller holds before any classification happens:
//! plain vectors of a given storage type, factors with declared levels, and
//! named tables of such columns. They are kept verbatim in the final
//! `Step1Result` so downstream stages can see exactly what was analysed.
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A categorical vector: integer codes into an ordered level set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub levels: Vec<String>,
    /// Zero-based indices into `levels`, one per sample.
    pub codes: Vec<usize>,
    pub ordered: bool,
}

impl Factor {
    pub fn new(levels: Vec<String>, codes: Vec<usize>) -> Self {
        Factor {
            levels,
            codes,
            ordered: false,
        }
    }

    /// Builds a factor from labels, with levels sorted the way an unordered
    /// factor of strings is.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let levels: Vec<String> = labels
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self::with_levels(labels, levels)
    }

    /// Builds a factor with an explicit level order. Labels not found among
    /// `levels` receive an out-of-range code and are rejected at
    /// normalization.
    pub fn with_levels<S: AsRef<str>>(labels: &[S], levels: Vec<String>) -> Self {
        let codes = labels
            .iter()
            .map(|l| {
                levels
                    .iter()
                    .position(|lv| lv == l.as_ref())
                    .unwrap_or(levels.len())
            })
            .collect();
        Factor::new(levels, codes)
    }

    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// One vector of sample values with its storage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Floating point values; `NaN` marks a missing value.
    Numeric(Vec<f64>),
    Integer(Vec<i64>),
    Logical(Vec<bool>),
    Character(Vec<String>),
    Factor(Factor),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Integer(v) => v.len(),
            Column::Logical(v) => v.len(),
            Column::Character(v) => v.len(),
            Column::Factor(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage(&self) -> StorageType {
        match self {
            Column::Numeric(_) => StorageType::Numeric,
            Column::Integer(_) => StorageType::Integer,
            Column::Logical(_) => StorageType::Logical,
            Column::Character(_) => StorageType::Character,
            Column::Factor(_) => StorageType::Factor,
        }
    }
}

/// Storage type of a raw column, kept for reporting after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    Numeric,
    Integer,
    Logical,
    Character,
    Factor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedColumn {
    pub name: String,
    pub column: Column,
}

/// A table of named columns sharing one row dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<NamedColumn>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push(NamedColumn {
            name: name.into(),
            column,
        });
        self
    }

    /// Wraps each matrix column as a numeric column. Names default to
    /// `V1`, `V2`, … when `names` is `None`.
    pub fn from_matrix(values: &Array2<f64>, names: Option<&[String]>) -> Self {
        let columns = values
            .columns()
            .into_iter()
            .enumerate()
            .map(|(j, col)| NamedColumn {
                name: names
                    .and_then(|n| n.get(j).cloned())
                    .unwrap_or_else(|| format!("V{}", j + 1)),
                column: Column::Numeric(col.to_vec()),
            })
            .collect();
        DataTable { columns }
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Row count of the first column, or `None` for an empty table.
    pub fn nrows(&self) -> Option<usize> {
        self.columns.first().map(|c| c.column.len())
    }
}

/// An exposure or outcome as handed in by the caller: a single vector or a
/// table of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    Vector(Column),
    Table(DataTable),
}

impl From<Column> for Variable {
    fn from(column: Column) -> Self {
        Variable::Vector(column)
    }
}

impl From<DataTable> for Variable {
    fn from(table: DataTable) -> Self {
        Variable::Table(table)
    }
}

/// The n × p mediator matrix with its column identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mediators {
    pub values: Array2<f64>,
    pub ids: Vec<String>,
}

impl Mediators {
    pub fn new(values: Array2<f64>, ids: Vec<String>) -> Self {
        Mediators { values, ids }
    }

    /// Uses `M1`, `M2`, … as mediator identifiers.
    pub fn with_default_ids(values: Array2<f64>) -> Self {
        let ids = (1..=values.ncols()).map(|j| format!("M{j}")).collect();
        Mediators { values, ids }
    }
}

/// Everything a single `run_as` call analyses.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub exposure: Variable,
    pub outcome: Variable,
    pub mediators: Mediators,
    /// Number of latent factors; non-integer values are truncated.
    pub k: Option<f64>,
    pub covariates: Option<DataTable>,
    /// Extra adjustment factors used in the mediator ~ outcome stage only.
    pub suppl_covariates: Option<DataTable>,
}

impl AnalysisInput {
    pub fn new(exposure: Variable, outcome: Variable, mediators: Mediators, k: usize) -> Self {
        AnalysisInput {
            exposure,
            outcome,
            mediators,
            k: Some(k as f64),
            covariates: None,
            suppl_covariates: None,
        }
    }

    pub fn with_covariates(mut self, covariates: DataTable) -> Self {
        self.covariates = Some(covariates);
        self
    }

    pub fn with_suppl_covariates(mut self, suppl_covariates: DataTable) -> Self {
        self.suppl_covariates = Some(suppl_covariates);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_factor_from_labels_sorts_levels() {
        let f = Factor::from_labels(&["b", "a", "c", "a"]);
        assert_eq!(f.levels, vec!["a", "b", "c"]);
        assert_eq!(f.codes, vec![1, 0, 2, 0]);
        assert!(!f.ordered);
    }

    #[test]
    fn test_factor_unknown_label_gets_out_of_range_code() {
        let f = Factor::with_levels(&["x", "z"], vec!["x".into(), "y".into()]);
        assert_eq!(f.codes, vec![0, 2]);
    }

    #[test]
    fn test_table_from_matrix_default_names() {
        let m = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let t = DataTable::from_matrix(&m, None);
        assert_eq!(t.ncols(), 2);
        assert_eq!(t.nrows(), Some(3));
        assert_eq!(t.columns[1].name, "V2");
        assert_eq!(t.columns[1].column, Column::Numeric(vec![2.0, 4.0, 6.0]));
    }
}
