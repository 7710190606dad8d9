//! Run options for `run_as`.
use serde::{Deserialize, Serialize};

/// Options that change how an analysis runs, as opposed to what it analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsConfig {
    /// Also compute Stage-1 p-values per exposure design column.
    pub each_var_pval: bool,
    /// Ridge penalty of the latent factor backend.
    pub lambda: f64,
    /// Size of a dedicated rayon pool; the global pool is used when `None`.
    pub n_threads: Option<usize>,
}

impl Default for AsConfig {
    fn default() -> Self {
        AsConfig {
            each_var_pval: false,
            lambda: 1e-5,
            n_threads: None,
        }
    }
}

impl AsConfig {
    pub fn with_each_var_pval(mut self, each_var_pval: bool) -> Self {
        self.each_var_pval = each_var_pval;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self
    }
}
