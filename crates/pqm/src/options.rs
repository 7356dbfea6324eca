/// Knobs for one reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// The generated primary-key column. It is created by the table guard and
    /// excluded from the catalog read.
    pub identity_column: String,
    /// Compute and render the batch without executing it.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            identity_column: "id".to_string(),
            dry_run: false,
        }
    }
}

impl ReconcileOptions {
    pub fn identity_column(mut self, name: impl Into<String>) -> Self {
        self.identity_column = name.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
