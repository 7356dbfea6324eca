use pqm_db_schema::KeyError;
use thiserror::Error;

/// Everything that can abort a reconciliation.
///
/// None of these are retried: the caller owns the transaction and decides
/// whether to roll back.
#[derive(Debug, Error)]
pub enum Error {
    /// The introspection query itself failed.
    #[error("reading catalog for table {table} failed: {source}")]
    CatalogQuery {
        table: String,
        source: tokio_postgres::Error,
    },

    /// A catalog row did not decode into the expected shape.
    #[error("decoding catalog row for table {table} failed: {source}")]
    CatalogScan {
        table: String,
        source: tokio_postgres::Error,
    },

    /// The statement batch failed to apply.
    #[error("migration of table {table} failed: {source}")]
    Execution {
        table: String,
        source: tokio_postgres::Error,
    },

    /// A declared key cannot be rendered as a constraint.
    #[error("key {key} on table {table} is invalid: {source}")]
    InvalidKey {
        table: String,
        key: String,
        source: KeyError,
    },
}
