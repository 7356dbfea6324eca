//! Reconciliation entry points: read, diff, render, execute.

use crate::diff::{TableDiff, diff};
use crate::introspect::read_live_schema;
use crate::traced::{Connection, ConnectionExt};
use crate::{Error, ReconcileOptions, Result};
use pqm_db_schema::Table;

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub diff: TableDiff,
    /// The statement batch, as handed to the connection.
    pub sql: String,
    /// False for dry runs.
    pub applied: bool,
}

/// Read the live table and diff it against `table`, without executing anything.
pub async fn plan<C: Connection + ?Sized>(
    conn: &C,
    table: &Table,
    options: &ReconcileOptions,
) -> Result<TableDiff> {
    let live = read_live_schema(conn, &table.name, options).await?;
    let diff = diff(table, &live, &options.identity_column);

    tracing::debug!(
        table = %table.name,
        changes = diff.change_count(),
        "planned reconciliation"
    );
    for change in &diff.changes {
        tracing::debug!(table = %table.name, "{}", change);
    }
    Ok(diff)
}

/// Converge the live table to `table`.
///
/// Runs one catalog query and one statement batch on `conn`. Pass a
/// transaction to make the whole reconciliation atomic; committing or
/// rolling back stays with the caller.
pub async fn reconcile<C: Connection + ?Sized>(
    conn: &C,
    table: &Table,
    options: &ReconcileOptions,
) -> Result<Reconciled> {
    let diff = plan(conn, table, options).await?;
    let sql = diff.to_sql()?;

    if options.dry_run {
        return Ok(Reconciled {
            diff,
            sql,
            applied: false,
        });
    }

    if !diff.is_noop() {
        tracing::info!(table = %table.name, changes = diff.change_count(), "{}", sql);
    }
    conn.traced(&table.name)
        .batch_execute(&sql)
        .await
        .map_err(|source| Error::Execution {
            table: table.name.clone(),
            source,
        })?;

    Ok(Reconciled {
        diff,
        sql,
        applied: true,
    })
}
