//! Table diffing - compare a declared table against its live shape.
//!
//! [`diff`] produces a [`TableDiff`]: an ordered list of [`Change`]s that,
//! rendered with [`TableDiff::to_sql`], converge the live table to the
//! declaration.
//!
//! ## Ordering
//!
//! 1. a `CREATE TABLE IF NOT EXISTS` guard carrying only the identity column
//! 2. column changes, in declaration order
//! 3. constraint drops: modified keys (declaration order), then orphans
//! 4. constraint adds, in declaration order
//!
//! Dropping every constraint before adding any lets a key be redefined under
//! its own name within one batch.
//!
//! ## Columns
//!
//! A type change replaces the column (`DROP COLUMN` + `ADD`); no cast is
//! attempted and no other change is computed for it. Otherwise a varchar
//! length change, a nullability change and a default change are each emitted
//! independently. Live columns missing from the declaration are left alone.
//!
//! ## Keys
//!
//! Keys are matched by constraint name. A key differing in kind, target table
//! or column sets is dropped and re-added. Live keys with no declared
//! counterpart are dropped. Constraints on a replaced column disappear with
//! the column, so they are neither dropped nor compared.
//!
//! The snapshot is never mutated.

use crate::{Error, Result};
use pqm_db_schema::{
    Column, Key, KeyKind, LiveColumn, LiveKey, LiveSchema, PgType, Table, normalize_default,
    same_columns,
};
use std::collections::HashSet;
use std::fmt;

/// Changes for a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDiff {
    /// Table name.
    pub table: String,
    /// List of changes, in execution order.
    pub changes: Vec<Change>,
}

impl TableDiff {
    /// True when nothing but the `CREATE TABLE IF NOT EXISTS` guard is needed.
    pub fn is_noop(&self) -> bool {
        self.changes
            .iter()
            .all(|c| matches!(c, Change::CreateTableIfNotExists { .. }))
    }

    /// Number of changes besides the guard.
    pub fn change_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| !matches!(c, Change::CreateTableIfNotExists { .. }))
            .count()
    }

    /// Render the statement batch.
    ///
    /// Fails without rendering anything if a key cannot be expressed as a
    /// constraint.
    pub fn to_sql(&self) -> Result<String> {
        let fragments = self
            .changes
            .iter()
            .map(|change| change.to_sql(&self.table))
            .collect::<Result<Vec<_>>>()?;
        Ok(fragments.join("\n"))
    }
}

/// A single schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create the table with just its identity column, if missing.
    CreateTableIfNotExists { identity: String },
    /// Add a new column.
    AddColumn { name: String, column: Column },
    /// Drop an existing column.
    DropColumn(String),
    /// Change a varchar column's length.
    AlterType {
        name: String,
        from: String,
        column: Column,
    },
    /// Change a column's nullability.
    SetNullability { name: String, not_null: bool },
    /// Change a column's default value.
    SetDefault {
        name: String,
        from: String,
        column: Column,
    },
    /// Add a unique or foreign-key constraint.
    AddKey { name: String, key: Key },
    /// Drop a constraint.
    DropKey(String),
}

impl Change {
    /// Generate the SQL statement for this change on `table_name`.
    pub fn to_sql(&self, table_name: &str) -> Result<String> {
        let sql = match self {
            Change::CreateTableIfNotExists { identity } => format!(
                "CREATE TABLE IF NOT EXISTS {} ({} bigserial PRIMARY KEY);",
                table_name, identity
            ),
            Change::AddColumn { name, column } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD {} {}",
                    table_name,
                    name,
                    column.type_sql()
                );
                let default = column.rendered_default();
                if !default.is_empty() {
                    sql.push_str(&format!(" DEFAULT {}", default));
                }
                if column.not_null {
                    sql.push_str(" NOT NULL");
                }
                sql.push(';');
                sql
            }
            Change::DropColumn(name) => {
                format!("ALTER TABLE {} DROP COLUMN {};", table_name, name)
            }
            Change::AlterType { name, column, .. } => format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                table_name,
                name,
                column.type_sql(),
                name,
                column.pg_type
            ),
            Change::SetNullability { name, not_null } => {
                let action = if *not_null { "SET" } else { "DROP" };
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                    table_name, name, action
                )
            }
            Change::SetDefault { name, column, .. } => {
                let default = column.rendered_default();
                if default.is_empty() {
                    format!(
                        "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                        table_name, name
                    )
                } else {
                    format!(
                        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                        table_name, name, default
                    )
                }
            }
            Change::AddKey { name, key } => {
                key.validate().map_err(|source| Error::InvalidKey {
                    table: table_name.to_string(),
                    key: name.clone(),
                    source,
                })?;
                match key.kind {
                    KeyKind::Unique => format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE({});",
                        table_name,
                        name,
                        key.from_columns.join(",")
                    ),
                    KeyKind::Reference => format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE CASCADE;",
                        table_name,
                        name,
                        key.from_columns.join(","),
                        key.to_table,
                        key.to_columns.join(",")
                    ),
                }
            }
            Change::DropKey(name) => {
                format!("ALTER TABLE {} DROP CONSTRAINT {};", table_name, name)
            }
        };
        Ok(sql)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTableIfNotExists { identity } => {
                write!(f, "= table ({} bigserial)", identity)
            }
            Change::AddColumn { name, column } => {
                let nullable = if column.not_null { "" } else { " (nullable)" };
                write!(f, "+ {}: {}{}", name, column.type_sql(), nullable)
            }
            Change::DropColumn(name) => write!(f, "- {}", name),
            Change::AlterType { name, from, column } => {
                write!(f, "~ {}: {} -> {}", name, from, column.type_sql())
            }
            Change::SetNullability { name, not_null } => {
                let (from, to) = if *not_null {
                    ("nullable", "not null")
                } else {
                    ("not null", "nullable")
                };
                write!(f, "~ {}: {} -> {}", name, from, to)
            }
            Change::SetDefault { name, from, column } => {
                let to = column.rendered_default();
                let from = if from.is_empty() { "(none)" } else { from.as_str() };
                let to = if to.is_empty() { "(none)" } else { to.as_str() };
                write!(f, "~ {} default: {} -> {}", name, from, to)
            }
            Change::AddKey { name, key } => match key.kind {
                KeyKind::Unique => {
                    write!(f, "+ UNIQUE {} ({})", name, key.from_columns.join(", "))
                }
                KeyKind::Reference => write!(
                    f,
                    "+ FOREIGN KEY {} ({}) -> {}.{}",
                    name,
                    key.from_columns.join(", "),
                    key.to_table,
                    key.to_columns.join(", ")
                ),
            },
            Change::DropKey(name) => write!(f, "- CONSTRAINT {}", name),
        }
    }
}

impl fmt::Display for TableDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            writeln!(f, "{}: no changes", self.table)
        } else {
            writeln!(f, "{}:", self.table)?;
            for change in &self.changes {
                writeln!(f, "  {}", change)?;
            }
            Ok(())
        }
    }
}

/// Diff a declared table against its live snapshot.
pub fn diff(desired: &Table, current: &LiveSchema, identity_column: &str) -> TableDiff {
    let mut changes = vec![Change::CreateTableIfNotExists {
        identity: identity_column.to_string(),
    }];

    let mut replaced: HashSet<&str> = HashSet::new();
    for (name, column) in &desired.columns {
        match current.columns.get(name) {
            None => changes.push(Change::AddColumn {
                name: name.clone(),
                column: column.clone(),
            }),
            Some(live) if !live.same_type(&column.pg_type) => {
                replaced.insert(name);
                changes.push(Change::DropColumn(name.clone()));
                changes.push(Change::AddColumn {
                    name: name.clone(),
                    column: column.clone(),
                });
            }
            Some(live) => changes.extend(diff_column(name, column, live)),
        }
    }

    // Constraints touching a replaced column were dropped along with it.
    let surviving = |live: &&LiveKey| {
        !live
            .from_columns
            .iter()
            .any(|c| replaced.contains(c.as_str()))
    };

    let mut drops = Vec::new();
    let mut adds = Vec::new();
    for (name, key) in &desired.keys {
        match current.keys.get(name).filter(surviving) {
            None => adds.push(Change::AddKey {
                name: name.clone(),
                key: key.clone(),
            }),
            Some(live) if key_changed(key, live) => {
                drops.push(Change::DropKey(name.clone()));
                adds.push(Change::AddKey {
                    name: name.clone(),
                    key: key.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for (name, live) in &current.keys {
        if !desired.keys.contains_key(name) && surviving(&live) {
            drops.push(Change::DropKey(name.clone()));
        }
    }
    changes.extend(drops);
    changes.extend(adds);

    TableDiff {
        table: desired.name.clone(),
        changes,
    }
}

/// Changes for a column whose type already matches.
fn diff_column(name: &str, column: &Column, live: &LiveColumn) -> Vec<Change> {
    let mut changes = Vec::new();

    if column.pg_type == PgType::Varchar && live.length != column.length {
        let from = if live.length > 0 {
            format!("{}({})", live.data_type, live.length)
        } else {
            live.data_type.clone()
        };
        changes.push(Change::AlterType {
            name: name.to_string(),
            from,
            column: column.clone(),
        });
    }

    if live.not_null != column.not_null {
        changes.push(Change::SetNullability {
            name: name.to_string(),
            not_null: column.not_null,
        });
    }

    let declared = normalize_default(&column.rendered_default(), &column.pg_type);
    if normalize_default(&live.default, &column.pg_type) != declared {
        changes.push(Change::SetDefault {
            name: name.to_string(),
            from: live.default.clone(),
            column: column.clone(),
        });
    }

    changes
}

fn key_changed(declared: &Key, live: &LiveKey) -> bool {
    live.is_reference != declared.is_reference()
        || live.is_unique != declared.is_unique()
        || (!declared.to_table.is_empty() && declared.to_table != live.to_table)
        || !same_columns(&declared.from_columns, &live.from_columns)
        || !same_columns(&declared.to_columns, &live.to_columns)
}
