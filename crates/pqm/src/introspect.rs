//! Catalog reader: one `information_schema` query per table, folded into a
//! [`LiveSchema`].

use crate::traced::{Connection, ConnectionExt};
use crate::{Error, ReconcileOptions, Result};
use pqm_db_schema::{LiveColumn, LiveKey, LiveSchema};
use tokio_postgres::Row;

/// Columns of the inspected table joined with every unique/foreign-key
/// constraint they take part in. A multi-column constraint shows up once per
/// (column, referenced column) pair.
const CATALOG_QUERY: &str = r#"
select
    c.column_name::text,
    c.data_type::text,
    c.udt_name::text,
    coalesce(c.column_default::text, ''),
    coalesce(c.character_maximum_length::int8, 0),
    c.is_nullable::text,
    coalesce(kcu.constraint_name::text, ''),
    coalesce(tc.constraint_type::text, ''),
    coalesce(ccu.column_name::text, ''),
    coalesce(ccu.table_name::text, '')
from
    information_schema.columns c
left join information_schema.key_column_usage kcu on
    kcu.column_name = c.column_name
    and kcu.table_name = c.table_name
    and kcu.table_schema = c.table_schema
left join information_schema.constraint_column_usage ccu on
    ccu.constraint_name = kcu.constraint_name
    and ccu.constraint_schema = kcu.constraint_schema
left join information_schema.table_constraints tc on
    tc.constraint_name = kcu.constraint_name
    and tc.constraint_schema = kcu.constraint_schema
where
    c.table_name::text = $1::text
    and c.table_schema::text = current_schema()
    and c.column_name::text <> $2::text
order by
    c.ordinal_position, kcu.constraint_name, ccu.column_name
"#;

/// One decoded catalog row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CatalogRow {
    pub column: String,
    pub data_type: String,
    pub udt_name: String,
    pub default: String,
    pub length: i64,
    pub is_nullable: String,
    pub key: String,
    pub key_type: String,
    pub key_column: String,
    pub key_table: String,
}

impl CatalogRow {
    fn decode(row: &Row) -> std::result::Result<Self, tokio_postgres::Error> {
        Ok(Self {
            column: row.try_get(0)?,
            data_type: row.try_get(1)?,
            udt_name: row.try_get(2)?,
            default: row.try_get(3)?,
            length: row.try_get(4)?,
            is_nullable: row.try_get(5)?,
            key: row.try_get(6)?,
            key_type: row.try_get(7)?,
            key_column: row.try_get(8)?,
            key_table: row.try_get(9)?,
        })
    }
}

/// Read the live shape of `table`.
///
/// A table that does not exist yet comes back as an empty snapshot.
pub async fn read_live_schema<C: Connection + ?Sized>(
    conn: &C,
    table: &str,
    options: &ReconcileOptions,
) -> Result<LiveSchema> {
    let rows = conn
        .traced(table)
        .query(CATALOG_QUERY, &[&table, &options.identity_column])
        .await
        .map_err(|source| Error::CatalogQuery {
            table: table.to_string(),
            source,
        })?;

    let mut live = LiveSchema::new(table);
    for row in &rows {
        let row = CatalogRow::decode(row).map_err(|source| Error::CatalogScan {
            table: table.to_string(),
            source,
        })?;
        fold_row(&mut live, row);
    }

    tracing::debug!(
        table,
        columns = live.columns.len(),
        keys = live.keys.len(),
        "read live schema"
    );
    Ok(live)
}

/// Fold one catalog row into the snapshot.
///
/// The first row for a column defines it; every row naming a constraint adds
/// its column (and referenced column) to that constraint at most once.
pub(crate) fn fold_row(live: &mut LiveSchema, row: CatalogRow) {
    live.columns
        .entry(row.column.clone())
        .or_insert_with(|| LiveColumn {
            data_type: row.data_type.clone(),
            udt_name: row.udt_name.clone(),
            default: row.default.clone(),
            length: row.length,
            not_null: row.is_nullable == "NO",
        });

    if row.key.is_empty() {
        return;
    }

    // A unique key "references" its own table; only foreign keys carry
    // target columns. Self-referencing foreign keys are foreign keys too.
    let is_reference = row.key_type == "FOREIGN KEY";
    let has_target =
        !row.key_column.is_empty() && (row.key_table != live.name || is_reference);

    let key = live.keys.entry(row.key).or_insert_with(|| LiveKey {
        to_table: row.key_table.clone(),
        is_unique: row.key_type == "UNIQUE",
        is_reference,
        ..Default::default()
    });
    if !key.from_columns.contains(&row.column) {
        key.from_columns.push(row.column);
    }
    if has_target && !key.to_columns.contains(&row.key_column) {
        key.to_columns.push(row.key_column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_row(column: &str, data_type: &str, nullable: &str) -> CatalogRow {
        CatalogRow {
            column: column.to_string(),
            data_type: data_type.to_string(),
            udt_name: data_type.to_string(),
            is_nullable: nullable.to_string(),
            ..Default::default()
        }
    }

    fn key_row(
        column: &str,
        key: &str,
        key_type: &str,
        key_table: &str,
        key_column: &str,
    ) -> CatalogRow {
        CatalogRow {
            key: key.to_string(),
            key_type: key_type.to_string(),
            key_table: key_table.to_string(),
            key_column: key_column.to_string(),
            ..column_row(column, "text", "YES")
        }
    }

    fn fold(rows: Vec<CatalogRow>) -> LiveSchema {
        let mut live = LiveSchema::new("post");
        for row in rows {
            fold_row(&mut live, row);
        }
        live
    }

    #[test]
    fn test_fold_column_nullability() {
        let live = fold(vec![
            column_row("title", "text", "NO"),
            column_row("body", "text", "YES"),
        ]);
        assert!(live.columns["title"].not_null);
        assert!(!live.columns["body"].not_null);
        assert!(live.keys.is_empty());
    }

    #[test]
    fn test_fold_first_row_defines_column() {
        let mut second = column_row("title", "integer", "YES");
        second.default = "0".to_string();
        let live = fold(vec![column_row("title", "text", "NO"), second]);
        let title = &live.columns["title"];
        assert_eq!(title.data_type, "text");
        assert!(title.not_null);
        assert_eq!(title.default, "");
    }

    #[test]
    fn test_fold_composite_unique() {
        // each kcu row is joined against every ccu row of the constraint
        let live = fold(vec![
            key_row("slug", "uq_slug_lang", "UNIQUE", "post", "lang"),
            key_row("slug", "uq_slug_lang", "UNIQUE", "post", "slug"),
            key_row("lang", "uq_slug_lang", "UNIQUE", "post", "lang"),
            key_row("lang", "uq_slug_lang", "UNIQUE", "post", "slug"),
        ]);
        let key = &live.keys["uq_slug_lang"];
        assert!(key.is_unique);
        assert!(!key.is_reference);
        assert_eq!(key.from_columns, vec!["slug", "lang"]);
        assert!(key.to_columns.is_empty());
        assert_eq!(key.to_table, "post");
        assert_eq!(live.columns.len(), 2);
    }

    #[test]
    fn test_fold_foreign_key() {
        let live = fold(vec![key_row(
            "author_id",
            "fk_author",
            "FOREIGN KEY",
            "users",
            "id",
        )]);
        let key = &live.keys["fk_author"];
        assert!(key.is_reference);
        assert!(!key.is_unique);
        assert_eq!(key.from_columns, vec!["author_id"]);
        assert_eq!(key.to_columns, vec!["id"]);
        assert_eq!(key.to_table, "users");
    }

    #[test]
    fn test_fold_self_referencing_foreign_key() {
        let live = fold(vec![key_row(
            "parent_id",
            "fk_parent",
            "FOREIGN KEY",
            "post",
            "id",
        )]);
        assert_eq!(live.keys["fk_parent"].to_columns, vec!["id"]);
    }

    #[test]
    fn test_fold_column_in_two_constraints() {
        let live = fold(vec![
            key_row("author_id", "fk_author", "FOREIGN KEY", "users", "id"),
            key_row("author_id", "uq_author", "UNIQUE", "post", "author_id"),
        ]);
        assert_eq!(live.columns.len(), 1);
        assert_eq!(live.keys.len(), 2);
        let names: Vec<&str> = live.keys.keys().map(String::as_str).collect();
        assert_eq!(names, ["fk_author", "uq_author"]);
    }
}
