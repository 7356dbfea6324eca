//! Schema types, re-exported from `pqm-db-schema`.
//!
//! ## Example
//!
//! ```
//! use pqm::schema::*;
//!
//! let post = Table::new("post")
//!     .column("title", varchar(None, 200, true))
//!     .column("views", bigint(0, true))
//!     .column("author_id", bigint(None, true))
//!     .key("uq_post_title", unique(["title"]))
//!     .key("fk_post_author", reference("author_id", "users", "id"));
//! assert_eq!(post.columns.len(), 3);
//! ```

pub mod codegen;

pub use pqm_db_schema::{
    ArrayElement, Column, DefaultValue, Key, KeyError, KeyKind, LiveColumn, LiveKey, LiveSchema,
    PgType, Table, array, bigint, boolean, bytea, double_precision, integer, jsonb,
    normalize_default, reference, reference_many, render_default, same_columns, text, timestamp,
    unique, varchar,
};
