//! Table schema types for pqm.
//!
//! This crate holds both sides of a reconciliation:
//!
//! - the *declared* table ([`Table`], [`Column`], [`Key`]), built by the caller
//!   with the builder functions ([`integer`], [`varchar`], [`unique`], ...)
//! - the *live* table ([`LiveSchema`]), as read back from the catalog
//!
//! It also owns [`render_default`] and [`normalize_default`], the one place
//! where default values are turned into SQL text.

use chrono::{NaiveDateTime, Timelike};
use indexmap::IndexMap;
use pqm_sql::{Cast, Lit, bytea_hex, fold_constant, strip_cast};
use std::fmt;

#[cfg(test)]
mod tests;

/// Element type of an array column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayElement {
    Integer,
    BigInt,
    DoublePrecision,
    Text,
    Boolean,
}

/// Postgres column types a declaration can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgType {
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// CHARACTER VARYING, with the length carried on the [`Column`]
    Varchar,
    /// TEXT
    Text,
    /// BOOLEAN
    Boolean,
    /// BYTEA (binary)
    Bytea,
    /// One-dimensional array of a scalar type
    Array(ArrayElement),
    /// JSONB
    Jsonb,
    /// TIMESTAMP WITHOUT TIME ZONE
    Timestamp,
}

impl PgType {
    /// The `information_schema.columns.data_type` text for this type.
    pub fn data_type(&self) -> &'static str {
        match self {
            PgType::Array(_) => "ARRAY",
            other => other.sql_name(),
        }
    }

    /// The type name used in DDL and casts.
    pub fn sql_name(&self) -> &'static str {
        match self {
            PgType::Integer => "integer",
            PgType::BigInt => "bigint",
            PgType::DoublePrecision => "double precision",
            PgType::Varchar => "character varying",
            PgType::Text => "text",
            PgType::Boolean => "boolean",
            PgType::Bytea => "bytea",
            PgType::Array(ArrayElement::Integer) => "integer[]",
            PgType::Array(ArrayElement::BigInt) => "bigint[]",
            PgType::Array(ArrayElement::DoublePrecision) => "double precision[]",
            PgType::Array(ArrayElement::Text) => "text[]",
            PgType::Array(ArrayElement::Boolean) => "boolean[]",
            PgType::Jsonb => "jsonb",
            PgType::Timestamp => "timestamp without time zone",
        }
    }

    /// The `udt_name` Postgres reports for this type.
    ///
    /// Arrays all share the `ARRAY` data type; this is what tells them apart.
    pub fn udt_name(&self) -> &'static str {
        match self {
            PgType::Integer => "int4",
            PgType::BigInt => "int8",
            PgType::DoublePrecision => "float8",
            PgType::Varchar => "varchar",
            PgType::Text => "text",
            PgType::Boolean => "bool",
            PgType::Bytea => "bytea",
            PgType::Array(ArrayElement::Integer) => "_int4",
            PgType::Array(ArrayElement::BigInt) => "_int8",
            PgType::Array(ArrayElement::DoublePrecision) => "_float8",
            PgType::Array(ArrayElement::Text) => "_text",
            PgType::Array(ArrayElement::Boolean) => "_bool",
            PgType::Jsonb => "jsonb",
            PgType::Timestamp => "timestamp",
        }
    }

    /// Map a catalog `udt_name` back to a type.
    pub fn from_udt_name(udt_name: &str) -> Option<Self> {
        let ty = match udt_name {
            "int4" => PgType::Integer,
            "int8" => PgType::BigInt,
            "float8" => PgType::DoublePrecision,
            "varchar" => PgType::Varchar,
            "text" => PgType::Text,
            "bool" => PgType::Boolean,
            "bytea" => PgType::Bytea,
            "_int4" => PgType::Array(ArrayElement::Integer),
            "_int8" => PgType::Array(ArrayElement::BigInt),
            "_float8" => PgType::Array(ArrayElement::DoublePrecision),
            "_text" => PgType::Array(ArrayElement::Text),
            "_bool" => PgType::Array(ArrayElement::Boolean),
            "jsonb" => PgType::Jsonb,
            "timestamp" => PgType::Timestamp,
            _ => return None,
        };
        Some(ty)
    }

    /// Whether Postgres may print defaults of this type as a bare, unquoted value.
    fn has_bare_literals(&self) -> bool {
        matches!(
            self,
            PgType::Integer | PgType::BigInt | PgType::DoublePrecision | PgType::Boolean
        )
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A declared default value.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    /// Raw JSON text, emitted as-is.
    Json(String),
    Timestamp(NaiveDateTime),
    Array(Vec<DefaultValue>),
}

impl DefaultValue {
    pub fn json(raw: impl Into<String>) -> Self {
        DefaultValue::Json(raw.into())
    }
}

impl From<i32> for DefaultValue {
    fn from(v: i32) -> Self {
        DefaultValue::Integer(v.into())
    }
}

impl From<i64> for DefaultValue {
    fn from(v: i64) -> Self {
        DefaultValue::Integer(v)
    }
}

impl From<f64> for DefaultValue {
    fn from(v: f64) -> Self {
        DefaultValue::Float(v)
    }
}

impl From<bool> for DefaultValue {
    fn from(v: bool) -> Self {
        DefaultValue::Bool(v)
    }
}

impl From<&str> for DefaultValue {
    fn from(v: &str) -> Self {
        DefaultValue::Text(v.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(v: String) -> Self {
        DefaultValue::Text(v)
    }
}

impl From<Vec<u8>> for DefaultValue {
    fn from(v: Vec<u8>) -> Self {
        DefaultValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for DefaultValue {
    fn from(v: NaiveDateTime) -> Self {
        DefaultValue::Timestamp(v)
    }
}

/// Render a declared default as the SQL expression used in DDL.
///
/// `None` renders to the empty string, which means "no default".
pub fn render_default(default: Option<&DefaultValue>, pg_type: &PgType) -> String {
    let Some(default) = default else {
        return String::new();
    };
    let cast = pg_type.sql_name();
    match default {
        // `-1::integer` parses as `-(1::integer)`, which overflows for the
        // minimum value; negatives are cast as quoted literals instead
        DefaultValue::Integer(v) if *v < 0 => Cast(Lit(v.to_string()), cast).to_string(),
        DefaultValue::Integer(v) => Cast(v, cast).to_string(),
        DefaultValue::Float(v) if v.is_finite() && v.is_sign_positive() => {
            Cast(v, cast).to_string()
        }
        DefaultValue::Float(v) => Cast(Lit(float_text(*v)), cast).to_string(),
        DefaultValue::Bool(v) => Cast(v, cast).to_string(),
        DefaultValue::Text(s) | DefaultValue::Json(s) => Cast(Lit(s), cast).to_string(),
        DefaultValue::Bytes(b) => Cast(Lit(bytea_hex(b)), cast).to_string(),
        DefaultValue::Timestamp(t) => Cast(Lit(timestamp_text(t)), cast).to_string(),
        DefaultValue::Array(items) => Cast(Lit(array_text(items)), cast).to_string(),
    }
}

/// Canonical text of a default expression, for comparisons only.
///
/// Both the catalog's `column_default` and the output of [`render_default`]
/// go through here before they are compared. For numeric and boolean types
/// the deparsed constant (`0`, `(7)::bigint`, `(- 1)`, `'-5'::bigint`,
/// `(0.5)::double precision`) is folded to its value and printed back in one
/// spelling. Other types only lose their outer cast.
pub fn normalize_default(expr: &str, pg_type: &PgType) -> String {
    let expr = expr.trim();
    if pg_type.has_bare_literals() {
        if let Some(constant) = fold_constant(expr) {
            return canonical_scalar(constant, pg_type);
        }
    }
    strip_cast(expr, pg_type.sql_name()).trim().to_string()
}

fn canonical_scalar(constant: String, pg_type: &PgType) -> String {
    let canonical = match pg_type {
        PgType::Integer | PgType::BigInt => constant.parse::<i64>().ok().map(|v| v.to_string()),
        PgType::DoublePrecision => constant.parse::<f64>().ok().map(|v| v.to_string()),
        PgType::Boolean => match constant.to_ascii_lowercase().as_str() {
            "true" | "t" => Some("true".to_string()),
            "false" | "f" => Some("false".to_string()),
            _ => None,
        },
        _ => None,
    };
    canonical.unwrap_or(constant)
}

/// float8 input text, spelling out the values Rust prints as `inf`.
fn float_text(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "Infinity".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        v.to_string()
    }
}

/// Postgres' own output format: seconds, then microseconds only when non-zero.
fn timestamp_text(t: &NaiveDateTime) -> String {
    let mut out = t.format("%Y-%m-%d %H:%M:%S").to_string();
    let micros = t.nanosecond() / 1_000;
    if micros > 0 {
        let frac = format!("{:06}", micros);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

fn array_text(items: &[DefaultValue]) -> String {
    let elements: Vec<String> = items.iter().map(array_element_text).collect();
    format!("{{{}}}", elements.join(","))
}

fn array_element_text(item: &DefaultValue) -> String {
    match item {
        DefaultValue::Integer(v) => v.to_string(),
        DefaultValue::Float(v) => float_text(*v),
        DefaultValue::Bool(true) => "t".to_string(),
        DefaultValue::Bool(false) => "f".to_string(),
        DefaultValue::Text(s) | DefaultValue::Json(s) => quote_array_element(s),
        DefaultValue::Bytes(b) => quote_array_element(&bytea_hex(b)),
        DefaultValue::Timestamp(t) => quote_array_element(&timestamp_text(t)),
        DefaultValue::Array(inner) => array_text(inner),
    }
}

fn quote_array_element(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.chars()
            .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace());
    if !needs_quotes {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A declared column. The name is the key it is stored under in [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Postgres type
    pub pg_type: PgType,
    /// Whether the column rejects NULL
    pub not_null: bool,
    /// Default value (if any)
    pub default: Option<DefaultValue>,
    /// Maximum length; only meaningful for [`PgType::Varchar`], zero otherwise
    pub length: i64,
}

impl Column {
    pub fn new(pg_type: PgType, default: Option<DefaultValue>, not_null: bool) -> Self {
        Self {
            pg_type,
            not_null,
            default,
            length: 0,
        }
    }

    /// The rendered default expression, empty when there is none.
    pub fn rendered_default(&self) -> String {
        render_default(self.default.as_ref(), &self.pg_type)
    }

    /// The type as written in DDL, with the length clause for varchar.
    pub fn type_sql(&self) -> String {
        if self.pg_type == PgType::Varchar && self.length > 0 {
            format!("{}({})", self.pg_type, self.length)
        } else {
            self.pg_type.to_string()
        }
    }
}

pub fn integer(default: impl Into<Option<i32>>, not_null: bool) -> Column {
    Column::new(PgType::Integer, default.into().map(Into::into), not_null)
}

pub fn bigint(default: impl Into<Option<i64>>, not_null: bool) -> Column {
    Column::new(PgType::BigInt, default.into().map(Into::into), not_null)
}

pub fn double_precision(default: impl Into<Option<f64>>, not_null: bool) -> Column {
    Column::new(
        PgType::DoublePrecision,
        default.into().map(Into::into),
        not_null,
    )
}

/// A `character varying(length)` column. A length of zero leaves it unbounded.
pub fn varchar<'a>(default: impl Into<Option<&'a str>>, length: i64, not_null: bool) -> Column {
    Column {
        length,
        ..Column::new(PgType::Varchar, default.into().map(Into::into), not_null)
    }
}

pub fn text<'a>(default: impl Into<Option<&'a str>>, not_null: bool) -> Column {
    Column::new(PgType::Text, default.into().map(Into::into), not_null)
}

pub fn boolean(default: impl Into<Option<bool>>, not_null: bool) -> Column {
    Column::new(PgType::Boolean, default.into().map(Into::into), not_null)
}

pub fn bytea(default: Option<Vec<u8>>, not_null: bool) -> Column {
    Column::new(PgType::Bytea, default.map(Into::into), not_null)
}

pub fn array(element: ArrayElement, default: Option<Vec<DefaultValue>>, not_null: bool) -> Column {
    Column::new(
        PgType::Array(element),
        default.map(DefaultValue::Array),
        not_null,
    )
}

/// A `jsonb` column; the default is raw JSON text.
pub fn jsonb<'a>(default: impl Into<Option<&'a str>>, not_null: bool) -> Column {
    Column::new(PgType::Jsonb, default.into().map(DefaultValue::json), not_null)
}

pub fn timestamp(default: impl Into<Option<NaiveDateTime>>, not_null: bool) -> Column {
    Column::new(PgType::Timestamp, default.into().map(Into::into), not_null)
}

/// What a key constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Unique,
    Reference,
}

/// A declared unique or foreign-key constraint. The constraint name is the
/// key it is stored under in [`Table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Column(s) in this table
    pub from_columns: Vec<String>,
    /// Referenced column(s); empty for unique keys
    pub to_columns: Vec<String>,
    /// Referenced table; empty for unique keys
    pub to_table: String,
    pub kind: KeyKind,
}

impl Key {
    pub fn is_unique(&self) -> bool {
        self.kind == KeyKind::Unique
    }

    pub fn is_reference(&self) -> bool {
        self.kind == KeyKind::Reference
    }

    /// Check that the key can be rendered as a constraint.
    pub fn validate(&self) -> Result<(), KeyError> {
        match self.kind {
            KeyKind::Unique if self.from_columns.is_empty() => Err(KeyError::NoColumns),
            KeyKind::Unique => Ok(()),
            KeyKind::Reference if self.to_table.is_empty() => Err(KeyError::NoTargetTable),
            KeyKind::Reference
                if self.from_columns.is_empty()
                    || self.from_columns.len() != self.to_columns.len() =>
            {
                Err(KeyError::Cardinality {
                    from: self.from_columns.len(),
                    to: self.to_columns.len(),
                })
            }
            KeyKind::Reference => Ok(()),
        }
    }
}

/// Why a declared key cannot be turned into a constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("unique key has no columns")]
    NoColumns,

    #[error("reference key has no target table")]
    NoTargetTable,

    #[error("reference key maps {from} column(s) onto {to} column(s)")]
    Cardinality { from: usize, to: usize },
}

fn names<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Vec<String> {
    columns.into_iter().map(Into::into).collect()
}

/// A unique constraint over one or more columns.
pub fn unique<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Key {
    Key {
        from_columns: names(columns),
        to_columns: Vec::new(),
        to_table: String::new(),
        kind: KeyKind::Unique,
    }
}

/// A single-column foreign key, `ON DELETE CASCADE`.
pub fn reference(
    from_column: impl Into<String>,
    to_table: impl Into<String>,
    to_column: impl Into<String>,
) -> Key {
    Key {
        from_columns: vec![from_column.into()],
        to_columns: vec![to_column.into()],
        to_table: to_table.into(),
        kind: KeyKind::Reference,
    }
}

/// A composite foreign key; columns pair up positionally.
pub fn reference_many<S: Into<String>, T: Into<String>>(
    from_columns: impl IntoIterator<Item = S>,
    to_table: impl Into<String>,
    to_columns: impl IntoIterator<Item = T>,
) -> Key {
    Key {
        from_columns: names(from_columns),
        to_columns: names(to_columns),
        to_table: to_table.into(),
        kind: KeyKind::Reference,
    }
}

/// A declared table.
///
/// Columns and keys keep their declaration order, which is also the order
/// their changes are emitted in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub columns: IndexMap<String, Column>,
    pub keys: IndexMap<String, Key>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a column. Declaring the same name twice keeps the last definition.
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// Add a key. Declaring the same name twice keeps the last definition.
    pub fn key(mut self, name: impl Into<String>, key: Key) -> Self {
        self.keys.insert(name.into(), key);
        self
    }
}

/// A column as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveColumn {
    /// `information_schema.columns.data_type`
    pub data_type: String,
    /// `information_schema.columns.udt_name`
    pub udt_name: String,
    /// Default expression text, empty if none
    pub default: String,
    /// Character maximum length, zero if not applicable
    pub length: i64,
    pub not_null: bool,
}

impl LiveColumn {
    /// Whether the live column has the declared type.
    ///
    /// Arrays are told apart by element type as well.
    pub fn same_type(&self, pg_type: &PgType) -> bool {
        self.data_type == pg_type.data_type()
            && (!matches!(pg_type, PgType::Array(_)) || self.udt_name == pg_type.udt_name())
    }
}

/// A unique or foreign-key constraint as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveKey {
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
    pub to_table: String,
    pub is_unique: bool,
    pub is_reference: bool,
}

/// The live shape of one table, built fresh for each reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveSchema {
    pub name: String,
    pub columns: IndexMap<String, LiveColumn>,
    pub keys: IndexMap<String, LiveKey>,
}

impl LiveSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when the catalog knows no columns for this table.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Unordered equality of two duplicate-free column lists.
///
/// Two empty lists are equal; otherwise every element of each side must
/// appear in the other.
pub fn same_columns(a: &[String], b: &[String]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
}
