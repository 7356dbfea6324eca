//! Generate a Rust declaration from a live table, for adopting a table that
//! was created by hand.

use super::{ArrayElement, LiveColumn, LiveKey, LiveSchema, PgType, normalize_default};
use pqm_sql::unquote_literal;

/// Render `live` as a `Table::new(..)` builder chain.
///
/// Columns whose type has no declaration counterpart, and defaults that
/// cannot be written as a Rust literal, are emitted as comments.
pub fn live_to_rust(live: &LiveSchema) -> String {
    let mut out = format!("Table::new({:?})", live.name);

    for (name, column) in &live.columns {
        out.push_str("\n    ");
        match column_to_rust(column) {
            Some((call, None)) => out.push_str(&format!(".column({:?}, {})", name, call)),
            Some((call, Some(default))) => out.push_str(&format!(
                ".column({:?}, {}) // default: {}",
                name, call, default
            )),
            None => out.push_str(&format!(
                "// unsupported column {}: {} ({})",
                name, column.data_type, column.udt_name
            )),
        }
    }

    for (name, key) in &live.keys {
        out.push_str("\n    ");
        match key_to_rust(key) {
            Some(call) => out.push_str(&format!(".key({:?}, {})", name, call)),
            None => out.push_str(&format!("// unsupported constraint {}", name)),
        }
    }

    out
}

/// The builder call, plus the raw default when it had to be dropped.
fn column_to_rust(column: &LiveColumn) -> Option<(String, Option<String>)> {
    let pg_type = PgType::from_udt_name(&column.udt_name)?;
    let nn = column.not_null;
    let normalized = normalize_default(&column.default, &pg_type);
    let literal = default_literal(&normalized, &pg_type);
    let dropped = match (&literal, normalized.is_empty()) {
        (None, false) => Some(column.default.clone()),
        _ => None,
    };
    let default = literal.unwrap_or_else(|| "None".to_string());

    let call = match pg_type {
        PgType::Integer => format!("integer({}, {})", default, nn),
        PgType::BigInt => format!("bigint({}, {})", default, nn),
        PgType::DoublePrecision => format!("double_precision({}, {})", default, nn),
        PgType::Varchar => format!("varchar({}, {}, {})", default, column.length, nn),
        PgType::Text => format!("text({}, {})", default, nn),
        PgType::Boolean => format!("boolean({}, {})", default, nn),
        PgType::Bytea => format!("bytea({}, {})", default, nn),
        PgType::Array(element) => format!(
            "array(ArrayElement::{}, {}, {})",
            element_name(element),
            default,
            nn
        ),
        PgType::Jsonb => format!("jsonb({}, {})", default, nn),
        PgType::Timestamp => format!("timestamp({}, {})", default, nn),
    };
    Some((call, dropped))
}

fn default_literal(normalized: &str, pg_type: &PgType) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }
    match pg_type {
        PgType::Integer => normalized.parse::<i32>().ok().map(|v| v.to_string()),
        PgType::BigInt => normalized.parse::<i64>().ok().map(|v| v.to_string()),
        PgType::DoublePrecision => normalized
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| format!("{:?}", v)),
        PgType::Boolean => normalized.parse::<bool>().ok().map(|v| v.to_string()),
        PgType::Varchar | PgType::Text | PgType::Jsonb => {
            unquote_literal(normalized).map(|s| format!("{:?}", s))
        }
        PgType::Bytea | PgType::Array(_) | PgType::Timestamp => None,
    }
}

fn element_name(element: ArrayElement) -> &'static str {
    match element {
        ArrayElement::Integer => "Integer",
        ArrayElement::BigInt => "BigInt",
        ArrayElement::DoublePrecision => "DoublePrecision",
        ArrayElement::Text => "Text",
        ArrayElement::Boolean => "Boolean",
    }
}

fn key_to_rust(key: &LiveKey) -> Option<String> {
    if key.is_unique {
        return Some(format!("unique({:?})", key.from_columns));
    }
    if !key.is_reference {
        return None;
    }
    match (key.from_columns.as_slice(), key.to_columns.as_slice()) {
        ([from], [to]) => Some(format!(
            "reference({:?}, {:?}, {:?})",
            from, key.to_table, to
        )),
        _ => Some(format!(
            "reference_many({:?}, {:?}, {:?})",
            key.from_columns, key.to_table, key.to_columns
        )),
    }
}
