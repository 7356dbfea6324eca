//! SQL text primitives.
//!
//! Everything here works on plain text: the rest of pqm builds DDL fragments
//! out of these pieces and compares catalog expressions with them.

use std::fmt::{self, Write};

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use pqm_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('\'')?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                f.write_str("''")?;
            } else {
                f.write_char(c)?;
            }
        }
        f.write_char('\'')
    }
}

/// Escape a string literal for SQL.
pub fn escape_string(s: &str) -> String {
    Lit(s).to_string()
}

/// A cast expression `<expr>::<type>`.
///
/// # Example
/// ```
/// use pqm_sql::Cast;
/// assert_eq!(Cast("0", "integer").to_string(), "0::integer");
/// ```
pub struct Cast<E: fmt::Display, T: AsRef<str>>(pub E, pub T);

impl<E: fmt::Display, T: AsRef<str>> fmt::Display for Cast<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.0, self.1.as_ref())
    }
}

/// Render bytes as the text of a bytea hex literal, without quotes.
///
/// # Example
/// ```
/// assert_eq!(pqm_sql::bytea_hex(&[0xde, 0xad]), "\\xdead");
/// ```
pub fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        // writing to a String cannot fail
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Strip one trailing `::<cast>` from an expression, if present.
///
/// # Example
/// ```
/// use pqm_sql::strip_cast;
/// assert_eq!(strip_cast("'x'::text", "text"), "'x'");
/// assert_eq!(strip_cast("0", "integer"), "0");
/// ```
pub fn strip_cast<'a>(expr: &'a str, cast: &str) -> &'a str {
    expr.strip_suffix(cast)
        .and_then(|rest| rest.strip_suffix("::"))
        .unwrap_or(expr)
}

/// Strip a surrounding pair of single quotes and undo `''` escaping.
///
/// Returns `None` when `expr` is not a single complete string literal.
///
/// # Example
/// ```
/// use pqm_sql::unquote_literal;
/// assert_eq!(unquote_literal("'-1'").as_deref(), Some("-1"));
/// assert_eq!(unquote_literal("'it''s'").as_deref(), Some("it's"));
/// assert_eq!(unquote_literal("0"), None);
/// ```
pub fn unquote_literal(expr: &str) -> Option<String> {
    let inner = expr.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // a lone quote means the literal ended early
            if chars.next_if_eq(&'\'').is_none() {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Reduce a deparsed constant expression to its literal text.
///
/// Postgres prints stored defaults through its deparser, which wraps
/// coerced constants in parens and spells unary minus as an operator:
/// `(7)::bigint`, `(- 1)`, `(- (5)::bigint)`, `'-1'::integer`. This peels
/// parens, casts and quotes and folds the minus signs, yielding `7`, `-1`,
/// `-5` and `-1`.
///
/// Returns `None` for anything that is not a single constant, such as a
/// function call.
///
/// # Example
/// ```
/// use pqm_sql::fold_constant;
/// assert_eq!(fold_constant("(- (5)::bigint)").as_deref(), Some("-5"));
/// assert_eq!(fold_constant("(0.5)::double precision").as_deref(), Some("0.5"));
/// assert_eq!(fold_constant("now()"), None);
/// ```
pub fn fold_constant(expr: &str) -> Option<String> {
    let expr = expr.trim();
    if let Some(inner) = strip_parens(expr) {
        return fold_constant(inner);
    }
    if let Some(rest) = expr.strip_prefix('-') {
        let folded = fold_constant(rest)?;
        return Some(match folded.strip_prefix('-') {
            Some(positive) => positive.to_string(),
            None => format!("-{}", folded),
        });
    }
    if let Some(head) = strip_any_cast(expr) {
        return fold_constant(head);
    }
    let atom = unquote_literal(expr).unwrap_or_else(|| expr.to_string());
    let is_atom = !atom.is_empty()
        && atom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
    is_atom.then_some(atom)
}

/// The inside of `(..)` when the opening paren closes at the very end.
fn strip_parens(expr: &str) -> Option<&str> {
    let inner = expr.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    let mut quoted = false;
    for c in inner.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                // the leading paren closed early, as in `(1) + (2)`
                depth = depth.checked_sub(1)?;
            }
            _ => {}
        }
    }
    (depth == 0 && !quoted).then_some(inner)
}

/// The expression before a trailing `::<type name>`, whatever the type.
fn strip_any_cast(expr: &str) -> Option<&str> {
    let at = expr.rfind("::")?;
    let type_name = expr[at + 2..].trim();
    let is_type_name = type_name.starts_with(|c: char| c.is_ascii_alphabetic())
        && type_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '_');
    is_type_name.then(|| expr[..at].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_cast_only_strips_matching_type() {
        assert_eq!(strip_cast("'x'::character varying", "text"), "'x'::character varying");
        assert_eq!(
            strip_cast("'x'::character varying", "character varying"),
            "'x'"
        );
        assert_eq!(strip_cast("'{1,2}'::integer[]", "integer[]"), "'{1,2}'");
    }

    #[test]
    fn test_unquote_rejects_concatenated_literals() {
        assert_eq!(unquote_literal("'a' || 'b'"), None);
        assert_eq!(unquote_literal("'a''"), None);
        assert_eq!(unquote_literal("''").as_deref(), Some(""));
    }

    #[test]
    fn test_bytea_hex_empty() {
        assert_eq!(bytea_hex(&[]), "\\x");
    }

    #[test]
    fn test_fold_constant_deparsed_forms() {
        let cases = [
            ("0", "0"),
            ("(7)::bigint", "7"),
            ("(0.5)::double precision", "0.5"),
            ("(- 1)", "-1"),
            ("(- (5)::bigint)", "-5"),
            ("'-1'::integer", "-1"),
            ("'-0.5'::double precision", "-0.5"),
            ("('-5'::integer)::bigint", "-5"),
            ("-(-3)", "3"),
            ("'Infinity'::double precision", "Infinity"),
            ("true", "true"),
        ];
        for (expr, folded) in cases {
            assert_eq!(fold_constant(expr).as_deref(), Some(folded), "{expr}");
        }
    }

    #[test]
    fn test_fold_constant_rejects_expressions() {
        assert_eq!(fold_constant(""), None);
        assert_eq!(fold_constant("now()"), None);
        assert_eq!(fold_constant("nextval('t_id_seq'::regclass)"), None);
        assert_eq!(fold_constant("(1) + (2)"), None);
        assert_eq!(fold_constant("'a b'::text"), None);
    }

    proptest! {
        #[test]
        fn fold_constant_reads_signed_integers(v in any::<i64>()) {
            let quoted = format!("'{}'::bigint", v);
            prop_assert_eq!(fold_constant(&quoted), Some(v.to_string()));
            let deparsed = if v < 0 {
                format!("(- ({})::bigint)", v.unsigned_abs())
            } else {
                format!("({})::bigint", v)
            };
            prop_assert_eq!(fold_constant(&deparsed), Some(v.to_string()));
        }

        #[test]
        fn lit_then_unquote_is_identity(s in ".*") {
            prop_assert_eq!(unquote_literal(&escape_string(&s)), Some(s));
        }
    }
}
