use super::*;
use chrono::NaiveDate;
use proptest::prelude::*;

fn ts(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_micro_opt(h, m, s, micro)
        .unwrap()
}

#[test]
fn test_render_default_none_is_empty() {
    assert_eq!(render_default(None, &PgType::Integer), "");
    assert_eq!(text(None, true).rendered_default(), "");
}

#[test]
fn test_render_default_scalars() {
    assert_eq!(integer(0, true).rendered_default(), "0::integer");
    assert_eq!(bigint(-5, false).rendered_default(), "'-5'::bigint");
    assert_eq!(
        double_precision(0.5, false).rendered_default(),
        "0.5::double precision"
    );
    assert_eq!(boolean(true, false).rendered_default(), "true::boolean");
}

#[test]
fn test_render_default_signed_extremes() {
    assert_eq!(
        integer(i32::MIN, false).rendered_default(),
        "'-2147483648'::integer"
    );
    assert_eq!(
        bigint(i64::MIN, false).rendered_default(),
        "'-9223372036854775808'::bigint"
    );
    assert_eq!(
        double_precision(-0.5, false).rendered_default(),
        "'-0.5'::double precision"
    );
    assert_eq!(
        double_precision(f64::INFINITY, false).rendered_default(),
        "'Infinity'::double precision"
    );
    assert_eq!(
        double_precision(f64::NAN, false).rendered_default(),
        "'NaN'::double precision"
    );
}

#[test]
fn test_render_default_quoted_types() {
    assert_eq!(text("it's", false).rendered_default(), "'it''s'::text");
    assert_eq!(
        varchar("guest", 20, false).rendered_default(),
        "'guest'::character varying"
    );
    assert_eq!(
        jsonb(r#"{"a": 1}"#, false).rendered_default(),
        r#"'{"a": 1}'::jsonb"#
    );
    assert_eq!(
        bytea(Some(vec![0xca, 0xfe]), false).rendered_default(),
        "'\\xcafe'::bytea"
    );
}

#[test]
fn test_render_default_timestamp() {
    assert_eq!(
        timestamp(ts(10, 0, 0, 0), false).rendered_default(),
        "'2024-03-09 10:00:00'::timestamp without time zone"
    );
    assert_eq!(
        timestamp(ts(10, 0, 0, 500_000), false).rendered_default(),
        "'2024-03-09 10:00:00.5'::timestamp without time zone"
    );
}

#[test]
fn test_render_default_arrays() {
    let col = array(
        ArrayElement::Text,
        Some(vec!["a".into(), "b c".into(), "".into()]),
        false,
    );
    assert_eq!(col.rendered_default(), r#"'{a,"b c",""}'::text[]"#);

    let col = array(
        ArrayElement::Boolean,
        Some(vec![true.into(), false.into()]),
        false,
    );
    assert_eq!(col.rendered_default(), "'{t,f}'::boolean[]");

    let col = array(ArrayElement::Integer, Some(vec![]), false);
    assert_eq!(col.rendered_default(), "'{}'::integer[]");
}

#[test]
fn test_normalize_matches_catalog_forms() {
    // information_schema.columns.column_default as Postgres deparses it
    let cases: &[(Column, &str)] = &[
        (integer(0, true), "0"),
        (integer(-1, true), "(- 1)"),
        (integer(-1, true), "'-1'::integer"),
        (integer(i32::MIN, false), "'-2147483648'::integer"),
        (bigint(7, false), "(7)::bigint"),
        (bigint(-5, false), "(- (5)::bigint)"),
        (bigint(-5, false), "'-5'::bigint"),
        (bigint(i64::MIN, false), "'-9223372036854775808'::bigint"),
        (double_precision(0.5, false), "(0.5)::double precision"),
        (double_precision(1.0, false), "(1)::double precision"),
        (double_precision(-0.5, false), "'-0.5'::double precision"),
        (boolean(false, false), "false"),
        (text("x", false), "'x'::text"),
        (varchar("x", 10, false), "'x'::character varying"),
        (
            timestamp(ts(1, 2, 3, 0), false),
            "'2024-03-09 01:02:03'::timestamp without time zone",
        ),
    ];
    for (column, catalog) in cases {
        assert_eq!(
            normalize_default(catalog, &column.pg_type),
            normalize_default(&column.rendered_default(), &column.pg_type),
            "{catalog}"
        );
    }
}

#[test]
fn test_normalize_tells_values_apart() {
    assert_ne!(
        normalize_default("(7)::bigint", &PgType::BigInt),
        normalize_default("(- (7)::bigint)", &PgType::BigInt)
    );
    assert_ne!(
        normalize_default("(0.5)::double precision", &PgType::DoublePrecision),
        normalize_default("'0.25'::double precision", &PgType::DoublePrecision)
    );
}

#[test]
fn test_normalize_leaves_expressions_alone() {
    assert_eq!(
        normalize_default("nextval('t_n_seq'::regclass)", &PgType::BigInt),
        "nextval('t_n_seq'::regclass)"
    );
}

#[test]
fn test_normalize_keeps_text_quotes() {
    // '1' and 1 are different text defaults
    assert_eq!(normalize_default("'1'::text", &PgType::Text), "'1'");
    assert_ne!(
        normalize_default("'1'::text", &PgType::Text),
        normalize_default("1", &PgType::Text)
    );
}

#[test]
fn test_normalize_empty() {
    assert_eq!(normalize_default("", &PgType::Integer), "");
    assert_eq!(normalize_default("  ", &PgType::Text), "");
}

#[test]
fn test_length_only_set_for_varchar() {
    assert_eq!(varchar(None, 50, false).length, 50);
    assert_eq!(text(None, false).length, 0);
    assert_eq!(integer(None, false).length, 0);
}

#[test]
fn test_type_sql() {
    assert_eq!(varchar(None, 50, false).type_sql(), "character varying(50)");
    assert_eq!(varchar(None, 0, false).type_sql(), "character varying");
    assert_eq!(
        array(ArrayElement::BigInt, None, false).type_sql(),
        "bigint[]"
    );
    assert_eq!(timestamp(None, false).type_sql(), "timestamp without time zone");
}

#[test]
fn test_array_data_type_and_udt() {
    let ty = PgType::Array(ArrayElement::Integer);
    assert_eq!(ty.data_type(), "ARRAY");
    assert_eq!(PgType::from_udt_name(ty.udt_name()), Some(ty));
    assert_eq!(PgType::from_udt_name("uuid"), None);
}

#[test]
fn test_live_column_same_type() {
    let live = LiveColumn {
        data_type: "ARRAY".to_string(),
        udt_name: "_text".to_string(),
        ..Default::default()
    };
    assert!(live.same_type(&PgType::Array(ArrayElement::Text)));
    assert!(!live.same_type(&PgType::Array(ArrayElement::Integer)));
    assert!(!live.same_type(&PgType::Text));
}

#[test]
fn test_key_builders() {
    let k = unique(["email"]);
    assert!(k.is_unique() && !k.is_reference());
    assert!(k.to_columns.is_empty() && k.to_table.is_empty());

    let k = reference("owner_id", "users", "id");
    assert!(k.is_reference() && !k.is_unique());
    assert_eq!(k.from_columns, vec!["owner_id"]);
    assert_eq!(k.to_columns, vec!["id"]);
    assert_eq!(k.to_table, "users");
}

#[test]
fn test_key_validate() {
    assert_eq!(unique(Vec::<String>::new()).validate(), Err(KeyError::NoColumns));
    assert_eq!(reference("a", "", "b").validate(), Err(KeyError::NoTargetTable));
    assert_eq!(
        reference_many(["a", "b"], "t", ["x"]).validate(),
        Err(KeyError::Cardinality { from: 2, to: 1 })
    );
    assert!(reference_many(["a", "b"], "t", ["x", "y"]).validate().is_ok());
    assert!(unique(["a", "b"]).validate().is_ok());
}

#[test]
fn test_table_keeps_declaration_order() {
    let t = Table::new("t")
        .column("b", text(None, false))
        .column("a", text(None, false))
        .key("uq_b", unique(["b"]));
    let names: Vec<&str> = t.columns.keys().map(String::as_str).collect();
    assert_eq!(names, ["b", "a"]);
    assert_eq!(t.keys.len(), 1);
}

#[test]
fn test_same_columns_empty() {
    assert!(same_columns(&[], &[]));
    assert!(!same_columns(&["a".to_string()], &[]));
}

fn column_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[a-z]{1,6}", 1..6)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn same_columns_ignores_order(names in column_names(), seed in any::<u64>()) {
        let mut shuffled = names.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();
        prop_assert!(same_columns(&names, &shuffled));
    }

    #[test]
    fn same_columns_rejects_different_cardinality(names in column_names(), extra in "[A-Z]{1,4}") {
        let mut more = names.clone();
        more.push(extra);
        prop_assert!(!same_columns(&names, &more));
        prop_assert!(!same_columns(&more, &names));
    }

    #[test]
    fn render_default_is_deterministic(v in any::<i64>(), s in ".*", f in -1e9f64..1e9f64) {
        let int = bigint(v, false);
        prop_assert_eq!(int.rendered_default(), int.rendered_default());
        let txt = text(s.as_str(), false);
        prop_assert_eq!(txt.rendered_default(), txt.rendered_default());
        let dbl = double_precision(f, false);
        prop_assert_eq!(dbl.rendered_default(), dbl.rendered_default());
    }

    #[test]
    fn rendered_default_survives_normalization(v in any::<i32>()) {
        let col = integer(v, false);
        // int4 constants come back bare unless negative
        let catalog = if v < 0 {
            format!("'{}'::integer", v)
        } else {
            v.to_string()
        };
        prop_assert_eq!(
            normalize_default(&col.rendered_default(), &col.pg_type),
            v.to_string()
        );
        prop_assert_eq!(normalize_default(&catalog, &col.pg_type), v.to_string());
    }

    #[test]
    fn float_default_survives_normalization(f in -1e9f64..1e9f64) {
        let col = double_precision(f, false);
        let catalog = if f.is_sign_negative() {
            format!("'{}'::double precision", f)
        } else {
            format!("({})::double precision", f)
        };
        prop_assert_eq!(
            normalize_default(&catalog, &col.pg_type),
            normalize_default(&col.rendered_default(), &col.pg_type)
        );
    }
}
