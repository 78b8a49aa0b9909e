//! Canonical and legacy wire forms, end to end into compiled SQL.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;

use insta::assert_snapshot;
use proptest::prelude::*;
use serde_json::json;

use strata::codec::UserTypeRegistry;
use strata::dialect::NativeDialect;
use strata::dml::Bind;
use strata::error::WireError;
use strata::query::{filters, normalize, Clause, Condition, Operator, Page, Query, QueryElement, SortDir, SortField};
use strata::sql::{Dialect, SqlCompiler, SqlStatement};
use strata::Value;

fn compile(query: &Query) -> SqlStatement {
    let types = common::resolver();
    let order = types.authoring().entity("Order").unwrap();
    let view = &order.views["core"];
    let filter = normalize(query).unwrap();
    SqlCompiler::new(Dialect::Postgres)
        .merge_select(order, view, filter.as_ref(), &query.sort, &query.page, &query.params, &types)
        .unwrap()
}

#[test]
fn test_not_eq_from_wire_compiles_to_negated_predicate() {
    let query = Query::from_wire(&json!({
        "filter": {"not": {"eq": {"field": "tenantId", "value": "t1"}}}
    }))
    .unwrap();

    let stmt = compile(&query);
    assert_snapshot!(stmt.sql, @r#"SELECT id AS "id", tenant_id AS "tenantId", status AS "status", total AS "total", tags AS "tags", meta AS "meta", customer_name AS "customer.name" FROM "orders" WHERE NOT (tenant_id = :b1) LIMIT 50 OFFSET 0"#);
    assert_eq!(stmt.binds, vec![Bind::new("t1", "string")]);
}

#[test]
fn test_full_query_document() {
    let query: Query = r#"{
        "filter": {"and": [
            {"in": {"field": "status", "values": ["NEW", "PAID"]}},
            {"range": {"field": "total", "lower": 10, "upper": 20}}
        ]},
        "page": {"type": "offset", "offset": 40, "limit": 20},
        "sort": [{"field": "total", "dir": "desc"}, {"field": "status"}],
        "projection": ["status"],
        "groupBy": {"fields": ["status"]},
        "params": {"tenant": "t1"}
    }"#
    .parse()
    .unwrap();

    assert_eq!(
        query.filter,
        Some(filters::and([
            filters::in_list("status", ["NEW", "PAID"]),
            filters::range("total", 10i64, 20i64),
        ]))
    );
    assert_eq!(query.page, Page::offset(40, 20));
    assert_eq!(
        query.sort,
        vec![
            SortField { field: "total".into(), dir: SortDir::Desc },
            SortField::asc("status"),
        ]
    );
    assert_eq!(query.projection, ["status"]);
    assert_eq!(query.group_by, ["status"]);
    assert_eq!(query.params.get("tenant"), Some(&Value::from("t1")));

    let stmt = compile(&query);
    assert!(stmt.sql.ends_with(
        "WHERE (status IN (:b1, :b2) AND total BETWEEN :b3 AND :b4) ORDER BY total DESC, status ASC LIMIT 20 OFFSET 40"
    ));
    assert_eq!(stmt.binds.len(), 4);
}

#[test]
fn test_legacy_shapes_parse_to_the_same_tree() {
    let canonical = QueryElement::from_wire(&json!({"or": [
        {"eq": {"field": "status", "value": "NEW"}},
        {"gt": {"field": "total", "value": 5, "not": true}}
    ]}))
    .unwrap();

    let legacy_object = QueryElement::from_wire(&json!({
        "clause": "OR",
        "elements": [
            {"operator": "EQ", "property": "status", "value": "NEW"},
            {"operator": "gt", "property": "total", "value": 5, "not": true}
        ]
    }))
    .unwrap();

    let legacy_list = QueryElement::from_wire(&json!([
        {"clause": "or"},
        {"operator": "EQ", "property": "status", "value": "NEW"},
        {"op": "GT", "propertyPath": "total", "value": 5, "not": "true"}
    ]))
    .unwrap();

    assert_eq!(canonical, legacy_object);
    assert_eq!(canonical, legacy_list);
    assert!(matches!(canonical, Some(QueryElement::Group { clause: Clause::Or, .. })));
}

#[test]
fn test_legacy_range_accepts_from_and_to() {
    let el = QueryElement::from_wire(&json!({
        "operator": "RANGE", "property": "total", "from": 1, "to": 9
    }))
    .unwrap();
    assert_eq!(el, Some(filters::range("total", 1i64, 9i64)));
}

#[test]
fn test_wire_output_is_canonical() {
    let query = Query::of(filters::and([
        filters::not(filters::eq("status", "NEW")),
        filters::nin("status", ["X"]),
        filters::eq("tenantId", filters::param("tenant")),
    ]))
    .param("tenant", "t1")
    .page(Page::offset(0, 10))
    .sort(SortField::desc("total"));

    assert_eq!(
        query.to_wire(),
        json!({
            "filter": {"and": [
                {"not": {"eq": {"field": "status", "value": "NEW"}}},
                {"nin": {"field": "status", "values": ["X"]}},
                {"eq": {"field": "tenantId", "value": {"param": "tenant"}}}
            ]},
            "page": {"type": "offset", "offset": 0, "limit": 10},
            "sort": [{"field": "total", "dir": "DESC"}],
            "params": {"tenant": "t1"}
        })
    );
    assert_eq!(Query::from_wire(&query.to_wire()).unwrap(), query);
}

#[test]
fn test_seek_page_carries_after_values() {
    let query = Query::from_wire(&json!({
        "page": {"type": "seek", "limit": 2, "after": {"total": 100}},
        "sort": [{"field": "total", "dir": "ASC"}]
    }))
    .unwrap();

    let stmt = compile(&query);
    assert!(stmt.sql.ends_with("WHERE (total > :b1) ORDER BY total ASC LIMIT 2"));
    assert_eq!(stmt.binds, vec![Bind::new(100i64, "long")]);
}

#[test]
fn test_page_defaults_and_rejections() {
    let query = Query::from_wire(&json!({"page": {}})).unwrap();
    assert_eq!(query.page, Page::offset(0, 50));

    assert!(matches!(
        Query::from_wire(&json!({"page": {"limit": 0}})),
        Err(WireError::InvalidPage(_))
    ));
    assert!(matches!(
        Query::from_wire(&json!({"page": {"offset": -1, "limit": 5}})),
        Err(WireError::InvalidPage(_))
    ));
}

#[test]
fn test_malformed_input() {
    assert!(matches!("{".parse::<Query>(), Err(WireError::Syntax(_))));
    assert!(matches!(
        QueryElement::from_wire(&json!({"between": {"field": "a"}})),
        Err(WireError::UnknownElement(_))
    ));
    assert!(matches!(
        QueryElement::from_wire(&json!({"eq": ["a", 1]})),
        Err(WireError::OperatorBody(op)) if op == "eq"
    ));
    assert!(matches!(
        QueryElement::from_wire(&json!({"operator": "SOUNDS_LIKE", "property": "a"})),
        Err(WireError::UnknownOperator(_))
    ));
    assert_eq!(QueryElement::from_wire(&json!(null)).unwrap(), None);
    assert_eq!(QueryElement::from_wire(&json!({"not": null})).unwrap(), None);
}

#[test]
fn test_int_operands_widen_to_long_on_the_wire() {
    let query = Query::of(filters::eq("total", Value::Int(5)));
    let parsed = Query::from_wire(&query.to_wire()).unwrap();
    let Some(QueryElement::Condition(c)) = &parsed.filter else {
        panic!("expected a condition, got {:?}", parsed.filter);
    };
    // JSON numbers carry no width; the bind type narrows them again.
    assert_eq!(c.value, Value::Long(5));
    let types = UserTypeRegistry::with_defaults("postgres");
    assert_eq!(types.decode("int", &c.value).unwrap(), Value::Int(5));
}

fn scalar() -> BoxedStrategy<Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Long),
        (-1000i32..1000).prop_map(|n| Value::Double(f64::from(n) + 0.5)),
        "\\PC{0,8}".prop_map(Value::String),
        "[a-z]{1,5}".prop_map(Value::Param),
    ]
    .boxed()
}

/// Nested JSON fragment; keys never spell a param reference.
fn fragment() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::List),
            prop::collection::btree_map("k[a-z]{0,4}", inner, 0..3).prop_map(Value::Map),
        ]
    })
}

fn condition() -> impl Strategy<Value = QueryElement> {
    (
        prop::sample::select(Operator::ALL.to_vec()),
        "[a-z]{1,6}(\\.[a-z]{1,4})?",
        any::<bool>(),
        scalar(),
        scalar(),
        prop::collection::vec(scalar(), 0..4),
        "[a-z]{1,4}",
        fragment(),
    )
        .prop_map(|(op, property, not, a, b, list, path, nested)| {
            let mut c = Condition::new(property, op, Value::Null);
            c.not = not;
            match op {
                Operator::Range => {
                    c.lower = a;
                    c.upper = b;
                }
                Operator::JsonPathExists => c.value = Value::String(format!("$.{path}")),
                Operator::JsonValueEq => {
                    c.value = Value::Map(BTreeMap::from([
                        ("path".to_string(), Value::String(format!("$.{path}"))),
                        ("value".to_string(), nested),
                    ]))
                }
                op if op.is_list_shaped() => c.value = Value::List(list),
                _ => c.value = a,
            }
            c.into()
        })
}

fn element() -> impl Strategy<Value = QueryElement> {
    condition().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|v| filters::and(v)),
            prop::collection::vec(inner.clone(), 0..4).prop_map(|v| filters::or(v)),
            inner.prop_map(filters::not),
        ]
    })
}

proptest! {
    #[test]
    fn test_wire_form_round_trips(
        filter in element(),
        sort in prop::collection::vec(("[a-z]{1,6}", any::<bool>()), 0..3),
        offset in 0u64..500,
        limit in 1u64..200,
    ) {
        let mut query = Query::of(filter).page(Page::offset(offset, limit));
        for (field, desc) in sort {
            query = query.sort(if desc { SortField::desc(field) } else { SortField::asc(field) });
        }

        let wire = query.to_wire();
        let parsed = Query::from_wire(&wire).unwrap();
        prop_assert_eq!(&parsed, &query);
        prop_assert_eq!(parsed.to_wire(), wire.clone());

        let text: Query = wire.to_string().parse().unwrap();
        prop_assert_eq!(text, query);
    }
}
