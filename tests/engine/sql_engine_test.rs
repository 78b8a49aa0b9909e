//! The orchestrator over a recording SQL driver.

#[path = "../common/mod.rs"]
mod common;

use std::any::Any;
use std::sync::Arc;

use common::{doc, map, FakeSqlDriver};
use strata::codec::UserTypeRegistry;
use strata::engine::{EntityHelpers, RowAdapter, RowDecoder};
use strata::error::{Error, PlanningError};
use strata::prelude::*;
use strata::sql::{default_binders, SqlArg};

fn orders() -> EntityViewRef {
    EntityViewRef::new("Order", "core")
}

fn text(s: &str) -> SqlArg {
    SqlArg::Plain(Value::from(s))
}

#[test]
fn test_postgres_insert_reads_key_from_returning() {
    let driver = FakeSqlDriver::new().with_rows(vec![vec![("id".into(), Value::Long(42))]]);
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let mut order = doc([("tenantId", "t1".into()), ("status", "NEW".into())]);
    engine.insert(&mut ctx, &orders(), &mut order).unwrap();

    assert_eq!(order.get("id"), Some(&Value::Long(42)));
    let state = driver.state();
    assert_eq!((state.connects, state.begins, state.commits, state.rollbacks), (1, 1, 1, 0));
    let (sql, args, in_tx) = &state.statements[0];
    assert_eq!(
        sql,
        r#"INSERT INTO "orders" ("tenant_id", "status") VALUES ($1, $2) RETURNING "id""#
    );
    assert_eq!(args, &[text("t1"), text("NEW")]);
    assert!(*in_tx);
    assert!(!ctx.in_transaction());
}

#[test]
fn test_ansi_insert_reads_generated_key() {
    let driver = FakeSqlDriver::new();
    driver.state().generated_key = Some(Value::Long(7));
    let engine = common::sql_engine(Dialect::Ansi, driver.clone());
    let mut ctx = engine.context();

    let mut order = doc([("status", "NEW".into())]);
    engine.insert(&mut ctx, &orders(), &mut order).unwrap();

    assert_eq!(order.get("id"), Some(&Value::Long(7)));
    assert_eq!(driver.sql(), [r#"INSERT INTO "orders" ("status") VALUES (?)"#]);
}

#[test]
fn test_present_key_is_not_written_back() {
    let driver = FakeSqlDriver::new().with_rows(vec![vec![("id".into(), Value::Long(42))]]);
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let mut order = doc([("id", Value::Long(5)), ("status", "NEW".into())]);
    engine.insert(&mut ctx, &orders(), &mut order).unwrap();

    assert_eq!(order.get("id"), Some(&Value::Long(5)));
    assert!(!driver.sql()[0].contains("RETURNING"));
}

#[test]
fn test_select_decodes_rows_through_the_view() {
    let driver = FakeSqlDriver::new().with_rows(vec![vec![
        ("id".into(), Value::Long(1)),
        ("tenantId".into(), "t1".into()),
        ("status".into(), "NEW".into()),
        ("customer.name".into(), "Ada".into()),
    ]]);
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let rows: Vec<Document> = engine
        .select(&mut ctx, &orders(), &Query::of(filters::eq("status", "NEW")))
        .unwrap();

    assert_eq!(
        rows,
        vec![doc([
            ("id", Value::Long(1)),
            ("tenantId", "t1".into()),
            ("status", "NEW".into()),
            ("customer", map(vec![("name", "Ada".into())])),
        ])]
    );
    let state = driver.state();
    assert_eq!((state.connects, state.begins), (1, 0));
    assert!(state.statements[0].0.ends_with("WHERE status = $1 LIMIT 50 OFFSET 0"));
    assert!(!state.statements[0].2);
}

#[derive(Debug, PartialEq)]
struct OrderSummary {
    id: i64,
    status: String,
}

struct SummaryDecoder;

impl RowDecoder for SummaryDecoder {
    fn read(&self, row: &dyn RowAdapter) -> strata::Result<Box<dyn Any + Send>> {
        let id = row.decode("id", "long")?.as_i64().unwrap_or_default();
        let status = match row.decode("status", "string")? {
            Value::String(s) => s,
            _ => String::new(),
        };
        Ok(Box::new(OrderSummary { id, status }))
    }
}

#[test]
fn test_select_into_typed_rows() {
    let driver = FakeSqlDriver::new().with_rows(vec![
        vec![("id".into(), Value::Long(1)), ("status".into(), "NEW".into())],
        vec![("id".into(), Value::Long(2)), ("status".into(), "PAID".into())],
    ]);
    let authoring = common::authoring("long");
    let mut helpers = HelperRegistry::new();
    helpers.register("Order", EntityHelpers::new().with_decoder(Arc::new(SummaryDecoder)));
    let backend = SqlBackend::new(
        driver,
        Dialect::Postgres,
        Arc::new(UserTypeRegistry::with_defaults("postgres")),
        Arc::new(default_binders()),
    );
    let engine = DataEngine::new(
        common::handle(),
        SqlCompiler::new(Dialect::Postgres),
        backend,
        authoring,
        Arc::new(helpers),
    );
    let mut ctx = engine.context();

    let rows: Vec<OrderSummary> = engine.select(&mut ctx, &orders(), &Query::new()).unwrap();
    assert_eq!(
        rows,
        [
            OrderSummary { id: 1, status: "NEW".into() },
            OrderSummary { id: 2, status: "PAID".into() },
        ]
    );

    let err = engine
        .select::<Document>(&mut ctx, &orders(), &Query::new())
        .unwrap_err();
    assert!(matches!(err, Error::Planning(PlanningError::PayloadType(t)) if t == "Order"));

    let mut order = doc([("status", "NEW".into())]);
    let err = engine.insert(&mut ctx, &orders(), &mut order).unwrap_err();
    assert_eq!(err.to_string(), "No accessor registered for entity type 'Order'");
}

#[test]
fn test_count_reads_first_column() {
    let driver = FakeSqlDriver::new().with_rows(vec![vec![("count".into(), Value::Long(3))]]);
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let n = engine
        .count(&mut ctx, &orders(), &Query::of(filters::gt("total", 10i64)))
        .unwrap();
    assert_eq!(n, 3);
    assert!(driver.sql()[0].starts_with("SELECT COUNT(1) FROM (SELECT "));
}

#[test]
fn test_schema_placeholder_resolves_from_handle() {
    let driver = FakeSqlDriver::new();
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let query = Query::new().param("tenant", "t1");
    let rows: Vec<Document> = engine
        .select(&mut ctx, &EntityViewRef::new("Order", "open"), &query)
        .unwrap();
    assert!(rows.is_empty());

    let state = driver.state();
    let (sql, args, _) = &state.statements[0];
    assert!(sql.starts_with("SELECT * FROM sales.orders WHERE tenant_id = $1"), "{sql}");
    assert_eq!(args.len(), 1);
}

#[test]
fn test_bulk_update_runs_in_one_transaction() {
    let driver = FakeSqlDriver::new();
    driver.state().affected = 1;
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let orders_in = [
        doc([("id", Value::Long(1)), ("status", "PAID".into())]),
        doc([("id", Value::Long(2)), ("status", "VOID".into())]),
    ];
    let n = engine.bulk_update(&mut ctx, &orders(), &orders_in).unwrap();

    assert_eq!(n, 2);
    let state = driver.state();
    assert_eq!((state.begins, state.commits), (1, 1));
    assert_eq!(state.statements.len(), 2);
    assert!(state.statements.iter().all(|(_, _, in_tx)| *in_tx));
    assert_eq!(
        state.statements[1].0,
        r#"UPDATE "orders" SET "status" = $1 WHERE id = $2"#
    );
    assert_eq!(state.statements[1].1, [text("VOID"), SqlArg::Plain(Value::Long(2))]);
}

#[test]
fn test_planning_failure_never_opens_a_transaction() {
    let driver = FakeSqlDriver::new();
    let engine = common::sql_engine(Dialect::Ansi, driver.clone());
    let mut ctx = engine.context();

    let mut batch = [doc([("id", Value::Long(1)), ("status", "NEW".into())])];
    let err = engine.bulk_upsert(&mut ctx, &orders(), &mut batch).unwrap_err();
    assert!(matches!(err, Error::Planning(PlanningError::UnsupportedUpsert(d)) if d == "ansi"));

    let err = engine
        .update(&mut ctx, &orders(), &doc([("id", Value::Long(1))]))
        .unwrap_err();
    assert!(matches!(err, Error::Planning(PlanningError::EmptyUpdate(_))));

    let err = engine
        .count(&mut ctx, &EntityViewRef::new("Order", "missing"), &Query::new())
        .unwrap_err();
    assert!(matches!(err, Error::Authoring(_)));

    let state = driver.state();
    assert_eq!((state.connects, state.begins), (0, 0));
}

#[test]
fn test_driver_failure_rolls_back_and_names_the_operation() {
    let driver = FakeSqlDriver::new();
    driver.state().fail_on = Some("DELETE".into());
    let engine = common::sql_engine(Dialect::Postgres, driver.clone());
    let mut ctx = engine.context();

    let err = engine
        .delete_by_criteria(&mut ctx, &orders(), &Query::of(filters::eq("status", "VOID")))
        .unwrap_err();

    match &err {
        Error::Backend(e) => assert_eq!(e.operation, "delete"),
        other => panic!("expected a backend error, got {other:?}"),
    }
    assert_eq!(err.to_string(), "backend error during delete: injected failure on DELETE");
    let state = driver.state();
    assert_eq!((state.begins, state.commits, state.rollbacks), (1, 0, 1));
}
