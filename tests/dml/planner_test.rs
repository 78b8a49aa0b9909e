//! Write planning over typed payloads with hand-written accessors.

#[path = "../common/mod.rs"]
mod common;

use std::any::Any;
use std::sync::Arc;

use strata::authoring::{AuthoringRegistry, EntityAuthoring, FieldDef, InMemoryAuthoringRegistry, ViewDef};
use strata::dml::{Bind, DmlPlanner, MappedDmlPlanner, PathPolicy};
use strata::engine::{Accessor, EntityHelpers, HelperRegistry};
use strata::error::{Error, PlanningError};
use strata::query::filters;
use strata::Value;

#[derive(Debug, Clone, Default)]
struct Customer {
    name: Option<String>,
    email: Option<String>,
}

/// `clear_total` asks for `total` to be written as null.
#[derive(Debug, Clone, Default)]
struct Order {
    id: Option<i64>,
    tenant_id: String,
    status: Option<String>,
    total: Option<i64>,
    clear_total: bool,
    customer: Option<Customer>,
}

struct OrderAccessor;

impl Accessor for OrderAccessor {
    fn get(&self, entity: &dyn Any, field: &str) -> Value {
        let Some(order) = entity.downcast_ref::<Order>() else {
            return Value::Null;
        };
        match field {
            "id" => order.id.into(),
            "tenantId" => order.tenant_id.clone().into(),
            "status" => order.status.clone().into(),
            "total" => order.total.into(),
            _ => Value::Null,
        }
    }

    fn is_explicit_null(&self, entity: &dyn Any, field: &str) -> bool {
        field == "total" && entity.downcast_ref::<Order>().is_some_and(|o| o.clear_total)
    }

    fn child<'a>(&self, entity: &'a dyn Any, field: &str) -> Option<&'a dyn Any> {
        let order = entity.downcast_ref::<Order>()?;
        match field {
            "customer" => order.customer.as_ref().map(|c| c as &dyn Any),
            _ => None,
        }
    }
}

struct CustomerAccessor;

impl Accessor for CustomerAccessor {
    fn get(&self, entity: &dyn Any, field: &str) -> Value {
        let Some(customer) = entity.downcast_ref::<Customer>() else {
            return Value::Null;
        };
        match field {
            "name" => customer.name.clone().into(),
            "email" => customer.email.clone().into(),
            _ => Value::Null,
        }
    }
}

fn helpers() -> Arc<HelperRegistry> {
    let mut registry = HelperRegistry::new();
    registry
        .register("Order", EntityHelpers::new().with_accessor(Arc::new(OrderAccessor)))
        .register("Customer", EntityHelpers::new().with_accessor(Arc::new(CustomerAccessor)));
    Arc::new(registry)
}

fn planner(authoring: &Arc<dyn AuthoringRegistry>) -> MappedDmlPlanner {
    MappedDmlPlanner::new(authoring.clone(), helpers(), PathPolicy::SnakeCaseDefault)
        .with_tenant_boundary_keys(["tenant", " "])
}

fn order() -> Order {
    Order {
        id: Some(7),
        tenant_id: "t1".into(),
        status: Some("NEW".into()),
        total: None,
        clear_total: false,
        customer: Some(Customer {
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
        }),
    }
}

fn columns(binds: &[strata::dml::ColumnBind]) -> Vec<&str> {
    binds.iter().map(|c| c.column.as_str()).collect()
}

#[test]
fn test_insert_reads_typed_payload_in_declaration_order() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let ast = planner(&authoring)
        .plan_insert(ea, &ea.views["core"], &order(), false)
        .unwrap();

    assert_eq!(ast.table, "orders");
    // email has no nested mapping in the view, total is unset.
    assert_eq!(columns(&ast.columns), ["id", "tenant_id", "status", "customer_name"]);
    assert_eq!(ast.column("id").unwrap().bind, Bind::new(7i64, "long"));
    assert_eq!(ast.column("customer_name").unwrap().bind, Bind::new("Ada", "string"));
    assert!(ast.returning.is_empty());
}

#[test]
fn test_generated_key_is_left_out_and_returned() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let fresh = Order {
        id: None,
        customer: None,
        ..order()
    };
    let ast = planner(&authoring)
        .plan_insert(ea, &ea.views["core"], &fresh, true)
        .unwrap();
    assert_eq!(columns(&ast.columns), ["tenant_id", "status"]);
    assert_eq!(ast.returning, ["id"]);
}

#[test]
fn test_explicit_null_is_written() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let cleared = Order {
        clear_total: true,
        ..order()
    };
    let ast = planner(&authoring)
        .plan_update_by_id(ea, &ea.views["core"], &cleared)
        .unwrap();

    assert_eq!(columns(&ast.sets), ["status", "total", "customer_name"]);
    assert_eq!(ast.sets[1].bind, Bind::new(Value::Null, "long"));
    assert_eq!(ast.filter, Some(filters::eq("id", 7i64)));
}

#[test]
fn test_update_by_criteria_keeps_the_filter() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let filter = filters::and([filters::eq("status", "NEW"), filters::lt("total", 5i64)]);
    let patch = Order {
        status: Some("VOID".into()),
        customer: None,
        ..Order::default()
    };
    let ast = planner(&authoring)
        .plan_update_by_criteria(ea, &ea.views["core"], &patch, Some(filter.clone()))
        .unwrap();
    assert_eq!(columns(&ast.sets), ["status"]);
    assert_eq!(ast.filter, Some(filter));
}

#[test]
fn test_upsert_update_columns_respect_governance() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let view = &ea.views["core"];

    let governed = planner(&authoring).plan_upsert(ea, view, &order(), false).unwrap();
    assert_eq!(governed.conflict_columns, ["id"]);
    assert_eq!(governed.update_columns, ["status", "customer_name"]);

    let ungoverned = MappedDmlPlanner::new(authoring.clone(), helpers(), PathPolicy::SnakeCaseDefault)
        .plan_upsert(ea, view, &order(), false)
        .unwrap();
    assert_eq!(ungoverned.update_columns, ["tenant_id", "status", "customer_name"]);
}

#[test]
fn test_unmapped_fields_use_snake_case_columns() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let ast = planner(&authoring)
        .plan_insert(ea, &ViewDef::new("bare"), &order(), false)
        .unwrap();
    // No nested mapping, so the customer is not written.
    assert_eq!(columns(&ast.columns), ["id", "tenant_id", "status"]);
}

#[test]
fn test_composite_keys_and_missing_sources() {
    let authoring = InMemoryAuthoringRegistry::new([
        EntityAuthoring::entity("Line", "lines")
            .field("orderId", FieldDef::scalar("long").key())
            .field("lineNo", FieldDef::scalar("int").key()),
        EntityAuthoring::value("Address").field("street", FieldDef::scalar("string")),
    ])
    .unwrap()
    .into_shared();
    let mut registry = HelperRegistry::new();
    registry.register_documents(authoring.as_ref());
    let planner = MappedDmlPlanner::new(authoring.clone(), Arc::new(registry), PathPolicy::SnakeCaseDefault);

    let line = authoring.entity("Line").unwrap();
    let payload = common::doc([("orderId", Value::Long(1)), ("lineNo", Value::Int(2))]);
    let err = planner
        .plan_update_by_id(line, &ViewDef::new("v"), &payload)
        .unwrap_err();
    assert!(matches!(err, Error::Planning(PlanningError::CompositeKey(t)) if t == "Line"));

    let upsert = planner.plan_upsert(line, &ViewDef::new("v"), &payload, false).unwrap();
    assert_eq!(upsert.conflict_columns, ["order_id", "line_no"]);
    assert!(upsert.update_columns.is_empty());

    let address = authoring.entity("Address").unwrap();
    let err = planner
        .plan_insert(address, &ViewDef::new("v"), &common::doc([("street", "Main".into())]), false)
        .unwrap_err();
    assert_eq!(err.to_string(), "Entity 'Address' has no table or collection source");
}

#[test]
fn test_missing_accessor() {
    let authoring = common::authoring("long");
    let ea = authoring.entity("Order").unwrap();
    let planner = MappedDmlPlanner::new(authoring.clone(), Arc::new(HelperRegistry::new()), PathPolicy::SnakeCaseDefault);
    let err = planner
        .plan_insert(ea, &ea.views["core"], &order(), false)
        .unwrap_err();
    assert_eq!(err.to_string(), "No accessor registered for entity type 'Order'");
}
