//! Filters, pipelines and writes compiled for the document family.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use strata::authoring::{AuthoringRegistry, ViewDef};
use strata::compile::PropertyTypeResolver;
use strata::dialect::NativeDialect;
use strata::dml::{DmlAst, DmlPlanner, MappedDmlPlanner, PathPolicy};
use strata::document::{DocumentDialect, DocumentStatement, Stage, StatementKind};
use strata::error::{Error, PlanningError};
use strata::query::{filters, normalize, Page, Query, SortDir, SortField};
use strata::value::Document;
use strata::Value;

use common::{doc, map};

struct Fixture {
    authoring: Arc<dyn AuthoringRegistry>,
    types: PropertyTypeResolver,
    planner: MappedDmlPlanner,
    dialect: DocumentDialect,
}

impl Fixture {
    fn new() -> Self {
        let authoring = common::document_authoring();
        let helpers = common::document_helpers(&authoring);
        Self {
            types: PropertyTypeResolver::new(authoring.clone()),
            planner: MappedDmlPlanner::new(authoring.clone(), helpers, PathPolicy::Explicit)
                .with_tenant_boundary_keys(["tenant"]),
            dialect: DocumentDialect::default(),
            authoring,
        }
    }

    fn view(&self, id: &str) -> ViewDef {
        self.authoring.entity("Person").unwrap().views[id].clone()
    }

    fn select(&self, view: &ViewDef, query: &Query) -> Result<DocumentStatement, Error> {
        let person = self.authoring.entity("Person")?;
        let filter = normalize(query)?;
        self.dialect.merge_select(
            person,
            view,
            filter.as_ref(),
            &query.sort,
            &query.page,
            &query.params,
            &self.types,
        )
    }

    fn write(&self, view: &ViewDef, ast: DmlAst) -> Result<DocumentStatement, Error> {
        let person = self.authoring.entity("Person")?;
        self.dialect.render_dml(person, view, &ast, &self.types)
    }
}

fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

#[test]
fn test_operators_render_at_stored_paths() {
    let f = Fixture::new();
    let none: Vec<Value> = vec![];
    let query = Query::of(filters::and([
        filters::eq("firstName", "Ada"),
        filters::gt("age", 30i64),
        filters::nin("firstName", none),
        filters::ne("firstName", Value::Null),
        filters::range("age", 18i64, 65i64),
        filters::like("firstName", "A%"),
        filters::array_overlaps("tags", ["x"]),
        filters::json_path_exists("meta", "$.a.b"),
        filters::json_value_eq("meta", "$.kind", "vip"),
    ]));

    let stmt = f.select(&f.view("core"), &query).unwrap();
    assert_eq!(stmt.kind, StatementKind::Find);
    assert_eq!(stmt.collection, "people");
    assert_eq!(
        stmt.filter,
        doc([(
            "$and",
            list(vec![
                map(vec![("first_name", "Ada".into())]),
                map(vec![("age", map(vec![("$gt", Value::Long(30))]))]),
                map(vec![("$expr", Value::Bool(true))]),
                map(vec![("first_name", map(vec![("$ne", Value::Null)]))]),
                map(vec![(
                    "age",
                    map(vec![("$gte", Value::Long(18)), ("$lte", Value::Long(65))]),
                )]),
                map(vec![("first_name", map(vec![("$regex", "^A.*$".into())]))]),
                map(vec![("tags", map(vec![("$in", list(vec!["x".into()]))]))]),
                map(vec![("meta.a.b", map(vec![("$exists", Value::Bool(true))]))]),
                map(vec![("meta.kind", "vip".into())]),
            ]),
        )])
    );
    assert_eq!(stmt.skip, None);
    assert_eq!(stmt.limit, Some(50));
}

#[test]
fn test_negation_becomes_nor_and_flips_groups() {
    let f = Fixture::new();
    let query = Query::of(filters::not(filters::or([
        filters::eq("firstName", "Ada"),
        filters::array_not_contains("tags", ["x"]),
    ])));

    let stmt = f.select(&f.view("core"), &query).unwrap();
    assert_eq!(
        stmt.filter,
        doc([(
            "$and",
            list(vec![
                map(vec![("$nor", list(vec![map(vec![("first_name", "Ada".into())])]))]),
                map(vec![("tags", map(vec![("$all", list(vec!["x".into()]))]))]),
            ]),
        )])
    );
}

#[test]
fn test_uuid_operands_compare_as_stored_text() {
    let f = Fixture::new();
    let id = Uuid::new_v4();
    let stmt = f
        .select(&f.view("core"), &Query::of(filters::in_list("id", [id])))
        .unwrap();
    assert_eq!(
        stmt.filter,
        doc([("_id", map(vec![("$in", list(vec![Value::String(id.to_string())]))]))])
    );
}

#[test]
fn test_seek_page_after_a_filter() {
    let f = Fixture::new();
    let after = BTreeMap::from([
        ("age".to_string(), Value::Long(40)),
        ("firstName".to_string(), Value::from("Ada")),
    ]);
    let query = Query::of(filters::eq("tenantId", "t1"))
        .sort(SortField::desc("age"))
        .sort(SortField::asc("firstName"))
        .page(Page::Seek { limit: 10, after });

    let stmt = f.select(&f.view("core"), &query).unwrap();
    let seek = map(vec![(
        "$or",
        list(vec![
            map(vec![("age", map(vec![("$lt", Value::Long(40))]))]),
            map(vec![(
                "$and",
                list(vec![
                    map(vec![("age", Value::Long(40))]),
                    map(vec![("first_name", map(vec![("$gt", "Ada".into())]))]),
                ]),
            )]),
        ]),
    )]);
    assert_eq!(
        stmt.filter,
        doc([("$and", list(vec![map(vec![("tenantId", "t1".into())]), seek]))])
    );
    assert_eq!(
        stmt.sort,
        vec![("age".to_string(), SortDir::Desc), ("first_name".to_string(), SortDir::Asc)]
    );
    assert_eq!((stmt.skip, stmt.limit), (None, Some(10)));
}

#[test]
fn test_native_filter_view_and_offset_page() {
    let f = Fixture::new();
    let query = Query::of(filters::eq("firstName", "Ada")).page(Page::offset(20, 10));
    let stmt = f.select(&f.view("adults"), &query).unwrap();
    assert_eq!(stmt.kind, StatementKind::Find);
    assert_eq!(
        stmt.filter,
        doc([(
            "$and",
            list(vec![
                map(vec![("age", map(vec![("$gte", Value::Long(18))]))]),
                map(vec![("firstName", "Ada".into())]),
            ]),
        )])
    );
    assert_eq!((stmt.skip, stmt.limit), (Some(20), Some(10)));
}

#[test]
fn test_pipeline_view_select_and_count() {
    let f = Fixture::new();
    let person = f.authoring.entity("Person").unwrap();
    let view = f.view("by_tenant");
    let query = Query::of(filters::ge("age", 18i64))
        .param("tenant", "t1")
        .sort(SortField::asc("age"))
        .page(Page::offset(5, 5));

    let stmt = f.select(&view, &query).unwrap();
    assert_eq!(stmt.kind, StatementKind::Aggregate);
    let tenant_match = doc([("$match", map(vec![("tenantId", "t1".into())]))]);
    let age_match = doc([("age", map(vec![("$gte", Value::Long(18))]))]);
    assert_eq!(
        stmt.pipeline,
        vec![
            Stage::Raw(tenant_match.clone()),
            Stage::Match(age_match.clone()),
            Stage::Sort(vec![("age".to_string(), SortDir::Asc)]),
            Stage::Skip(5),
            Stage::Limit(5),
        ]
    );

    let filter = normalize(&query).unwrap();
    let count = f
        .dialect
        .merge_count(person, &view, filter.as_ref(), &query.params, &f.types)
        .unwrap();
    assert_eq!(count.kind, StatementKind::Aggregate);
    assert_eq!(
        count.pipeline,
        vec![
            Stage::Raw(tenant_match),
            Stage::Match(age_match),
            Stage::Count("n".into()),
        ]
    );

    let err = f.select(&view, &Query::new()).unwrap_err();
    assert!(matches!(err, Error::Planning(PlanningError::MissingParam(p)) if p == "tenant"));
}

#[test]
fn test_insert_mirrors_key_into_id() {
    let f = Fixture::new();
    let person = f.authoring.entity("Person").unwrap();
    let id = Uuid::new_v4();
    let payload = doc([
        ("id", Value::Uuid(id)),
        ("tenantId", "t1".into()),
        ("firstName", "Ada".into()),
        ("tags", list(vec!["a".into()])),
    ]);

    let core = f.view("core");
    let insert = f.planner.plan_insert(person, &core, &payload, false).unwrap();
    let stmt = f.write(&core, insert.into()).unwrap();
    assert_eq!(stmt.kind, StatementKind::InsertOne);
    assert_eq!(
        stmt.document,
        Some(doc([
            ("_id", Value::String(id.to_string())),
            ("tenantId", "t1".into()),
            ("first_name", "Ada".into()),
            ("tags", list(vec!["a".into()])),
        ]))
    );
    assert_eq!(stmt.id_hint, Some(Value::Uuid(id)));

    let legacy = ViewDef::new("legacy").map("id", "personId");
    let insert = f.planner.plan_insert(person, &legacy, &payload, false).unwrap();
    let stmt = f.write(&legacy, insert.into()).unwrap();
    let document = stmt.document.unwrap();
    assert_eq!(document["personId"], Value::String(id.to_string()));
    assert_eq!(document["_id"], Value::String(id.to_string()));
    assert_eq!(document["firstName"], Value::from("Ada"));
}

#[test]
fn test_update_by_id_sets_flat_paths() {
    let f = Fixture::new();
    let person = f.authoring.entity("Person").unwrap();
    let id = Uuid::new_v4();
    let payload = doc([
        ("id", Value::Uuid(id)),
        ("tenantId", "t2".into()),
        ("firstName", "Bo".into()),
        ("meta", map(vec![("kind", "vip".into())])),
    ]);

    let core = f.view("core");
    let update = f.planner.plan_update_by_id(person, &core, &payload).unwrap();
    let stmt = f.write(&core, update.into()).unwrap();
    assert_eq!(stmt.kind, StatementKind::UpdateMany);
    assert_eq!(stmt.filter, doc([("_id", Value::String(id.to_string()))]));
    assert_eq!(
        stmt.document,
        Some(doc([(
            "$set",
            map(vec![
                ("first_name", "Bo".into()),
                ("meta", map(vec![("kind", "vip".into())])),
            ]),
        )]))
    );

    let only_governed = doc([("id", Value::Uuid(id)), ("tenantId", "t2".into())]);
    let update = f.planner.plan_update_by_id(person, &core, &only_governed).unwrap();
    let err = f.write(&core, update.into()).unwrap_err();
    assert!(matches!(err, Error::Planning(PlanningError::EmptyUpdate(t)) if t == "people"));
}

#[test]
fn test_upsert_splits_set_and_set_on_insert() {
    let f = Fixture::new();
    let person = f.authoring.entity("Person").unwrap();
    let id = Uuid::new_v4();
    let id_text = Value::String(id.to_string());
    let payload = doc([
        ("id", Value::Uuid(id)),
        ("tenantId", "t1".into()),
        ("firstName", "Ada".into()),
        ("age", Value::Long(30)),
    ]);

    let core = f.view("core");
    let upsert = f.planner.plan_upsert(person, &core, &payload, false).unwrap();
    let stmt = f.write(&core, upsert.into()).unwrap();
    assert_eq!(stmt.kind, StatementKind::UpdateOne);
    assert!(stmt.upsert);
    assert_eq!(stmt.filter, doc([("_id", id_text.clone())]));
    assert_eq!(
        stmt.document,
        Some(doc([
            ("$set", map(vec![("first_name", "Ada".into()), ("age", Value::Long(30))])),
            ("$setOnInsert", map(vec![("_id", id_text.clone()), ("tenantId", "t1".into())])),
        ]))
    );
    assert_eq!(stmt.id_hint, Some(Value::Uuid(id)));

    let legacy = ViewDef::new("legacy").map("id", "personId");
    let upsert = f.planner.plan_upsert(person, &legacy, &payload, false).unwrap();
    let stmt = f.write(&legacy, upsert.into()).unwrap();
    assert_eq!(stmt.filter, doc([("personId", id_text.clone())]));
    let update = stmt.document.unwrap();
    assert_eq!(
        update["$setOnInsert"],
        map(vec![
            ("_id", id_text.clone()),
            ("personId", id_text),
            ("tenantId", "t1".into()),
        ])
    );
    assert_eq!(stmt.id_hint, Some(Value::Uuid(id)));
}

#[test]
fn test_delete_by_criteria() {
    let f = Fixture::new();
    let person = f.authoring.entity("Person").unwrap();
    let core = f.view("core");
    let delete = f
        .planner
        .plan_delete_by_criteria(person, &core, Some(filters::lt("age", 0i64)))
        .unwrap();
    let stmt = f.write(&core, delete.into()).unwrap();
    assert_eq!(stmt.kind, StatementKind::DeleteMany);
    assert_eq!(stmt.filter, doc([("age", map(vec![("$lt", Value::Long(0))]))]));
    assert!(matches!(stmt.dml, Some(DmlAst::Delete(_))));

    let everything = f.planner.plan_delete_by_criteria(person, &core, None).unwrap();
    assert_eq!(f.write(&core, everything.into()).unwrap().filter, Document::new());
}
