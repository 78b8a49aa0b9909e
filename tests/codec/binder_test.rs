//! Binder resolution order and the SQL/document binder sets.

use std::sync::{Arc, Mutex};

use strata::bind::{BindContext, Binder, BinderProvider, BinderRegistry, OpKind};
use strata::codec::UserTypeRegistry;
use strata::dml::Bind;
use strata::document::{document_binders, document_user_types, DIALECT_ID};
use strata::error::Error;
use strata::sql::{default_binders, BoundParams, SqlArg};
use strata::value::{Document, ValueKind};
use strata::Value;

/// Appends its name to the target so tests can see which binder ran.
struct Named {
    name: &'static str,
    kind: Option<ValueKind>,
    only_type: Option<&'static str>,
}

impl Binder<Vec<String>> for Named {
    fn value_kind(&self) -> Option<ValueKind> {
        self.kind
    }

    fn supports(&self, _ctx: &BindContext, bind: &Bind, _encoded: &Value) -> bool {
        self.only_type.map_or(true, |t| bind.type_id == t)
    }

    fn bind(&self, target: &mut Vec<String>, _ctx: &BindContext, _bind: &Bind, _encoded: &Value) -> Result<(), Error> {
        target.push(self.name.to_string());
        Ok(())
    }
}

fn named(name: &'static str, kind: Option<ValueKind>, only_type: Option<&'static str>) -> Arc<dyn Binder<Vec<String>>> {
    Arc::new(Named { name, kind, only_type })
}

fn run(registry: &BinderRegistry, dialect: &str, bind: Bind) -> Result<Vec<String>, Error> {
    let mut seen = Vec::new();
    let encoded = bind.value.clone();
    registry.bind(dialect, &mut seen, &BindContext::position(OpKind::Filter, 1), &bind, &encoded)?;
    Ok(seen)
}

#[test]
fn test_dialect_binders_run_before_global_in_registration_order() {
    let mut registry = BinderRegistry::new();
    registry
        .register_global::<Vec<String>>(named("global-any", None, None))
        .register::<Vec<String>>("pg", named("pg-json", None, Some("json")))
        .register::<Vec<String>>("pg", named("pg-string", Some(ValueKind::String), None))
        .register::<Vec<String>>("pg", named("pg-string-late", Some(ValueKind::String), None));

    assert_eq!(run(&registry, "pg", Bind::new("x", "string")).unwrap(), ["pg-string"]);
    assert_eq!(run(&registry, "pg", Bind::new("{}", "json")).unwrap(), ["pg-json"]);
    assert_eq!(run(&registry, "pg", Bind::new(5i64, "long")).unwrap(), ["global-any"]);
    assert_eq!(run(&registry, "other", Bind::new("x", "string")).unwrap(), ["global-any"]);
}

#[test]
fn test_no_matching_binder_is_an_error() {
    let mut registry = BinderRegistry::new();
    registry.register::<Vec<String>>("pg", named("pg-string", Some(ValueKind::String), None));

    let err = run(&registry, "pg", Bind::new(Value::List(vec![]), "list<uuid>")).unwrap_err();
    let Error::Binding(binding) = &err else {
        panic!("expected a binding error, got {err:?}");
    };
    assert_eq!(binding.dialect, "pg");
    assert_eq!(binding.target_type, "Vec");
    assert_eq!(binding.value_type, "list");
    assert_eq!(binding.type_id, "list<uuid>");
    assert_eq!(
        err.to_string(),
        "No binder for dialect 'pg' (target=Vec, value=list, userTypeId=list<uuid>)"
    );
}

#[test]
fn test_binders_are_scoped_by_target_type() {
    let mut registry = BinderRegistry::new();
    registry.register::<Vec<String>>("pg", named("strings", None, None));

    let mut params = BoundParams::default();
    let bind = Bind::new("x", "string");
    let err = registry
        .bind("pg", &mut params, &BindContext::position(OpKind::Insert, 1), &bind, &bind.value)
        .unwrap_err();
    assert!(matches!(err, Error::Binding(b) if b.target_type == "BoundParams"));
}

struct Audit(Arc<Mutex<Vec<OpKind>>>);

impl BinderProvider for Audit {
    fn register(&self, registry: &mut BinderRegistry) {
        struct Recording(Arc<Mutex<Vec<OpKind>>>);

        impl Binder<Vec<String>> for Recording {
            fn bind(&self, _target: &mut Vec<String>, ctx: &BindContext, _bind: &Bind, _encoded: &Value) -> Result<(), Error> {
                self.0.lock().unwrap().push(ctx.op);
                Ok(())
            }
        }

        registry.register_global::<Vec<String>>(Arc::new(Recording(self.0.clone())));
    }
}

#[test]
fn test_providers_contribute_binders() {
    let ops = Arc::new(Mutex::new(Vec::new()));
    let registry = BinderRegistry::from_providers([&Audit(ops.clone()) as &dyn BinderProvider]);

    let bind = Bind::new("x", "string");
    let mut seen: Vec<String> = Vec::new();
    for op in [OpKind::Insert, OpKind::UpsertFilter] {
        registry
            .bind("any", &mut seen, &BindContext::path(op, "a.b"), &bind, &bind.value)
            .unwrap();
    }
    assert_eq!(*ops.lock().unwrap(), [OpKind::Insert, OpKind::UpsertFilter]);
}

fn sql_arg(dialect: &str, bind: Bind) -> SqlArg {
    let types = UserTypeRegistry::with_defaults(dialect);
    let encoded = types.encode(&bind.type_id, &bind.value).unwrap();
    let mut params = BoundParams::default();
    default_binders()
        .bind(dialect, &mut params, &BindContext::position(OpKind::Filter, 1), &bind, &encoded)
        .unwrap();
    params.into_args().remove(0)
}

#[test]
fn test_sql_binders_per_dialect() {
    let tags = Value::List(vec!["a".into(), "b".into()]);

    assert_eq!(
        sql_arg("postgres", Bind::new(tags.clone(), "list<string>")),
        SqlArg::Array {
            element_type: "text",
            items: vec!["a".into(), "b".into()],
        }
    );
    assert_eq!(
        sql_arg("ansi", Bind::new(tags, "list<string>")),
        SqlArg::JsonText(r#"["a","b"]"#.into())
    );

    let meta = Value::from_json(&serde_json::json!({"kind": "x"}));
    assert_eq!(
        sql_arg("postgres", Bind::new(meta.clone(), "json")),
        SqlArg::Jsonb(Some(r#"{"kind":"x"}"#.into()))
    );
    assert_eq!(
        sql_arg("ansi", Bind::new(meta, "json")),
        SqlArg::Plain(Value::from(r#"{"kind":"x"}"#))
    );
}

#[test]
fn test_instants_bind_as_timestamps() {
    let at = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    assert_eq!(
        sql_arg("ansi", Bind::new("2024-05-01T10:00:00Z", "instant")),
        SqlArg::Timestamp(at)
    );
}

#[test]
fn test_document_binders_store_uuids_as_text_at_path() {
    let types = document_user_types();
    let binders = document_binders();
    let id = uuid::Uuid::new_v4();

    let mut doc = Document::new();
    for (path, bind) in [
        ("_id", Bind::new(id, "uuid")),
        ("owner.ref", Bind::new(id, "uuid")),
        ("created", Bind::new(0i64, "instant")),
        ("name", Bind::new("Ada", "string")),
    ] {
        let encoded = types.encode(&bind.type_id, &bind.value).unwrap();
        binders
            .bind(DIALECT_ID, &mut doc, &BindContext::path(OpKind::Insert, path), &bind, &encoded)
            .unwrap();
    }

    assert_eq!(doc["_id"], Value::String(id.to_string()));
    assert_eq!(doc["owner"].get_path("ref"), Some(&Value::String(id.to_string())));
    assert!(matches!(doc["created"], Value::Instant(t) if t.timestamp_millis() == 0));
    assert_eq!(doc["name"], Value::from("Ada"));
}
