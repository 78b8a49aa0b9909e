//! User type lookup and conversion through the public registry.

use std::sync::Arc;

use strata::codec::{GlobalUserTypes, UserType, UserTypeProvider, UserTypeRegistry};
use strata::document::document_user_types;
use strata::error::CodecError;
use strata::Value;

/// Cents stored as a long, exposed as a decimal amount.
#[derive(Debug)]
struct Money;

impl UserType for Money {
    fn id(&self) -> &str {
        "money"
    }

    fn decode(&self, native: &Value) -> Result<Value, CodecError> {
        Ok(match native.as_i64() {
            Some(cents) => Value::Double(cents as f64 / 100.0),
            None => Value::Null,
        })
    }

    fn encode(&self, logical: &Value) -> Result<Value, CodecError> {
        Ok(match logical.as_f64() {
            Some(amount) => Value::Long((amount * 100.0).round() as i64),
            None => Value::Null,
        })
    }
}

/// Stores booleans as `Y`/`N`.
#[derive(Debug)]
struct YesNo;

impl UserType for YesNo {
    fn id(&self) -> &str {
        "bool"
    }

    fn decode(&self, native: &Value) -> Result<Value, CodecError> {
        Ok(Value::Bool(native.as_str() == Some("Y")))
    }

    fn encode(&self, logical: &Value) -> Result<Value, CodecError> {
        Ok(Value::from(if logical == &Value::Bool(true) { "Y" } else { "N" }))
    }
}

struct Scoped(Option<&'static str>, fn() -> Arc<dyn UserType>);

impl UserTypeProvider for Scoped {
    fn dialect_id(&self) -> Option<&str> {
        self.0
    }

    fn user_types(&self) -> Vec<Arc<dyn UserType>> {
        vec![(self.1)()]
    }
}

fn money() -> Arc<dyn UserType> {
    Arc::new(Money)
}

fn yes_no() -> Arc<dyn UserType> {
    Arc::new(YesNo)
}

fn registry(dialect: &str) -> UserTypeRegistry {
    UserTypeRegistry::new(
        dialect,
        [
            &GlobalUserTypes as &dyn UserTypeProvider,
            &Scoped(None, money),
            &Scoped(Some("legacy"), yes_no),
        ],
    )
}

#[test]
fn test_dialect_override_wins_over_global() {
    let legacy = registry("legacy");
    assert_eq!(legacy.encode("bool", &Value::Bool(true)).unwrap(), Value::from("Y"));
    assert_eq!(legacy.decode("bool", &Value::from("N")).unwrap(), Value::Bool(false));

    let postgres = registry("postgres");
    assert_eq!(postgres.encode("bool", &Value::Bool(true)).unwrap(), Value::Bool(true));
}

#[test]
fn test_custom_global_type_and_containers_of_it() {
    let types = registry("postgres");
    assert_eq!(types.encode("money", &Value::Double(12.5)).unwrap(), Value::Long(1250));
    assert_eq!(
        types
            .decode("list<money>", &Value::List(vec![Value::Long(100), Value::Long(5)]))
            .unwrap(),
        Value::List(vec![Value::Double(1.0), Value::Double(0.05)])
    );
}

#[test]
fn test_list_of_int_coerces_mixed_elements() {
    let types = UserTypeRegistry::with_defaults("postgres");
    let native = Value::List(vec![Value::Long(1), Value::from("2"), Value::Int(2)]);
    assert_eq!(
        types.decode("list<int>", &native).unwrap(),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(2)])
    );
}

#[test]
fn test_set_keeps_first_occurrence_of_each_element() {
    let types = UserTypeRegistry::with_defaults("postgres");
    let native = Value::List(vec![Value::from("b"), Value::from("a"), Value::from("b")]);
    assert_eq!(
        types.decode("set<string>", &native).unwrap(),
        Value::List(vec![Value::from("b"), Value::from("a")])
    );
}

#[test]
fn test_containers_accept_json_text_and_singletons() {
    let types = UserTypeRegistry::with_defaults("ansi");
    assert_eq!(
        types.decode("list<long>", &Value::from("[3, 4]")).unwrap(),
        Value::List(vec![Value::Long(3), Value::Long(4)])
    );
    assert_eq!(
        types.decode("list<string>", &Value::from("solo")).unwrap(),
        Value::List(vec![Value::from("solo")])
    );
    assert_eq!(types.decode("list<string>", &Value::Null).unwrap(), Value::Null);
}

#[test]
fn test_map_type_converts_values() {
    let types = UserTypeRegistry::with_defaults("postgres");
    let decoded = types
        .decode("map<string,long>", &Value::from(r#"{"a": "1", "b": 2}"#))
        .unwrap();
    let expected: strata::value::Document =
        [("a".to_string(), Value::Long(1)), ("b".to_string(), Value::Long(2))].into();
    assert_eq!(decoded, Value::Map(expected));
}

#[test]
fn test_synthesized_types_are_cached() {
    let types = UserTypeRegistry::with_defaults("postgres");
    let first = types.get("list<uuid>").unwrap();
    let second = types.get(" list<uuid> ").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_unknown_type_names_dialect() {
    let types = UserTypeRegistry::with_defaults("postgres");
    let err = types.get("geometry").unwrap_err();
    assert_eq!(err.to_string(), "Unknown userTypeId: geometry (dialectId=postgres)");
    assert!(matches!(types.get("list<geometry>"), Err(CodecError::UnknownType { .. })));
    assert!(!types.contains("geometry"));
}

#[test]
fn test_scalar_decoding_of_text() {
    let types = UserTypeRegistry::with_defaults("postgres");
    assert_eq!(types.decode("int", &Value::from(" 7 ")).unwrap(), Value::Int(7));
    assert_eq!(types.decode("int", &Value::from("")).unwrap(), Value::Null);
    assert_eq!(types.decode("bool", &Value::from("TRUE")).unwrap(), Value::Bool(true));
    assert!(matches!(
        types.decode("int", &Value::from("seven")),
        Err(CodecError::Decode { .. })
    ));
}

#[test]
fn test_json_is_text_for_sql_and_native_for_documents() {
    let payload = Value::from_json(&serde_json::json!({"kind": "x"}));

    let sql = UserTypeRegistry::with_defaults("postgres");
    assert_eq!(sql.encode("json", &payload).unwrap(), Value::from(r#"{"kind":"x"}"#));

    let docs = document_user_types();
    assert_eq!(docs.encode("json", &payload).unwrap(), payload);
    assert_eq!(docs.decode("json", &Value::from(r#"{"kind":"x"}"#)).unwrap(), payload);
}
