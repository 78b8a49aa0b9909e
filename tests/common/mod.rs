//! Shared fixtures for integration tests: an order/customer model and
//! recording drivers for both backend families.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use strata::authoring::{
    AuthoringRegistry, EntityAuthoring, FieldDef, InMemoryAuthoringRegistry, NativeQuery, TypeRef,
    ViewDef, GOVERNANCE_KEY_ATTR,
};
use strata::codec::UserTypeRegistry;
use strata::compile::PropertyTypeResolver;
use strata::document::{
    document_user_types, DocumentBackend, DocumentDialect, DocumentDriver, DocumentStatement,
    Stage, UpdateOutcome,
};
use strata::engine::{DataEngine, DriverResult, EngineHandle, HelperRegistry};
use strata::sql::{default_binders, Dialect, SqlArg, SqlBackend, SqlCompiler, SqlDriver, SqlRow};
use strata::value::{Document, Value};

// =============================================================================
// Model
// =============================================================================

/// Orders keyed by a generated `long`, with a governed tenant column, a
/// string array, a JSON column and a nested customer.
pub fn order_entity(key_type: &str) -> EntityAuthoring {
    EntityAuthoring::entity("Order", "orders")
        .field("id", FieldDef::scalar(key_type).key().auto_generated())
        .field(
            "tenantId",
            FieldDef::scalar("string").attr(GOVERNANCE_KEY_ATTR, json!("tenant")),
        )
        .field("status", FieldDef::scalar("string"))
        .field("total", FieldDef::scalar("long"))
        .field("tags", FieldDef::scalar("list<string>"))
        .field("meta", FieldDef::scalar("json"))
        .field("customer", FieldDef::new(TypeRef::reference("Customer")))
        .view(
            ViewDef::new("core")
                .map("id", "id")
                .map("tenantId", "tenant_id")
                .map("status", "status")
                .map("total", "total")
                .map("tags", "tags")
                .map("meta", "meta")
                .map_nested("customer", [("name", "customer_name")]),
        )
        .view(
            ViewDef::new("open")
                .map("tenantId", "tenant_id")
                .with_native(NativeQuery {
                    schema: true,
                    ..NativeQuery::sql("SELECT * FROM {schema}.orders WHERE tenant_id = :tenant")
                }),
        )
}

pub fn customer_entity() -> EntityAuthoring {
    EntityAuthoring::entity("Customer", "customers")
        .field("id", FieldDef::scalar("uuid").key())
        .field("name", FieldDef::scalar("string"))
        .field("email", FieldDef::scalar("string"))
        .view(ViewDef::new("core"))
}

pub fn authoring(key_type: &str) -> Arc<dyn AuthoringRegistry> {
    InMemoryAuthoringRegistry::new([order_entity(key_type), customer_entity()])
        .expect("fixture model is valid")
        .into_shared()
}

pub fn resolver() -> PropertyTypeResolver {
    PropertyTypeResolver::new(authoring("long"))
}

pub fn document_helpers(authoring: &Arc<dyn AuthoringRegistry>) -> Arc<HelperRegistry> {
    let mut helpers = HelperRegistry::new();
    helpers.register_documents(authoring.as_ref());
    Arc::new(helpers)
}

/// Build a document payload from `(field, value)` pairs.
pub fn doc<const N: usize>(pairs: [(&str, Value); N]) -> Document {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// =============================================================================
// SQL driver
// =============================================================================

/// What a [`FakeSqlDriver`] saw, and what it should answer.
#[derive(Debug, Default)]
pub struct SqlState {
    pub connects: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// `(native sql, args, in transaction)` in execution order.
    pub statements: Vec<(String, Vec<SqlArg>, bool)>,

    /// Rows answered to every query.
    pub rows: Vec<SqlRow>,
    pub affected: u64,
    pub generated_key: Option<Value>,
    /// Fail any statement whose SQL contains this text.
    pub fail_on: Option<String>,
    pub fail_rollback: bool,
}

#[derive(Debug)]
pub struct FakeConn {
    in_tx: bool,
}

/// Records every call; answers from [`SqlState`].
#[derive(Debug, Clone, Default)]
pub struct FakeSqlDriver {
    pub state: Arc<Mutex<SqlState>>,
}

impl FakeSqlDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, rows: Vec<SqlRow>) -> Self {
        self.state.lock().unwrap().rows = rows;
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, SqlState> {
        self.state.lock().unwrap()
    }

    pub fn sql(&self) -> Vec<String> {
        self.state().statements.iter().map(|(s, _, _)| s.clone()).collect()
    }

    fn record(&self, conn: &FakeConn, sql: &str, args: &[SqlArg]) -> DriverResult<()> {
        let mut state = self.state();
        state.statements.push((sql.to_string(), args.to_vec(), conn.in_tx));
        match &state.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => Err(format!("injected failure on {needle}").into()),
            _ => Ok(()),
        }
    }
}

impl SqlDriver for FakeSqlDriver {
    type Connection = FakeConn;

    fn connect(&self, _handle: &EngineHandle) -> DriverResult<FakeConn> {
        self.state().connects += 1;
        Ok(FakeConn { in_tx: false })
    }

    fn begin(&self, conn: &mut FakeConn) -> DriverResult<()> {
        self.state().begins += 1;
        conn.in_tx = true;
        Ok(())
    }

    fn commit(&self, conn: &mut FakeConn) -> DriverResult<()> {
        self.state().commits += 1;
        conn.in_tx = false;
        Ok(())
    }

    fn rollback(&self, conn: &mut FakeConn) -> DriverResult<()> {
        let mut state = self.state();
        state.rollbacks += 1;
        conn.in_tx = false;
        if state.fail_rollback {
            return Err("connection reset during rollback".into());
        }
        Ok(())
    }

    fn query(&self, conn: &mut FakeConn, sql: &str, args: &[SqlArg]) -> DriverResult<Vec<SqlRow>> {
        self.record(conn, sql, args)?;
        Ok(self.state().rows.clone())
    }

    fn execute(&self, conn: &mut FakeConn, sql: &str, args: &[SqlArg]) -> DriverResult<u64> {
        self.record(conn, sql, args)?;
        Ok(self.state().affected)
    }

    fn execute_returning_key(&self, conn: &mut FakeConn, sql: &str, args: &[SqlArg]) -> DriverResult<Option<Value>> {
        self.record(conn, sql, args)?;
        Ok(self.state().generated_key.clone())
    }
}

pub type SqlEngine = DataEngine<SqlCompiler, SqlBackend<FakeSqlDriver>>;

pub fn handle() -> EngineHandle {
    EngineHandle::new("orders-db").with_namespace("sales")
}

/// An engine over `driver` with document payloads registered for every
/// entity.
pub fn sql_engine(dialect: Dialect, driver: FakeSqlDriver) -> SqlEngine {
    let authoring = authoring("long");
    let dialect_id = match dialect {
        Dialect::Postgres => "postgres",
        Dialect::Ansi => "ansi",
    };
    let backend = SqlBackend::new(
        driver,
        dialect,
        Arc::new(UserTypeRegistry::with_defaults(dialect_id)),
        Arc::new(default_binders()),
    );
    let helpers = document_helpers(&authoring);
    DataEngine::new(handle(), SqlCompiler::new(dialect), backend, authoring, helpers)
}

// =============================================================================
// Document driver
// =============================================================================

/// One command seen by a [`FakeDocumentDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Find(DocumentStatement),
    Aggregate(String, Vec<Stage>),
    Count(String, Document),
    InsertOne(String, Document),
    UpdateOne {
        collection: String,
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        collection: String,
        filter: Document,
        update: Document,
    },
    DeleteMany(String, Document),
}

#[derive(Debug, Default)]
pub struct DocState {
    pub sessions: usize,
    pub commits: usize,
    pub aborts: usize,
    /// Commands with whether they ran inside a session.
    pub commands: Vec<(Command, bool)>,

    pub documents: Vec<Document>,
    pub count: u64,
    pub inserted_id: Option<Value>,
    pub outcome: UpdateOutcome,
    pub deleted: u64,
    /// Fail every write command.
    pub fail_writes: bool,
}

#[derive(Debug)]
pub struct FakeSession;

#[derive(Debug, Clone, Default)]
pub struct FakeDocumentDriver {
    pub state: Arc<Mutex<DocState>>,
}

impl FakeDocumentDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, DocState> {
        self.state.lock().unwrap()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state().commands.iter().map(|(c, _)| c.clone()).collect()
    }

    fn read(&self, session: Option<&mut FakeSession>, command: Command) {
        self.state().commands.push((command, session.is_some()));
    }

    fn write(&self, command: Command) -> DriverResult<()> {
        let mut state = self.state();
        state.commands.push((command, true));
        if state.fail_writes {
            return Err("write concern failed".into());
        }
        Ok(())
    }
}

impl DocumentDriver for FakeDocumentDriver {
    type Session = FakeSession;

    fn start_session(&self, _handle: &EngineHandle) -> DriverResult<FakeSession> {
        self.state().sessions += 1;
        Ok(FakeSession)
    }

    fn commit(&self, _session: &mut FakeSession) -> DriverResult<()> {
        self.state().commits += 1;
        Ok(())
    }

    fn abort(&self, _session: &mut FakeSession) -> DriverResult<()> {
        self.state().aborts += 1;
        Ok(())
    }

    fn find(
        &self,
        session: Option<&mut FakeSession>,
        _handle: &EngineHandle,
        stmt: &DocumentStatement,
    ) -> DriverResult<Vec<Document>> {
        self.read(session, Command::Find(stmt.clone()));
        Ok(self.state().documents.clone())
    }

    fn aggregate(
        &self,
        session: Option<&mut FakeSession>,
        _handle: &EngineHandle,
        collection: &str,
        pipeline: &[Stage],
    ) -> DriverResult<Vec<Document>> {
        self.read(session, Command::Aggregate(collection.to_string(), pipeline.to_vec()));
        Ok(self.state().documents.clone())
    }

    fn count(
        &self,
        session: Option<&mut FakeSession>,
        _handle: &EngineHandle,
        collection: &str,
        filter: &Document,
    ) -> DriverResult<u64> {
        self.read(session, Command::Count(collection.to_string(), filter.clone()));
        Ok(self.state().count)
    }

    fn insert_one(
        &self,
        _session: &mut FakeSession,
        _handle: &EngineHandle,
        collection: &str,
        document: Document,
    ) -> DriverResult<Option<Value>> {
        self.write(Command::InsertOne(collection.to_string(), document))?;
        Ok(self.state().inserted_id.clone())
    }

    fn update_one(
        &self,
        _session: &mut FakeSession,
        _handle: &EngineHandle,
        collection: &str,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> DriverResult<UpdateOutcome> {
        self.write(Command::UpdateOne {
            collection: collection.to_string(),
            filter: filter.clone(),
            update: update.clone(),
            upsert,
        })?;
        Ok(self.state().outcome.clone())
    }

    fn update_many(
        &self,
        _session: &mut FakeSession,
        _handle: &EngineHandle,
        collection: &str,
        filter: &Document,
        update: &Document,
    ) -> DriverResult<UpdateOutcome> {
        self.write(Command::UpdateMany {
            collection: collection.to_string(),
            filter: filter.clone(),
            update: update.clone(),
        })?;
        Ok(self.state().outcome.clone())
    }

    fn delete_many(
        &self,
        _session: &mut FakeSession,
        _handle: &EngineHandle,
        collection: &str,
        filter: &Document,
    ) -> DriverResult<u64> {
        self.write(Command::DeleteMany(collection.to_string(), filter.clone()))?;
        Ok(self.state().deleted)
    }
}

pub type DocEngine = DataEngine<DocumentDialect, DocumentBackend<FakeDocumentDriver>>;

/// Document engine over the people model of [`document_authoring`].
pub fn doc_engine(driver: FakeDocumentDriver) -> DocEngine {
    let authoring = document_authoring();
    let backend = DocumentBackend::new(driver, Arc::new(document_user_types()));
    let helpers = document_helpers(&authoring);
    DataEngine::new(handle(), DocumentDialect::default(), backend, authoring, helpers)
}

/// People keyed by a client-side uuid stored at `_id`, with two native
/// views: a plain filter and a parameterized pipeline.
pub fn document_authoring() -> Arc<dyn AuthoringRegistry> {
    InMemoryAuthoringRegistry::new([
        EntityAuthoring::entity("Person", "people")
            .field("id", FieldDef::scalar("uuid").key())
            .field(
                "tenantId",
                FieldDef::scalar("string").attr(GOVERNANCE_KEY_ATTR, json!("tenant")),
            )
            .field("firstName", FieldDef::scalar("string"))
            .field("age", FieldDef::scalar("long"))
            .field("tags", FieldDef::scalar("list<string>"))
            .field("meta", FieldDef::scalar("json"))
            .view(
                ViewDef::new("core")
                    .map("id", "_id")
                    .map("firstName", "first_name"),
            )
            .view(ViewDef::new("adults").with_native(NativeQuery {
                sql: Some(json!({"age": {"$gte": 18}})),
                projection: None,
                schema: false,
            }))
            .view(ViewDef::new("by_tenant").with_native(NativeQuery {
                sql: Some(json!([{"$match": {"tenantId": {"param": "tenant"}}}])),
                projection: None,
                schema: false,
            })),
    ])
    .expect("fixture model is valid")
    .into_shared()
}

/// Shorthand for nested document values in expectations.
pub fn map(pairs: Vec<(&str, Value)>) -> Value {
    Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>())
}
