//! Document-store compilation of view reads and planned writes.
//!
//! A view's native query is either a filter document, merged with the
//! caller's filter under `$and`, or an aggregation pipeline (a stage list, a
//! `$`-keyed stage, or any view with a projection). Pipelines get the
//! caller's filter as a trailing `$match` followed by `$sort`, `$skip` and
//! `$limit`.
//!
//! Paths follow explicit view mappings only; an unmapped property is stored
//! under its own name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;

use super::binders::document_binders;
use super::render::{and_docs, doc1, lookup, sort_spec, FilterRenderer, Placer};
use super::statement::{DocumentStatement, Stage, StatementKind};
use super::types::document_user_types;
use super::DIALECT_ID;
use crate::authoring::{EntityAuthoring, ViewDef};
use crate::bind::{BinderRegistry, OpKind};
use crate::codec::UserTypeRegistry;
use crate::compile::PropertyTypeResolver;
use crate::dialect::NativeDialect;
use crate::dml::{DeleteAst, DmlAst, InsertAst, PathPolicy, UpdateAst, UpsertAst};
use crate::error::{Error, PlanningError};
use crate::query::{Page, QueryElement, SortField};
use crate::value::{Document, Value};

/// Field the aggregation count lands in.
pub const COUNT_FIELD: &str = "n";

/// Compiles reads and writes into [`DocumentStatement`]s.
#[derive(Debug, Clone)]
pub struct DocumentDialect {
    user_types: Arc<UserTypeRegistry>,
    binders: Arc<BinderRegistry>,
}

impl Default for DocumentDialect {
    fn default() -> Self {
        Self::new(Arc::new(document_user_types()), Arc::new(document_binders()))
    }
}

enum Base {
    Filter(Document),
    Pipeline(Vec<Stage>),
}

impl DocumentDialect {
    pub fn new(user_types: Arc<UserTypeRegistry>, binders: Arc<BinderRegistry>) -> Self {
        Self { user_types, binders }
    }

    pub fn user_types(&self) -> &Arc<UserTypeRegistry> {
        &self.user_types
    }

    fn placer(&self) -> Placer<'_> {
        Placer {
            user_types: &self.user_types,
            binders: &self.binders,
        }
    }

    fn renderer<'a>(
        &'a self,
        ea: &'a EntityAuthoring,
        view: &'a ViewDef,
        types: &'a PropertyTypeResolver,
        op: OpKind,
    ) -> FilterRenderer<'a> {
        FilterRenderer {
            ea,
            view,
            types,
            placer: self.placer(),
            op,
        }
    }

    fn base(&self, view: &ViewDef, params: &BTreeMap<String, Value>) -> Result<Base, Error> {
        let Some(native) = &view.native else {
            return Ok(Base::Filter(Document::new()));
        };
        let sql = native.sql.as_ref().filter(|v| !v.is_null());
        let projection = native.projection.as_ref().filter(|v| !v.is_null());

        let pipeline = projection.is_some()
            || matches!(sql, Some(Json::Array(_)))
            || matches!(sql, Some(Json::Object(m)) if m.keys().any(|k| k.starts_with('$')));
        if pipeline {
            let mut stages = Vec::new();
            for part in [sql, projection].into_iter().flatten() {
                match part {
                    Json::Array(items) => {
                        for item in items {
                            stages.push(Stage::Raw(native_document(view, item, params)?));
                        }
                    }
                    other => stages.push(Stage::Raw(native_document(view, other, params)?)),
                }
            }
            return Ok(Base::Pipeline(stages));
        }

        match sql {
            None => Ok(Base::Filter(Document::new())),
            Some(json) => native_document(view, json, params).map(Base::Filter),
        }
    }

    /// Document written by an insert. A single key stored under another
    /// path is mirrored into `_id`.
    pub fn insert_document(&self, ea: &EntityAuthoring, view: &ViewDef, ins: &InsertAst) -> Result<Document, Error> {
        let placer = self.placer();
        let mut doc = Document::new();
        for cb in &ins.columns {
            placer.place(&mut doc, OpKind::Insert, &cb.column, &cb.bind)?;
        }
        if let Some(key_path) = key_path(ea, view) {
            if key_path != "_id" && !doc.contains_key("_id") {
                if let Some(id) = lookup(&doc, &key_path).filter(|v| !v.is_null()).cloned() {
                    doc.insert("_id".to_string(), id);
                }
            }
        }
        Ok(doc)
    }

    /// Query document selecting the rows of an update or delete.
    pub fn where_document(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        types: &PropertyTypeResolver,
    ) -> Result<Document, Error> {
        let r = self.renderer(ea, view, types, OpKind::Filter);
        Ok(match filter {
            Some(f) => r.render(f)?.unwrap_or_default(),
            None => Document::new(),
        })
    }

    /// `{$set: {...}}` with one dotted key per set column.
    pub fn update_document(&self, upd: &UpdateAst) -> Result<Document, Error> {
        if upd.sets.is_empty() {
            return Err(PlanningError::EmptyUpdate(upd.table.clone()).into());
        }
        let placer = self.placer();
        let mut set = Document::new();
        for cb in &upd.sets {
            set.insert(cb.column.clone(), placer.stored(OpKind::UpdateSet, &cb.column, &cb.bind)?);
        }
        Ok(doc1("$set", Value::Map(set)))
    }

    /// Filter, update document and key hint of an upsert.
    ///
    /// The filter matches the conflict columns. Update columns go to
    /// `$set`; every other inserted column goes to `$setOnInsert`, so no
    /// path is targeted by both.
    pub fn upsert_spec(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        ups: &UpsertAst,
    ) -> Result<(Document, Document, Option<Value>), Error> {
        let ins = &ups.insert;
        if ups.conflict_columns.is_empty() {
            return Err(PlanningError::NoConflictColumns(ins.table.clone()).into());
        }
        let placer = self.placer();
        let key_path = key_path(ea, view);

        let mut filter = Document::new();
        let mut id_hint = None;
        for col in &ups.conflict_columns {
            let cb = ins
                .column(col)
                .ok_or_else(|| PlanningError::UnknownConflictColumn(col.clone()))?;
            let v = placer.stored(OpKind::UpsertFilter, col, &cb.bind)?;
            if col == "_id" || key_path.as_deref() == Some(col.as_str()) {
                id_hint = Some(cb.bind.value.clone()).filter(|v| !v.is_null());
            }
            filter.insert(col.clone(), v);
        }

        let mut set = Document::new();
        for col in &ups.update_columns {
            if let Some(cb) = ins.column(col) {
                set.insert(col.clone(), placer.stored(OpKind::UpsertSet, col, &cb.bind)?);
            }
        }
        let mut on_insert = Document::new();
        for cb in ins.columns.iter().filter(|cb| !set.contains_key(&cb.column)) {
            on_insert.insert(cb.column.clone(), placer.stored(OpKind::Insert, &cb.column, &cb.bind)?);
        }
        if let Some(key_path) = &key_path {
            if key_path != "_id" && !set.contains_key("_id") && !on_insert.contains_key("_id") {
                if let Some(id) = filter.get(key_path).or_else(|| on_insert.get(key_path)).cloned() {
                    on_insert.insert("_id".to_string(), id);
                }
            }
        }

        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set".to_string(), Value::Map(set));
        }
        if !on_insert.is_empty() {
            update.insert("$setOnInsert".to_string(), Value::Map(on_insert));
        }
        Ok((filter, update, id_hint))
    }

    fn render_insert(&self, ea: &EntityAuthoring, view: &ViewDef, ins: &InsertAst) -> Result<DocumentStatement, Error> {
        if ins.columns.is_empty() {
            return Err(PlanningError::EmptyInsert(ins.table.clone()).into());
        }
        let mut stmt = DocumentStatement::new(StatementKind::InsertOne, &ins.table);
        stmt.document = Some(self.insert_document(ea, view, ins)?);
        stmt.id_hint = key_path(ea, view)
            .and_then(|path| ins.column(&path))
            .map(|cb| cb.bind.value.clone())
            .filter(|v| !v.is_null());
        Ok(stmt)
    }

    fn render_update(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        upd: &UpdateAst,
        types: &PropertyTypeResolver,
    ) -> Result<DocumentStatement, Error> {
        let mut stmt = DocumentStatement::new(StatementKind::UpdateMany, &upd.table);
        stmt.document = Some(self.update_document(upd)?);
        stmt.filter = self.where_document(ea, view, upd.filter.as_ref(), types)?;
        Ok(stmt)
    }

    fn render_delete(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        del: &DeleteAst,
        types: &PropertyTypeResolver,
    ) -> Result<DocumentStatement, Error> {
        let mut stmt = DocumentStatement::new(StatementKind::DeleteMany, &del.table);
        stmt.filter = self.where_document(ea, view, del.filter.as_ref(), types)?;
        Ok(stmt)
    }

    fn render_upsert(&self, ea: &EntityAuthoring, view: &ViewDef, ups: &UpsertAst) -> Result<DocumentStatement, Error> {
        let (filter, update, id_hint) = self.upsert_spec(ea, view, ups)?;
        let mut stmt = DocumentStatement::new(StatementKind::UpdateOne, &ups.insert.table);
        stmt.filter = filter;
        stmt.document = Some(update);
        stmt.upsert = true;
        stmt.id_hint = id_hint;
        Ok(stmt)
    }
}

impl NativeDialect for DocumentDialect {
    type Statement = DocumentStatement;

    fn id(&self) -> &str {
        DIALECT_ID
    }

    fn path_policy(&self) -> PathPolicy {
        PathPolicy::Explicit
    }

    fn merge_select(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        sort: &[SortField],
        page: &Page,
        params: &BTreeMap<String, Value>,
        types: &PropertyTypeResolver,
    ) -> Result<DocumentStatement, Error> {
        let collection = collection(ea)?;
        let r = self.renderer(ea, view, types, OpKind::Filter);
        let mut compiled = filter.map(|f| r.render(f)).transpose()?.flatten();
        if let Page::Seek { after, .. } = page {
            if let Some(seek) = r.seek(sort, after)? {
                compiled = Some(match compiled {
                    Some(c) => and_docs(c, Some(seek)),
                    None => seek,
                });
            }
        }
        let sort = sort_spec(view, sort);
        let (skip, limit) = match page {
            Page::Offset { offset, limit } => (*offset, *limit),
            Page::Seek { limit, .. } => (0, *limit),
        };

        match self.base(view, params)? {
            Base::Filter(base) => {
                let mut stmt = DocumentStatement::new(StatementKind::Find, collection);
                stmt.filter = and_docs(base, compiled);
                stmt.sort = sort;
                stmt.skip = (skip > 0).then_some(skip);
                stmt.limit = Some(limit);
                Ok(stmt)
            }
            Base::Pipeline(mut stages) => {
                if let Some(m) = compiled.filter(|m| !m.is_empty()) {
                    stages.push(Stage::Match(m));
                }
                if !sort.is_empty() {
                    stages.push(Stage::Sort(sort));
                }
                if skip > 0 {
                    stages.push(Stage::Skip(skip));
                }
                stages.push(Stage::Limit(limit));
                let mut stmt = DocumentStatement::new(StatementKind::Aggregate, collection);
                stmt.pipeline = stages;
                Ok(stmt)
            }
        }
    }

    fn merge_count(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<&QueryElement>,
        params: &BTreeMap<String, Value>,
        types: &PropertyTypeResolver,
    ) -> Result<DocumentStatement, Error> {
        let collection = collection(ea)?;
        let compiled = self.where_document(ea, view, filter, types)?;

        match self.base(view, params)? {
            Base::Filter(base) => {
                let mut stmt = DocumentStatement::new(StatementKind::Count, collection);
                stmt.filter = and_docs(base, Some(compiled));
                Ok(stmt)
            }
            Base::Pipeline(mut stages) => {
                if !compiled.is_empty() {
                    stages.push(Stage::Match(compiled));
                }
                stages.push(Stage::Count(COUNT_FIELD.to_string()));
                let mut stmt = DocumentStatement::new(StatementKind::Aggregate, collection);
                stmt.pipeline = stages;
                Ok(stmt)
            }
        }
    }

    fn render_dml(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        ast: &DmlAst,
        types: &PropertyTypeResolver,
    ) -> Result<DocumentStatement, Error> {
        let mut stmt = match ast {
            DmlAst::Insert(ins) => self.render_insert(ea, view, ins)?,
            DmlAst::Update(upd) => self.render_update(ea, view, upd, types)?,
            DmlAst::Delete(del) => self.render_delete(ea, view, del, types)?,
            DmlAst::Upsert(ups) => self.render_upsert(ea, view, ups)?,
        };
        stmt.dml = Some(ast.clone());
        Ok(stmt)
    }
}

fn collection(ea: &EntityAuthoring) -> Result<&str, PlanningError> {
    ea.source()
        .ok_or_else(|| PlanningError::NoSource(ea.type_name.clone()))
}

/// Stored path of the single key field.
fn key_path(ea: &EntityAuthoring, view: &ViewDef) -> Option<String> {
    ea.single_key_field()
        .map(|key| PathPolicy::Explicit.column(view, key))
}

/// A native filter or stage as a document, with `{param: name}` references
/// replaced by query params.
fn native_document(view: &ViewDef, json: &Json, params: &BTreeMap<String, Value>) -> Result<Document, Error> {
    match resolve_params(Value::from_json(json), params)? {
        Value::Map(doc) => Ok(doc),
        other => Err(PlanningError::InvalidNativeQuery(
            view.id.clone(),
            format!("expected a document but found {}", other.kind()),
        )
        .into()),
    }
}

fn resolve_params(v: Value, params: &BTreeMap<String, Value>) -> Result<Value, PlanningError> {
    Ok(match v {
        Value::Param(name) => params
            .get(&name)
            .cloned()
            .ok_or(PlanningError::MissingParam(name))?,
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| resolve_params(item, params))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(m) => Value::Map(
            m.into_iter()
                .map(|(k, item)| Ok((k, resolve_params(item, params)?)))
                .collect::<Result<_, PlanningError>>()?,
        ),
        other => other,
    })
}
