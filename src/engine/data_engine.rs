//! The transactional orchestrator.
//!
//! Every operation resolves the entity and view, resolves the schema
//! placeholder, then either compiles a read (normalize, validate, merge) or
//! plans and renders a write. All of that happens before the backend is
//! touched, so a rejected query or payload never leaves a partial write.
//! Writes run in the transaction bound to the caller's [`TxContext`], or in
//! a fresh one that is committed or rolled back before returning.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::backend::Backend;
use super::context::TxContext;
use super::handle::{EngineHandle, EntityViewRef};
use super::helpers::HelperRegistry;
use super::propagation::Propagation;
use super::row::RowAdapter;
use crate::authoring::{AuthoringRegistry, EntityAuthoring, ViewDef, SCHEMA_PLACEHOLDER};
use crate::compile::{DefaultQueryValidation, PropertyTypeResolver, QueryValidation};
use crate::config::Settings;
use crate::dialect::NativeDialect;
use crate::dml::{DmlAst, DmlPlanner, MappedDmlPlanner};
use crate::error::{AuthoringError, PlanningError, Result, TransactionStateError};
use crate::query::{normalize, Query, QueryElement};

/// Transaction context of the engine running on backend `B`.
pub type EngineContext<B> = TxContext<<B as Backend>::Tx>;

/// Sequences compilation and execution for one backend.
pub struct DataEngine<D, B>
where
    D: NativeDialect,
    B: Backend<Statement = D::Statement>,
{
    id: Uuid,
    handle: EngineHandle,
    dialect: D,
    backend: B,
    authoring: Arc<dyn AuthoringRegistry>,
    types: PropertyTypeResolver,
    validation: Arc<dyn QueryValidation>,
    planner: Arc<dyn DmlPlanner>,
    helpers: Arc<HelperRegistry>,
    default_propagation: Propagation,
}

impl<D, B> std::fmt::Debug for DataEngine<D, B>
where
    D: NativeDialect,
    B: Backend<Statement = D::Statement>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataEngine")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("dialect", &self.dialect.id())
            .field("default_propagation", &self.default_propagation)
            .finish()
    }
}

/// A planned write whose generated key may need writing back.
struct PlannedWrite<S> {
    stmt: S,
    generated_key: Option<String>,
}

impl<D, B> DataEngine<D, B>
where
    D: NativeDialect,
    B: Backend<Statement = D::Statement>,
{
    pub fn new(
        handle: EngineHandle,
        dialect: D,
        backend: B,
        authoring: Arc<dyn AuthoringRegistry>,
        helpers: Arc<HelperRegistry>,
    ) -> Self {
        let planner = MappedDmlPlanner::new(authoring.clone(), helpers.clone(), dialect.path_policy());
        Self {
            id: Uuid::new_v4(),
            handle,
            types: PropertyTypeResolver::new(authoring.clone()),
            dialect,
            backend,
            authoring,
            validation: Arc::new(DefaultQueryValidation),
            planner: Arc::new(planner),
            helpers,
            default_propagation: Propagation::default(),
        }
    }

    /// Apply the `[engine]` and `[planner]` settings. The handle is passed
    /// to [`DataEngine::new`] separately.
    pub fn with_settings(self, settings: &Settings) -> Self {
        self.with_default_propagation(settings.engine.default_propagation)
            .with_tenant_boundary_keys(&settings.planner.tenant_boundary_keys)
    }

    pub fn with_default_propagation(mut self, propagation: Propagation) -> Self {
        self.default_propagation = propagation;
        self
    }

    pub fn with_validation(mut self, validation: Arc<dyn QueryValidation>) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn DmlPlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Rebuild the default planner with insert-only governance keys.
    pub fn with_tenant_boundary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let planner = MappedDmlPlanner::new(
            self.authoring.clone(),
            self.helpers.clone(),
            self.dialect.path_policy(),
        )
        .with_tenant_boundary_keys(keys);
        self.planner = Arc::new(planner);
        self
    }

    /// Identity tagged onto every context this engine creates.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn default_propagation(&self) -> Propagation {
        self.default_propagation
    }

    /// A context with no transaction bound.
    pub fn context(&self) -> EngineContext<B> {
        TxContext::new(self.id)
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Run `work` under `propagation` relative to the transaction bound in
    /// `ctx`. A newly opened transaction is committed when `work` succeeds
    /// and rolled back when it fails.
    pub fn in_tx<T>(
        &self,
        ctx: &mut EngineContext<B>,
        propagation: Propagation,
        work: impl FnOnce(&mut EngineContext<B>) -> Result<T>,
    ) -> Result<T> {
        let active = ctx.is_active_for(self.id);
        match propagation {
            Propagation::Required | Propagation::Nested => {
                if active {
                    work(ctx)
                } else {
                    self.run_new(propagation, work)
                }
            }
            Propagation::Supports => work(ctx),
            Propagation::Mandatory => {
                if active {
                    work(ctx)
                } else {
                    Err(TransactionStateError::NoActiveTransaction.into())
                }
            }
            Propagation::RequiresNew => self.run_new(propagation, work),
            Propagation::Never => {
                if active {
                    Err(TransactionStateError::ActiveTransaction.into())
                } else {
                    work(ctx)
                }
            }
        }
    }

    /// [`DataEngine::in_tx`] with the engine's default propagation.
    pub fn transaction<T>(
        &self,
        ctx: &mut EngineContext<B>,
        work: impl FnOnce(&mut EngineContext<B>) -> Result<T>,
    ) -> Result<T> {
        self.in_tx(ctx, self.default_propagation, work)
    }

    fn run_new<T>(
        &self,
        propagation: Propagation,
        work: impl FnOnce(&mut EngineContext<B>) -> Result<T>,
    ) -> Result<T> {
        let tx = self.backend.begin(&self.handle)?;
        debug!(
            engine_id = %self.id,
            handle_id = %self.handle.id,
            %propagation,
            "transaction begin"
        );

        let mut child = TxContext::with_tx(self.id, tx);
        let result = work(&mut child);
        let Some(tx) = child.take_tx() else {
            return result;
        };

        match result {
            Ok(value) => {
                self.backend.commit(tx)?;
                debug!(engine_id = %self.id, handle_id = %self.handle.id, "transaction commit");
                Ok(value)
            }
            Err(err) => {
                match self.backend.rollback(tx) {
                    Ok(()) => debug!(
                        engine_id = %self.id,
                        handle_id = %self.handle.id,
                        error = %err,
                        "transaction rollback"
                    ),
                    Err(rollback_err) => warn!(
                        engine_id = %self.id,
                        handle_id = %self.handle.id,
                        error = %rollback_err,
                        original = %err,
                        "rollback failed; keeping the original error"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Run `f` on the bound transaction, opening one when none is bound.
    fn write<T>(
        &self,
        ctx: &mut EngineContext<B>,
        f: impl FnOnce(&mut B::Tx) -> Result<T>,
    ) -> Result<T> {
        self.in_tx(ctx, Propagation::Required, |c| {
            let tx = c
                .tx_for(self.id)
                .ok_or(TransactionStateError::NoActiveTransaction)?;
            f(tx)
        })
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    fn resolve(&self, target: &EntityViewRef) -> Result<(&EntityAuthoring, Cow<'_, ViewDef>)> {
        let ea = self.authoring.entity(&target.type_name)?;
        let view = ea
            .views
            .get(&target.view_id)
            .ok_or_else(|| AuthoringError::UnknownView(target.view_id.clone()))?;
        Ok((ea, resolve_schema(view, &self.handle)?))
    }

    fn compile_filter(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        query: &Query,
    ) -> Result<Option<QueryElement>> {
        let filter = normalize(query)?;
        self.validation
            .validate(ea, view, query, filter.as_ref(), &self.types)?;
        Ok(filter)
    }

    fn render(&self, ea: &EntityAuthoring, view: &ViewDef, ast: DmlAst) -> Result<D::Statement> {
        let stmt = self.dialect.render_dml(ea, view, &ast, &self.types)?;
        debug!(
            op = ast.op_name(),
            table = ast.table(),
            dialect = self.dialect.id(),
            "rendered write"
        );
        Ok(stmt)
    }

    /// The auto-generated single key field when the payload leaves it unset.
    fn generated_key(&self, ea: &EntityAuthoring, entity: &dyn Any) -> Result<Option<String>> {
        let Some(key) = ea.single_key_field() else {
            return Ok(None);
        };
        let auto = ea.get_field(key).is_some_and(|f| f.auto_generated);
        if !auto || !self.helpers.accessor(ea)?.get(entity, key).is_null() {
            return Ok(None);
        }
        self.helpers.mutator(ea)?;
        Ok(Some(key.to_string()))
    }

    /// Decode a returned key through its field type and set it on the payload.
    fn write_back(
        &self,
        ea: &EntityAuthoring,
        entity: &mut dyn Any,
        field: Option<&str>,
        key: Option<crate::value::Value>,
    ) -> Result<()> {
        let (Some(field), Some(raw)) = (field, key) else {
            return Ok(());
        };
        if raw.is_null() {
            return Ok(());
        }
        let type_id = ea
            .get_field(field)
            .map(|f| f.ty.type_id())
            .unwrap_or_else(|| "json".to_string());
        let decoded = self.backend.user_types().decode(&type_id, &raw)?;
        debug!(entity = %ea.type_name, field, %type_id, "generated key written back");
        self.helpers.mutator(ea)?.set(entity, field, decoded)
    }

    fn plan_insert(&self, ea: &EntityAuthoring, view: &ViewDef, entity: &dyn Any) -> Result<PlannedWrite<D::Statement>> {
        let generated_key = self.generated_key(ea, entity)?;
        let ast = self
            .planner
            .plan_insert(ea, view, entity, generated_key.is_some())?;
        Ok(PlannedWrite {
            stmt: self.render(ea, view, DmlAst::Insert(ast))?,
            generated_key,
        })
    }

    fn plan_upsert(&self, ea: &EntityAuthoring, view: &ViewDef, entity: &dyn Any) -> Result<PlannedWrite<D::Statement>> {
        let generated_key = self.generated_key(ea, entity)?;
        let ast = self
            .planner
            .plan_upsert(ea, view, entity, generated_key.is_some())?;
        Ok(PlannedWrite {
            stmt: self.render(ea, view, DmlAst::Upsert(ast))?,
            generated_key,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Rows of `target` matching `query`, materialized by the entity's row
    /// decoder. Uses the bound transaction when there is one.
    pub fn select<E: Any>(
        &self,
        ctx: &mut EngineContext<B>,
        target: &EntityViewRef,
        query: &Query,
    ) -> Result<Vec<E>> {
        let (ea, view) = self.resolve(target)?;
        let filter = self.compile_filter(ea, &view, query)?;
        let stmt = self.dialect.merge_select(
            ea,
            &view,
            filter.as_ref(),
            &query.sort,
            &query.page,
            &query.params,
            &self.types,
        )?;
        let decoder = self.helpers.decoder(ea)?;

        let mut out = Vec::new();
        self.backend.select(
            ctx.tx_for(self.id),
            &self.handle,
            &view,
            &stmt,
            &mut |row: &dyn RowAdapter| -> Result<()> {
                let entity = decoder
                    .read(row)?
                    .downcast::<E>()
                    .map_err(|_| PlanningError::PayloadType(ea.type_name.clone()))?;
                out.push(*entity);
                Ok(())
            },
        )?;
        Ok(out)
    }

    pub fn count(&self, ctx: &mut EngineContext<B>, target: &EntityViewRef, query: &Query) -> Result<u64> {
        let (ea, view) = self.resolve(target)?;
        let filter = self.compile_filter(ea, &view, query)?;
        let stmt = self
            .dialect
            .merge_count(ea, &view, filter.as_ref(), &query.params, &self.types)?;
        self.backend.count(ctx.tx_for(self.id), &self.handle, &stmt)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert `entity`. A key generated by the backend for an unset
    /// auto-generated key field is written back onto `entity`.
    pub fn insert<E: Any>(&self, ctx: &mut EngineContext<B>, target: &EntityViewRef, entity: &mut E) -> Result<()> {
        let (ea, view) = self.resolve(target)?;
        let planned = self.plan_insert(ea, &view, &*entity)?;
        let key = self.write(ctx, |tx| self.backend.insert(tx, &self.handle, &planned.stmt))?;
        self.write_back(ea, entity, planned.generated_key.as_deref(), key)
    }

    /// Insert every entity in one transaction. Nothing is written when any
    /// payload fails to plan.
    pub fn bulk_insert<E: Any>(
        &self,
        ctx: &mut EngineContext<B>,
        target: &EntityViewRef,
        entities: &mut [E],
    ) -> Result<()> {
        let (ea, view) = self.resolve(target)?;
        let planned = entities
            .iter()
            .map(|e| self.plan_insert(ea, &view, e))
            .collect::<Result<Vec<_>>>()?;
        let keys = self.write(ctx, |tx| {
            planned
                .iter()
                .map(|p| self.backend.insert(tx, &self.handle, &p.stmt))
                .collect::<Result<Vec<_>>>()
        })?;
        for ((entity, p), key) in entities.iter_mut().zip(&planned).zip(keys) {
            self.write_back(ea, entity, p.generated_key.as_deref(), key)?;
        }
        Ok(())
    }

    /// Insert, or update the non-key, non-governed columns on key conflict.
    pub fn upsert<E: Any>(&self, ctx: &mut EngineContext<B>, target: &EntityViewRef, entity: &mut E) -> Result<()> {
        let (ea, view) = self.resolve(target)?;
        let planned = self.plan_upsert(ea, &view, &*entity)?;
        let key = self.write(ctx, |tx| self.backend.upsert(tx, &self.handle, &planned.stmt))?;
        self.write_back(ea, entity, planned.generated_key.as_deref(), key)
    }

    pub fn bulk_upsert<E: Any>(
        &self,
        ctx: &mut EngineContext<B>,
        target: &EntityViewRef,
        entities: &mut [E],
    ) -> Result<()> {
        let (ea, view) = self.resolve(target)?;
        let planned = entities
            .iter()
            .map(|e| self.plan_upsert(ea, &view, e))
            .collect::<Result<Vec<_>>>()?;
        let keys = self.write(ctx, |tx| {
            planned
                .iter()
                .map(|p| self.backend.upsert(tx, &self.handle, &p.stmt))
                .collect::<Result<Vec<_>>>()
        })?;
        for ((entity, p), key) in entities.iter_mut().zip(&planned).zip(keys) {
            self.write_back(ea, entity, p.generated_key.as_deref(), key)?;
        }
        Ok(())
    }

    /// Update every non-key field of `entity`, matched on its single key.
    /// Returns the affected count.
    pub fn update<E: Any>(&self, ctx: &mut EngineContext<B>, target: &EntityViewRef, entity: &E) -> Result<u64> {
        let (ea, view) = self.resolve(target)?;
        let ast = self.planner.plan_update_by_id(ea, &view, entity)?;
        let stmt = self.render(ea, &view, DmlAst::Update(ast))?;
        self.write(ctx, |tx| self.backend.update(tx, &self.handle, &stmt))
    }

    pub fn bulk_update<E: Any>(&self, ctx: &mut EngineContext<B>, target: &EntityViewRef, entities: &[E]) -> Result<u64> {
        let (ea, view) = self.resolve(target)?;
        let stmts = entities
            .iter()
            .map(|e| {
                let ast = self.planner.plan_update_by_id(ea, &view, e)?;
                self.render(ea, &view, DmlAst::Update(ast))
            })
            .collect::<Result<Vec<_>>>()?;
        self.write(ctx, |tx| {
            stmts.iter().try_fold(0u64, |n, stmt| {
                Ok(n + self.backend.update(tx, &self.handle, stmt)?)
            })
        })
    }

    /// Set the fields present on `entity` on every row matching `query`.
    pub fn update_by_criteria<E: Any>(
        &self,
        ctx: &mut EngineContext<B>,
        target: &EntityViewRef,
        entity: &E,
        query: &Query,
    ) -> Result<u64> {
        let (ea, view) = self.resolve(target)?;
        let filter = self.compile_filter(ea, &view, query)?;
        let ast = self
            .planner
            .plan_update_by_criteria(ea, &view, entity, filter)?;
        let stmt = self.render(ea, &view, DmlAst::Update(ast))?;
        self.write(ctx, |tx| self.backend.update(tx, &self.handle, &stmt))
    }

    pub fn delete_by_criteria(&self, ctx: &mut EngineContext<B>, target: &EntityViewRef, query: &Query) -> Result<u64> {
        let (ea, view) = self.resolve(target)?;
        let filter = self.compile_filter(ea, &view, query)?;
        let ast = self.planner.plan_delete_by_criteria(ea, &view, filter)?;
        let stmt = self.render(ea, &view, DmlAst::Delete(ast))?;
        self.write(ctx, |tx| self.backend.delete(tx, &self.handle, &stmt))
    }
}

/// Substitute `{schema}` in a view's native query when the view asks for it.
pub fn resolve_schema<'v>(view: &'v ViewDef, handle: &EngineHandle) -> Result<Cow<'v, ViewDef>> {
    let Some(native) = view.native.as_ref().filter(|n| n.schema) else {
        return Ok(Cow::Borrowed(view));
    };
    let namespace = handle
        .namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| PlanningError::MissingNamespace(view.id.clone()))?;

    let mut native = native.clone();
    for part in [&mut native.sql, &mut native.projection].into_iter().flatten() {
        substitute(part, namespace);
    }
    let mut resolved = view.clone();
    resolved.native = Some(native);
    Ok(Cow::Owned(resolved))
}

fn substitute(json: &mut serde_json::Value, namespace: &str) {
    match json {
        serde_json::Value::String(s) if s.contains(SCHEMA_PLACEHOLDER) => {
            *s = s.replace(SCHEMA_PLACEHOLDER, namespace);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(|v| substitute(v, namespace)),
        serde_json::Value::Object(map) => map.values_mut().for_each(|v| substitute(v, namespace)),
        _ => {}
    }
}
