//! Turns a typed payload into write statements.
//!
//! A field is written when its value is non-null or the payload marks it
//! explicitly null. Reference fields are written only through an explicit
//! nested `fields` mapping, one column per non-null child field.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::authoring::{AuthoringRegistry, EntityAuthoring, FieldDef, TypeRef, ViewDef};
use crate::engine::helpers::{Accessor, HelperRegistry};
use crate::error::{Error, PlanningError};
use crate::query::{filters, QueryElement};
use crate::value::Value;

use super::ast::{Bind, ColumnBind, DeleteAst, InsertAst, UpdateAst, UpsertAst};

/// Plans write statements for one backend family.
pub trait DmlPlanner: Send + Sync {
    fn plan_insert(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        returning_key: bool,
    ) -> Result<InsertAst, Error>;

    /// Update of every non-key field, matched on the single key field.
    fn plan_update_by_id(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
    ) -> Result<UpdateAst, Error>;

    fn plan_update_by_criteria(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        filter: Option<QueryElement>,
    ) -> Result<UpdateAst, Error>;

    fn plan_delete_by_criteria(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        filter: Option<QueryElement>,
    ) -> Result<DeleteAst, Error>;

    fn plan_upsert(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        returning_key: bool,
    ) -> Result<UpsertAst, Error>;
}

/// How a field maps to its written column or document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathPolicy {
    /// Explicit mapping, else the snake_case form (relational columns).
    #[default]
    SnakeCaseDefault,
    /// Explicit mapping, else the field name unchanged (document paths).
    Explicit,
}

impl PathPolicy {
    /// Mapped column or document path of `field`.
    pub fn column(self, view: &ViewDef, field: &str) -> String {
        match self {
            PathPolicy::SnakeCaseDefault => view.ref_path(field),
            PathPolicy::Explicit => view
                .explicit_ref(field)
                .map(str::to_string)
                .unwrap_or_else(|| field.to_string()),
        }
    }
}

/// Planner driven by view mappings and registered entity accessors.
pub struct MappedDmlPlanner {
    authoring: Arc<dyn AuthoringRegistry>,
    helpers: Arc<HelperRegistry>,
    policy: PathPolicy,
    tenant_boundary_keys: BTreeSet<String>,
}

impl std::fmt::Debug for MappedDmlPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedDmlPlanner")
            .field("policy", &self.policy)
            .field("tenant_boundary_keys", &self.tenant_boundary_keys)
            .finish()
    }
}

impl MappedDmlPlanner {
    pub fn new(
        authoring: Arc<dyn AuthoringRegistry>,
        helpers: Arc<HelperRegistry>,
        policy: PathPolicy,
    ) -> Self {
        Self {
            authoring,
            helpers,
            policy,
            tenant_boundary_keys: BTreeSet::new(),
        }
    }

    /// Governance keys whose fields are insert-only. Blank keys are ignored.
    pub fn with_tenant_boundary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tenant_boundary_keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn policy(&self) -> PathPolicy {
        self.policy
    }

    fn is_governed(&self, def: &FieldDef) -> bool {
        !self.tenant_boundary_keys.is_empty()
            && def
                .governance_keys()
                .iter()
                .any(|k| self.tenant_boundary_keys.contains(k))
    }

    fn key_columns(&self, ea: &EntityAuthoring, view: &ViewDef) -> Vec<String> {
        ea.key_fields()
            .map(|field| self.policy.column(view, field))
            .collect()
    }

    fn governed_columns(&self, ea: &EntityAuthoring, view: &ViewDef) -> BTreeSet<String> {
        ea.fields
            .iter()
            .filter(|(_, def)| self.is_governed(def))
            .map(|(field, _)| self.policy.column(view, field))
            .collect()
    }

    /// Written columns of the payload. Update sets skip key and governed
    /// fields.
    fn extract(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        for_update: bool,
    ) -> Result<Vec<ColumnBind>, Error> {
        let accessor = self.helpers.accessor(ea)?;
        let mut out = Vec::new();
        for (field, def) in &ea.fields {
            if for_update && (def.key || self.is_governed(def)) {
                continue;
            }
            if let TypeRef::Ref(target) = &def.ty {
                self.extract_nested(view, accessor, entity, field, target, &mut out)?;
                continue;
            }
            let value = accessor.get(entity, field);
            if value.is_null() && !accessor.is_explicit_null(entity, field) {
                continue;
            }
            out.push(ColumnBind::new(
                self.policy.column(view, field),
                bind_for(Some(def), value),
            ));
        }
        Ok(out)
    }

    fn extract_nested(
        &self,
        view: &ViewDef,
        accessor: &dyn Accessor,
        entity: &dyn Any,
        field: &str,
        target: &str,
        out: &mut Vec<ColumnBind>,
    ) -> Result<(), Error> {
        let Some(children) = view.mapping.get(field).and_then(|m| m.nested_fields()) else {
            return Ok(());
        };
        let Some(child) = accessor.child(entity, field) else {
            return Ok(());
        };
        let child_ea = self.authoring.entity(target)?;
        let child_accessor = self.helpers.accessor(child_ea)?;
        for (child_field, spec) in children {
            let Some(column) = spec.target() else { continue };
            let value = child_accessor.get(child, child_field);
            if value.is_null() {
                continue;
            }
            out.push(ColumnBind::new(
                column,
                bind_for(child_ea.get_field(child_field), value),
            ));
        }
        Ok(())
    }
}

fn require_source(ea: &EntityAuthoring) -> Result<&str, PlanningError> {
    ea.source()
        .ok_or_else(|| PlanningError::NoSource(ea.type_name.clone()))
}

/// The single key field, falling back to `id` for entities that mark none.
fn single_key_field(ea: &EntityAuthoring) -> Result<&str, PlanningError> {
    let mut keys = ea.key_fields();
    match (keys.next(), keys.next()) {
        (None, _) => Ok("id"),
        (Some(key), None) => Ok(key),
        (Some(_), Some(_)) => Err(PlanningError::CompositeKey(ea.type_name.clone())),
    }
}

fn bind_for(def: Option<&FieldDef>, value: Value) -> Bind {
    match def {
        Some(def) => Bind::new(value, def.ty.type_id()),
        None => Bind::new(value, "json"),
    }
}

impl DmlPlanner for MappedDmlPlanner {
    fn plan_insert(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        returning_key: bool,
    ) -> Result<InsertAst, Error> {
        let table = require_source(ea)?.to_string();
        let columns = self.extract(ea, view, entity, false)?;
        let returning = if returning_key {
            self.key_columns(ea, view)
        } else {
            Vec::new()
        };
        Ok(InsertAst {
            table,
            columns,
            returning,
        })
    }

    fn plan_update_by_id(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
    ) -> Result<UpdateAst, Error> {
        let table = require_source(ea)?.to_string();
        let key_field = single_key_field(ea)?;
        let sets = self.extract(ea, view, entity, true)?;
        let id = self.helpers.accessor(ea)?.get(entity, key_field);
        Ok(UpdateAst {
            table,
            sets,
            filter: Some(filters::eq(key_field, id)),
        })
    }

    fn plan_update_by_criteria(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        filter: Option<QueryElement>,
    ) -> Result<UpdateAst, Error> {
        let table = require_source(ea)?.to_string();
        let sets = self.extract(ea, view, entity, true)?;
        Ok(UpdateAst { table, sets, filter })
    }

    fn plan_delete_by_criteria(
        &self,
        ea: &EntityAuthoring,
        _view: &ViewDef,
        filter: Option<QueryElement>,
    ) -> Result<DeleteAst, Error> {
        Ok(DeleteAst {
            table: require_source(ea)?.to_string(),
            filter,
        })
    }

    fn plan_upsert(
        &self,
        ea: &EntityAuthoring,
        view: &ViewDef,
        entity: &dyn Any,
        returning_key: bool,
    ) -> Result<UpsertAst, Error> {
        let insert = self.plan_insert(ea, view, entity, returning_key)?;
        let conflict_columns = self.key_columns(ea, view);
        let governed = self.governed_columns(ea, view);
        let update_columns = insert
            .columns
            .iter()
            .map(|c| c.column.clone())
            .filter(|c| !conflict_columns.contains(c) && !governed.contains(c))
            .collect();
        Ok(UpsertAst {
            insert,
            conflict_columns,
            update_columns,
        })
    }
}
