//! Pre-compilation query validation.

use super::resolver::PropertyTypeResolver;
use crate::authoring::{EntityAuthoring, ViewDef};
use crate::error::{PathUsage, ValidationError};
use crate::query::{Query, QueryElement};

/// Hook run after normalization and before dialect compilation.
pub trait QueryValidation: Send + Sync {
    fn validate(
        &self,
        entity: &EntityAuthoring,
        view: &ViewDef,
        query: &Query,
        filter: Option<&QueryElement>,
        types: &PropertyTypeResolver,
    ) -> Result<(), ValidationError>;
}

/// Every filter, sort, and group-by path must resolve to a scalar leaf.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQueryValidation;

impl QueryValidation for DefaultQueryValidation {
    fn validate(
        &self,
        entity: &EntityAuthoring,
        _view: &ViewDef,
        query: &Query,
        filter: Option<&QueryElement>,
        types: &PropertyTypeResolver,
    ) -> Result<(), ValidationError> {
        let mut result = Ok(());
        if let Some(filter) = filter {
            filter.for_each_condition(&mut |c| {
                if result.is_ok() {
                    result = require_scalar(entity, &c.property, PathUsage::Filter, types);
                }
            });
        }
        result?;
        for s in &query.sort {
            require_scalar(entity, &s.field, PathUsage::Sort, types)?;
        }
        for g in &query.group_by {
            require_scalar(entity, g, PathUsage::GroupBy, types)?;
        }
        Ok(())
    }
}

fn require_scalar(
    entity: &EntityAuthoring,
    path: &str,
    usage: PathUsage,
    types: &PropertyTypeResolver,
) -> Result<(), ValidationError> {
    if path.trim().is_empty() {
        return Err(ValidationError::BlankPath {
            usage,
            entity: entity.type_name.clone(),
        });
    }
    match types.resolve_scalar_type_id(entity, path) {
        Some(_) => Ok(()),
        None => Err(ValidationError::UnknownPath {
            path: path.to_string(),
            usage,
            entity: entity.type_name.clone(),
        }),
    }
}
