//! Shared compilation support: property type resolution and validation.

mod resolver;
mod validation;

pub use resolver::PropertyTypeResolver;
pub use validation::{DefaultQueryValidation, QueryValidation};
