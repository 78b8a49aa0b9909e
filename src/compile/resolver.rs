//! Property path to scalar logical type resolution.

use std::sync::Arc;

use dashmap::DashMap;

use crate::authoring::{AuthoringRegistry, EntityAuthoring, TypeRef};

/// Resolves dot paths through `Ref` fields to the terminal scalar type id.
///
/// Results are memoized per `(entity type, path)`. The cache never changes
/// an answer: a miss re-derives the same result from the immutable
/// authoring metadata.
pub struct PropertyTypeResolver {
    authoring: Arc<dyn AuthoringRegistry>,
    cache: DashMap<(String, String), Option<String>>,
}

impl std::fmt::Debug for PropertyTypeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyTypeResolver")
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl PropertyTypeResolver {
    pub fn new(authoring: Arc<dyn AuthoringRegistry>) -> Self {
        Self {
            authoring,
            cache: DashMap::new(),
        }
    }

    pub fn authoring(&self) -> &Arc<dyn AuthoringRegistry> {
        &self.authoring
    }

    /// Scalar type id of `path`, or `None` when a segment is unknown, a
    /// non-terminal segment is not a reference, or the leaf is not scalar.
    pub fn resolve_scalar_type_id(&self, root: &EntityAuthoring, path: &str) -> Option<String> {
        let key = (root.type_name.clone(), path.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        self.cache
            .entry(key)
            .or_insert_with(|| self.resolve_uncached(root, path))
            .clone()
    }

    /// Resolution without the cache.
    pub fn resolve_uncached(&self, root: &EntityAuthoring, path: &str) -> Option<String> {
        if path.trim().is_empty() {
            return None;
        }
        let parts: Vec<&str> = path.split('.').collect();
        let mut current = root;
        for (i, part) in parts.iter().enumerate() {
            let field = current.get_field(part)?;
            if i == parts.len() - 1 {
                return match &field.ty {
                    TypeRef::Scalar(id) => Some(id.clone()),
                    _ => None,
                };
            }
            match &field.ty {
                TypeRef::Ref(target) => current = self.authoring.entity(target).ok()?,
                _ => return None,
            }
        }
        None
    }

    /// Type id used to bind values of a top-level or nested field: the
    /// scalar id when resolvable, otherwise the field's container id, else
    /// `json`.
    pub fn bind_type_id(&self, root: &EntityAuthoring, path: &str) -> String {
        if let Some(id) = self.resolve_scalar_type_id(root, path) {
            return id;
        }
        root.get_field(path)
            .map(|f| f.ty.type_id())
            .unwrap_or_else(|| "json".to_string())
    }
}
