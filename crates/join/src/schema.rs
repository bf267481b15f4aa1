use std::collections::HashMap;

use crate::entity::{Entity, EntityRef};

/// Registry of entity metadata used to locate the intermediate entity of two-hop
/// joins by simple name.
///
/// Entities are grouped by the module they are declared in; lookups are
/// case-insensitive on the simple name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    modules: HashMap<&'static str, HashMap<String, EntityRef>>,
}

impl Schema {
    /// Empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `E`.
    #[must_use]
    pub fn entity<E: Entity>(mut self) -> Self {
        self.register(EntityRef::of::<E>());
        self
    }

    /// Register an entity handle.
    pub fn register(&mut self, entity: EntityRef) {
        self.modules
            .entry(entity.module)
            .or_default()
            .insert(entity.name.to_ascii_lowercase(), entity);
    }

    /// Entity named `name` declared in `module`.
    #[must_use]
    pub fn find(&self, module: &str, name: &str) -> Option<EntityRef> {
        self.modules.get(module)?.get(&name.to_ascii_lowercase()).copied()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.values().map(HashMap::len).sum()
    }

    /// Whether no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.values().all(HashMap::is_empty)
    }
}
