//! Spawn/despawn boundary between the simulation and the replication layer
//!
//! The simulation never creates networked entities itself. It asks an
//! [`EntityRuntime`] for an ID and treats a refusal as a soft failure.

use hashbrown::HashSet;

use crate::game::state::{ConsumableTemplate, EntityId};
use crate::util::vec2::Vec2;

/// Why the runtime refused to create an entity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("entity capacity exceeded ({0} live)")]
    CapacityExceeded(usize),
    #[error("no network slot registered for '{0}'")]
    NoTemplateSlot(String),
}

/// Networked entity lifecycle
pub trait EntityRuntime: Send + Sync {
    /// Allocate a networked entity for a consumable
    fn spawn_consumable(&mut self, template: &ConsumableTemplate, position: Vec2) -> Result<EntityId, SpawnError>;

    /// Release a networked entity. Unknown IDs are ignored.
    fn despawn(&mut self, id: EntityId);

    /// Number of entities currently allocated
    fn live_count(&self) -> usize;
}

/// In-process runtime with a fixed entity budget
#[derive(Debug)]
pub struct LocalRuntime {
    capacity: usize,
    next_id: EntityId,
    live: HashSet<EntityId>,
    /// Templates with a registered slot; `None` accepts every template
    registered: Option<HashSet<String>>,
}

impl LocalRuntime {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 1,
            live: HashSet::new(),
            registered: None,
        }
    }

    /// Only accept the named templates
    pub fn with_registered_templates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registered = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_live(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }
}

impl EntityRuntime for LocalRuntime {
    fn spawn_consumable(&mut self, template: &ConsumableTemplate, _position: Vec2) -> Result<EntityId, SpawnError> {
        if let Some(registered) = &self.registered {
            if !registered.contains(&template.name) {
                return Err(SpawnError::NoTemplateSlot(template.name.clone()));
            }
        }
        if self.live.len() >= self.capacity {
            return Err(SpawnError::CapacityExceeded(self.live.len()));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        Ok(id)
    }

    fn despawn(&mut self, id: EntityId) {
        self.live.remove(&id);
    }

    fn live_count(&self) -> usize {
        self.live.len()
    }
}
