//! EventTypeRegistry — bidirectional string ↔ id map, ids stable for the
//! life of the process.

use parking_lot::RwLock;
use std::collections::HashMap;

pub type EventTypeId = u32;

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, EventTypeId>,
    by_id: Vec<String>,
}

pub struct EventTypeRegistry {
    inner: RwLock<Inner>,
}

impl Default for EventTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Intern `name`, returning its stable id. Takes the writer lock only
    /// when the name is new.
    pub fn intern(&self, name: &str) -> EventTypeId {
        if let Some(id) = self.inner.read().by_name.get(name) {
            return *id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.by_name.get(name) {
            return *id;
        }
        let id = inner.by_id.len() as EventTypeId;
        inner.by_id.push(name.to_string());
        inner.by_name.insert(name.to_string(), id);
        id
    }

    pub fn name_of(&self, id: EventTypeId) -> Option<String> {
        self.inner.read().by_id.get(id as usize).cloned()
    }

    pub fn id_of(&self, name: &str) -> Option<EventTypeId> {
        self.inner.read().by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let reg = EventTypeRegistry::new();
        let a = reg.intern("signal.input.text");
        let b = reg.intern("signal.input.text");
        assert_eq!(a, b);
        assert_eq!(reg.name_of(a).as_deref(), Some("signal.input.text"));
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let reg = EventTypeRegistry::new();
        let a = reg.intern("a");
        let b = reg.intern("b");
        assert_ne!(a, b);
    }
}
