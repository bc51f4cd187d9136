//! Handler registry: an ordered multi-map from event type to handlers.
//!
//! Registration order is dispatch order, so the per-type lists are
//! append-only vectors. Removal during dispatch is the classic hazard here;
//! the registry therefore supports tombstoning (`Handler::mark_removed`)
//! with a sweep that runs after each dispatch, never during iteration.
//! Only the interpreter thread mutates the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::opcode::OpNode;
use crate::vm::scope::ScopeRef;

use super::event::EventType;
use super::handler::{Handler, HandlerRef};

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    by_type: HashMap<EventType, Vec<HandlerRef>>,
    by_id: HashMap<String, HandlerRef>,
    next_seq: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler body for `event_type`, capturing `parent_scope`.
    /// Returns the new handler's reference.
    pub fn register(
        &mut self,
        event_type: EventType,
        body: Arc<Vec<OpNode>>,
        parent_scope: ScopeRef,
    ) -> HandlerRef {
        self.next_seq += 1;
        let handler = Handler::new(self.next_seq, event_type, body, parent_scope);
        let id = handler.id.clone();
        let handler = Arc::new(Mutex::new(handler));
        self.by_type
            .entry(event_type)
            .or_default()
            .push(Arc::clone(&handler));
        self.by_id.insert(id, Arc::clone(&handler));
        handler
    }

    /// Remove a handler immediately by its stable id.
    pub fn unregister(&mut self, id: &str) -> bool {
        let Some(handler) = self.by_id.remove(id) else {
            return false;
        };
        let ty = handler.lock().unwrap().event_type;
        if let Some(list) = self.by_type.get_mut(&ty) {
            list.retain(|h| !Arc::ptr_eq(h, &handler));
        }
        true
    }

    /// Empty both indices immediately (`del_all`).
    pub fn unregister_all(&mut self) {
        self.by_type.clear();
        self.by_id.clear();
    }

    /// A reference-order copy of the handlers for `ty`. Dispatch iterates
    /// this snapshot so a registration landing mid-dispatch takes effect on
    /// the next event rather than the current one.
    pub fn snapshot(&self, ty: EventType) -> Vec<HandlerRef> {
        self.by_type.get(&ty).cloned().unwrap_or_default()
    }

    /// Sweep every tombstoned handler across all types. Called after each
    /// dispatch.
    pub fn cleanup_marked_handlers(&mut self) {
        let mut dead: Vec<String> = Vec::new();
        for list in self.by_type.values_mut() {
            list.retain(|h| {
                let h = h.lock().unwrap();
                if h.tombstoned {
                    dead.push(h.id.clone());
                    false
                } else {
                    true
                }
            });
        }
        for id in dead {
            self.by_id.remove(&id);
        }
    }

    /// Locate a handler by its registration sequence number (`DelMes`).
    pub fn find_by_seq(&self, seq: u64) -> Option<HandlerRef> {
        self.by_id
            .values()
            .find(|h| h.lock().unwrap().seq == seq)
            .cloned()
    }

    /// Total live (non-tombstoned) handlers, across all types.
    pub fn len(&self) -> usize {
        self.by_id
            .values()
            .filter(|h| !h.lock().unwrap().tombstoned)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::scope::Scope;

    fn registry_with(n: usize, ty: EventType) -> (HandlerRegistry, Vec<HandlerRef>) {
        let mut reg = HandlerRegistry::new();
        let scope = Scope::root();
        let handlers = (0..n)
            .map(|_| reg.register(ty, Arc::new(vec![]), Arc::clone(&scope)))
            .collect();
        (reg, handlers)
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let (reg, handlers) = registry_with(3, EventType::Time);
        let snap = reg.snapshot(EventType::Time);
        assert_eq!(snap.len(), 3);
        for (a, b) in snap.iter().zip(handlers.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
        let seqs: Vec<u64> = snap.iter().map(|h| h.lock().unwrap().seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_sweep_removes_only_tombstoned() {
        let (mut reg, handlers) = registry_with(3, EventType::Time);
        handlers[1].lock().unwrap().mark_removed();
        // Tombstoned but visible until the sweep.
        assert_eq!(reg.snapshot(EventType::Time).len(), 3);
        reg.cleanup_marked_handlers();
        let snap = reg.snapshot(EventType::Time);
        assert_eq!(snap.len(), 2);
        let seqs: Vec<u64> = snap.iter().map(|h| h.lock().unwrap().seq).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_unregister_by_id_is_immediate() {
        let (mut reg, handlers) = registry_with(2, EventType::Key);
        let id = handlers[0].lock().unwrap().id.clone();
        assert!(reg.unregister(&id));
        assert!(!reg.unregister(&id));
        assert_eq!(reg.snapshot(EventType::Key).len(), 1);
    }

    #[test]
    fn test_unregister_all() {
        let (mut reg, _handlers) = registry_with(2, EventType::Time);
        reg.register(EventType::Key, Arc::new(vec![]), Scope::root());
        reg.unregister_all();
        assert!(reg.is_empty());
        assert!(reg.snapshot(EventType::Time).is_empty());
    }

    #[test]
    fn test_find_by_seq() {
        let (reg, handlers) = registry_with(3, EventType::User);
        let h = reg.find_by_seq(2).unwrap();
        assert!(Arc::ptr_eq(&h, &handlers[1]));
        assert!(reg.find_by_seq(99).is_none());
    }

    #[test]
    fn test_sequence_numbers_are_unique_across_types() {
        let mut reg = HandlerRegistry::new();
        let scope = Scope::root();
        let a = reg.register(EventType::Time, Arc::new(vec![]), Arc::clone(&scope));
        let b = reg.register(EventType::Key, Arc::new(vec![]), Arc::clone(&scope));
        assert_ne!(a.lock().unwrap().seq, b.lock().unwrap().seq);
    }
}
