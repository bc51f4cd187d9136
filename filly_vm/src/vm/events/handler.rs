//! Handler - a registered, resumable piece of opcode-level code bound to
//! one event type.
//!
//! A handler is the platform's coroutine. Suspension is encoded as explicit
//! state rather than a thread or a stackful coroutine: `pc` indexes the next
//! top-level statement of the body, `wait_counter` counts the events of the
//! handler's type still to be skipped. The dispatcher drives resumption.

use std::sync::{Arc, Mutex};

use crate::opcode::OpNode;
use crate::vm::scope::ScopeRef;

use super::event::EventType;

pub type HandlerRef = Arc<Mutex<Handler>>;

#[derive(Debug)]
pub struct Handler {
    /// Stable identifier, unique across the VM's lifetime.
    pub id: String,
    /// Registration sequence number; what `GetMesNo` reports and `DelMes`
    /// addresses.
    pub seq: u64,
    pub event_type: EventType,
    pub body: Arc<Vec<OpNode>>,
    /// The scope in force at registration. The body runs directly in this
    /// scope, so the handler observes its enclosing lexical environment.
    pub parent_scope: ScopeRef,
    /// Inactive handlers are skipped by the dispatcher.
    pub active: bool,
    /// Deactivated and scheduled for removal at the post-dispatch sweep.
    pub tombstoned: bool,
    /// Index of the next top-level statement to run.
    pub pc: usize,
    /// Events of `event_type` still to skip before resuming.
    pub wait_counter: i64,
    /// Step count stored by `SetStep`; the compiler's comma mechanism reads
    /// it, the core only stores it.
    pub step_counter: i64,
}

impl Handler {
    pub fn new(
        seq: u64,
        event_type: EventType,
        body: Arc<Vec<OpNode>>,
        parent_scope: ScopeRef,
    ) -> Self {
        Self {
            id: format!("mes-{}", seq),
            seq,
            event_type,
            body,
            parent_scope,
            active: true,
            tombstoned: false,
            pc: 0,
            wait_counter: 0,
            step_counter: 0,
        }
    }

    /// Tombstone: deactivate now, remove at the next sweep. Idempotent.
    pub fn mark_removed(&mut self) {
        self.active = false;
        self.tombstoned = true;
    }

    /// Body completed (or was forced to complete): restart from the top on
    /// the next event.
    pub fn finish_run(&mut self) {
        self.pc = 0;
    }

    /// Suspend after the top-level statement at `index`.
    pub fn suspend(&mut self, index: usize, count: i64) {
        self.wait_counter = count;
        self.pc = index + 1;
    }
}
