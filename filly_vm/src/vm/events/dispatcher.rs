//! The dispatcher: drives handlers for one event and applies the
//! suspend/resume protocol.
//!
//! Protocol, per handler and per event of its type:
//!
//! 1. A positive `wait_counter` is decremented first. Still positive: the
//!    handler sleeps through this event. Reaching zero: the handler resumes
//!    on this very event, from `pc`.
//! 2. The event's parameters are installed in the handler's scope, and the
//!    VM's current-handler pointer and current scope are swapped for the
//!    handler's, restored when the run ends.
//! 3. Top-level statements run from `pc`. A `Wait(n)` signal stores `n` and
//!    parks `pc` after the emitting statement; the waiting statement is
//!    never advanced past twice. A completed body resets `pc` to 0.
//!
//! Handlers removing themselves mid-dispatch only tombstone; the sweep runs
//! after the dispatch, so the iteration never observes a shrinking list.

use std::sync::Arc;

use crate::vm::error::VmError;
use crate::vm::exec::Flow;
use crate::vm::Vm;

use super::event::Event;
use super::handler::HandlerRef;

impl Vm {
    /// Run every active handler registered for `event`'s type, in
    /// registration order, then sweep tombstones.
    ///
    /// A fatal fault aborts the remaining handlers for this event and
    /// propagates; the caller logs it and continues with the next event.
    pub fn dispatch_event(&mut self, event: &Event) -> Result<(), VmError> {
        let snapshot = self.registry.snapshot(event.ty);
        let mut outcome = Ok(());
        for handler in &snapshot {
            if let Err(e) = self.run_handler(handler, event) {
                outcome = Err(e);
                break;
            }
        }
        self.registry.cleanup_marked_handlers();
        outcome
    }

    fn run_handler(&mut self, handler: &HandlerRef, event: &Event) -> Result<(), VmError> {
        // Wait bookkeeping under the handler lock, released before the body
        // runs so builtins like del_me can take it again.
        let (body, scope, start_pc) = {
            let mut h = handler.lock().unwrap();
            if !h.active {
                return Ok(());
            }
            if h.wait_counter > 0 {
                h.wait_counter -= 1;
                if h.wait_counter > 0 {
                    // Still sleeping.
                    return Ok(());
                }
                // Reached zero: resume on this event.
            }
            (Arc::clone(&h.body), Arc::clone(&h.parent_scope), h.pc)
        };

        for (key, value) in &event.params {
            scope.set_local(key, value.clone());
        }

        let prev_handler = self.current_handler.replace(Arc::clone(handler));
        let prev_event = self.current_event.replace(event.clone());
        let prev_scope = std::mem::replace(&mut self.current_scope, scope);

        let outcome = self.run_handler_body(handler, &body, start_pc);

        // A signal parked during the final statement has no consumer left.
        self.pending_signal = None;
        self.current_scope = prev_scope;
        self.current_handler = prev_handler;
        self.current_event = prev_event;
        outcome
    }

    fn run_handler_body(
        &mut self,
        handler: &HandlerRef,
        body: &[crate::opcode::OpNode],
        start_pc: usize,
    ) -> Result<(), VmError> {
        let mut index = start_pc;
        while index < body.len() {
            let mut flow = match self.execute(&body[index]) {
                Ok(flow) => flow,
                Err(e) => {
                    // Fatal: this dispatch aborts; the handler restarts
                    // fresh on its next event.
                    handler.lock().unwrap().finish_run();
                    return Err(e);
                }
            };
            if matches!(flow, Flow::Value(_)) {
                if let Some(pending) = self.pending_signal.take() {
                    flow = pending.into_flow();
                }
            }
            match flow {
                Flow::Value(_) => {}
                Flow::Break => {
                    log::warn!("`break` outside any loop in a handler; ignored");
                }
                Flow::Return(_) => {
                    // No frame to consume it here: the body is done.
                    handler.lock().unwrap().finish_run();
                    return Ok(());
                }
                Flow::Wait(count) => {
                    handler.lock().unwrap().suspend(index, count);
                    return Ok(());
                }
                Flow::EndStep => {
                    let mut h = handler.lock().unwrap();
                    h.pc = 0;
                    h.wait_counter = 0;
                    h.step_counter = 0;
                    return Ok(());
                }
            }
            index += 1;
        }
        handler.lock().unwrap().finish_run();
        Ok(())
    }
}
