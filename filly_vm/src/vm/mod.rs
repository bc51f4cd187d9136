// Submodules
pub mod array;
pub mod error;
pub mod events;
pub mod exec;
pub mod frame;
pub mod scope;
pub mod value;

// Re-exports
pub use array::{new_array_ref, ArrayRef, ArrayValue};
pub use error::{LoadError, RunError, VmError};
pub use events::{Event, EventQueue, EventType, Handler, HandlerRef, HandlerRegistry};
pub use exec::Flow;
pub use frame::{CallFrame, MAX_STACK_DEPTH};
pub use scope::{Scope, ScopeRef};
pub use value::{HostObject, Value, ValueKind};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::host::HostHandles;
use crate::opcode::{OpNode, ParamSpec, Program};

use events::queue::DEFAULT_QUEUE_CAPACITY;
use exec::PendingSignal;

/// Construction options for a [`Vm`].
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Suppress GUI-facing behaviour; the host checks this before wiring a
    /// real graphics backend.
    pub headless: bool,
    /// Overall wall-clock budget for `run`; reaching it triggers `Stop`.
    pub timeout: Option<Duration>,
    /// Event queue capacity; the oldest event is evicted beyond this.
    pub queue_capacity: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// A user-defined function: declared parameters plus an opcode body.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub body: Arc<Vec<OpNode>>,
}

/// The builtin seam. Host code registers `(name, function)` pairs; each
/// function receives the VM and the evaluated argument vector.
pub type BuiltinFn = Arc<dyn Fn(&mut Vm, &[Value]) -> Result<Value, VmError> + Send + Sync>;

/// A cloneable handle that stops a running VM from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    queue: Arc<EventQueue>,
}

impl StopHandle {
    /// Signal the event loop to exit after the current dispatch.
    /// Idempotent.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.queue.wake();
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The virtual machine: value domain, scope chain, function and builtin
/// tables, call stack, event machinery, and the capability handles to the
/// host. Every dependency is an instance field; multiple VMs coexist in one
/// process.
pub struct Vm {
    options: VmOptions,
    pub(crate) host: HostHandles,

    pub(crate) global_scope: ScopeRef,
    /// The scope statements execute in right now: the global scope at top
    /// level, a function's local scope during a call, a handler's parent
    /// scope during dispatch.
    pub(crate) current_scope: ScopeRef,

    pub(crate) functions: HashMap<String, Arc<FunctionDef>>,
    functions_ci: HashMap<String, String>,
    pub(crate) builtins: HashMap<String, BuiltinFn>,
    builtins_ci: HashMap<String, String>,

    pub(crate) call_stack: Vec<CallFrame>,

    pub(crate) registry: HandlerRegistry,
    queue: Arc<EventQueue>,
    stop: Arc<AtomicBool>,

    /// The handler currently being dispatched, if any.
    pub(crate) current_handler: Option<HandlerRef>,
    /// The event currently being dispatched, if any.
    pub(crate) current_event: Option<Event>,
    /// Control signal raised by a builtin (`Wait`, `end_step`) mid-call,
    /// converted to a `Flow` at the enclosing statement boundary.
    pub(crate) pending_signal: Option<PendingSignal>,
    /// Step count stored by `SetStep` outside any handler.
    pub(crate) step_counter: i64,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("functions", &self.functions.len())
            .field("builtins", &self.builtins.len())
            .field("handlers", &self.registry.len())
            .field("queue_len", &self.queue.len())
            .field("stack_depth", &self.call_stack.len())
            .finish_non_exhaustive()
    }
}

impl Vm {
    pub fn new(options: VmOptions) -> Self {
        Self::with_host(options, HostHandles::default())
    }

    pub fn with_host(options: VmOptions, host: HostHandles) -> Self {
        let global_scope = Scope::root();
        let queue = Arc::new(EventQueue::new(
            options.queue_capacity,
            Arc::clone(&host.clock),
        ));
        Self {
            options,
            host,
            current_scope: Arc::clone(&global_scope),
            global_scope,
            functions: HashMap::new(),
            functions_ci: HashMap::new(),
            builtins: HashMap::new(),
            builtins_ci: HashMap::new(),
            call_stack: Vec::new(),
            registry: HandlerRegistry::new(),
            queue,
            stop: Arc::new(AtomicBool::new(false)),
            current_handler: None,
            current_event: None,
            pending_signal: None,
            step_counter: 0,
        }
    }

    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // Builtin and function tables
    // ------------------------------------------------------------------

    /// Register a host builtin. Later registrations shadow earlier ones
    /// under the same name.
    pub fn register_builtin<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut Vm, &[Value]) -> Result<Value, VmError> + Send + Sync + 'static,
    {
        self.builtins_ci
            .insert(name.to_ascii_lowercase(), name.to_string());
        self.builtins.insert(name.to_string(), Arc::new(f));
    }

    pub(crate) fn lookup_builtin(&self, name: &str) -> Option<BuiltinFn> {
        if let Some(f) = self.builtins.get(name) {
            return Some(Arc::clone(f));
        }
        self.builtins_ci
            .get(&name.to_ascii_lowercase())
            .and_then(|canonical| self.builtins.get(canonical))
            .cloned()
    }

    /// Register a user function (`DefineFunction` lands here).
    pub fn define_function(&mut self, name: &str, params: Vec<ParamSpec>, body: Arc<Vec<OpNode>>) {
        let def = Arc::new(FunctionDef {
            name: name.to_string(),
            params,
            body,
        });
        self.functions_ci
            .insert(name.to_ascii_lowercase(), name.to_string());
        self.functions.insert(name.to_string(), def);
    }

    pub(crate) fn lookup_function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        if let Some(f) = self.functions.get(name) {
            return Some(Arc::clone(f));
        }
        self.functions_ci
            .get(&name.to_ascii_lowercase())
            .and_then(|canonical| self.functions.get(canonical))
            .cloned()
    }

    pub fn function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    pub fn global_scope(&self) -> &ScopeRef {
        &self.global_scope
    }

    pub fn current_scope(&self) -> &ScopeRef {
        &self.current_scope
    }

    /// Convenience for tests and hosts: read a variable through the global
    /// scope.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.global_scope.get(name)
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.global_scope.set(name, value);
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Push an event. Callable from any thread through a queue handle; this
    /// method is the interpreter-thread convenience.
    pub fn post_event(&self, event: Event) {
        self.queue.push(event);
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Sequence number of the handler currently being dispatched
    /// (`GetMesNo`).
    pub fn current_handler_seq(&self) -> Option<u64> {
        self.current_handler
            .as_ref()
            .map(|h| h.lock().unwrap().seq)
    }

    pub fn current_event(&self) -> Option<&Event> {
        self.current_event.as_ref()
    }

    /// Tombstone the currently executing handler (`del_me`/`del_us`). The
    /// dispatch in progress completes; the sweep removes the handler
    /// afterwards. Reports whether a handler was executing.
    pub fn remove_current_handler(&mut self) -> bool {
        match &self.current_handler {
            Some(h) => {
                h.lock().unwrap().mark_removed();
                true
            }
            None => false,
        }
    }

    /// Tombstone the handler with registration number `seq` (`DelMes`).
    pub fn remove_handler_by_seq(&mut self, seq: u64) -> bool {
        match self.registry.find_by_seq(seq) {
            Some(h) => {
                h.lock().unwrap().mark_removed();
                true
            }
            None => false,
        }
    }

    /// Drop every handler immediately (`del_all`).
    pub fn remove_all_handlers(&mut self) {
        self.registry.unregister_all();
    }

    // ------------------------------------------------------------------
    // Control signals raised from builtins
    // ------------------------------------------------------------------

    /// Raise a wait from inside a builtin (`Wait(n)` called as a function).
    /// Converted to a `Flow::Wait` at the enclosing statement boundary.
    pub fn signal_wait(&mut self, count: i64) {
        if count > 0 {
            self.pending_signal = Some(PendingSignal::Wait(count));
        }
    }

    /// Raise `end_step`: the executing handler's body completes at the
    /// current statement, wait and step counters cleared.
    pub fn signal_end_step(&mut self) {
        self.pending_signal = Some(PendingSignal::EndStep);
    }

    /// Store a step count on the executing handler, or on the VM itself
    /// outside a dispatch.
    pub fn set_step_value(&mut self, count: i64) {
        match &self.current_handler {
            Some(h) => h.lock().unwrap().step_counter = count,
            None => self.step_counter = count,
        }
    }

    /// The VM-level step count (`SetStep` outside a handler).
    pub fn step_value(&self) -> i64 {
        self.step_counter
    }

    // ------------------------------------------------------------------
    // Host capabilities
    // ------------------------------------------------------------------

    pub fn host(&self) -> &HostHandles {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostHandles {
        &mut self.host
    }

    pub fn clock_now(&self) -> u64 {
        self.host.clock.now()
    }

    // ------------------------------------------------------------------
    // Run / stop
    // ------------------------------------------------------------------

    /// Signal the event loop to exit after the current dispatch.
    /// Idempotent; callable from builtins on the interpreter thread.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.queue.wake();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// A handle other threads can use to stop the VM.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop),
            queue: Arc::clone(&self.queue),
        }
    }

    /// Validate and run a program: the top-level statement stream first,
    /// then the event loop until `Stop` or the configured timeout.
    pub fn run(&mut self, program: &Program) -> Result<(), RunError> {
        program.validate()?;
        self.stop.store(false, Ordering::SeqCst);
        if let Err(e) = self.run_toplevel(program) {
            // Fatal faults abort the top-level entry only; the event loop
            // still serves whatever handlers were registered.
            log::error!("top-level run aborted: {}", e);
        }
        self.event_loop();
        self.shutdown();
        Ok(())
    }

    /// Execute the top-level statement stream without entering the event
    /// loop. Suspension signals are meaningless outside a handler and are
    /// logged and ignored.
    pub fn run_toplevel(&mut self, program: &Program) -> Result<(), VmError> {
        self.current_scope = Arc::clone(&self.global_scope);
        for node in &program.body {
            match self.execute(node) {
                Ok(Flow::Value(_)) => {}
                Ok(Flow::Return(_)) => break,
                Ok(Flow::Break) => {
                    log::warn!("`break` outside any loop at top level; ignored");
                }
                Ok(Flow::Wait(_)) | Ok(Flow::EndStep) => {
                    log::warn!("wait outside a message handler; ignored");
                }
                Err(e) => return Err(e),
            }
            if let Some(signal) = self.pending_signal.take() {
                log::warn!("{} outside a message handler; ignored", signal.describe());
            }
        }
        Ok(())
    }

    /// Dispatch queued events until the queue is empty, without blocking.
    /// Returns the number of events dispatched. Hosts and tests drive
    /// deterministic schedules with this.
    pub fn pump(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.queue.pop() {
            if let Err(e) = self.dispatch_event(&event) {
                log::error!("dispatch of {} aborted: {}", event.ty, e);
            }
            dispatched += 1;
            if self.is_stopped() {
                break;
            }
        }
        dispatched
    }

    fn event_loop(&mut self) {
        let deadline = self
            .options
            .timeout
            .map(|t| self.host.clock.now().saturating_add(t.as_millis() as u64));
        loop {
            if self.is_stopped() {
                break;
            }
            if let Some(deadline) = deadline {
                if self.host.clock.now() >= deadline {
                    log::info!("run timeout reached; stopping");
                    self.stop();
                    break;
                }
            }
            let Some(event) = self.queue.pop_wait(Duration::from_millis(25)) else {
                continue;
            };
            if let Err(e) = self.dispatch_event(&event) {
                log::error!("dispatch of {} aborted: {}", event.ty, e);
            }
        }
    }

    fn shutdown(&mut self) {
        self.host.audio.shutdown();
        self.host.file_io.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive_on_fallback() {
        let mut vm = Vm::new(VmOptions::default());
        vm.register_builtin("Wait", |_vm, _args| Ok(Value::I64(1)));
        assert!(vm.lookup_builtin("Wait").is_some());
        assert!(vm.lookup_builtin("wait").is_some());
        assert!(vm.lookup_builtin("WAIT").is_some());
        assert!(vm.lookup_builtin("Waitt").is_none());
    }

    #[test]
    fn test_exact_builtin_wins_over_case_fold() {
        let mut vm = Vm::new(VmOptions::default());
        vm.register_builtin("abs", |_vm, _args| Ok(Value::I64(1)));
        vm.register_builtin("Abs", |_vm, _args| Ok(Value::I64(2)));
        let f = vm.lookup_builtin("abs").unwrap();
        assert_eq!(f.as_ref()(&mut vm, &[]).unwrap().coerce_i64(), Some(1));
    }

    #[test]
    fn test_stop_is_idempotent_and_visible_through_handle() {
        let vm = Vm::new(VmOptions::default());
        let handle = vm.stop_handle();
        assert!(!vm.is_stopped());
        handle.stop();
        handle.stop();
        assert!(vm.is_stopped());
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_set_step_outside_handler_lands_on_vm() {
        let mut vm = Vm::new(VmOptions::default());
        vm.set_step_value(6);
        assert_eq!(vm.step_value(), 6);
        assert!(!vm.remove_current_handler());
    }
}
