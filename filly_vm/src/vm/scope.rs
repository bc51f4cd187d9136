//! Scope - name-to-value binding frames forming a lexical chain.
//!
//! Two lookup modes exist. The walking mode (`get`/`set`) serves general
//! variable reads and writes: `get` searches local, then parent, then
//! grandparent; `set` updates the nearest existing binding, creating a local
//! binding only when the name is unbound everywhere up the chain. The
//! local-only mode (`get_local`/`set_local`) serves parameter binding and
//! explicit locals.
//!
//! Scopes are single-writer in practice (only the interpreter thread
//! mutates them) but keep a lock so debug introspection from another thread
//! is safe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::value::Value;

pub type ScopeRef = Arc<Scope>;

#[derive(Debug)]
pub struct Scope {
    vars: Mutex<HashMap<String, Value>>,
    parent: Option<ScopeRef>,
}

impl Scope {
    /// A chain root with no parent. The VM's global scope is one of these.
    pub fn root() -> ScopeRef {
        Arc::new(Self {
            vars: Mutex::new(HashMap::new()),
            parent: None,
        })
    }

    /// A child frame whose lookups fall through to `parent`.
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Arc::new(Self {
            vars: Mutex::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Walking read: the innermost binding of `name`, if any.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.lock().unwrap().get(name) {
            return Some(v.clone());
        }
        let mut scope = self.parent.as_ref();
        while let Some(s) = scope {
            if let Some(v) = s.vars.lock().unwrap().get(name) {
                return Some(v.clone());
            }
            scope = s.parent.as_ref();
        }
        None
    }

    /// Walking write: update the nearest existing binding of `name`, or
    /// create a binding in this scope when none exists anywhere up the
    /// chain.
    pub fn set(&self, name: &str, value: Value) {
        {
            let mut vars = self.vars.lock().unwrap();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return;
            }
        }
        let mut scope = self.parent.as_ref();
        while let Some(s) = scope {
            let mut vars = s.vars.lock().unwrap();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return;
            }
            drop(vars);
            scope = s.parent.as_ref();
        }
        self.vars.lock().unwrap().insert(name.to_string(), value);
    }

    /// Local-only read, ignoring the parent chain.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.vars.lock().unwrap().get(name).cloned()
    }

    /// Local-only write: always binds in this scope.
    pub fn set_local(&self, name: &str, value: Value) {
        self.vars.lock().unwrap().insert(name.to_string(), value);
    }

    /// Whether `name` is bound in this scope (not the chain).
    pub fn has_local(&self, name: &str) -> bool {
        self.vars.lock().unwrap().contains_key(name)
    }
}
