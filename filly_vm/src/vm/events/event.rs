//! Event - a typed message with a timestamp and a parameter map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vm::value::Value;

/// Parameter keys observed by handlers. The dispatcher installs these into
/// the handler's scope before the body runs.
pub const MES_P1: &str = "MesP1";
pub const MES_P2: &str = "MesP2";
pub const MES_P3: &str = "MesP3";
pub const MES_P4: &str = "MesP4";
/// Set on `User` events: the user-defined message number.
pub const MESSAGE_TYPE: &str = "MessageType";

/// The fixed set of event types, plus `User` for program-defined messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Time,
    MidiTime,
    MidiEnd,
    LbDown,
    RbDown,
    RbDblClk,
    Key,
    Click,
    User,
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            EventType::Time => "TIME",
            EventType::MidiTime => "MIDI_TIME",
            EventType::MidiEnd => "MIDI_END",
            EventType::LbDown => "LBDOWN",
            EventType::RbDown => "RBDOWN",
            EventType::RbDblClk => "RBDBLCLK",
            EventType::Key => "KEY",
            EventType::Click => "CLICK",
            EventType::User => "USER",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A message travelling through the event queue.
///
/// `timestamp` is in the `Clock`'s milliseconds; events built without one
/// are stamped at queue admission.
#[derive(Debug, Clone)]
pub struct Event {
    pub ty: EventType,
    pub timestamp: Option<u64>,
    pub params: HashMap<String, Value>,
}

impl Event {
    pub fn new(ty: EventType) -> Self {
        Self {
            ty,
            timestamp: None,
            params: HashMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// A `User` event as posted by `PostMes(message_type, p1, p2, p3, ...)`.
    pub fn user(message_type: i64, params: &[Value]) -> Self {
        let mut event = Event::new(EventType::User)
            .with_param(MESSAGE_TYPE, Value::I64(message_type));
        for (i, p) in params.iter().enumerate().take(4) {
            let key = match i {
                0 => MES_P1,
                1 => MES_P2,
                2 => MES_P3,
                _ => MES_P4,
            };
            event.params.insert(key.to_string(), p.clone());
        }
        event
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}
