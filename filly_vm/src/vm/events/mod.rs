//! The event system: events, the bounded chronological queue, resumable
//! handlers, the ordered registry, and the dispatcher.

pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod queue;
pub mod registry;

pub use event::{Event, EventType, MESSAGE_TYPE, MES_P1, MES_P2, MES_P3, MES_P4};
pub use handler::{Handler, HandlerRef};
pub use queue::{EventQueue, DEFAULT_QUEUE_CAPACITY};
pub use registry::HandlerRegistry;
