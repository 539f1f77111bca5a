// crates/flexcore/src/events/mod.rs

mod bus;

pub use bus::{EventBus, EventEmitter, ExecutionEvent};
