//! In-process run progress events.

pub mod bus;

pub use bus::{event_types, EventBus, RunEvent};
