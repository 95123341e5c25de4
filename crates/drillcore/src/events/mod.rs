// crates/drillcore/src/events/mod.rs

mod bus;
mod telemetry;

pub use bus::{EventBus, Handler, SubscriptionId};
pub use telemetry::{EventEmitter, FlowEvent, SessionId, Telemetry};
