//! Telemetry event families and the emitter boundary (spec §4.J).

pub mod emitter;
pub mod event;

pub use emitter::{NoopEmitter, TelemetryEmitter, TracingEmitter};
pub use event::{Action, ActionEvent, CacheEvent, CacheOutcome, RequestEvent};
