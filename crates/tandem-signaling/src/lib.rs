//! The signaling relay (spec component H).

pub mod envelope;
pub mod relay;

pub use envelope::{Envelope, EnvelopeKind, Role};
pub use relay::{RelayCmd, RelayHandle, RelayService};
