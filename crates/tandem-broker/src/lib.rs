//! The session broker (spec component G).

pub mod service;
pub mod shortcode;
pub mod types;

pub use service::{BrokerCmd, BrokerHandle, BrokerService};
pub use types::{Guest, GuestState, Session, SessionState};
