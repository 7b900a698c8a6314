//! The peer channel runtime (spec component F).

pub mod connection;
pub mod events;
pub mod frame;
pub mod lane;
pub mod state;
pub mod transport;

pub use connection::{LocalEdit, PeerCmd, PeerConnection, PeerHandle};
pub use events::PeerEvent;
pub use frame::Frame;
pub use lane::{ChatMessage, ControlEvent, CursorBeacon, Lane, RemoteServiceStatePayload, TerminalIoPayload};
pub use state::{PeerState, ReconnectDecision, ReconnectState};
pub use transport::{PeerTransport, TransportEvent};
