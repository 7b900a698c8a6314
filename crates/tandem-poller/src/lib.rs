//! Adaptive per-repository polling (spec component D).

pub mod change;
pub mod loop_;
pub mod source;

pub use change::{Change, ChangeKind};
pub use loop_::{PollCmd, PollerEvent, PollerHandle, RepoPoller};
pub use source::{DeltaItem, DeltaSource, PollTarget};
