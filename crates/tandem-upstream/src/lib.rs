//! The upstream HTTP client (spec component C): graph and REST surfaces,
//! conditional revalidation, bounded retry, and pre-flight validation.

pub mod client;
pub mod model;
pub mod retry;
pub mod validate;

pub use client::UpstreamClient;
pub use model::{Accept, Credential, FileEntry, Revalidated};
pub use retry::{is_retryable, with_retry};
