//! Profile records and the backends that store them
//!
//! - [`types`]: the typed profile record and outgoing updates
//! - [`backend`]: the `ProfileBackend` and `SaveProfile` seams
//! - [`http`]: REST implementation
//! - [`memory`]: in-memory implementation for tests and offline use

pub mod backend;
pub mod http;
pub mod memory;
pub mod types;

pub use backend::{ProfileBackend, SaveProfile};
pub use http::HttpProfileBackend;
pub use memory::{MemoryProfileBackend, SaveFailure};
pub use types::*;
