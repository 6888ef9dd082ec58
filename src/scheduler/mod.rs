//! Background work: offload batching, offload retries and the timeout sweep.

mod cleanup;
mod offload;
mod retry;

pub use cleanup::*;
pub use offload::*;
pub use retry::*;
