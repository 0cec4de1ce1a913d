//! Host/worker task coordination.
//!
//! Two lanes, [`Lane::Host`] and [`Lane::Worker`], each own a FIFO task queue drained by the
//! thread bound to that lane. Blocking rendezvous calls keep servicing the caller's own lane while
//! they wait, so a host blocked on the worker can still run a worker-issued host task.

/// Lane queues, rendezvous and keep-running loops.
pub mod coordinator;

pub use coordinator::{Coordinator, Lane, Task, ThreadingMode, TickStats};
