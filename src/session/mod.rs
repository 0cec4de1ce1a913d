//! Render session state machine and its worker render loop.
//!
//! The host owns a [`RenderSession`]. `start` lends the engine to a render loop running as a
//! keep-running task on the worker lane; every scene resync is a rendezvous onto the host lane, and
//! composited frames come back through a single-slot [`DisplayLink`](crate::display::DisplayLink)
//! that the host empties in [`RenderSession::pump`].

/// Completion criteria and progress.
pub mod criteria;
/// Session options.
pub mod opts;
/// Host-side session front.
pub mod render_session;
/// Lifecycle states.
pub mod state;
mod worker;

pub use criteria::{CompletionCriteria, Progress};
pub use opts::{RenderMode, RenderSessionOpts};
pub use render_session::{PumpReport, RenderSession};
pub use state::SessionState;
pub use worker::SessionStats;
