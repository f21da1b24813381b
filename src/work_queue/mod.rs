//! Scheduling primitives shared by the ingestion and recognition phases.
//!
//! - [`run_with_concurrency`]: bounded-parallelism executor with input-ordered results.
//! - [`guard`]: deadline race that never propagates the operation's failure.
//! - [`PageBudget`]: per-page elapsed-time gate.
//! - [`SkipToken`]: cooperative skip-this-page signal.

mod budget;
mod cancel;
mod runner;
mod timeout;

pub use budget::PageBudget;
pub use cancel::SkipToken;
pub use runner::run_with_concurrency;
pub use timeout::{guard, Guarded};
