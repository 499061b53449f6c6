//! `blueprint-runtime` — the async plan executor, readiness scheduler,
//! kind drivers, and event-source loop for Blueprint plans.
//!
//! This crate turns a frozen `blueprint_kernel::Plan` into resolved
//! values: [`executor::Executor::run`] drives every node from `Pending`
//! through `Ready`/`Running` to a terminal state, dispatching ready,
//! non-combinator nodes to the per-kind drivers in [`drivers`] and
//! evaluating `gather`/`any`/`at_least`/`at_most` directly against
//! dependency outcomes.

pub mod config;
pub mod drivers;
pub mod error;
pub mod event_source;
pub mod executor;
pub mod report;
pub mod state;

pub use config::ExecutorConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use executor::Executor;
pub use report::ExecutionReport;
pub use state::{NodeReport, NodeState};
