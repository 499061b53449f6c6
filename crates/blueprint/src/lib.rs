//! Blueprint — standard facade crate.
//!
//! Re-exports [`blueprint_kernel`] (the value model, plan graph, and
//! intrinsic binding surface) and [`blueprint_runtime`] (the async
//! executor) under a single dependency, so embedders depend on one
//! crate instead of wiring the two together themselves.
//!
//! A script driver builds a plan with [`kernel::plan::PlanBuilder`] and
//! the constructors in [`kernel::intrinsics`], freezes it into a
//! [`kernel::Plan`], and hands it to [`runtime::Executor::run`].

pub use blueprint_kernel as kernel;
pub use blueprint_runtime as runtime;

pub use blueprint_kernel::{Deferred, KernelError, KernelResult, Node, NodeId, NodeKind, Plan, PlanBuilder, ScriptError, Value};
pub use blueprint_runtime::{ExecutionReport, Executor, ExecutorConfig, RuntimeError};
