//! `blueprint-kernel` — the value model, plan graph, and intrinsic binding
//! surface for Blueprint plans.
//!
//! This crate is pure data and graph-construction logic: no tokio runtime,
//! no filesystem or network I/O. A script driver builds a [`Plan`] by
//! calling the intrinsic constructors in [`intrinsics`] against a
//! [`plan::PlanBuilder`]; the resulting frozen [`plan::Plan`] is handed to
//! `blueprint-runtime` for execution.

pub mod error;
pub mod intrinsics;
pub mod node;
pub mod plan;
pub mod value;

#[cfg(feature = "config")]
pub mod config;

pub use error::{KernelError, KernelResult, ScriptError};
pub use node::{Node, NodeId, NodeKind};
pub use plan::{Plan, PlanBuilder};
pub use value::{Deferred, Value};
