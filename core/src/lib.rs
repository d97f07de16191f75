// src/lib.rs

//! shopnish-flow: the async step engine behind the Shopnish storefront.
//!
//! A [`Flow`] is an ordered list of named steps. Each step may carry `before`,
//! `on` and `after` handlers; every handler receives the same shared
//! [`FlowContext`] and answers with a [`StepControl`] telling the engine to keep
//! going or to halt. Steps can be optional (no handlers is fine) and can be
//! skipped by a predicate evaluated against the context right before they run.
//!
//! Flows are registered in a [`FlowRegistry`] keyed by their context type, so
//! HTTP handlers only need to build the context and call `registry.run(ctx)`.

pub mod context;
pub mod control;
pub mod error;
pub mod flow;
pub mod registry;
pub mod step;

pub use crate::context::{FlowContext, Handler};
pub use crate::control::{FlowOutcome, StepControl};
pub use crate::error::{FlowError, FlowResult};
pub use crate::flow::Flow;
pub use crate::registry::FlowRegistry;
pub use crate::step::{SkipCondition, StepDef};
