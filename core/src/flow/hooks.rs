// src/flow/hooks.rs

//! Handler registration. Handlers may fail with any error type that converts
//! into the flow's `E`; the conversion happens inside the boxed wrapper.

use crate::context::{FlowContext, Handler};
use crate::control::StepControl;
use crate::error::FlowError;
use crate::flow::definition::Flow;
use std::future::Future;
use tracing::{event, Level};

fn boxed<T, E, F, Fut, HandlerErr>(handler_fn: F) -> Handler<T, E>
where
  T: 'static + Send + Sync,
  E: 'static,
  F: Fn(FlowContext<T>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
  HandlerErr: Into<E> + 'static,
{
  Box::new(move |ctx| {
    let fut = handler_fn(ctx);
    Box::pin(async move { fut.await.map_err(Into::into) })
  })
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Adds a handler that runs before the step's `on` handlers.
  pub fn before<F, Fut, HandlerErr>(&mut self, step: &str, handler_fn: F) -> &mut Self
  where
    F: Fn(FlowContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + 'static,
  {
    self.assert_step(step);
    self.before.entry(step.to_string()).or_default().push(boxed(handler_fn));
    event!(Level::TRACE, flow = %self.name, %step, "before handler registered");
    self
  }

  /// Adds a main handler for the step.
  pub fn on<F, Fut, HandlerErr>(&mut self, step: &str, handler_fn: F) -> &mut Self
  where
    F: Fn(FlowContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + 'static,
  {
    self.assert_step(step);
    self.on.entry(step.to_string()).or_default().push(boxed(handler_fn));
    event!(Level::TRACE, flow = %self.name, %step, "on handler registered");
    self
  }

  /// Adds a handler that runs after the step's `on` handlers.
  pub fn after<F, Fut, HandlerErr>(&mut self, step: &str, handler_fn: F) -> &mut Self
  where
    F: Fn(FlowContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<E> + 'static,
  {
    self.assert_step(step);
    self.after.entry(step.to_string()).or_default().push(boxed(handler_fn));
    event!(Level::TRACE, flow = %self.name, %step, "after handler registered");
    self
  }
}
