// tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use shopnish_flow::{FlowContext, FlowError, Handler, StepControl};
use tracing::Level;

#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub trail: Vec<String>,
  pub halt_at: Option<String>,
  pub express: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  /// Engine error, kept as its Debug string so the enum stays comparable.
  #[error("flow engine error: {0}")]
  Engine(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(err: FlowError) -> Self {
    TestError::Engine(format!("{:?}", err))
  }
}

/// Records `label` in the trail, bumps the counter and halts when the
/// context asks for it.
pub fn recording_handler(label: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: FlowContext<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.trail.push(label.to_string());
      if guard.halt_at.as_deref() == Some(label) {
        return Ok(StepControl::Halt);
      }
      Ok(StepControl::Continue)
    })
  })
}

pub fn failing_handler(label: &'static str, message: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: FlowContext<TestContext>| {
    Box::pin(async move {
      ctx.write().trail.push(label.to_string());
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
