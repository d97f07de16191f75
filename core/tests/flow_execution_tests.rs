// tests/flow_execution_tests.rs
mod common;

use common::*;
use serial_test::serial;
use shopnish_flow::{Flow, FlowContext, FlowOutcome, StepControl, StepDef};

#[tokio::test]
#[serial]
async fn test_steps_run_in_declaration_order() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "ordered",
    [StepDef::required("a"), StepDef::required("b"), StepDef::required("c")],
  );
  flow.on("c", recording_handler("c"));
  flow.on("a", recording_handler("a"));
  flow.on("b", recording_handler("b"));

  let ctx = FlowContext::new(TestContext::default());
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, FlowOutcome::Completed);
  assert_eq!(ctx.read().trail, vec!["a", "b", "c"]);
  assert_eq!(ctx.read().counter, 3);
}

#[tokio::test]
#[serial]
async fn test_before_on_after_phases_run_in_order_within_a_step() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("phases", [StepDef::required("only")]);
  flow.after("only", recording_handler("after"));
  flow.on("only", recording_handler("on-1"));
  flow.before("only", recording_handler("before"));
  flow.on("only", recording_handler("on-2"));

  let ctx = FlowContext::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().trail, vec!["before", "on-1", "on-2", "after"]);
}

#[tokio::test]
#[serial]
async fn test_halt_stops_the_rest_of_the_flow() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "halting",
    [StepDef::required("first"), StepDef::required("gate"), StepDef::required("last")],
  );
  flow.on("first", recording_handler("first"));
  flow.on("gate", recording_handler("gate"));
  flow.after("gate", recording_handler("gate-after"));
  flow.on("last", recording_handler("last"));

  let ctx = FlowContext::new(TestContext {
    halt_at: Some("gate".to_string()),
    ..Default::default()
  });
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(
    outcome,
    FlowOutcome::Halted {
      step: "gate".to_string()
    }
  );
  assert_eq!(ctx.read().trail, vec!["first", "gate"]);
}

#[tokio::test]
#[serial]
async fn test_handler_error_aborts_and_is_returned_unchanged() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "failing",
    [StepDef::required("good"), StepDef::required("bad"), StepDef::required("never")],
  );
  flow.on("good", recording_handler("good"));
  flow.on("bad", failing_handler("bad", "stock ran out"));
  flow.on("never", recording_handler("never"));

  let ctx = FlowContext::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("stock ran out".to_string()));
  assert_eq!(ctx.read().trail, vec!["good", "bad"]);
}

#[tokio::test]
#[serial]
async fn test_skip_condition_is_read_at_run_time() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "skipping",
    [
      StepDef::required("decide"),
      StepDef::required("standard_shipping").skip_when(|ctx: &TestContext| ctx.express),
      StepDef::required("finish"),
    ],
  );
  flow.on("decide", |ctx: FlowContext<TestContext>| async move {
    ctx.update(|data| data.express = true);
    Ok::<_, TestError>(StepControl::Continue)
  });
  flow.on("standard_shipping", recording_handler("standard_shipping"));
  flow.on("finish", recording_handler("finish"));

  let ctx = FlowContext::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().trail, vec!["finish"]);
}

#[tokio::test]
#[serial]
async fn test_optional_step_without_handlers_is_passed_over() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "optional",
    [StepDef::required("a"), StepDef::optional("notify"), StepDef::required("b")],
  );
  flow.on("a", recording_handler("a"));
  flow.on("b", recording_handler("b"));

  let ctx = FlowContext::new(TestContext::default());
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert!(outcome.is_completed());
  assert_eq!(ctx.read().trail, vec!["a", "b"]);
}

#[tokio::test]
#[serial]
async fn test_required_step_without_handlers_fails() {
  setup_tracing();
  let flow = Flow::<TestContext, TestError>::new("missing", [StepDef::required("lonely")]);

  let err = flow.run(FlowContext::new(TestContext::default())).await.unwrap_err();

  match err {
    TestError::Engine(debug) => {
      assert!(debug.contains("HandlerMissing"));
      assert!(debug.contains("lonely"));
    }
    other => panic!("expected an engine error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_handlers_can_await_between_lock_scopes() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("async", [StepDef::required("slow")]);
  flow.on("slow", |ctx: FlowContext<TestContext>| async move {
    let start = ctx.snapshot(|data| data.counter);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    ctx.update(|data| data.counter = start + 10);
    Ok::<_, TestError>(StepControl::Continue)
  });

  let ctx = FlowContext::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().counter, 10);
}
