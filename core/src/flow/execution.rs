// src/flow/execution.rs

use crate::context::{FlowContext, Handler};
use crate::control::{FlowOutcome, StepControl};
use crate::error::FlowError;
use crate::flow::definition::Flow;
use tracing::{event, info_span, instrument, Instrument, Level};

#[derive(Debug, Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  fn as_str(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in declaration order against `ctx`.
  ///
  /// A step whose skip condition holds is passed over entirely. A required
  /// step with no handlers fails with [`FlowError::HandlerMissing`]. Within a
  /// step, `before` handlers run first, then `on`, then `after`, each in
  /// registration order. The first handler error aborts the run and is
  /// returned unchanged.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(flow = %self.name, steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx: FlowContext<T>) -> Result<FlowOutcome, E> {
    event!(Level::DEBUG, "flow starting");

    for (index, step) in self.steps.iter().enumerate() {
      let step_name = step.name.as_str();

      let skip = step.should_skip(&ctx.read());
      if skip {
        event!(Level::DEBUG, step = step_name, "step skipped by condition");
        continue;
      }

      if self.handler_count(step_name) == 0 {
        if step.optional {
          event!(Level::DEBUG, step = step_name, "optional step has no handlers");
          continue;
        }
        event!(Level::ERROR, step = step_name, "required step has no handlers");
        return Err(E::from(FlowError::HandlerMissing {
          step: step.name.clone(),
        }));
      }

      let phases: [(Phase, Option<&Vec<Handler<T, E>>>); 3] = [
        (Phase::Before, self.before.get(step_name)),
        (Phase::On, self.on.get(step_name)),
        (Phase::After, self.after.get(step_name)),
      ];

      for (phase, handlers) in phases {
        for (handler_index, handler) in handlers.into_iter().flatten().enumerate() {
          let span = info_span!(
            "flow_step",
            step = step_name,
            step_index = index,
            phase = phase.as_str(),
            handler_index
          );
          let control = match handler(ctx.clone()).instrument(span).await {
            Ok(control) => control,
            Err(err) => {
              event!(Level::WARN, step = step_name, phase = phase.as_str(), error = %err, "handler failed");
              return Err(err);
            }
          };
          if control == StepControl::Halt {
            event!(Level::INFO, step = step_name, phase = phase.as_str(), "flow halted by handler");
            return Ok(FlowOutcome::Halted {
              step: step.name.clone(),
            });
          }
        }
      }
    }

    event!(Level::DEBUG, "flow completed");
    Ok(FlowOutcome::Completed)
  }
}
