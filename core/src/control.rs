// src/control.rs

/// What a handler wants the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Run the remaining handlers of this step and the following steps.
  Continue,
  /// Stop right here. Nothing else in this flow runs.
  Halt,
}

/// How a flow run ended when no handler failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
  Completed,
  /// A handler returned [`StepControl::Halt`] inside `step`.
  Halted { step: String },
}

impl FlowOutcome {
  pub fn is_completed(&self) -> bool {
    matches!(self, FlowOutcome::Completed)
  }
}
