// src/step.rs

use std::sync::Arc;

/// Predicate deciding whether a step is skipped. Evaluated under a read lock
/// right before the step would run.
pub type SkipCondition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'static>;

/// Declaration of one step of a flow.
#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  /// Optional steps may have no handlers at all; required ones may not.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub fn required(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      optional: false,
      skip_if: None,
    }
  }

  pub fn optional(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      optional: true,
      skip_if: None,
    }
  }

  pub fn skip_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
    self.skip_if = Some(Arc::new(predicate));
    self
  }

  pub(crate) fn should_skip(&self, data: &T) -> bool {
    self.skip_if.as_ref().is_some_and(|predicate| predicate(data))
  }
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_condition", &self.skip_if.is_some())
      .finish()
  }
}
