// src/flow/definition.rs

use crate::context::Handler;
use crate::error::FlowError;
use crate::step::{SkipCondition, StepDef};
use std::collections::{HashMap, HashSet};

/// An ordered set of named steps over the context type `T`, whose handlers
/// fail with `E`.
///
/// `E` must be constructible from [`FlowError`] so that engine-level problems
/// (a required step without handlers, for instance) surface through the same
/// channel as handler failures.
pub struct Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) before: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) on: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) after: HashMap<String, Vec<Handler<T, E>>>,
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Declares a flow. Panics when two steps share a name; use
  /// [`try_new`](Self::try_new) when the step list is not a literal.
  pub fn new(name: impl Into<String>, steps: impl IntoIterator<Item = StepDef<T>>) -> Self {
    match Self::try_new(name, steps) {
      Ok(flow) => flow,
      Err(err) => panic!("flow setup error: {err}"),
    }
  }

  pub fn try_new(name: impl Into<String>, steps: impl IntoIterator<Item = StepDef<T>>) -> Result<Self, FlowError> {
    let steps: Vec<StepDef<T>> = steps.into_iter().collect();
    let mut seen = HashSet::new();
    for step in &steps {
      if !seen.insert(step.name.as_str()) {
        return Err(FlowError::DuplicateStep {
          step: step.name.clone(),
        });
      }
    }

    Ok(Self {
      name: name.into(),
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step: &str) -> bool {
    self.position(step).is_some()
  }

  fn position(&self, step: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step)
  }

  /// Registering a handler on a step that was never declared is a bug in the
  /// flow's setup code, not a runtime condition.
  pub(crate) fn assert_step(&self, step: &str) {
    if !self.has_step(step) {
      panic!("flow setup error: step '{}' is not declared in flow '{}'", step, self.name);
    }
  }

  pub fn insert_before(&mut self, existing: &str, step: StepDef<T>) -> Result<(), FlowError> {
    let idx = self.checked_insert_index(existing, &step)?;
    self.steps.insert(idx, step);
    Ok(())
  }

  pub fn insert_after(&mut self, existing: &str, step: StepDef<T>) -> Result<(), FlowError> {
    let idx = self.checked_insert_index(existing, &step)?;
    self.steps.insert(idx + 1, step);
    Ok(())
  }

  fn checked_insert_index(&self, existing: &str, step: &StepDef<T>) -> Result<usize, FlowError> {
    if self.has_step(&step.name) {
      return Err(FlowError::DuplicateStep {
        step: step.name.clone(),
      });
    }
    self.position(existing).ok_or_else(|| FlowError::StepNotFound {
      step: existing.to_string(),
    })
  }

  /// Removes a step and every handler attached to it. Returns whether the
  /// step existed.
  pub fn remove_step(&mut self, step: &str) -> bool {
    let Some(idx) = self.position(step) else {
      return false;
    };
    self.steps.remove(idx);
    self.before.remove(step);
    self.on.remove(step);
    self.after.remove(step);
    true
  }

  pub fn set_skip_condition(&mut self, step: &str, skip_if: Option<SkipCondition<T>>) -> Result<(), FlowError> {
    let def = self
      .steps
      .iter_mut()
      .find(|s| s.name == step)
      .ok_or_else(|| FlowError::StepNotFound { step: step.to_string() })?;
    def.skip_if = skip_if;
    Ok(())
  }

  pub(crate) fn handler_count(&self, step: &str) -> usize {
    [&self.before, &self.on, &self.after]
      .iter()
      .map(|phase| phase.get(step).map_or(0, Vec::len))
      .sum()
  }
}

impl<T, E> std::fmt::Debug for Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Flow")
      .field("name", &self.name)
      .field("steps", &self.steps)
      .finish_non_exhaustive()
  }
}
