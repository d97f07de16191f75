// src/registry.rs

//! `FlowRegistry<E>`: flows keyed by their context type, run through a
//! type-erased wrapper so one registry can hold every flow of an application.

use crate::context::FlowContext;
use crate::control::FlowOutcome;
use crate::error::FlowError;
use crate::flow::Flow;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedFlow<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  fn name(&self) -> &str;

  /// `ctx` must box a `FlowContext<T>` for the flow's own `T`.
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<FlowOutcome, AppErr>;
}

struct TypedFlow<T, HandlerErr, AppErr>
where
  T: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: Flow<T, HandlerErr>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<T, HandlerErr, AppErr> ErasedFlow<AppErr> for TypedFlow<T, HandlerErr, AppErr>
where
  T: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<FlowError> + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    self.flow.name()
  }

  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<FlowOutcome, AppErr> {
    let typed = match ctx.downcast::<FlowContext<T>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected = std::any::type_name::<FlowContext<T>>();
        event!(Level::ERROR, flow = %self.flow.name(), expected, "context type mismatch");
        return Err(AppErr::from(FlowError::TypeMismatch {
          expected: expected.to_string(),
        }));
      }
    };
    self.flow.run(typed).await.map_err(AppErr::from)
  }
}

/// Holds one flow per context type.
pub struct FlowRegistry<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flows: RwLock<HashMap<TypeId, Arc<dyn ErasedFlow<AppErr>>>>,
}

impl<AppErr> Default for FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> FlowRegistry<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `flow` for its context type, replacing any earlier flow for
  /// the same type.
  pub fn register<T, HandlerErr>(&self, flow: Flow<T, HandlerErr>)
  where
    T: 'static + Send + Sync,
    HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<HandlerErr>,
  {
    event!(Level::DEBUG, flow = %flow.name(), context_type = %std::any::type_name::<T>(), "registering flow");
    let erased: Arc<dyn ErasedFlow<AppErr>> = Arc::new(TypedFlow::<T, HandlerErr, AppErr> {
      flow,
      _app_err: PhantomData,
    });
    if let Some(previous) = self.flows.write().insert(TypeId::of::<T>(), erased) {
      event!(Level::WARN, replaced = %previous.name(), "flow replaced an earlier registration");
    }
  }

  pub fn is_registered<T: 'static + Send + Sync>(&self) -> bool {
    self.flows.read().contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.flows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.flows.read().is_empty()
  }

  /// Runs the flow registered for `T` against `ctx`.
  #[instrument(name = "FlowRegistry::run", skip_all, fields(context_type = %std::any::type_name::<T>()))]
  pub async fn run<T>(&self, ctx: FlowContext<T>) -> Result<FlowOutcome, AppErr>
  where
    T: 'static + Send + Sync,
  {
    let flow = self.flows.read().get(&TypeId::of::<T>()).cloned();
    let Some(flow) = flow else {
      let context_type = std::any::type_name::<T>().to_string();
      event!(Level::ERROR, %context_type, "no flow registered");
      return Err(AppErr::from(FlowError::NotRegistered { context_type }));
    };
    flow.run_erased(Box::new(ctx)).await
  }
}
