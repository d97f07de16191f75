// src/context.rs

//! Shared flow context and the boxed handler type that operates on it.

use crate::control::StepControl;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Shared, lockable state threaded through every step of a flow.
///
/// Cloning is cheap (an `Arc` bump) and every clone sees the same data. The
/// guards returned by [`read`](Self::read) and [`write`](Self::write) are
/// blocking `parking_lot` guards: they must be dropped before any `.await`.
/// They are `!Send`, so holding one across an await point makes the handler
/// future `!Send` and the registration will not compile.
#[derive(Debug)]
pub struct FlowContext<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> FlowContext<T> {
  pub fn new(data: T) -> Self {
    FlowContext(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Read guard narrowed to one part of the context.
  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }

  /// Clones a value out of the context under a short read lock.
  pub fn snapshot<U, F>(&self, f: F) -> U
  where
    F: FnOnce(&T) -> U,
  {
    f(&self.read())
  }

  /// Applies a mutation under a short write lock.
  pub fn update<U, F>(&self, f: F) -> U
  where
    F: FnOnce(&mut T) -> U,
  {
    f(&mut self.write())
  }

  /// Consumes the handle and returns the data if this is the last clone,
  /// otherwise hands the handle back.
  pub fn try_into_inner(self) -> Result<T, Self> {
    Arc::try_unwrap(self.0).map(RwLock::into_inner).map_err(FlowContext)
  }
}

impl<T: Send + Sync + 'static> Clone for FlowContext<T> {
  fn clone(&self) -> Self {
    FlowContext(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for FlowContext<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}

/// A registered step handler: takes a clone of the context and resolves to a
/// [`StepControl`] or the flow's error type.
pub type Handler<T, E> = Box<
  dyn Fn(FlowContext<T>) -> Pin<Box<dyn Future<Output = Result<StepControl, E>> + Send>> + Send + Sync,
>;
