//! The task runtime, as seen by the engine.
//!
//! The engine never creates threads or tasks on its own. Whatever schedules
//! its work is handed in as a [`Spawn`] implementation; [`AsyncStd`] is the
//! one used by default.

use std::future::Future;

pub trait Spawn: Clone + Send + Sync + 'static {
    /// Completion of a spawned unit of work. Dropping a handle must detach
    /// the work, not cancel it.
    type Handle<T: Send + 'static>: Future<Output = T> + Send + 'static;

    fn spawn<F>(&self, future: F) -> Self::Handle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncStd;

impl Spawn for AsyncStd {
    type Handle<T: Send + 'static> = async_std::task::JoinHandle<T>;

    fn spawn<F>(&self, future: F) -> Self::Handle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        async_std::task::spawn(future)
    }
}
