//! Single-use completion handles.
//!
//! A [`CompletionHandle`] is the right to invoke one context-bound callback
//! exactly once. It is created on the context thread, moved (never shared)
//! into an asynchronous job, and consumed when that job finishes. The
//! callback itself never leaves the context thread: the handle only carries
//! a [`Persistent`] slot and a [`Weak`] reference to the context, and the
//! callback can only be materialised again through a [`ContextScope`] of
//! that same context.

use std::sync::{Arc, Weak};

use crate::context::{ContextScope, ExecutionContext, Persistent};
use crate::value::Value;

/// Outcome of handing a completion back to its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The context was alive; the callback runs on the context thread.
    Scheduled,
    /// The context is gone; the handle was dropped without invoking anything.
    Dropped,
}

/// Move-only token carrying a context-bound callback.
#[derive(Debug)]
#[must_use = "dropping a completion handle discards its callback"]
pub struct CompletionHandle {
    callback: Option<Persistent>,
    context: Weak<ExecutionContext>,
}

impl CompletionHandle {
    /// Bind `callback` to the scope's context.
    pub fn new(scope: &mut ContextScope<'_>, callback: Value) -> Self {
        let context = Arc::downgrade(scope.context());
        Self {
            callback: Some(scope.persist(callback)),
            context,
        }
    }

    /// Returns `true` while the owning context has not been torn down.
    pub fn is_context_alive(&self) -> bool {
        self.context.strong_count() > 0
    }

    /// Take the callback back out of the context.
    ///
    /// Returns `None` if the context is gone or `scope` belongs to a
    /// different context. The handle is consumed either way.
    pub fn consume(mut self, scope: &mut ContextScope<'_>) -> Option<Value> {
        let context = self.context.upgrade()?;
        if !Arc::ptr_eq(&context, scope.context()) {
            log::warn!(
                "Completion for context {} consumed in context {}",
                context.id(),
                scope.context().id(),
            );
            // Released by drop, on the owning context.
            return None;
        }
        let persistent = self.callback.take()?;
        scope.take(persistent)
    }

    /// Hand the handle back to its context from any thread.
    ///
    /// If the context is alive, a task is queued on the context thread that
    /// consumes the handle and runs `on_delivered` with the callback. If the
    /// context is gone the handle is simply dropped.
    pub fn deliver<F>(self, on_delivered: F) -> Delivery
    where
        F: FnOnce(&mut ContextScope<'_>, Value) + Send + 'static,
    {
        let Some(context) = self.context.upgrade() else {
            log::debug!("Context gone before completion; dropping callback");
            return Delivery::Dropped;
        };

        let posted = context.post(move |scope| {
            // The context may still die between posting and running, in
            // which case this task is discarded on the context thread.
            if let Some(callback) = self.consume(scope) {
                on_delivered(scope, callback);
            }
        });

        match posted {
            Ok(()) => Delivery::Scheduled,
            Err(error) => {
                log::debug!("Completion not delivered: {error}");
                Delivery::Dropped
            }
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        let Some(persistent) = self.callback.take() else {
            return;
        };
        // Released on the context thread; a dead context already dropped
        // its whole handle table.
        if let Some(context) = self.context.upgrade() {
            log::trace!("Releasing unconsumed completion on context {}", context.id());
            if let Err(error) = context.post(move |scope| scope.release(persistent)) {
                log::trace!("Completion release not posted: {error}");
            }
        }
    }
}
