//! Thread-affine execution contexts.
//!
//! An [`ExecutionContext`] owns one dedicated OS thread. All work that
//! touches script [`Value`]s runs on that thread, one task at a time, inside
//! a [`ContextScope`]. Other threads interact with the context only by
//! posting `Send` tasks onto its queue.
//!
//! The context is reference-counted. Holders that must not keep it alive
//! (in-flight decodes, most notably) keep a [`Weak`] and upgrade it when they
//! need to reach the context; once the last [`Arc`] is gone every upgrade
//! fails and tasks still queued are discarded on the context thread.
//!
//! # Example
//!
//! ```
//! use frame_bridge::{ContextOptions, ExecutionContext, Value};
//!
//! let context = ExecutionContext::spawn(ContextOptions::new().with_name("ui"))?;
//!
//! let live = context.call(|scope| {
//!     let persistent = scope.persist(Value::from("kept"));
//!     let count = scope.live_handles();
//!     scope.release(persistent);
//!     count
//! })?;
//! assert_eq!(live, 1);
//! # Ok::<(), frame_bridge::BridgeError>(())
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use crate::configuration::ContextOptions;
use crate::decoder::DecoderService;
use crate::error::BridgeError;
use crate::value::Value;

/// Runs on the context thread after the task's scope has been released.
type Reply = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work run on a context thread.
type Task = Box<dyn FnOnce(&mut ContextScope<'_>) -> Option<Reply> + Send + 'static>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an [`ExecutionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// A reference to a [`Value`] kept alive in a context's handle table.
///
/// Unlike the value itself, a `Persistent` is `Send`: it can travel to other
/// threads and come back. It can only be resolved (or released) through a
/// [`ContextScope`] of the context that issued it. It is not `Clone`, so
/// each slot has exactly one owner.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unreleased persistent keeps its value alive until the context is destroyed"]
pub struct Persistent {
    context: ContextId,
    slot: u64,
}

impl Persistent {
    /// The context that issued this handle.
    pub fn context_id(&self) -> ContextId {
        self.context
    }
}

#[derive(Default)]
struct HandleTable {
    slots: HashMap<u64, Value>,
    next_slot: u64,
}

/// Access to a live context from within its own thread.
///
/// A scope holds a strong reference to its context for as long as it
/// exists, so the context cannot be torn down while a task runs.
pub struct ContextScope<'a> {
    context: Arc<ExecutionContext>,
    handles: &'a mut HandleTable,
}

impl ContextScope<'_> {
    /// The context this scope is bound to.
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Keep `value` alive in the handle table and return a sendable
    /// reference to it.
    pub fn persist(&mut self, value: Value) -> Persistent {
        let slot = self.handles.next_slot;
        self.handles.next_slot += 1;
        self.handles.slots.insert(slot, value);
        Persistent {
            context: self.context.id,
            slot,
        }
    }

    /// Remove a persisted value from the table and return it.
    ///
    /// Returns `None` if the handle belongs to another context.
    pub fn take(&mut self, persistent: Persistent) -> Option<Value> {
        if persistent.context != self.context.id {
            log::warn!(
                "Persistent from context {} resolved in context {}",
                persistent.context,
                self.context.id,
            );
            return None;
        }
        self.handles.slots.remove(&persistent.slot)
    }

    /// Drop a persisted value.
    pub fn release(&mut self, persistent: Persistent) {
        drop(self.take(persistent));
    }

    /// Number of values currently held in the handle table.
    pub fn live_handles(&self) -> usize {
        self.handles.slots.len()
    }
}

/// An isolated unit of script execution with its own thread.
///
/// Created via [`ExecutionContext::spawn`]. Dropping the last [`Arc`]
/// closes the task queue and, unless the drop happens on the context thread
/// itself, joins the thread.
pub struct ExecutionContext {
    id: ContextId,
    name: String,
    decoder: Option<Arc<dyn DecoderService>>,
    sender: Option<Sender<Task>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Debug for ExecutionContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_decoder", &self.decoder.is_some())
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Spawn a context thread configured by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::IoError`] if the thread cannot be spawned.
    pub fn spawn(options: ContextOptions) -> Result<Arc<Self>, BridgeError> {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        let name = options
            .name
            .unwrap_or_else(|| format!("context-{}", id.0));

        let (sender, receiver) = mpsc::channel::<Task>();
        let (publish, published) = mpsc::channel::<Weak<ExecutionContext>>();

        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            // A closed channel means construction was abandoned.
            let Ok(context) = published.recv() else {
                return;
            };
            run_loop(id, context, receiver);
        })?;
        let thread_id = thread.thread().id();

        let context = Arc::new(Self {
            id,
            name,
            decoder: options.decoder,
            sender: Some(sender),
            thread: Some(thread),
            thread_id,
        });

        publish
            .send(Arc::downgrade(&context))
            .map_err(|_| BridgeError::ContextGone)?;

        log::debug!("Spawned context {} ({})", context.id, context.name);
        Ok(context)
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve the decoder service configured for this context.
    pub fn decoder(&self) -> Option<Arc<dyn DecoderService>> {
        self.decoder.clone()
    }

    /// Returns `true` when called from this context's own thread.
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queue `task` to run on the context thread.
    ///
    /// Tasks run in submission order. A task that panics is logged and
    /// discarded; the context keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ContextGone`] if the context thread has exited.
    pub fn post<F>(&self, task: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&mut ContextScope<'_>) + Send + 'static,
    {
        self.enqueue(Box::new(move |scope: &mut ContextScope<'_>| -> Option<Reply> {
            task(scope);
            None
        }))
    }

    /// Run `task` on the context thread and wait for its result.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Reentrant`] when called from the context thread.
    /// - [`BridgeError::ContextGone`] if the context thread has exited.
    /// - [`BridgeError::TaskAborted`] if `task` panicked.
    pub fn call<R, F>(&self, task: F) -> Result<R, BridgeError>
    where
        F: FnOnce(&mut ContextScope<'_>) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current_thread() {
            return Err(BridgeError::Reentrant);
        }

        let (reply, response) = mpsc::sync_channel(1);
        self.enqueue(Box::new(move |scope: &mut ContextScope<'_>| -> Option<Reply> {
            let result = task(scope);
            // Sent once the scope's strong reference is gone, so the caller
            // may hold the last one when it wakes up.
            Some(Box::new(move || {
                let _ = reply.send(result);
            }))
        }))?;
        response.recv().map_err(|_| BridgeError::TaskAborted)
    }

    fn enqueue(&self, task: Task) -> Result<(), BridgeError> {
        let sender = self.sender.as_ref().ok_or(BridgeError::ContextGone)?;
        sender.send(task).map_err(|_| BridgeError::ContextGone)
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        log::debug!("Tearing down context {} ({})", self.id, self.name);
        drop(self.sender.take());

        let Some(thread) = self.thread.take() else {
            return;
        };
        // Dropped from a task on its own thread: the loop exits by itself
        // once the queue drains.
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            log::warn!("Context {} thread panicked during teardown", self.id);
        }
    }
}

fn run_loop(id: ContextId, context: Weak<ExecutionContext>, receiver: Receiver<Task>) {
    let mut handles = HandleTable::default();

    while let Ok(task) = receiver.recv() {
        let Some(strong) = context.upgrade() else {
            log::trace!("Context {id} is gone; discarding queued task");
            drop(task);
            continue;
        };

        let outcome = {
            let mut scope = ContextScope {
                context: strong,
                handles: &mut handles,
            };
            panic::catch_unwind(AssertUnwindSafe(|| task(&mut scope)))
        };
        match outcome {
            Ok(Some(reply)) => reply(),
            Ok(None) => {}
            Err(_) => log::error!("Task panicked on context {id}"),
        }
    }

    log::debug!(
        "Context {id} loop exited, releasing {} persistent handles",
        handles.slots.len(),
    );
}
