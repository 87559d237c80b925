//! Context-owning worker threads.
//!
//! A [`ContextWorker`] binds a [`GpuContext`] to one dedicated thread and runs
//! a message loop on it. Everything the worker does with the context happens
//! inside that loop, so GPU calls never race.
//!
//! # Lifecycle
//!
//! ```text
//!  owner thread                          worker thread
//!  ────────────                          ─────────────
//!  new() / shared()
//!  start() ── done_current ──handoff──►  make_current, on_begin
//!                                        handle(msg) ... (FIFO)
//!  stop()  ── Stop envelope ─────────►   on_end, done_current
//!          ◄──────── join (context) ───  thread exits
//!  make_current
//! ```
//!
//! The context is released on one side before it is acquired on the other,
//! so it is never current on two threads at once.
//!
//! # Contract
//!
//! `start()` and `stop()` may only be called from the thread that built the
//! worker, `start()` may only be called once, and a running worker must be
//! stopped before it is dropped. Violations panic.
//!
//! # Async work
//!
//! The worker thread runs a current-thread Tokio runtime. Hooks may
//! `tokio::spawn` futures from inside `handle`; those futures make progress
//! whenever the loop is waiting for mail, and report back by posting a message
//! to the worker's own mailbox.

use std::thread::{self, JoinHandle, ThreadId};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::gpu::{GpuContext, GpuError};

/// Errors from worker management.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker's mailbox no longer accepts messages.
    #[error("worker mailbox is closed")]
    Closed,

    /// The worker's context is on its thread (or lost) and cannot be used.
    #[error("worker '{0}' does not hold its context")]
    NoContext(String),

    /// Failed to build the worker thread or its runtime.
    #[error("failed to spawn worker: {0}")]
    Runtime(#[from] std::io::Error),

    /// A GPU context operation failed.
    #[error("GPU context error: {0}")]
    Gpu(#[from] GpuError),

    /// The worker thread panicked; its context is gone.
    #[error("worker '{0}' panicked")]
    Panicked(String),
}

/// Per-worker behavior, executed on the worker thread.
pub trait WorkerHooks: Send + 'static {
    /// Messages this worker accepts.
    type Message: Send + 'static;

    /// Called once, after the context became current on the worker thread.
    fn on_begin(&mut self, _context: &mut dyn GpuContext) {}

    /// Called for every message, in the order they were posted.
    fn handle(&mut self, message: Self::Message, context: &mut dyn GpuContext);

    /// Called once when the worker is stopped, before the context is released.
    fn on_end(&mut self, _context: &mut dyn GpuContext) {}
}

enum Envelope<M> {
    Message(M),
    Stop,
}

/// Cloneable sender for a worker's mailbox.
pub struct WorkerHandle<M> {
    tx: mpsc::UnboundedSender<Envelope<M>>,
}

impl<M> Clone for WorkerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> WorkerHandle<M> {
    /// Queue `message` for the worker thread.
    pub fn post(&self, message: M) -> Result<(), WorkerError> {
        self.tx
            .send(Envelope::Message(message))
            .map_err(|_| WorkerError::Closed)
    }

    fn stop(&self) -> Result<(), WorkerError> {
        self.tx.send(Envelope::Stop).map_err(|_| WorkerError::Closed)
    }
}

/// A worker's message queue, created before the worker so that peers can be
/// handed its [`WorkerHandle`] up front.
pub struct Mailbox<M> {
    handle: WorkerHandle<M>,
    rx: mpsc::UnboundedReceiver<Envelope<M>>,
}

impl<M> Mailbox<M> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle: WorkerHandle { tx },
            rx,
        }
    }

    /// A sender for this mailbox.
    pub fn handle(&self) -> WorkerHandle<M> {
        self.handle.clone()
    }

    /// Take the next queued message without blocking.
    ///
    /// Used to drive hooks by hand when no worker thread is attached.
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<M> {
        loop {
            match self.rx.try_recv().ok()? {
                Envelope::Message(message) => return Some(message),
                Envelope::Stop => continue,
            }
        }
    }

    /// Wait for the next queued message.
    #[cfg(test)]
    pub(crate) async fn recv(&mut self) -> Option<M> {
        loop {
            match self.rx.recv().await? {
                Envelope::Message(message) => return Some(message),
                Envelope::Stop => continue,
            }
        }
    }
}

impl<M> Default for Mailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

enum WorkerState<H: WorkerHooks> {
    Idle {
        context: Box<dyn GpuContext>,
        hooks: H,
        rx: mpsc::UnboundedReceiver<Envelope<H::Message>>,
    },
    Running {
        thread: JoinHandle<Box<dyn GpuContext>>,
    },
    Stopped {
        context: Box<dyn GpuContext>,
    },
    Failed,
}

/// A GPU context bound to a dedicated worker thread.
pub struct ContextWorker<H: WorkerHooks> {
    name: String,
    owner: ThreadId,
    handle: WorkerHandle<H::Message>,
    state: WorkerState<H>,
}

impl<H: WorkerHooks> ContextWorker<H> {
    /// Create a worker around `context`. The calling thread becomes the owner.
    pub fn new(
        name: impl Into<String>,
        context: Box<dyn GpuContext>,
        hooks: H,
        mailbox: Mailbox<H::Message>,
    ) -> Self {
        let Mailbox { handle, rx } = mailbox;
        Self {
            name: name.into(),
            owner: thread::current().id(),
            handle,
            state: WorkerState::Idle { context, hooks, rx },
        }
    }

    /// Create a worker whose context shares textures and programs with
    /// `other`'s context.
    ///
    /// `other` must not be running, since its context is on its own thread.
    pub fn shared<O: WorkerHooks>(
        name: impl Into<String>,
        other: &ContextWorker<O>,
        hooks: H,
        mailbox: Mailbox<H::Message>,
    ) -> Result<Self, WorkerError> {
        let context = other
            .context()
            .ok_or_else(|| WorkerError::NoContext(other.name.clone()))?
            .create_shared()?;
        Ok(Self::new(name, context, hooks, mailbox))
    }

    /// The worker's name, also used for its thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A sender for this worker's mailbox.
    pub fn handle(&self) -> WorkerHandle<H::Message> {
        self.handle.clone()
    }

    /// Returns true between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        matches!(self.state, WorkerState::Running { .. })
    }

    /// The context, when it is held by the owner thread.
    pub fn context(&self) -> Option<&dyn GpuContext> {
        match &self.state {
            WorkerState::Idle { context, .. } | WorkerState::Stopped { context } => {
                Some(context.as_ref())
            }
            _ => None,
        }
    }

    fn assert_owner(&self, operation: &str) {
        assert_eq!(
            thread::current().id(),
            self.owner,
            "{}() on worker '{}' called from a thread that does not own it",
            operation,
            self.name
        );
    }

    /// Hand the context to a new worker thread and start its message loop.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        self.assert_owner("start");
        assert!(
            matches!(self.state, WorkerState::Idle { .. }),
            "worker '{}' started twice",
            self.name
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let WorkerState::Idle {
            mut context,
            hooks,
            rx,
        } = std::mem::replace(&mut self.state, WorkerState::Failed)
        else {
            unreachable!("state checked above");
        };

        // Release on this side before the worker thread acquires
        context.done_current();

        let name = self.name.clone();
        let thread = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                runtime.block_on(run_loop(&name, context.as_mut(), hooks, rx));
                drop(runtime);
                context
            })?;

        info!(worker = %self.name, "Worker started");
        self.state = WorkerState::Running { thread };
        Ok(())
    }

    /// Stop the worker thread and take the context back.
    ///
    /// Every message queued before this call is handled first. Returns once
    /// `on_end` has run and the thread has exited; the context is then
    /// current on the calling (owner) thread.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        self.assert_owner("stop");

        let thread = match std::mem::replace(&mut self.state, WorkerState::Failed) {
            WorkerState::Running { thread } => thread,
            WorkerState::Idle { context, .. } | WorkerState::Stopped { context } => {
                self.state = WorkerState::Stopped { context };
                return Ok(());
            }
            WorkerState::Failed => return Err(WorkerError::NoContext(self.name.clone())),
        };

        // The loop holds the receiver until it sees Stop, so this only fails
        // if the thread already died
        let _ = self.handle.stop();

        match thread.join() {
            Ok(mut context) => {
                context.make_current()?;
                info!(worker = %self.name, "Worker stopped");
                self.state = WorkerState::Stopped { context };
                Ok(())
            }
            Err(_) => {
                error!(worker = %self.name, "Worker thread panicked");
                Err(WorkerError::Panicked(self.name.clone()))
            }
        }
    }
}

impl<H: WorkerHooks> Drop for ContextWorker<H> {
    fn drop(&mut self) {
        if self.is_running() && !thread::panicking() {
            panic!("worker '{}' dropped before stop()", self.name);
        }
    }
}

async fn run_loop<H: WorkerHooks>(
    name: &str,
    context: &mut dyn GpuContext,
    mut hooks: H,
    mut rx: mpsc::UnboundedReceiver<Envelope<H::Message>>,
) {
    // begin
    if let Err(e) = context.make_current() {
        panic!("worker '{}' could not make its context current: {}", name, e);
    }
    hooks.on_begin(context);
    debug!(worker = name, "Worker loop running");

    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Message(message) => hooks.handle(message, context),
            Envelope::Stop => break,
        }
    }

    // end
    hooks.on_end(context);
    context.done_current();
    debug!(worker = name, "Worker loop finished");
}
