//! Hierarchical cancellation with causes and optional deadlines.
//!
//! A token is cancelled at most once; the first cause wins. Cancelling a token
//! cancels every child derived from it, while cancelling a child leaves the
//! parent untouched. Blocking code waits on a token with [`CancellationToken::wait`]
//! or [`CancellationToken::wait_timeout`].

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Why a token was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    /// The server is shutting down.
    Shutdown,
    /// The connection finished serving requests.
    ConnectionFinished,
    /// The operation completed and was unregistered.
    OperationFinished,
    /// The operation was killed by an administrator.
    Killed {
        /// Identifier of the killed operation.
        op_id: i32,
    },
    /// The operation registry was closed.
    RegistryClosed,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => formatter.write_str("server shutting down"),
            Self::ConnectionFinished => formatter.write_str("connection finished"),
            Self::OperationFinished => formatter.write_str("operation finished"),
            Self::Killed { op_id } => write!(formatter, "operation {op_id} killed"),
            Self::RegistryClosed => formatter.write_str("operation registry closed"),
        }
    }
}

struct State {
    cause: Option<CancelCause>,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    state: Mutex<State>,
    cancelled: Condvar,
    deadline: Option<Instant>,
}

/// Cloneable handle onto one node of a cancellation tree.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CancellationToken")
            .field("cause", &self.cause())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

impl CancellationToken {
    /// Creates a root token with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_deadline(None)
    }

    fn with_deadline(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    cause: None,
                    children: Vec::new(),
                }),
                cancelled: Condvar::new(),
                deadline,
            }),
        }
    }

    /// Derives a child that inherits this token's deadline.
    #[must_use]
    pub fn child_token(&self) -> Self {
        self.attach_child(self.inner.deadline)
    }

    /// Derives a child whose deadline is the earlier of `deadline` and the parent's.
    #[must_use]
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let deadline = self
            .inner
            .deadline
            .map_or(deadline, |parent| parent.min(deadline));
        self.attach_child(Some(deadline))
    }

    fn attach_child(&self, deadline: Option<Instant>) -> Self {
        let child = Self::with_deadline(deadline);
        let inherited = {
            let mut state = self.inner.state.lock();
            match &state.cause {
                Some(cause) => Some(cause.clone()),
                None => {
                    state.children.retain(|weak| weak.strong_count() > 0);
                    state.children.push(Arc::downgrade(&child.inner));
                    None
                }
            }
        };
        if let Some(cause) = inherited {
            child.cancel(cause);
        }
        child
    }

    /// Cancels this token and its descendants.
    ///
    /// Returns `false` when the token had already been cancelled, in which
    /// case the original cause is kept.
    pub fn cancel(&self, cause: CancelCause) -> bool {
        let children = {
            let mut state = self.inner.state.lock();
            if state.cause.is_some() {
                return false;
            }
            state.cause = Some(cause.clone());
            self.inner.cancelled.notify_all();
            std::mem::take(&mut state.children)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            Self { inner: child }.cancel(cause.clone());
        }
        true
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cause.is_some()
    }

    /// Cancellation cause, if cancelled.
    #[must_use]
    pub fn cause(&self) -> Option<CancelCause> {
        self.inner.state.lock().cause.clone()
    }

    /// Deadline attached to this token, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Blocks until the token is cancelled.
    pub fn wait(&self) -> CancelCause {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(cause) = &state.cause {
                return cause.clone();
            }
            self.inner.cancelled.wait(&mut state);
        }
    }

    /// Blocks until the token is cancelled or `timeout` elapses.
    ///
    /// Returns the cause when cancelled in time.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CancelCause> {
        let until = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(cause) = &state.cause {
                return Some(cause.clone());
            }
            if self
                .inner
                .cancelled
                .wait_until(&mut state, until)
                .timed_out()
            {
                return state.cause.clone();
            }
        }
    }
}
