//! Session Lifecycle State Machine
//!
//! Governs the connection to the remote head-mounted display:
//! `Closed -> InTransition -> Open` and back. Exactly one transition may be
//! in flight at a time; requests arriving while one is in flight are
//! rejected outright (surfaced as `Ignored`, never queued). The render loop
//! and the UI read the current state; only this machine mutates it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Remote display session state. One instance process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No remote session. Initial state.
    Closed,
    /// A connect or disconnect is in flight.
    InTransition,
    /// Remote session active; the render loop is permitted to run.
    Open,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::InTransition => "in-transition",
            Self::Open => "open",
        }
    }
}

/// How a connect attempt finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Opened,
    UserCancelled,
    /// Connection failure with a user-visible message. No automatic retry.
    Error(String),
}

/// Whether a connect/disconnect request was accepted.
///
/// `Ignored` is not an error shown to the user; it is logged and the state
/// is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum RequestOutcome {
    Accepted,
    Ignored,
}

impl RequestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Completion called without the matching transition in flight.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no {expected} in flight (state: {state})")]
pub struct TransitionError {
    pub expected: &'static str,
    pub state: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Connect,
    Disconnect,
}

struct Inner {
    state: SessionState,
    pending: Option<Pending>,
}

/// Single-writer session lifecycle machine.
///
/// Cheap to clone; all clones share one state cell. The generation counter
/// bumps on every state change so the UI can poll for updates without
/// holding the lock.
#[derive(Clone)]
pub struct SessionLifecycle {
    inner: Arc<Mutex<Inner>>,
    generation: Arc<AtomicU64>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Closed,
                pending: None,
            })),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Bumped on every state change; compare against a remembered value to
    /// detect updates.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Request a connect. Accepted only from `Closed`; the caller then
    /// drives the attempt and reports back via `complete_connect`.
    pub fn request_connect(&self) -> RequestOutcome {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Closed {
            tracing::debug!(state = inner.state.as_str(), "connect request ignored");
            return RequestOutcome::Ignored;
        }
        inner.state = SessionState::InTransition;
        inner.pending = Some(Pending::Connect);
        drop(inner);
        self.bump();
        tracing::info!("connect requested");
        RequestOutcome::Accepted
    }

    /// Report the result of the in-flight connect attempt.
    ///
    /// `Opened` transitions to `Open`; cancellation and errors return to
    /// `Closed`. Returns the resulting state.
    pub fn complete_connect(
        &self,
        outcome: ConnectOutcome,
    ) -> Result<SessionState, TransitionError> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::InTransition || inner.pending != Some(Pending::Connect) {
            return Err(TransitionError {
                expected: "connect",
                state: inner.state.as_str(),
            });
        }
        inner.pending = None;
        inner.state = match &outcome {
            ConnectOutcome::Opened => SessionState::Open,
            ConnectOutcome::UserCancelled => SessionState::Closed,
            ConnectOutcome::Error(message) => {
                tracing::warn!(%message, "connect failed");
                SessionState::Closed
            }
        };
        let state = inner.state;
        drop(inner);
        self.bump();
        tracing::info!(state = state.as_str(), "connect finished");
        Ok(state)
    }

    /// Request a disconnect. Accepted only from `Open`. The transition to
    /// `Closed` happens when the teardown completes, not here: teardown may
    /// also be triggered by the remote side independent of this request.
    pub fn request_disconnect(&self) -> RequestOutcome {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Open {
            tracing::debug!(state = inner.state.as_str(), "disconnect request ignored");
            return RequestOutcome::Ignored;
        }
        inner.state = SessionState::InTransition;
        inner.pending = Some(Pending::Disconnect);
        drop(inner);
        self.bump();
        tracing::info!("disconnect requested");
        RequestOutcome::Accepted
    }

    /// The remote display reported session teardown.
    ///
    /// This is the completion path for a locally-requested disconnect and
    /// the only path that may close the session after an externally-initiated
    /// teardown. A teardown while a connect is still in flight also lands in
    /// `Closed`; a teardown while already closed is a no-op.
    pub fn remote_terminated(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Closed => {
                tracing::debug!("termination notice while closed, ignoring");
                return;
            }
            SessionState::Open => {
                tracing::info!("remote display terminated the session");
            }
            SessionState::InTransition => {
                tracing::info!("session torn down while a transition was in flight");
            }
        }
        inner.state = SessionState::Closed;
        inner.pending = None;
        drop(inner);
        self.bump();
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
