use std::{
    fmt::{self, Display},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Host-assigned identity of a debug session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Suspended,
    Running,
    Terminated,
}

/// What the host debugger tells a session about the target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection is up; VMs launched with `suspend=y` start suspended.
    Attached { suspended: bool },
    Suspended,
    Resumed,
    Detached,
    VmDeath,
}

#[derive(Debug)]
struct Shared {
    state: SessionState,
    /// The query holding the slot, by the number it was given.
    active: Option<(u64, CancellationToken)>,
    issued: u64,
}

#[derive(Debug)]
struct Inner {
    id: SessionId,
    shared: Mutex<Shared>,
}

/// A live debugging session against one target VM.
///
/// Cloning gives another handle to the same session. The session never talks
/// to the target itself, it only tracks what the host reports through
/// [TargetSession::apply] and arbitrates the single query slot.
#[derive(Debug, Clone)]
pub struct TargetSession {
    inner: Arc<Inner>,
}

impl TargetSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                shared: Mutex::new(Shared {
                    state: SessionState::Connecting,
                    active: None,
                    issued: 0,
                }),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // nothing in here can be left half-updated by a panic
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_state(&self) -> Result<SessionState> {
        match self.lock().state {
            SessionState::Terminated => Err(Error::SessionUnavailable(self.id())),
            state => Ok(state),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().state == SessionState::Terminated
    }

    /// Feeds a host event into the session and returns the resulting state.
    ///
    /// Termination is final: the outstanding query, if any, is cancelled and
    /// every later event is ignored.
    pub fn apply(&self, event: SessionEvent) -> SessionState {
        let mut shared = self.lock();
        let from = shared.state;
        if from == SessionState::Terminated {
            debug!("session {} already terminated, ignoring {event:?}", self.id());
            return from;
        }
        shared.state = match event {
            SessionEvent::Attached { suspended: true } | SessionEvent::Suspended => {
                SessionState::Suspended
            }
            SessionEvent::Attached { suspended: false } | SessionEvent::Resumed => {
                SessionState::Running
            }
            SessionEvent::Detached | SessionEvent::VmDeath => {
                if let Some((_, active)) = shared.active.take() {
                    debug!("session {} terminated with a query in flight", self.id());
                    active.cancel();
                }
                SessionState::Terminated
            }
        };
        debug!("session {}: {from:?} -> {:?} on {event:?}", self.id(), shared.state);
        shared.state
    }

    pub fn has_query_in_flight(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Cancels whatever query currently holds the slot.
    ///
    /// Returns whether there was one.
    pub fn cancel_outstanding(&self) -> bool {
        match &self.lock().active {
            Some((_, active)) => {
                active.cancel();
                true
            }
            None => false,
        }
    }

    /// Claims the single query slot of this session.
    ///
    /// The slot's token is a child of `parent`: cancelling the caller's token
    /// cancels the query, and so does terminating the session.
    pub(crate) fn begin_query(&self, parent: &CancellationToken) -> Result<QueryGuard> {
        if parent.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut shared = self.lock();
        match shared.state {
            SessionState::Suspended => {}
            SessionState::Terminated => return Err(Error::SessionUnavailable(self.id())),
            state => {
                return Err(Error::SessionNotSuspended {
                    session: self.id(),
                    state,
                })
            }
        }
        if shared.active.is_some() {
            return Err(Error::QueryInProgress(self.id()));
        }
        shared.issued += 1;
        let ticket = shared.issued;
        let token = parent.child_token();
        shared.active = Some((ticket, token.clone()));
        Ok(QueryGuard {
            session: self.clone(),
            ticket,
            token,
        })
    }

    pub fn ptr_eq(&self, other: &TargetSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Holds the query slot of a session, releasing it on drop.
#[derive(Debug)]
pub(crate) struct QueryGuard {
    session: TargetSession,
    ticket: u64,
    token: CancellationToken,
}

impl QueryGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for QueryGuard {
    fn drop(&mut self) {
        let mut shared = self.session.lock();
        // termination may have already taken the slot away from us
        if matches!(&shared.active, Some((ticket, _)) if *ticket == self.ticket) {
            shared.active = None;
        }
    }
}
