use thiserror::Error;

use crate::{
    client::ClientError,
    session::{SessionId, SessionState},
};

/// Everything that can go wrong while enumerating instances.
///
/// None of these are fatal to the host or to the debug session; a display
/// surface is expected to render them inline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("debug session {0} is no longer available")]
    SessionUnavailable(SessionId),
    #[error("debug session {session} has to be suspended to list instances, it is {state:?}")]
    SessionNotSuspended {
        session: SessionId,
        state: SessionState,
    },
    #[error("class {0} was unloaded")]
    TypeUnloaded(String),
    #[error("lost communication with the target")]
    TargetCommunication(#[source] ClientError),
    #[error("another instance query is already running in session {0}")]
    QueryInProgress(SessionId),
    #[error("instance query was cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
