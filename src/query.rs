use std::{
    fmt::Debug,
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    client::ClientError,
    config::QueryConfig,
    error::{Error, Result},
    handle::TypeHandle,
    protocol::{reference_type::InstanceLimit, ErrorCode, ReferenceTypeID, TaggedObjectID},
    session::TargetSession,
};

/// The raw primitives of the host debugger that this crate builds on.
///
/// Implemented for [SharedClient](crate::vm::SharedClient); tests and other
/// hosts can bring their own.
pub trait InstancesBackend: Send + Sync + Debug {
    /// Up to `max` live instances of exactly the given type, in whatever order
    /// the target produces them.
    fn instances(
        &self,
        type_id: ReferenceTypeID,
        max: InstanceLimit,
    ) -> Result<Vec<TaggedObjectID>, ClientError>;

    /// Live instance counts, one per requested type, in the same order.
    fn instance_counts(&self, type_ids: &[ReferenceTypeID]) -> Result<Vec<u64>, ClientError>;
}

/// Some live instances of a type, at most as many as were asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumerationResult {
    entries: Vec<TaggedObjectID>,
    truncated: bool,
}

impl EnumerationResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TaggedObjectID] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TaggedObjectID> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the target had more instances than the limit allowed.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// A deferred "list the instances" request, bound to whatever it needs to
/// run.
///
/// Display surfaces hold one of these and call it when they actually need
/// entries, possibly several times with growing limits.
pub trait InstanceQuery: Send + Sync + Debug {
    /// Lists at most `limit` instances, giving up with [Error::Cancelled] as
    /// soon as `cancel` is cancelled. Once that happens the target is not
    /// contacted anymore.
    fn enumerate_with(&self, limit: u32, cancel: &CancellationToken) -> Result<EnumerationResult>;

    fn enumerate(&self, limit: u32) -> Result<EnumerationResult> {
        self.enumerate_with(limit, &CancellationToken::new())
    }
}

/// An [InstanceQuery] against a live session.
#[derive(Debug)]
pub struct TargetInstanceQuery {
    session: TargetSession,
    ty: TypeHandle,
    backend: Arc<dyn InstancesBackend>,
    config: QueryConfig,
}

impl TargetInstanceQuery {
    pub fn new(session: TargetSession, ty: TypeHandle, backend: Arc<dyn InstancesBackend>) -> Self {
        Self::with_config(session, ty, backend, QueryConfig::default())
    }

    pub fn with_config(
        session: TargetSession,
        ty: TypeHandle,
        backend: Arc<dyn InstancesBackend>,
        config: QueryConfig,
    ) -> Self {
        Self {
            session,
            ty,
            backend,
            config,
        }
    }

    pub fn session(&self) -> &TargetSession {
        &self.session
    }

    pub fn type_handle(&self) -> &TypeHandle {
        &self.ty
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn fetch(&self, cancel: &CancellationToken, max: InstanceLimit) -> Result<Vec<TaggedObjectID>> {
        let mut retried = false;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let reply = self.backend.instances(self.ty.id(), max);
            if cancel.is_cancelled() {
                debug!("dropping the reply for {}, query was cancelled", self.ty);
                return Err(Error::Cancelled);
            }
            match reply.map_err(|e| self.classify(e)) {
                Err(Error::TargetCommunication(e))
                    if !retried && self.config.retry_communication_errors && !e.is_desynced() =>
                {
                    warn!("listing instances of {} failed ({e}), retrying once", self.ty);
                    retried = true;
                }
                other => return other,
            }
        }
    }

    fn classify(&self, error: ClientError) -> Error {
        match error {
            ClientError::HostError(ErrorCode::InvalidClass | ErrorCode::InvalidObject) => {
                Error::TypeUnloaded(self.ty.name().to_owned())
            }
            ClientError::HostError(ErrorCode::VmDead) => Error::SessionUnavailable(self.session.id()),
            other => Error::TargetCommunication(other),
        }
    }
}

impl InstanceQuery for TargetInstanceQuery {
    fn enumerate_with(&self, limit: u32, cancel: &CancellationToken) -> Result<EnumerationResult> {
        if limit == 0 {
            return Ok(EnumerationResult::empty());
        }
        if !self.ty.belongs_to(&self.session) {
            return Err(Error::SessionUnavailable(self.ty.session()));
        }

        let guard = self.session.begin_query(cancel)?;

        // one extra instance tells us whether there are more than `limit`
        let wanted = InstanceLimit::at_most(limit.saturating_add(1));
        debug!("listing instances of {} ({:?})", self.ty, wanted);
        let fetched = self.fetch(guard.token(), wanted);

        let cancelled = guard.is_cancelled();
        drop(guard);

        let mut entries = fetched?;
        if cancelled {
            return Err(Error::Cancelled);
        }
        let truncated = entries.len() > limit as usize;
        entries.truncate(limit as usize);
        debug!(
            "got {} instances of {}{}",
            entries.len(),
            self.ty,
            if truncated { ", truncated" } else { "" }
        );
        Ok(EnumerationResult { entries, truncated })
    }
}

/// An [InstanceQuery::enumerate] call running on its own thread.
#[derive(Debug)]
pub struct BackgroundQuery {
    cancel: CancellationToken,
    receiver: Receiver<Result<EnumerationResult>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundQuery {
    pub fn spawn(query: Arc<dyn InstanceQuery>, limit: u32) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let cancel = CancellationToken::new();
        let handle = thread::Builder::new()
            .name("instances-query".into())
            .spawn({
                let cancel = cancel.clone();
                move || {
                    let result = match query.enumerate_with(limit, &cancel) {
                        Ok(_) if cancel.is_cancelled() => Err(Error::Cancelled),
                        result => result,
                    };
                    // the receiver may be gone if the display was closed meanwhile
                    let _ = sender.send(result);
                }
            })
            .map_err(|e| Error::TargetCommunication(ClientError::Io(e)))?;
        Ok(Self {
            cancel,
            receiver,
            handle: Some(handle),
        })
    }

    /// Stops the query; its result becomes [Error::Cancelled].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The result, if the query is done.
    pub fn try_result(&mut self) -> Option<Result<EnumerationResult>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(Error::Cancelled))
            }
        }
    }

    /// Blocks until the query is done.
    pub fn wait(mut self) -> Result<EnumerationResult> {
        let result = self.receiver.recv().unwrap_or(Err(Error::Cancelled));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("instances query thread panicked");
            }
        }
    }
}
