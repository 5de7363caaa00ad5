use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::{PoisonError, RwLock},
};

use log::debug;

use crate::{
    client::ClientError,
    handle::TypeHandle,
    protocol::ReferenceTypeID,
    query::InstancesBackend,
    session::SessionId,
};

/// A live-instance count that may not have been measured yet.
///
/// `Unknown` and `Measured(0)` mean very different things: the first should
/// never stop anyone from looking, the second means there is nothing to see.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum InstanceCount {
    #[default]
    Unknown,
    Measured(u64),
}

impl InstanceCount {
    pub fn measured(self) -> Option<u64> {
        match self {
            InstanceCount::Unknown => None,
            InstanceCount::Measured(count) => Some(count),
        }
    }

    /// True only for a count that was measured and came out as zero.
    pub fn is_known_empty(self) -> bool {
        self == InstanceCount::Measured(0)
    }
}

impl From<Option<u64>> for InstanceCount {
    fn from(count: Option<u64>) -> Self {
        count.map_or(InstanceCount::Unknown, InstanceCount::Measured)
    }
}

impl Display for InstanceCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceCount::Unknown => f.write_str("?"),
            InstanceCount::Measured(count) => write!(f, "{count}"),
        }
    }
}

/// Something that knows, or remembers, how many instances a type has.
pub trait ReferenceCountProvider: Send + Sync {
    /// Must not talk to the target, answer from whatever was recorded.
    fn total_count(&self, ty: &TypeHandle) -> InstanceCount;
}

/// The usual [ReferenceCountProvider]: counts recorded out of band, typically
/// by a full-heap scan of the classes view.
#[derive(Debug, Default)]
pub struct CountCache {
    counts: RwLock<HashMap<(SessionId, ReferenceTypeID), u64>>,
}

impl CountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, ty: &TypeHandle, count: u64) {
        self.counts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((ty.session(), ty.id()), count);
    }

    pub fn forget(&self, ty: &TypeHandle) {
        self.counts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(ty.session(), ty.id()));
    }

    /// Drops every entry of a session, for when it goes away.
    pub fn clear_session(&self, session: SessionId) {
        self.counts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(owner, _), _| *owner != session);
    }

    pub fn len(&self) -> usize {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Measures all of the given types in one round-trip and records the
    /// results.
    ///
    /// The VM reports unloaded types as having zero instances, so they end up
    /// measured as empty.
    pub fn refresh(
        &self,
        backend: &dyn InstancesBackend,
        types: &[TypeHandle],
    ) -> Result<(), ClientError> {
        if types.is_empty() {
            return Ok(());
        }
        let ids = types.iter().map(TypeHandle::id).collect::<Vec<_>>();
        let counts = backend.instance_counts(&ids)?;
        if counts.len() != types.len() {
            debug!(
                "asked for {} instance counts, got {}",
                types.len(),
                counts.len()
            );
        }

        let mut map = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        for (ty, count) in types.iter().zip(counts) {
            map.insert((ty.session(), ty.id()), count);
        }
        Ok(())
    }
}

impl ReferenceCountProvider for CountCache {
    fn total_count(&self, ty: &TypeHandle) -> InstanceCount {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(ty.session(), ty.id()))
            .copied()
            .into()
    }
}
