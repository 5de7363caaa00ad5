use std::{
    net::ToSocketAddrs,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;

use crate::{
    client::{ClientError, JdwpClient},
    config::ClientConfig,
    handle::{name_to_signature, TypeHandle},
    protocol::{
        reference_type::{InstanceLimit, Instances, Signature},
        virtual_machine::{
            self, AllClasses, Class, ClassesBySignature, InstanceCounts, Version, VersionReply,
        },
        ClassStatus, ReferenceTypeID, TaggedObjectID, TaggedReferenceTypeID,
    },
    query::InstancesBackend,
    session::{SessionEvent, TargetSession},
};

/// A [JdwpClient] that can be handed out to several owners.
///
/// Every call holds the lock for one full command round-trip, so commands
/// never interleave on the wire.
#[derive(Debug, Clone)]
pub struct SharedClient(Arc<Mutex<JdwpClient>>);

impl From<JdwpClient> for SharedClient {
    fn from(client: JdwpClient) -> Self {
        Self(Arc::new(Mutex::new(client)))
    }
}

impl SharedClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Ok(JdwpClient::connect(addr)?.into())
    }

    pub fn connect_with(
        addr: impl ToSocketAddrs,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        Ok(JdwpClient::connect_with(addr, config)?.into())
    }

    fn get(&self) -> MutexGuard<'_, JdwpClient> {
        // a panic mid-command leaves at worst a stale reply on the wire, which
        // the client skips anyway
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn version(&self) -> Result<VersionReply, ClientError> {
        self.get().send(Version)
    }

    pub fn classes_by_signature(
        &self,
        signature: &str,
    ) -> Result<Vec<(TaggedReferenceTypeID, ClassStatus)>, ClientError> {
        self.get().send(ClassesBySignature::new(signature))
    }

    pub fn all_classes(&self) -> Result<Vec<Class>, ClientError> {
        self.get().send(AllClasses)
    }

    pub fn signature(&self, ref_type: ReferenceTypeID) -> Result<String, ClientError> {
        self.get().send(Signature::new(ref_type))
    }

    /// Resolves a loaded class by its JNI signature.
    ///
    /// When several class loaders loaded the same class, the first one the VM
    /// reports wins.
    pub fn type_by_signature(
        &self,
        session: &TargetSession,
        signature: &str,
    ) -> Result<Option<TypeHandle>, ClientError> {
        let classes = self.classes_by_signature(signature)?;
        if classes.len() > 1 {
            debug!("{} classes match {signature}, using the first", classes.len());
        }
        Ok(classes
            .into_iter()
            .next()
            .map(|(id, _)| TypeHandle::new(session.id(), *id, signature)))
    }

    /// Same as [type_by_signature](SharedClient::type_by_signature), but takes
    /// a name like `com.example.Widget` or `int[]`.
    pub fn type_by_name(
        &self,
        session: &TargetSession,
        name: &str,
    ) -> Result<Option<TypeHandle>, ClientError> {
        self.type_by_signature(session, &name_to_signature(name))
    }

    /// Every loaded type, as handles of the given session.
    pub fn all_types(&self, session: &TargetSession) -> Result<Vec<TypeHandle>, ClientError> {
        let types = self
            .all_classes()?
            .into_iter()
            .map(|class| TypeHandle::new(session.id(), *class.type_id, class.signature))
            .collect();
        Ok(types)
    }

    /// Suspends the VM and tells the session about it.
    pub fn suspend(&self, session: &TargetSession) -> Result<(), ClientError> {
        self.get().send(virtual_machine::Suspend)?;
        session.apply(SessionEvent::Suspended);
        Ok(())
    }

    /// Resumes the VM and tells the session about it.
    pub fn resume(&self, session: &TargetSession) -> Result<(), ClientError> {
        self.get().send(virtual_machine::Resume)?;
        session.apply(SessionEvent::Resumed);
        Ok(())
    }
}

impl InstancesBackend for SharedClient {
    fn instances(
        &self,
        type_id: ReferenceTypeID,
        max: InstanceLimit,
    ) -> Result<Vec<TaggedObjectID>, ClientError> {
        self.get().send(Instances::new(type_id, max))
    }

    fn instance_counts(&self, type_ids: &[ReferenceTypeID]) -> Result<Vec<u64>, ClientError> {
        self.get().send(InstanceCounts::new(type_ids.to_vec()))
    }
}
