use std::{
    io::{self, Write},
    num::NonZeroU32,
};

use crate::{
    codec::{JdwpReadable, JdwpWritable, JdwpWriter},
    jdwp_command,
    protocol::*,
};

/// VirtualMachine Command Set (1)
pub mod virtual_machine {
    use super::*;

    /// Returns the JDWP version implemented by the target VM.
    ///
    /// The version string format is implementation dependent.
    #[jdwp_command(1, 1)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct Version;

    #[derive(Debug, JdwpReadable)]
    pub struct VersionReply {
        /// Text information on the VM version
        pub description: String,
        /// Major JDWP Version number
        pub version_major: u32,
        /// Minor JDWP Version number
        pub version_minor: u32,
        /// Target VM JRE version, as in the java.version property
        pub vm_version: String,
        /// Target VM name, as in the java.vm.name property
        pub vm_name: String,
    }

    /// Returns reference types for all the classes loaded by the target VM
    /// which match the given signature.
    ///
    /// Multiple reference types will be returned if two or more class loaders
    /// have loaded a class of the same name. The search is confined to loaded
    /// classes only, nothing gets loaded by this.
    #[jdwp_command(Vec<(TaggedReferenceTypeID, ClassStatus)>, 1, 2)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct ClassesBySignature {
        /// JNI signature of the class to find (for example,
        /// "Ljava/lang/String;")
        signature: String,
    }

    /// Returns reference types for all classes currently loaded by the target
    /// VM.
    #[jdwp_command(Vec<Class>, 1, 3)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct AllClasses;

    #[derive(Debug, Clone, JdwpReadable)]
    pub struct Class {
        /// Loaded reference type
        pub type_id: TaggedReferenceTypeID,
        /// The JNI signature of the loaded reference type
        pub signature: String,
        /// The current class status
        pub status: ClassStatus,
    }

    /// Returns the sizes of variably-sized data types in the target VM.
    ///
    /// Every other command depends on these, so the client asks for them
    /// right after the handshake.
    #[jdwp_command(IDSizeInfo, 1, 7)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct IDSizes;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, JdwpReadable, JdwpWritable)]
    pub struct IDSizeInfo {
        /// field_id size in bytes
        pub field_id_size: u32,
        /// method_id size in bytes
        pub method_id_size: u32,
        /// object_id size in bytes
        pub object_id_size: u32,
        /// reference_type_id size in bytes
        pub reference_type_id_size: u32,
        /// frame_id size in bytes
        pub frame_id_size: u32,
    }

    impl Default for IDSizeInfo {
        fn default() -> Self {
            Self {
                field_id_size: 8,
                method_id_size: 8,
                object_id_size: 8,
                reference_type_id_size: 8,
                frame_id_size: 8,
            }
        }
    }

    /// Suspends the execution of the application running in the target VM.
    ///
    /// Suspends are counted, the VM only runs again after as many
    /// [Resume]s as there were suspends.
    #[jdwp_command((), 1, 8)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct Suspend;

    /// Resumes execution of the application after the suspend command or an
    /// event has stopped it.
    #[jdwp_command((), 1, 9)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct Resume;

    /// Returns the number of instances of each reference type in the input
    /// list.
    ///
    /// Only instances that are reachable for the purposes of garbage collection
    /// are counted. If a reference type is invalid, eg. it has been unloaded,
    /// zero is returned for its instance count.
    ///
    /// Since JDWP version 1.6, requires the canGetInstanceInfo capability.
    #[jdwp_command(Vec<u64>, 1, 21)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct InstanceCounts {
        /// A list of reference type IDs.
        ref_types: Vec<ReferenceTypeID>,
    }
}

/// ReferenceType Command Set (2)
pub mod reference_type {
    use super::*;

    /// Returns the JNI signature of a reference type.
    ///
    /// For primitive classes the returned signature is the signature of the
    /// corresponding primitive type; for example, "I" is returned as the
    /// signature of the class represented by `java.lang.Integer.TYPE`.
    #[jdwp_command(String, 2, 1)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct Signature {
        /// The reference type ID
        ref_type: ReferenceTypeID,
    }

    /// Returns instances of this reference type.
    ///
    /// Only instances that are reachable for the purposes of garbage collection
    /// are returned, in whatever order the VM walks its heap.
    ///
    /// Since JDWP version 1.6, requires the canGetInstanceInfo capability.
    #[jdwp_command(Vec<TaggedObjectID>, 2, 16)]
    #[derive(Debug, Clone, JdwpWritable)]
    pub struct Instances {
        /// The reference type ID
        ref_type: ReferenceTypeID,
        /// Maximum number of instances to return.
        max_instances: InstanceLimit,
    }

    /// The `maxInstances` argument of [Instances], where zero means "all".
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum InstanceLimit {
        All,
        Limit(NonZeroU32),
    }

    impl InstanceLimit {
        /// The largest value the wire format can carry, it is a signed int.
        pub const MAX: u32 = i32::MAX as u32;

        /// Maps a plain count onto the wire limit, zero and anything over
        /// [InstanceLimit::MAX] become [InstanceLimit::All].
        pub fn at_most(limit: u32) -> Self {
            match NonZeroU32::new(limit) {
                Some(limit) if limit.get() <= Self::MAX => InstanceLimit::Limit(limit),
                _ => InstanceLimit::All,
            }
        }

        pub fn get(self) -> Option<u32> {
            match self {
                InstanceLimit::All => None,
                InstanceLimit::Limit(limit) => Some(limit.get()),
            }
        }
    }

    impl JdwpWritable for InstanceLimit {
        fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
            match self {
                InstanceLimit::All => 0u32.write(write),
                InstanceLimit::Limit(limit) => limit.get().write(write),
            }
        }
    }
}
