use std::{
    fmt::{self, Debug},
    io::{self, Read, Write},
    ops::Deref,
};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};

use crate::codec::*;

use super::{Tag, TypeTag};

pub trait JdwpId: Clone + Copy {
    /// Type of the underlying raw ID.
    type Raw;

    /// Creates an instance of Self from an arbitrary number.
    ///
    /// This is not unsafe as invalid IDs do not cause UB, but it is up to the
    /// caller to ensure that the id is valid for the target JVM.
    fn from_raw(raw: Self::Raw) -> Self;

    /// The underlying raw value.
    ///
    /// It is opaque and given out by the JVM, but in case you ever need it,
    /// here it is.
    fn raw(self) -> Self::Raw;
}

/// Uniquely identifies an object in the target VM.
///
/// An object keeps its [ObjectID] for its whole lifetime and the ID is not
/// reused for a different object unless explicitly disposed. Holding an ID
/// does not keep the object alive: once it is collected, commands using the ID
/// fail with `INVALID_OBJECT`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectID(u64);

/// Uniquely identifies a reference type in the target VM.
///
/// A [ReferenceTypeID] is never reused for a different type, even after the
/// type it named was unloaded.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ReferenceTypeID(u64);

macro_rules! ids {
    ($($id:ident: $tpe:ident),* $(,)?) => {
        $(
            impl JdwpId for $tpe {
                type Raw = u64;

                fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                fn raw(self) -> u64 {
                    self.0
                }
            }

            impl Debug for $tpe {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($tpe), "({})"), self.0)
                }
            }

            impl JdwpReadable for $tpe {
                fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
                    let id_size = read.id_sizes.$id as usize;
                    read.read_uint::<BE>(id_size).map($tpe)
                }
            }

            impl JdwpWritable for $tpe {
                fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
                    let id_size = write.id_sizes.$id as usize;
                    write.write_uint::<BE>(self.0, id_size)
                }
            }
        )*
    };
}

ids! {
    object_id_size: ObjectID,
    reference_type_id_size: ReferenceTypeID,
}

/// An object that is known to be a thread.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ThreadID(ObjectID);

/// An object that is known to be a thread group.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ThreadGroupID(ObjectID);

/// An object that is known to be a `java.lang.String`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct StringID(ObjectID);

/// An object that is known to be a class loader.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ClassLoaderID(ObjectID);

/// An object that is known to be a `java.lang.Class`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ClassObjectID(ObjectID);

/// An object that is known to be an array.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ArrayID(ObjectID);

/// A reference type that is known to be a class.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ClassID(ReferenceTypeID);

/// A reference type that is known to be an interface.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct InterfaceID(ReferenceTypeID);

/// A reference type that is known to be an array type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(transparent)]
pub struct ArrayTypeID(ReferenceTypeID);

macro_rules! wrapper_ids {
    ($($deref:ident {$($tpe:ident),* $(,)?})*) => {
        $($(
            impl JdwpId for $tpe {
                type Raw = u64;

                fn from_raw(raw: u64) -> Self {
                    Self($deref::from_raw(raw))
                }

                fn raw(self) -> u64 {
                    self.0.0
                }
            }

            impl Debug for $tpe {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($tpe), "({})"), self.0.0)
                }
            }

            impl From<$tpe> for $deref {
                fn from(id: $tpe) -> $deref {
                    id.0
                }
            }

            impl Deref for $tpe {
                type Target = $deref;

                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }
        )*)*
    };
}

wrapper_ids! {
    ObjectID {
        ThreadID,
        ThreadGroupID,
        StringID,
        ClassLoaderID,
        ClassObjectID,
        ArrayID,
    }
    ReferenceTypeID {
        ClassID,
        InterfaceID,
        ArrayTypeID,
    }
}

/// An [ObjectID] prefixed with a [Tag] describing what kind of object it is.
///
/// This is what the target VM hands out for every live instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(u8)]
pub enum TaggedObjectID {
    /// an array object
    Array(ArrayID) = Tag::Array as u8,
    /// an object
    Object(ObjectID) = Tag::Object as u8,
    /// a String object
    String(StringID) = Tag::String as u8,
    /// a Thread object
    Thread(ThreadID) = Tag::Thread as u8,
    /// a ThreadGroup object
    ThreadGroup(ThreadGroupID) = Tag::ThreadGroup as u8,
    /// a ClassLoader object
    ClassLoader(ClassLoaderID) = Tag::ClassLoader as u8,
    /// a class object object
    ClassObject(ClassObjectID) = Tag::ClassObject as u8,
}

impl TaggedObjectID {
    pub fn tag(&self) -> Tag {
        use TaggedObjectID::*;
        match self {
            Array(_) => Tag::Array,
            Object(_) => Tag::Object,
            String(_) => Tag::String,
            Thread(_) => Tag::Thread,
            ThreadGroup(_) => Tag::ThreadGroup,
            ClassLoader(_) => Tag::ClassLoader,
            ClassObject(_) => Tag::ClassObject,
        }
    }
}

impl Deref for TaggedObjectID {
    type Target = ObjectID;

    fn deref(&self) -> &Self::Target {
        use TaggedObjectID::*;
        match self {
            Array(id) => id,
            Object(id) => id,
            String(id) => id,
            Thread(id) => id,
            ThreadGroup(id) => id,
            ClassLoader(id) => id,
            ClassObject(id) => id,
        }
    }
}

/// A tagged representation of [ReferenceTypeID], similar to how
/// [TaggedObjectID] is a representation of the [ObjectID].
///
/// JDWP itself just sends a [TypeTag] byte followed by the ID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
#[repr(u8)]
pub enum TaggedReferenceTypeID {
    /// a class reference
    Class(ClassID) = TypeTag::Class as u8,
    /// an interface reference
    Interface(InterfaceID) = TypeTag::Interface as u8,
    /// an array reference
    Array(ArrayTypeID) = TypeTag::Array as u8,
}

impl TaggedReferenceTypeID {
    pub fn tag(&self) -> TypeTag {
        use TaggedReferenceTypeID::*;
        match self {
            Class(_) => TypeTag::Class,
            Interface(_) => TypeTag::Interface,
            Array(_) => TypeTag::Array,
        }
    }
}

impl Deref for TaggedReferenceTypeID {
    type Target = ReferenceTypeID;

    fn deref(&self) -> &Self::Target {
        use TaggedReferenceTypeID::*;
        match self {
            Class(id) => id,
            Interface(id) => id,
            Array(id) => id,
        }
    }
}
