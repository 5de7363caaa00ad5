use std::{
    fmt::{Display, Formatter},
    io::{self, Error, ErrorKind, Read, Write},
};

use bitflags::bitflags;

use crate::codec::{JdwpReadable, JdwpReader, JdwpWritable, JdwpWriter};

macro_rules! jdwp_enum {
    (
        #[repr($repr:ident)]
        pub enum $e:ident {
            $(#[doc = $string:literal] $name:ident = $id:literal),*
            $(,)?
        }
    ) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr($repr)]
        pub enum $e {
            $(#[doc = $string] $name = $id,)*
        }

        impl TryFrom<$repr> for $e {
            type Error = $repr;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                match value {
                    $($id => Ok($e::$name),)*
                    other => Err(other),
                }
            }
        }

        impl JdwpReadable for $e {
            fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
                Self::try_from($repr::read(read)?)
                    .map_err(|_| Error::from(ErrorKind::InvalidData))
            }
        }

        impl JdwpWritable for $e {
            fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
                (*self as $repr).write(write)
            }
        }
    };
    (
        #[derive(Display)]
        #[repr($repr:ident)]
        pub enum $e:ident {
            $(#[doc = $string:literal] $name:ident = $id:literal),*
            $(,)?
        }
    ) => {
        jdwp_enum! {
            #[repr($repr)]
            pub enum $e {
                $(#[doc = $string] $name = $id,)*
            }
        }

        impl Display for $e {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $($e::$name => $string.trim(),)*
                })
            }
        }
    };
}

jdwp_enum! {
    #[derive(Display)]
    #[repr(u16)]
    pub enum ErrorCode {
        /// No error has occurred
        None = 0,
        /// Passed thread is null, is not a valid thread or has exited
        InvalidThread = 10,
        /// The thread has not been suspended by an event
        ThreadNotSuspended = 13,
        /// The object has been garbage collected or was never valid
        InvalidObject = 20,
        /// The reference type is invalid or has been unloaded
        InvalidClass = 21,
        /// Class has been loaded but not yet prepared
        ClassNotPrepared = 22,
        /// Desired element not found
        NotFound = 41,
        /// The call has been interrupted before completion
        Interrupt = 52,
        /// The functionality is not implemented in this virtual machine
        NotImplemented = 99,
        /// Invalid pointer
        NullPointer = 100,
        /// Desired information is not available
        AbsentInformation = 101,
        /// The specified event type id is not recognized
        InvalidEventType = 102,
        /// Illegal argument
        IllegalArgument = 103,
        /// The VM ran out of memory while serving the request
        OutOfMemory = 110,
        /// Debugging has not been enabled in this virtual machine
        AccessDenied = 111,
        /// The virtual machine is not running
        VmDead = 112,
        /// An unexpected internal error has occurred
        Internal = 113,
        /// Object type id or class tag is invalid
        InvalidTag = 500,
        /// The string is invalid
        InvalidString = 506,
        /// The class loader is invalid
        InvalidClassLoader = 507,
        /// The array is invalid
        InvalidArray = 508,
        /// The count is invalid
        InvalidCount = 512,
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClassStatus: u32 {
        const VERIFIED = 1;
        const PREPARED = 2;
        const INITIALIZED = 4;
        const ERROR = 8;

        const OK = Self::VERIFIED.bits() | Self::PREPARED.bits() | Self::INITIALIZED.bits();
    }
}

impl JdwpReadable for ClassStatus {
    fn read<R: Read>(read: &mut JdwpReader<R>) -> io::Result<Self> {
        // array and primitive types report 0, newer VMs may set extra bits
        Ok(Self::from_bits_retain(u32::read(read)?))
    }
}

impl JdwpWritable for ClassStatus {
    fn write<W: Write>(&self, write: &mut JdwpWriter<W>) -> io::Result<()> {
        self.bits().write(write)
    }
}

jdwp_enum! {
    #[repr(u8)]
    pub enum TypeTag {
        /// ReferenceType is a class
        Class = 1,
        /// ReferenceType is an interface
        Interface = 2,
        /// ReferenceType is an array
        Array = 3,
    }
}

jdwp_enum! {
    #[repr(u8)]
    pub enum Tag {
        /// '[' - an array object
        Array = 91,
        /// 'L' - an object
        Object = 76,
        /// 's' - a String object
        String = 115,
        /// 't' - a Thread object
        Thread = 116,
        /// 'g' - a ThreadGroup object
        ThreadGroup = 103,
        /// 'l' - a ClassLoader object
        ClassLoader = 108,
        /// 'c' - a class object object
        ClassObject = 99,
    }
}
