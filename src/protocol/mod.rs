//! The subset of the Java Debug Wire Protocol this crate speaks: packet
//! framing, identifiers, constants and the commands needed to find classes,
//! count and list their instances, and suspend or resume the target VM.

use std::{fmt, fmt::Display};

use crate::codec::{JdwpReadable, JdwpWritable};

mod commands;
pub use commands::*;

mod constants;
pub use constants::*;

mod types;
pub use types::*;

pub trait Command: JdwpWritable + fmt::Debug {
    const ID: CommandId;

    type Output: JdwpReadable + fmt::Debug;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, JdwpReadable, JdwpWritable)]
pub struct CommandId {
    command_set: u8,
    command: u8,
}

impl CommandId {
    pub(crate) const fn new(command_set: u8, command: u8) -> CommandId {
        CommandId {
            command_set,
            command,
        }
    }

    pub const fn command_set(&self) -> u8 {
        self.command_set
    }

    pub const fn command(&self) -> u8 {
        self.command
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.command_set, self.command)
    }
}

/// The flags byte together with whatever follows it in the header.
///
/// Replies carry a raw error code; it is only mapped onto [ErrorCode] once we
/// know the reply is ours, so an unknown code cannot desync the stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, JdwpReadable, JdwpWritable)]
#[repr(u8)]
pub enum PacketMeta {
    Command(CommandId) = 0x00,
    Reply(u16) = 0x80,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, JdwpReadable, JdwpWritable)]
pub struct PacketHeader {
    length: u32,
    id: u32,
    meta: PacketMeta,
}

impl PacketHeader {
    pub const JDWP_SIZE: u32 = 4 + 4 + 1 + 2;

    pub const fn new(length: u32, id: u32, meta: PacketMeta) -> PacketHeader {
        PacketHeader { length, id, meta }
    }

    pub const fn length(&self) -> u32 {
        self.length
    }

    pub const fn id(&self) -> u32 {
        self.id
    }

    pub const fn meta(&self) -> PacketMeta {
        self.meta
    }
}
