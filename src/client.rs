use std::{
    fmt::Debug,
    io::{self, ErrorKind, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    codec::{decode, JdwpReadable, JdwpReader, JdwpWritable, JdwpWriter},
    config::ClientConfig,
    protocol::{
        virtual_machine::{IDSizeInfo, IDSizes},
        Command, ErrorCode, PacketHeader, PacketMeta,
    },
};

const HANDSHAKE: &[u8; 14] = b"JDWP-Handshake";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("the target did not answer the JDWP handshake")]
    FailedHandshake,
    #[error("the target VM replied with an error: {0}")]
    HostError(ErrorCode),
    #[error("the target VM replied with an unknown error code {0}")]
    UnknownHostError(u16),
    #[error("lost track of packet boundaries, the connection is unusable")]
    Desynced,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Whether the transport itself broke, as opposed to the VM refusing the
    /// command.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::FailedHandshake | ClientError::Desynced
        )
    }

    /// Whether no later command on the same connection can succeed.
    pub fn is_desynced(&self) -> bool {
        matches!(self, ClientError::Desynced)
    }
}

/// A blocking JDWP connection.
///
/// Commands are strictly request-reply, one at a time; anything the VM sends
/// on its own (event packets) or replies to requests we gave up on are
/// skipped while waiting for the reply of the current command.
#[derive(Debug)]
pub struct JdwpClient {
    stream: TcpStream,
    last_id: u32,
    id_sizes: IDSizeInfo,
    /// Bytes of a packet that is not fully received yet; a read timeout in
    /// the middle of a packet leaves them here for the next read.
    pending: Vec<u8>,
    desynced: bool,
}

impl JdwpClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with(addr, &ClientConfig::default())
    }

    pub fn connect_with(
        addr: impl ToSocketAddrs,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let mut stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        stream.set_read_timeout(config.handshake_timeout)?;
        stream.write_all(HANDSHAKE)?;
        let handshake = &mut [0; 14];
        match stream.read_exact(handshake) {
            Ok(()) if handshake == HANDSHAKE => {}
            Ok(()) => return Err(ClientError::FailedHandshake),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ClientError::FailedHandshake)
            }
            Err(e) => return Err(e.into()),
        }
        stream.set_read_timeout(config.read_timeout)?;

        let mut client = JdwpClient {
            stream,
            last_id: 0,
            id_sizes: IDSizeInfo::default(),
            pending: Vec::new(),
            desynced: false,
        };
        let id_sizes = client.send(IDSizes)?;
        check_id_sizes(&id_sizes)?;
        client.id_sizes = id_sizes;
        debug!("attached, id sizes: {:?}", client.id_sizes);

        Ok(client)
    }

    pub fn id_sizes(&self) -> IDSizeInfo {
        self.id_sizes
    }

    pub fn send<C: Command>(&mut self, command: C) -> Result<C::Output, ClientError> {
        if self.desynced {
            return Err(ClientError::Desynced);
        }
        self.last_id = self.last_id.wrapping_add(1);
        let id = self.last_id;

        let mut data = Vec::new();
        command.write(&mut JdwpWriter::new(&mut data, self.id_sizes))?;

        let header = PacketHeader::new(
            PacketHeader::JDWP_SIZE + data.len() as u32,
            id,
            PacketMeta::Command(C::ID),
        );
        let mut packet = Vec::with_capacity(header.length() as usize);
        header.write(&mut JdwpWriter::new(&mut packet, self.id_sizes))?;
        packet.extend_from_slice(&data);
        self.stream.write_all(&packet)?;

        trace!("[{id}] {} -> {:?}", C::ID, command);

        loop {
            let (header, body) = self.read_packet()?;
            match header.meta() {
                PacketMeta::Command(other) => {
                    debug!(
                        "skipping a VM-initiated {} packet ({} bytes)",
                        other,
                        body.len()
                    );
                }
                PacketMeta::Reply(_) if header.id() != id => {
                    warn!(
                        "discarding a stale reply to packet {} while waiting for {}",
                        header.id(),
                        id
                    );
                }
                PacketMeta::Reply(0) => {
                    let reply = decode::<C::Output>(&body, self.id_sizes)?;
                    trace!("[{id}] <- {:?}", reply);
                    return Ok(reply);
                }
                PacketMeta::Reply(code) => {
                    trace!("[{id}] <- error {code}");
                    return Err(match ErrorCode::try_from(code) {
                        Ok(code) => ClientError::HostError(code),
                        Err(code) => ClientError::UnknownHostError(code),
                    });
                }
            }
        }
    }

    fn read_packet(&mut self) -> Result<(PacketHeader, Vec<u8>), ClientError> {
        const HEADER: usize = PacketHeader::JDWP_SIZE as usize;

        self.fill(HEADER)?;
        let mut reader = JdwpReader::new(&self.pending[..HEADER], self.id_sizes);
        let header = PacketHeader::read(&mut reader);
        let header = match header {
            Ok(header) if header.length() >= PacketHeader::JDWP_SIZE => header,
            _ => return Err(self.desync()),
        };
        let len = header.length() as usize;
        self.fill(len)?;

        let body = self.pending[HEADER..len].to_vec();
        self.pending.drain(..len);
        Ok((header, body))
    }

    /// Reads until at least `len` bytes are pending.
    fn fill(&mut self, len: usize) -> io::Result<()> {
        let mut chunk = [0; 4096];
        while self.pending.len() < len {
            let want = (len - self.pending.len()).min(chunk.len());
            match self.stream.read(&mut chunk[..want]) {
                Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    if !self.pending.is_empty() {
                        debug!("read stalled with {} of {len} bytes in", self.pending.len());
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn desync(&mut self) -> ClientError {
        warn!("garbage packet header, giving up on the connection");
        self.desynced = true;
        self.pending.clear();
        ClientError::Desynced
    }
}

/// IDs are read and written as 1 to 8 byte big-endian integers.
fn check_id_sizes(sizes: &IDSizeInfo) -> Result<(), ClientError> {
    let all = [
        sizes.field_id_size,
        sizes.method_id_size,
        sizes.object_id_size,
        sizes.reference_type_id_size,
        sizes.frame_id_size,
    ];
    if all.iter().all(|size| (1..=8).contains(size)) {
        Ok(())
    } else {
        warn!("the VM reported unusable id sizes: {sizes:?}");
        Err(io::Error::new(ErrorKind::InvalidData, "unsupported id sizes").into())
    }
}
