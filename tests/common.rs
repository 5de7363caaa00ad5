#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    error::Error,
    io::{self, Cursor, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use jdwp_instances::{
    client::ClientError,
    handle::TypeHandle,
    protocol::{
        reference_type::InstanceLimit, ErrorCode, JdwpId, ObjectID, ReferenceTypeID,
        TaggedObjectID,
    },
    query::InstancesBackend,
    session::{SessionEvent, SessionId, TargetSession},
};

pub type Result<T = ()> = std::result::Result<T, Box<dyn Error>>;

pub const WIDGET: u64 = 42;
pub const WIDGET_SIGNATURE: &str = "Lcom/example/Widget;";

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

pub fn suspended_session() -> TargetSession {
    init_logger();
    let session = TargetSession::new(SessionId::new(1));
    session.apply(SessionEvent::Attached { suspended: true });
    session
}

pub fn widget(session: &TargetSession) -> TypeHandle {
    TypeHandle::new(session.id(), ReferenceTypeID::from_raw(WIDGET), WIDGET_SIGNATURE)
}

pub fn object(type_id: u64, index: u64) -> TaggedObjectID {
    TaggedObjectID::Object(ObjectID::from_raw(type_id * 1000 + index))
}

pub fn io_error() -> ClientError {
    ClientError::Io(io::Error::from(io::ErrorKind::ConnectionReset))
}

#[derive(Debug)]
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// The test side of a gate installed with [FakeTarget::gate].
#[derive(Debug)]
pub struct GateHandle {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl GateHandle {
    /// Waits until the gated call reached the backend.
    pub fn wait_entered(&self) {
        self.entered.recv().expect("gated call never happened");
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// An in-memory target that counts how often it was asked for instances.
#[derive(Debug, Default)]
pub struct FakeTarget {
    instances: Mutex<HashMap<ReferenceTypeID, Vec<TaggedObjectID>>>,
    failures: Mutex<VecDeque<ClientError>>,
    gate: Mutex<Option<Gate>>,
    calls: AtomicUsize,
}

impl FakeTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_instances(type_id: u64, count: u64) -> Arc<Self> {
        let target = Self::new();
        target.set_instances(type_id, count);
        target
    }

    pub fn set_instances(&self, type_id: u64, count: u64) {
        self.instances.lock().unwrap().insert(
            ReferenceTypeID::from_raw(type_id),
            (0..count).map(|i| object(type_id, i)).collect(),
        );
    }

    /// The next call fails with this error instead of answering.
    pub fn fail_next(&self, error: ClientError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Makes the next instances call block until released.
    pub fn gate(&self) -> GateHandle {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InstancesBackend for FakeTarget {
    fn instances(
        &self,
        type_id: ReferenceTypeID,
        max: InstanceLimit,
    ) -> std::result::Result<Vec<TaggedObjectID>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let all = self
            .instances
            .lock()
            .unwrap()
            .get(&type_id)
            .cloned()
            .ok_or(ClientError::HostError(ErrorCode::InvalidClass))?;
        Ok(match max.get() {
            Some(max) => all.into_iter().take(max as usize).collect(),
            None => all,
        })
    }

    fn instance_counts(
        &self,
        type_ids: &[ReferenceTypeID],
    ) -> std::result::Result<Vec<u64>, ClientError> {
        let instances = self.instances.lock().unwrap();
        Ok(type_ids
            .iter()
            .map(|id| instances.get(id).map_or(0, |all| all.len() as u64))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct MockClass {
    pub signature: &'static str,
    pub id: u64,
    pub instances: u32,
}

#[derive(Debug, Default, Clone)]
pub struct MockOptions {
    /// Precede every reply with an event packet and a reply to nothing.
    pub noise: bool,
    /// Answer the handshake with garbage.
    pub bad_handshake: bool,
    /// Send the first instances reply in two parts with this pause between.
    pub stall_first_instances: Option<Duration>,
    /// Answer instances with a header too short to be a packet.
    pub garbage_instances: bool,
    /// Report this object id size instead of 8.
    pub object_id_size: Option<u32>,
}

/// A tiny JDWP peer on localhost that serves one connection.
#[derive(Debug)]
pub struct MockVm {
    pub addr: SocketAddr,
    suspended: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl MockVm {
    pub fn spawn(classes: Vec<MockClass>, options: MockOptions) -> Result<MockVm> {
        init_logger();
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        let addr = listener.local_addr()?;
        let suspended = Arc::new(Mutex::new(false));
        let handle = thread::spawn({
            let suspended = suspended.clone();
            move || {
                if let Ok((stream, _)) = listener.accept() {
                    // the client hanging up ends the conversation
                    let _ = serve(stream, &classes, &options, &suspended);
                }
            }
        });
        Ok(MockVm {
            addr,
            suspended,
            handle: Some(handle),
        })
    }

    pub fn is_suspended(&self) -> bool {
        *self.suspended.lock().unwrap()
    }
}

impl Drop for MockVm {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // only join when the client is certainly gone
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) -> io::Result<()> {
    out.write_u32::<BE>(s.len() as u32)?;
    out.write_all(s.as_bytes())
}

fn read_string(body: &mut Cursor<Vec<u8>>) -> io::Result<String> {
    let mut bytes = vec![0; body.read_u32::<BE>()? as usize];
    body.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| io::Error::from(io::ErrorKind::InvalidData))
}

fn packet(id: u32, meta: &[u8], body: &[u8]) -> io::Result<Vec<u8>> {
    let mut packet = Vec::new();
    packet.write_u32::<BE>((4 + 4 + meta.len() + body.len()) as u32)?;
    packet.write_u32::<BE>(id)?;
    packet.write_all(meta)?;
    packet.write_all(body)?;
    Ok(packet)
}

fn write_packet(stream: &mut TcpStream, id: u32, meta: &[u8], body: &[u8]) -> io::Result<()> {
    stream.write_all(&packet(id, meta, body)?)
}

fn serve(
    mut stream: TcpStream,
    classes: &[MockClass],
    options: &MockOptions,
    suspended: &Mutex<bool>,
) -> io::Result<()> {
    let mut handshake = [0; 14];
    stream.read_exact(&mut handshake)?;
    if options.bad_handshake {
        stream.write_all(b"JDWP-Handshook")?;
        return Ok(());
    }
    stream.write_all(&handshake)?;

    let mut stalled = false;
    loop {
        let len = stream.read_u32::<BE>()?;
        let id = stream.read_u32::<BE>()?;
        let _flags = stream.read_u8()?;
        let command_set = stream.read_u8()?;
        let command = stream.read_u8()?;
        let mut body = vec![0; len as usize - 11];
        stream.read_exact(&mut body)?;
        let mut body = Cursor::new(body);

        let (code, reply) = answer(command_set, command, &mut body, classes, options, suspended)?;
        let instances = (command_set, command) == (2, 16);

        if instances && options.garbage_instances {
            stream.write_all(&[0, 0, 0, 3, 0, 0, 0, 0, 0x80, 0, 0])?;
            continue;
        }

        if options.noise {
            // a composite VM_START event, the client should skip it
            write_packet(&mut stream, 7, &[0x00, 64, 100], &[0, 0, 0, 0, 1, 90, 0, 0, 0, 0])?;
            write_packet(&mut stream, id.wrapping_add(1000), &[0x80, 0, 0], &[1, 2, 3])?;
        }

        let mut meta = vec![0x80];
        meta.write_u16::<BE>(code)?;

        match options.stall_first_instances {
            Some(pause) if instances && !stalled => {
                stalled = true;
                let bytes = packet(id, &meta, &reply)?;
                stream.write_all(&bytes[..5])?;
                stream.flush()?;
                thread::sleep(pause);
                stream.write_all(&bytes[5..])?;
            }
            _ => write_packet(&mut stream, id, &meta, &reply)?,
        }
    }
}

fn answer(
    command_set: u8,
    command: u8,
    body: &mut Cursor<Vec<u8>>,
    classes: &[MockClass],
    options: &MockOptions,
    suspended: &Mutex<bool>,
) -> io::Result<(u16, Vec<u8>)> {
    let mut out = Vec::new();
    let by_id = |id: u64| classes.iter().find(|c| c.id == id);

    match (command_set, command) {
        // Version
        (1, 1) => {
            write_string(&mut out, "mock")?;
            out.write_u32::<BE>(1)?;
            out.write_u32::<BE>(8)?;
            write_string(&mut out, "17")?;
            write_string(&mut out, "Mock VM")?;
        }
        // ClassesBySignature
        (1, 2) => {
            let signature = read_string(body)?;
            let matching = classes
                .iter()
                .filter(|c| c.signature == signature)
                .collect::<Vec<_>>();
            out.write_i32::<BE>(matching.len() as i32)?;
            for class in matching {
                out.write_u8(1)?;
                out.write_u64::<BE>(class.id)?;
                out.write_u32::<BE>(7)?;
            }
        }
        // AllClasses
        (1, 3) => {
            out.write_i32::<BE>(classes.len() as i32)?;
            for class in classes {
                out.write_u8(1)?;
                out.write_u64::<BE>(class.id)?;
                write_string(&mut out, class.signature)?;
                out.write_u32::<BE>(7)?;
            }
        }
        // IDSizes
        (1, 7) => {
            out.write_u32::<BE>(8)?;
            out.write_u32::<BE>(8)?;
            out.write_u32::<BE>(options.object_id_size.unwrap_or(8))?;
            out.write_u32::<BE>(8)?;
            out.write_u32::<BE>(8)?;
        }
        // Suspend, Resume
        (1, 8) => *suspended.lock().unwrap() = true,
        (1, 9) => *suspended.lock().unwrap() = false,
        // InstanceCounts
        (1, 21) => {
            let n = body.read_i32::<BE>()?;
            out.write_i32::<BE>(n)?;
            for _ in 0..n {
                let id = body.read_u64::<BE>()?;
                out.write_u64::<BE>(by_id(id).map_or(0, |c| c.instances as u64))?;
            }
        }
        // Signature
        (2, 1) => match by_id(body.read_u64::<BE>()?) {
            Some(class) => write_string(&mut out, class.signature)?,
            None => return Ok((ErrorCode::InvalidClass as u16, out)),
        },
        // Instances
        (2, 16) => {
            let Some(class) = by_id(body.read_u64::<BE>()?) else {
                return Ok((ErrorCode::InvalidClass as u16, out));
            };
            let max = body.read_i32::<BE>()?;
            let n = if max <= 0 {
                class.instances
            } else {
                class.instances.min(max as u32)
            };
            out.write_i32::<BE>(n as i32)?;
            for i in 0..n {
                out.write_u8(b'L')?;
                out.write_u64::<BE>(class.id * 1000 + i as u64)?;
            }
        }
        _ => return Ok((ErrorCode::NotImplemented as u16, out)),
    }
    Ok((0, out))
}
