use std::{io::ErrorKind, sync::Arc, time::Duration};

use common::{MockClass, MockOptions, MockVm, Result};
use jdwp_instances::{
    client::{ClientError, JdwpClient},
    config::ClientConfig,
    counts::{CountCache, InstanceCount, ReferenceCountProvider},
    handle::TypeHandle,
    protocol::{reference_type::InstanceLimit, virtual_machine::IDSizes, ErrorCode, JdwpId},
    query::{InstanceQuery, InstancesBackend, TargetInstanceQuery},
    session::{SessionEvent, SessionId, SessionState, TargetSession},
    vm::SharedClient,
    Error,
};

mod common;

fn classes() -> Vec<MockClass> {
    vec![
        MockClass {
            signature: "Lcom/example/Widget;",
            id: 42,
            instances: 5,
        },
        MockClass {
            signature: "Lcom/example/Gadget;",
            id: 43,
            instances: 0,
        },
        MockClass {
            signature: "[I",
            id: 44,
            instances: 2,
        },
    ]
}

fn attach(options: MockOptions) -> Result<(MockVm, SharedClient, TargetSession)> {
    let vm = MockVm::spawn(classes(), options)?;
    let client = SharedClient::connect(vm.addr)?;
    let session = TargetSession::new(SessionId::new(1));
    session.apply(SessionEvent::Attached { suspended: false });
    Ok((vm, client, session))
}

#[test]
fn handshake_and_version() -> Result {
    let (_vm, client, _) = attach(MockOptions::default())?;

    let version = client.version()?;

    insta::assert_debug_snapshot!(version, @r###"
    VersionReply {
        description: "mock",
        version_major: 1,
        version_minor: 8,
        vm_version: "17",
        vm_name: "Mock VM",
    }
    "###);
    Ok(())
}

#[test]
fn bad_handshake() -> Result {
    let vm = MockVm::spawn(classes(), MockOptions {
        bad_handshake: true,
        ..MockOptions::default()
    })?;

    let error = JdwpClient::connect(vm.addr).unwrap_err();

    assert!(matches!(error, ClientError::FailedHandshake));
    Ok(())
}

#[test]
fn id_sizes_are_negotiated() -> Result {
    let vm = MockVm::spawn(classes(), MockOptions::default())?;
    let mut client = JdwpClient::connect(vm.addr)?;

    let sizes = client.send(IDSizes)?;

    assert_eq!(sizes, client.id_sizes());
    assert_eq!(sizes.object_id_size, 8);
    Ok(())
}

#[test]
fn types_by_name() -> Result {
    let (_vm, client, session) = attach(MockOptions::default())?;

    let widget = client
        .type_by_name(&session, "com.example.Widget")?
        .expect("Widget is loaded");
    assert_eq!(widget.id().raw(), 42);
    assert_eq!(widget.signature(), "Lcom/example/Widget;");
    assert!(widget.belongs_to(&session));

    let ints = client.type_by_name(&session, "int[]")?.expect("int[] is loaded");
    assert_eq!(ints.id().raw(), 44);

    assert!(client.type_by_name(&session, "com.example.Nope")?.is_none());

    let names = client
        .all_types(&session)?
        .iter()
        .map(|ty| ty.name().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, ["com.example.Widget", "com.example.Gadget", "int[]"]);

    assert_eq!(client.signature(widget.id())?, "Lcom/example/Widget;");
    Ok(())
}

#[test]
fn suspend_and_resume() -> Result {
    let (vm, client, session) = attach(MockOptions::default())?;

    client.suspend(&session)?;
    assert!(vm.is_suspended());
    assert_eq!(session.current_state()?, SessionState::Suspended);

    client.resume(&session)?;
    assert!(!vm.is_suspended());
    assert_eq!(session.current_state()?, SessionState::Running);
    Ok(())
}

#[test]
fn instances_with_a_limit() -> Result {
    let (_vm, client, session) = attach(MockOptions::default())?;
    let widget = client
        .type_by_name(&session, "com.example.Widget")?
        .expect("Widget is loaded");

    assert_eq!(client.instances(widget.id(), InstanceLimit::All)?.len(), 5);
    assert_eq!(client.instances(widget.id(), InstanceLimit::at_most(2))?.len(), 2);
    Ok(())
}

#[test]
fn enumerate_over_the_wire() -> Result {
    let (_vm, client, session) = attach(MockOptions::default())?;
    let widget = client
        .type_by_name(&session, "com.example.Widget")?
        .expect("Widget is loaded");
    client.suspend(&session)?;
    let query = TargetInstanceQuery::new(session.clone(), widget, Arc::new(client));

    let truncated = query.enumerate(3)?;
    assert_eq!(truncated.len(), 3);
    assert!(truncated.is_truncated());

    let all = query.enumerate(500)?;
    assert_eq!(all.len(), 5);
    assert!(!all.is_truncated());
    assert_eq!(&all.entries()[..3], truncated.entries());
    Ok(())
}

#[test]
fn unknown_type_on_the_wire() -> Result {
    let (_vm, client, session) = attach(MockOptions::default())?;
    client.suspend(&session)?;

    let error = client
        .instances(JdwpId::from_raw(7), InstanceLimit::All)
        .unwrap_err();
    assert!(matches!(error, ClientError::HostError(ErrorCode::InvalidClass)));

    let gone = TypeHandle::new(
        session.id(),
        JdwpId::from_raw(7),
        "Lcom/example/Gone;",
    );
    let query = TargetInstanceQuery::new(session.clone(), gone, Arc::new(client.clone()));
    let error = query.enumerate(10).unwrap_err();
    assert!(matches!(error, Error::TypeUnloaded(name) if name == "com.example.Gone"));

    // the connection is still fine afterwards
    assert!(client.version().is_ok());
    Ok(())
}

#[test]
fn events_and_stray_replies_are_skipped() -> Result {
    let (_vm, client, session) = attach(MockOptions {
        noise: true,
        ..MockOptions::default()
    })?;
    client.suspend(&session)?;
    let widget = client
        .type_by_name(&session, "com.example.Widget")?
        .expect("Widget is loaded");
    let query = TargetInstanceQuery::new(session.clone(), widget, Arc::new(client));

    let result = query.enumerate(4)?;

    assert_eq!(result.len(), 4);
    assert!(result.is_truncated());
    Ok(())
}

#[test]
fn counts_over_the_wire() -> Result {
    let (_vm, client, session) = attach(MockOptions::default())?;
    let types = client.all_types(&session)?;

    let counts = CountCache::new();
    counts.refresh(&client, &types)?;

    let measured = types
        .iter()
        .map(|ty| (ty.name().to_owned(), counts.total_count(ty)))
        .collect::<Vec<_>>();
    assert_eq!(
        measured,
        [
            ("com.example.Widget".to_owned(), InstanceCount::Measured(5)),
            ("com.example.Gadget".to_owned(), InstanceCount::Measured(0)),
            ("int[]".to_owned(), InstanceCount::Measured(2)),
        ]
    );
    Ok(())
}

#[test]
fn oversized_ids_are_refused() -> Result {
    let vm = MockVm::spawn(classes(), MockOptions {
        object_id_size: Some(16),
        ..MockOptions::default()
    })?;

    let error = JdwpClient::connect(vm.addr).unwrap_err();

    assert!(matches!(error, ClientError::Io(e) if e.kind() == ErrorKind::InvalidData));
    Ok(())
}

#[test]
fn retry_after_a_reply_stalled_mid_packet() -> Result {
    let vm = MockVm::spawn(classes(), MockOptions {
        stall_first_instances: Some(Duration::from_millis(450)),
        ..MockOptions::default()
    })?;
    let config = ClientConfig {
        read_timeout: Some(Duration::from_millis(300)),
        ..ClientConfig::default()
    };
    let client = SharedClient::connect_with(vm.addr, &config)?;
    let session = TargetSession::new(SessionId::new(1));
    session.apply(SessionEvent::Attached { suspended: true });
    let widget = TypeHandle::new(session.id(), JdwpId::from_raw(42), "Lcom/example/Widget;");
    let query = TargetInstanceQuery::new(session, widget, Arc::new(client.clone()));

    // the first attempt times out halfway through the header, the retry
    // skips the late reply and gets its own
    let result = query.enumerate(3)?;

    assert_eq!(result.len(), 3);
    assert!(result.is_truncated());
    assert_eq!(client.version()?.vm_name, "Mock VM");
    Ok(())
}

#[test]
fn garbage_header_breaks_the_connection() -> Result {
    let vm = MockVm::spawn(classes(), MockOptions {
        garbage_instances: true,
        ..MockOptions::default()
    })?;
    let client = SharedClient::connect(vm.addr)?;
    let session = TargetSession::new(SessionId::new(1));
    session.apply(SessionEvent::Attached { suspended: true });
    let widget = TypeHandle::new(session.id(), JdwpId::from_raw(42), "Lcom/example/Widget;");
    let query = TargetInstanceQuery::new(session, widget, Arc::new(client.clone()));

    let error = query.enumerate(3).unwrap_err();
    assert!(matches!(error, Error::TargetCommunication(ClientError::Desynced)));

    // everything after that fails fast instead of reading noise
    assert!(matches!(client.version(), Err(ClientError::Desynced)));
    Ok(())
}
