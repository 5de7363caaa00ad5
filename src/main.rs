use std::{env, error::Error, process, sync::Arc};

use jdwp_instances::{
    config::{ClientConfig, QueryConfig},
    counts::{CountCache, ReferenceCountProvider},
    query::{InstanceQuery, TargetInstanceQuery},
    session::{SessionEvent, SessionId, TargetSession},
    vm::SharedClient,
};

// usage: jdwp-instances <host:port> <class name> [limit]
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(addr), Some(class)) = (args.next(), args.next()) else {
        eprintln!("usage: jdwp-instances <host:port> <class name> [limit]");
        process::exit(2);
    };
    let mut config = QueryConfig::from_env();
    if let Some(limit) = args.next() {
        config.default_limit = limit.parse()?;
    }

    let client = SharedClient::connect_with(addr.as_str(), &ClientConfig::from_env())?;
    let version = client.version()?;
    println!("attached to {} ({})", version.vm_name, version.vm_version);

    let session = TargetSession::new(SessionId::new(process::id()));
    session.apply(SessionEvent::Attached { suspended: false });

    let ty = client
        .type_by_name(&session, &class)?
        .ok_or_else(|| format!("{class} is not loaded"))?;

    client.suspend(&session)?;

    let counts = CountCache::new();
    counts.refresh(&client, &[ty.clone()])?;
    println!("{ty}: {} live instances", counts.total_count(&ty));

    let limit = config.default_limit;
    let query = TargetInstanceQuery::with_config(session.clone(), ty, Arc::new(client.clone()), config);
    let result = query.enumerate(limit);

    // resume even when the query failed
    client.resume(&session)?;

    let result = result?;
    for entry in result.entries() {
        println!("  {entry:?}");
    }
    if result.is_truncated() {
        println!("  ... more than {limit}");
    }

    Ok(())
}
