use std::{env, str::FromStr, time::Duration};

use log::warn;

/// Environment variable overriding [QueryConfig::default_limit].
pub const LIMIT_VAR: &str = "JDWP_INSTANCES_LIMIT";
/// Environment variable overriding [ClientConfig::read_timeout], in
/// milliseconds, `0` disables the timeout.
pub const TIMEOUT_VAR: &str = "JDWP_INSTANCES_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long a single reply may take before the command fails.
    pub read_timeout: Option<Duration>,
    /// How long to wait for the VM to echo the handshake.
    pub handshake_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(30)),
            handshake_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = parse_var::<u64>(TIMEOUT_VAR) {
            config.read_timeout = (ms != 0).then(|| Duration::from_millis(ms));
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How many instances a display asks for when it does not say otherwise.
    pub default_limit: u32,
    /// Transport failures are retried once unless this is off.
    pub retry_communication_errors: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 500_000,
            retry_communication_errors: true,
        }
    }
}

impl QueryConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(limit) = parse_var(LIMIT_VAR) {
            config.default_limit = limit;
        }
        config
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {name}={raw:?}, not a number");
            None
        }
    }
}
