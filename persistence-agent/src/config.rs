use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const HOST: &str = "HOST";
    pub const PUBLIC_HOST: &str = "PUBLIC_HOST";
    pub const AGENT_ID: &str = "AGENT_ID";
    pub const AGENT_NAME: &str = "AGENT_NAME";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const DATABASE_AUTH_TOKEN: &str = "DATABASE_AUTH_TOKEN";
    pub const LOCAL_REPLICA_PATH: &str = "LOCAL_REPLICA_PATH";
    // Discovery heartbeat
    pub const DISCOVERY_URL: &str = "A2A_DISCOVERY_URL";
    pub const DISCOVERY_INTERVAL: &str = "A2A_DISCOVERY_INTERVAL";
    pub const CORS_ORIGINS: &str = "CORS_ORIGINS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    // Pool / driver limits
    pub const MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";
    pub const CONNECTION_TIMEOUT: &str = "CONNECTION_TIMEOUT";
    pub const QUERY_TIMEOUT: &str = "QUERY_TIMEOUT";
    pub const DEFAULT_TTL: &str = "DEFAULT_TTL";
    // Sync forwarding to an external coordination endpoint
    pub const SYNC_FORWARD_ENABLED: &str = "SYNC_FORWARD_ENABLED";
    pub const SYNC_FORWARD_URL: &str = "SYNC_FORWARD_URL";
    pub const MAX_BODY_BYTES: &str = "MAX_BODY_BYTES";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 4243;
    pub const HOST: &str = "0.0.0.0";
    pub const PUBLIC_HOST: &str = "localhost";
    pub const AGENT_NAME: &str = "PersistenceAgent";
    pub const DATABASE_URL: &str = "./.db/agent.db";
    pub const LOCAL_REPLICA_PATH: &str = "./.db/local.db";
    pub const DISCOVERY_INTERVAL_SECS: u64 = 30;
    pub const LOG_LEVEL: &str = "info";
    pub const MAX_CONNECTIONS: u32 = 16;
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
    pub const QUERY_TIMEOUT_SECS: u64 = 10;
    pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
}

/// Where the SQLite file actually lives once the configured URL is resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub public_host: String,
    pub agent_id: String,
    pub agent_name: String,
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub local_replica_path: String,
    pub discovery_url: Option<String>,
    pub discovery_interval_secs: u64,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub query_timeout_secs: u64,
    /// Applied to stores that carry no TTL of their own
    pub default_ttl_secs: Option<i64>,
    pub sync_forward_enabled: bool,
    pub sync_forward_url: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from any variable source (the process env in production,
    /// a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let default_ttl: i64 = parse_or(get(env_vars::DEFAULT_TTL), env_vars::DEFAULT_TTL, 0);

        Self {
            port: parse_or(get(env_vars::PORT), env_vars::PORT, defaults::PORT),
            host: get(env_vars::HOST).unwrap_or_else(|| defaults::HOST.to_string()),
            public_host: get(env_vars::PUBLIC_HOST)
                .unwrap_or_else(|| defaults::PUBLIC_HOST.to_string()),
            agent_id: get(env_vars::AGENT_ID)
                .unwrap_or_else(|| format!("persistence-agent-{}", uuid::Uuid::new_v4())),
            agent_name: get(env_vars::AGENT_NAME)
                .unwrap_or_else(|| defaults::AGENT_NAME.to_string()),
            database_url: get(env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            database_auth_token: get(env_vars::DATABASE_AUTH_TOKEN),
            local_replica_path: get(env_vars::LOCAL_REPLICA_PATH)
                .unwrap_or_else(|| defaults::LOCAL_REPLICA_PATH.to_string()),
            discovery_url: get(env_vars::DISCOVERY_URL)
                .map(|url| url.trim_end_matches('/').to_string()),
            discovery_interval_secs: parse_or(
                get(env_vars::DISCOVERY_INTERVAL),
                env_vars::DISCOVERY_INTERVAL,
                defaults::DISCOVERY_INTERVAL_SECS,
            )
            .max(1),
            cors_origins: get(env_vars::CORS_ORIGINS)
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            log_level: get(env_vars::LOG_LEVEL)
                .map(|level| level.to_lowercase())
                .unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
            max_connections: parse_or(
                get(env_vars::MAX_CONNECTIONS),
                env_vars::MAX_CONNECTIONS,
                defaults::MAX_CONNECTIONS,
            )
            .max(1),
            connection_timeout_secs: parse_or(
                get(env_vars::CONNECTION_TIMEOUT),
                env_vars::CONNECTION_TIMEOUT,
                defaults::CONNECTION_TIMEOUT_SECS,
            ),
            query_timeout_secs: parse_or(
                get(env_vars::QUERY_TIMEOUT),
                env_vars::QUERY_TIMEOUT,
                defaults::QUERY_TIMEOUT_SECS,
            ),
            default_ttl_secs: (default_ttl > 0).then_some(default_ttl),
            sync_forward_enabled: get(env_vars::SYNC_FORWARD_ENABLED)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            sync_forward_url: get(env_vars::SYNC_FORWARD_URL),
            max_body_bytes: parse_or(
                get(env_vars::MAX_BODY_BYTES),
                env_vars::MAX_BODY_BYTES,
                defaults::MAX_BODY_BYTES,
            ),
        }
    }

    /// Remote URLs are served from the local replica file; the SQLite driver
    /// has no network transport.
    pub fn database_location(&self) -> DatabaseLocation {
        let url = self.database_url.as_str();
        if url == ":memory:" || url == "file::memory:" {
            return DatabaseLocation::Memory;
        }
        if is_remote_url(url) {
            return DatabaseLocation::File(self.local_replica_path.clone());
        }
        let path = url.strip_prefix("file:").unwrap_or(url);
        DatabaseLocation::File(path.to_string())
    }

    pub fn is_remote_database(&self) -> bool {
        is_remote_url(&self.database_url)
    }

    /// The URL other services should use to reach this agent.
    pub fn public_url(&self) -> String {
        format!("http://{}:{}", self.public_host, self.port)
    }

    /// The forwarding target, only when forwarding is switched on.
    pub fn sync_forward_target(&self) -> Option<&str> {
        if self.sync_forward_enabled {
            self.sync_forward_url.as_deref()
        } else {
            None
        }
    }
}

fn is_remote_url(url: &str) -> bool {
    ["libsql://", "http://", "https://", "ws://", "wss://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &str, default: T) -> T {
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("{} has invalid value '{}', using default", name, value);
            default
        }),
        None => default,
    }
}

/// Accepts either a JSON array or a comma separated list; `*` means any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = match serde_json::from_str::<Vec<String>>(raw) {
        Ok(list) => list,
        Err(_) => raw.split(',').map(|s| s.to_string()).collect(),
    };

    let origins: Vec<String> = origins
        .into_iter()
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
}
