use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::info;
use serde::Deserialize;
use uuid::Uuid;

use crate::data_capture::codec::DEFAULT_POOL_SIZE;
use crate::error_handling::types::ConfigError;
use crate::session_management::BucketKeys;
use crate::storage::{StoreSettings, DEFAULT_CAPACITY};

const DEFAULT_EVICTION_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Command-line arguments.
///
/// Every setting except `config_file` and `verbose` overrides the value of
/// the same name in the configuration file. Boolean switches can only turn a
/// feature on from the command line.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "rebound")]
#[command(version)]
#[command(about = "Out-of-band interaction capture server")]
pub struct Args {
    /// TOML configuration file
    ///
    /// # Command Line
    /// Use `--config-file <PATH>` or the `REBOUND_CONFIG` environment variable
    #[arg(long, short = 'c', env = "REBOUND_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Managed domain whose subdomains receive interactions
    #[arg(long, env = "REBOUND_DOMAIN")]
    pub domain: Option<String>,

    /// IP address the HTTP listener binds to
    #[arg(long)]
    pub listen_ip: Option<String>,

    /// Port of the HTTP listener
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Lifetime of a registered session, counted from registration
    #[arg(long)]
    pub eviction_ttl_secs: Option<u64>,

    /// Upper bound on live sessions before least recently used ones are evicted
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Period of the background sweep removing expired sessions
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Require the `Authorization` header on API routes
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub auth: bool,

    /// Operator token; generated when `--auth` is set without one
    #[arg(long, env = "REBOUND_TOKEN")]
    pub token: Option<String>,

    /// Capture interactions addressed to the bare domain
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub root_tld: bool,

    /// Value of `Access-Control-Allow-Origin` on API responses
    #[arg(long)]
    pub origin_url: Option<String>,

    /// Idle compressors kept for reuse
    #[arg(long)]
    pub compressor_pool_size: Option<usize>,

    /// Log at debug level unless `RUST_LOG` says otherwise
    #[arg(long, short = 'v', action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

/// Runtime configuration of the server.
///
/// Built from defaults, then an optional TOML file, then command-line and
/// environment overrides, and validated by [`Config::load`].
///
/// # Fields Overview
///
/// - `domain`: managed domain, lower-cased and without a trailing dot
/// - `listen_ip` / `http_port`: HTTP listener address
/// - `eviction_ttl_secs`: session lifetime from registration
/// - `max_sessions`: store capacity, pinned buckets included
/// - `sweep_interval_secs`: cadence of the background TTL sweep
/// - `auth` / `token`: API authentication and the operator bucket key
/// - `root_tld`: capture interactions addressed to the bare domain
/// - `origin_url`: CORS origin for API responses
/// - `compressor_pool_size`: idle compressors kept for reuse
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub domain: String,
    pub listen_ip: String,
    pub http_port: u16,
    pub eviction_ttl_secs: u64,
    pub max_sessions: usize,
    pub sweep_interval_secs: u64,
    pub auth: bool,
    pub token: Option<String>,
    pub root_tld: bool,
    pub origin_url: String,
    pub compressor_pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: String::new(),
            listen_ip: "0.0.0.0".to_string(),
            http_port: 80,
            eviction_ttl_secs: DEFAULT_EVICTION_TTL_SECS,
            max_sessions: DEFAULT_CAPACITY,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            auth: false,
            token: None,
            root_tld: false,
            origin_url: "*".to_string(),
            compressor_pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Config {
    /// Reads a TOML configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Builds the validated configuration for `args`.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let base = match &args.config_file {
            Some(path) => {
                info!("Reading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        base.with_overrides(args).finalize()
    }

    fn with_overrides(mut self, args: &Args) -> Self {
        if let Some(domain) = &args.domain {
            self.domain = domain.clone();
        }
        if let Some(listen_ip) = &args.listen_ip {
            self.listen_ip = listen_ip.clone();
        }
        if let Some(port) = args.http_port {
            self.http_port = port;
        }
        if let Some(ttl) = args.eviction_ttl_secs {
            self.eviction_ttl_secs = ttl;
        }
        if let Some(max) = args.max_sessions {
            self.max_sessions = max;
        }
        if let Some(interval) = args.sweep_interval_secs {
            self.sweep_interval_secs = interval;
        }
        if let Some(token) = &args.token {
            self.token = Some(token.clone());
        }
        if let Some(origin) = &args.origin_url {
            self.origin_url = origin.clone();
        }
        if let Some(size) = args.compressor_pool_size {
            self.compressor_pool_size = size;
        }
        self.auth |= args.auth;
        self.root_tld |= args.root_tld;
        self
    }

    fn finalize(mut self) -> Result<Self, ConfigError> {
        self.domain = self.domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if self.domain.is_empty() {
            return Err(ConfigError::MissingDomain);
        }
        if self.listen_ip.parse::<IpAddr>().is_err() {
            return Err(ConfigError::NotInRange(format!(
                "listen_ip {:?} is not an IP address",
                self.listen_ip
            )));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::NotInRange("max_sessions must be at least 1".into()));
        }
        if self.eviction_ttl_secs == 0 {
            return Err(ConfigError::NotInRange("eviction_ttl_secs must be at least 1".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::NotInRange("sweep_interval_secs must be at least 1".into()));
        }
        if self.compressor_pool_size == 0 {
            return Err(ConfigError::NotInRange("compressor_pool_size must be at least 1".into()));
        }

        if self.token.as_deref() == Some("") {
            self.token = None;
        }
        if self.auth && self.token.is_none() {
            let token = Uuid::new_v4().simple().to_string();
            info!("Client token: {}", token);
            self.token = Some(token);
        }
        Ok(self)
    }

    pub fn eviction_ttl(&self) -> Duration {
        Duration::from_secs(self.eviction_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn bucket_keys(&self) -> BucketKeys {
        BucketKeys {
            operator: self.token.clone(),
            root_domain: self.root_tld.then(|| self.domain.clone()),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        self.bucket_keys().pinned().into_iter().fold(
            StoreSettings::new(self.max_sessions, self.eviction_ttl())
                .with_pool_size(self.compressor_pool_size),
            |settings, key| settings.with_pinned_bucket(key),
        )
    }
}
