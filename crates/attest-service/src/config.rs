//! Service configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use attest_proof::{MAX_RANGE_BITS, MIN_RANGE_BITS};
use attest_resolver::{ChainOptions, ResolverOptions, RetryPolicy};
use attest_trust::TrustAnchor;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Full configuration for an Attest service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttestConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub proofs: ProofsConfig,

    #[serde(default)]
    pub trust: TrustConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// DID resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// How long a resolved document is served from cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Expired documents are swept this often. Zero disables sweeping.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
    /// Per backend call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Whole resolution, retries included.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Backends are raced once a method has more than this many.
    #[serde(default = "default_race_threshold")]
    pub race_threshold: usize,
    #[serde(default = "default_race_max_in_flight")]
    pub race_max_in_flight: usize,
    /// Domain under which new `did:web` identifiers are created.
    #[serde(default = "default_web_domain")]
    pub web_domain: String,
    #[serde(default)]
    pub retry: RetryConfig,
    /// `did:ledger` backends in priority order.
    #[serde(default = "default_ledger_backends")]
    pub ledger: Vec<BackendConfig>,
    /// `did:web` backends in priority order.
    #[serde(default = "default_web_backends")]
    pub web: Vec<BackendConfig>,
}

/// Retry backoff for transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

/// Where a method's documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local, lost on exit.
    Memory { name: String },
    /// A document host serving `GET/PUT {url}/dids/{did}`.
    Http { name: String, url: String },
    /// RocksDB under `storage.data_dir/<name>`.
    Rocksdb { name: String },
}

impl BackendConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Memory { name } | Self::Http { name, .. } | Self::Rocksdb { name } => name,
        }
    }
}

/// Proof worker pool and circuit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofsConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Bit width of range constraints.
    #[serde(default = "default_range_bits")]
    pub range_bits: u32,
    #[serde(default = "default_proof_timeout_ms")]
    pub timeout_ms: u64,
}

/// Trusted issuers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrustConfig {
    /// Reject credentials from issuers without an anchor.
    #[serde(default)]
    pub require_anchor: bool,
    #[serde(default)]
    pub anchors: Vec<TrustAnchor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_purge_interval_secs() -> u64 {
    60
}
fn default_call_timeout_ms() -> u64 {
    2_000
}
fn default_resolve_timeout_ms() -> u64 {
    10_000
}
fn default_max_in_flight() -> usize {
    64
}
fn default_race_threshold() -> usize {
    3
}
fn default_race_max_in_flight() -> usize {
    2
}
fn default_web_domain() -> String {
    "localhost".into()
}
fn default_ledger_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::Memory {
        name: "ledger".into(),
    }]
}
fn default_web_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::Memory { name: "web".into() }]
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_interval_ms() -> u64 {
    50
}
fn default_max_interval_ms() -> u64 {
    1_000
}
fn default_max_elapsed_ms() -> u64 {
    5_000
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    64
}
fn default_range_bits() -> u32 {
    attest_proof::DEFAULT_RANGE_BITS
}
fn default_proof_timeout_ms() -> u64 {
    30_000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            purge_interval_secs: default_purge_interval_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            max_in_flight: default_max_in_flight(),
            race_threshold: default_race_threshold(),
            race_max_in_flight: default_race_max_in_flight(),
            web_domain: default_web_domain(),
            retry: RetryConfig::default(),
            ledger: default_ledger_backends(),
            web: default_web_backends(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

impl Default for ProofsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            range_bits: default_range_bits(),
            timeout_ms: default_proof_timeout_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ResolverConfig {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            purge_interval: Duration::from_secs(self.purge_interval_secs),
            max_in_flight: self.max_in_flight,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                initial_interval: Duration::from_millis(self.retry.initial_interval_ms),
                max_interval: Duration::from_millis(self.retry.max_interval_ms),
                max_elapsed: Duration::from_millis(self.retry.max_elapsed_ms),
            },
        }
    }

    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            race_threshold: self.race_threshold,
            race_max_in_flight: self.race_max_in_flight,
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl ProofsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AttestConfig {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let bits = self.proofs.range_bits;
        if !(MIN_RANGE_BITS..=MAX_RANGE_BITS).contains(&bits) {
            return Err(ServiceError::Config(format!(
                "proofs.range_bits must be within {}..={}, got {}",
                MIN_RANGE_BITS, MAX_RANGE_BITS, bits
            )));
        }
        if self.proofs.workers == 0 {
            return Err(ServiceError::Config("proofs.workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: AttestConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
