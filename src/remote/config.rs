//! Configuration resolution for the remote provisioning core.
//!
//! Every value follows a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MEDIAHOST_CONNECT_TIMEOUT` | 30s | Handshake timeout in seconds |
//! | `MEDIAHOST_COMMAND_TIMEOUT` | 180s | Per-command timeout in seconds |
//! | `MEDIAHOST_MAX_RETRIES` | 3 | Connect retries on transient errors |
//! | `MEDIAHOST_RETRY_DELAY_MS` | 1000ms | Initial retry delay in milliseconds |
//! | `MEDIAHOST_KEEPALIVE_SECS` | 30s | Keepalive interval |
//! | `MEDIAHOST_COMPRESSION` | false | Enable zlib compression |
//! | `MEDIAHOST_BASE_DIR` | /home/streaming | Root of per-user directories |
//! | `MEDIAHOST_OWNER` | streaming | Owner applied by best-effort `chown` |
//! | `MEDIAHOST_COOLDOWN_SECS` | 5s | Provisioning cooldown window |
//! | `MEDIAHOST_EXISTS_TTL_SECS` | 30s | `directory_exists` cache TTL |
//! | `MEDIAHOST_FOLDER_INFO_TTL_SECS` | 15s | `folder_info` cache TTL |
//! | `MEDIAHOST_JANITOR_SECS` | 60s | Cache/pool sweep interval |

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default SSH handshake timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default command execution timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default maximum retry attempts for SSH connection
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry delay in milliseconds
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Maximum retry delay cap
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const DEFAULT_KEEPALIVE_SECS: u64 = 30;

pub(crate) const DEFAULT_BASE_DIR: &str = "/home/streaming";

pub(crate) const DEFAULT_OWNER: &str = "streaming";

pub(crate) const DEFAULT_COOLDOWN_SECS: u64 = 5;

pub(crate) const DEFAULT_EXISTS_TTL_SECS: u64 = 30;

pub(crate) const DEFAULT_FOLDER_INFO_TTL_SECS: u64 = 15;

pub(crate) const DEFAULT_JANITOR_SECS: u64 = 60;

/// Subdirectories created under every user directory
pub(crate) const DEFAULT_USER_SUBDIRS: &[&str] = &["videos", "thumbnails"];

pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "MEDIAHOST_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "MEDIAHOST_COMMAND_TIMEOUT";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "MEDIAHOST_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "MEDIAHOST_RETRY_DELAY_MS";
pub(crate) const KEEPALIVE_ENV_VAR: &str = "MEDIAHOST_KEEPALIVE_SECS";
pub(crate) const COMPRESSION_ENV_VAR: &str = "MEDIAHOST_COMPRESSION";
pub(crate) const BASE_DIR_ENV_VAR: &str = "MEDIAHOST_BASE_DIR";
pub(crate) const OWNER_ENV_VAR: &str = "MEDIAHOST_OWNER";
pub(crate) const COOLDOWN_ENV_VAR: &str = "MEDIAHOST_COOLDOWN_SECS";
pub(crate) const EXISTS_TTL_ENV_VAR: &str = "MEDIAHOST_EXISTS_TTL_SECS";
pub(crate) const FOLDER_INFO_TTL_ENV_VAR: &str = "MEDIAHOST_FOLDER_INFO_TTL_SECS";
pub(crate) const JANITOR_ENV_VAR: &str = "MEDIAHOST_JANITOR_SECS";

/// Resolve a parseable value with priority: parameter -> env var -> default.
///
/// Unparseable environment values are ignored.
fn resolve<T: FromStr>(param: Option<T>, env_var: &str, default: T) -> T {
    if let Some(value) = param {
        return value;
    }

    if let Ok(raw) = env::var(env_var)
        && let Ok(value) = raw.trim().parse::<T>()
    {
        return value;
    }

    default
}

fn resolve_secs(param: Option<u64>, env_var: &str, default: u64) -> Duration {
    Duration::from_secs(resolve(param, env_var, default))
}

/// Like [`resolve_secs`], but a zero from any tier falls back to `default`.
///
/// Used for intervals and timeouts where zero would panic (`interval`) or
/// fail every operation immediately.
fn resolve_nonzero_secs(param: Option<u64>, env_var: &str, default: u64) -> Duration {
    let param = param.filter(|secs| *secs > 0);
    match resolve(param, env_var, default) {
        0 => Duration::from_secs(default),
        secs => Duration::from_secs(secs),
    }
}

pub(crate) fn resolve_connect_timeout(param: Option<u64>) -> Duration {
    resolve_nonzero_secs(param, CONNECT_TIMEOUT_ENV_VAR, DEFAULT_CONNECT_TIMEOUT_SECS)
}

pub(crate) fn resolve_command_timeout(param: Option<u64>) -> Duration {
    resolve_nonzero_secs(param, COMMAND_TIMEOUT_ENV_VAR, DEFAULT_COMMAND_TIMEOUT_SECS)
}

pub(crate) fn resolve_max_retries(param: Option<u32>) -> u32 {
    resolve(param, MAX_RETRIES_ENV_VAR, DEFAULT_MAX_RETRIES)
}

pub(crate) fn resolve_retry_delay(param: Option<u64>) -> Duration {
    Duration::from_millis(resolve(param, RETRY_DELAY_MS_ENV_VAR, DEFAULT_RETRY_DELAY_MS))
}

/// Resolve the compression setting with priority: parameter -> env var -> default (false)
pub(crate) fn resolve_compression(param: Option<bool>) -> bool {
    if let Some(compress) = param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    false
}

fn resolve_string(param: Option<String>, env_var: &str, default: &str) -> String {
    if let Some(value) = param {
        return value;
    }

    match env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Settings for the whole core: connection, provisioning and cache windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub keepalive_interval: Duration,
    pub compression: bool,
    /// Root of per-user directories, without trailing slash
    pub base_dir: String,
    /// Owner (user and group) applied to provisioned directories
    pub owner: String,
    pub user_subdirs: Vec<String>,
    pub dir_mode: String,
    pub file_mode: String,
    pub cooldown: Duration,
    pub exists_ttl: Duration,
    pub folder_info_ttl: Duration,
    pub janitor_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            compression: false,
            base_dir: DEFAULT_BASE_DIR.to_string(),
            owner: DEFAULT_OWNER.to_string(),
            user_subdirs: DEFAULT_USER_SUBDIRS.iter().map(|s| s.to_string()).collect(),
            dir_mode: "755".to_string(),
            file_mode: "644".to_string(),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            exists_ttl: Duration::from_secs(DEFAULT_EXISTS_TTL_SECS),
            folder_info_ttl: Duration::from_secs(DEFAULT_FOLDER_INFO_TTL_SECS),
            janitor_interval: Duration::from_secs(DEFAULT_JANITOR_SECS),
        }
    }
}

impl CoreConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let base_dir = resolve_string(None, BASE_DIR_ENV_VAR, DEFAULT_BASE_DIR);
        Self {
            connect_timeout: resolve_connect_timeout(None),
            command_timeout: resolve_command_timeout(None),
            max_retries: resolve_max_retries(None),
            retry_delay: resolve_retry_delay(None),
            keepalive_interval: resolve_nonzero_secs(None, KEEPALIVE_ENV_VAR, DEFAULT_KEEPALIVE_SECS),
            compression: resolve_compression(None),
            base_dir: base_dir.trim_end_matches('/').to_string(),
            owner: resolve_string(None, OWNER_ENV_VAR, DEFAULT_OWNER),
            cooldown: resolve_secs(None, COOLDOWN_ENV_VAR, DEFAULT_COOLDOWN_SECS),
            exists_ttl: resolve_secs(None, EXISTS_TTL_ENV_VAR, DEFAULT_EXISTS_TTL_SECS),
            folder_info_ttl: resolve_secs(
                None,
                FOLDER_INFO_TTL_ENV_VAR,
                DEFAULT_FOLDER_INFO_TTL_SECS,
            ),
            janitor_interval: resolve_nonzero_secs(None, JANITOR_ENV_VAR, DEFAULT_JANITOR_SECS),
            ..Self::default()
        }
    }
}
