use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Overrides the per-user configuration directory.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { app_name: default_app_name(), root_dir: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
    /// 0 disables the timeout: a request whose reply never arrives stays pending.
    #[serde(default)]
    pub request_timeout_ms: u64,
    /// Prefix of correlation ids; defaults to the process id.
    #[serde(default)]
    pub identity: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { socket_path: None, buffer: default_buffer(), request_timeout_ms: 0, identity: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_admin_addr")]
    pub addr: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: false, addr: default_admin_addr() }
    }
}

fn default_app_name() -> String { "prefs-proxy".to_string() }
fn default_buffer() -> usize { 64 }
fn default_log_format() -> String { "compact".to_string() }
fn default_admin_addr() -> String { "127.0.0.1:9188".to_string() }

pub const SOCKET_FILE_NAME: &str = "host.sock";

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (or `config.toml`); a missing file yields the defaults.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_missing_file(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.normalize_from_env()?;
        self.channel.normalize(self.storage.root()?)?;
        self.admin.validate()?;
        Ok(())
    }

    /// Only meaningful after `normalize_and_validate`.
    pub fn socket_path(&self) -> PathBuf {
        self.channel
            .socket_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SOCKET_FILE_NAME))
    }
}

fn is_missing_file(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(anyhow!("storage.app_name must not be empty"));
        }
        if let Ok(dir) = std::env::var("PREFS_ROOT_DIR") {
            if !dir.trim().is_empty() {
                self.root_dir = Some(PathBuf::from(dir));
            }
        }
        if self.root_dir.is_none() {
            let base = dirs::config_dir()
                .ok_or_else(|| anyhow!("no per-user config directory on this platform; set storage.root_dir"))?;
            self.root_dir = Some(base.join(&self.app_name));
        }
        Ok(())
    }

    pub fn root(&self) -> Result<PathBuf> {
        let root = self
            .root_dir
            .clone()
            .ok_or_else(|| anyhow!("storage.root_dir is not resolved"))?;
        if !root.is_absolute() {
            return Err(anyhow!("storage.root_dir must be absolute: {}", root.display()));
        }
        Ok(root)
    }
}

impl ChannelConfig {
    fn normalize(&mut self, root: PathBuf) -> Result<()> {
        if self.buffer == 0 {
            return Err(anyhow!("channel.buffer must be >= 1"));
        }
        if self.socket_path.is_none() {
            self.socket_path = Some(root.join(SOCKET_FILE_NAME));
        }
        if let Some(id) = &self.identity {
            if id.trim().is_empty() || id.contains('/') {
                return Err(anyhow!("channel.identity must be non-empty and contain no '/'"));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl AdminConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            self.addr
                .parse::<SocketAddr>()
                .map_err(|e| anyhow!("admin.addr {:?} is not a socket address: {e}", self.addr))?;
        }
        Ok(())
    }
}
