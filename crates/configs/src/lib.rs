use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub invoices: InvoicesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: Some(4),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Which key-value backend holds the record collections.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Replit,
    File,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replit" => Ok(Self::Replit),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown storage backend `{other}` (expected replit|file|memory)")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Left empty to pick `replit` when a URL is configured, `file` otherwise.
    #[serde(default)]
    pub backend: Option<StorageBackend>,
    #[serde(default)]
    pub replit_db_url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: None,
            replit_db_url: None,
            data_dir: default_data_dir(),
            bulk_timeout_secs: default_bulk_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicesConfig {
    #[serde(default = "default_invoices_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for InvoicesConfig {
    fn default() -> Self {
        Self { dir: default_invoices_dir(), url_prefix: default_url_prefix() }
    }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }
fn default_max_body_bytes() -> usize { 50 * 1024 * 1024 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_bulk_timeout() -> u64 { 10 }
fn default_request_timeout() -> u64 { 10 }
fn default_invoices_dir() -> PathBuf { PathBuf::from("Invoices") }
fn default_url_prefix() -> String { "/Invoices".into() }

/// Load the TOML file named by `CONFIG_PATH` (default `config.toml`).
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// File (if present) + environment overrides, normalized and validated.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                // 没有配置文件时完全依赖环境变量
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                _ => return Err(e),
            },
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Apply environment-style overrides through `lookup` so tests can feed a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| anyhow!("PORT must be a port number, got `{port}`"))?;
        }
        if let Some(w) = lookup("TOKIO_WORKER_THREADS") {
            self.server.worker_threads = Some(parse_number("TOKIO_WORKER_THREADS", &w)?);
        }
        if let Some(n) = lookup("MAX_BODY_BYTES") {
            self.server.max_body_bytes = parse_number("MAX_BODY_BYTES", &n)?;
        }
        if let Some(backend) = lookup("STORAGE_BACKEND") {
            self.storage.backend = Some(backend.parse()?);
        }
        if let Some(url) = lookup("REPLIT_DB_URL") {
            self.storage.replit_db_url = Some(url);
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("BULK_TIMEOUT_SECS") {
            self.storage.bulk_timeout_secs = parse_number("BULK_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("STORAGE_REQUEST_TIMEOUT_SECS") {
            self.storage.request_timeout_secs = parse_number("STORAGE_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(dir) = lookup("INVOICES_DIR") {
            self.invoices.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.normalize()?;
        self.invoices.normalize();
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| anyhow!("{key} must be a non-negative integer, got `{raw}`"))
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(w) if w > 0 => {}
            _ => self.worker_threads = Some(4),
        }
        if self.max_body_bytes == 0 {
            self.max_body_bytes = default_max_body_bytes();
        }
        Ok(())
    }
}

impl StorageConfig {
    fn normalize(&mut self) -> Result<()> {
        if let Some(url) = &self.replit_db_url {
            if url.trim().is_empty() {
                self.replit_db_url = None;
            }
        }
        if self.backend.is_none() {
            self.backend = Some(if self.replit_db_url.is_some() { StorageBackend::Replit } else { StorageBackend::File });
        }
        if self.backend == Some(StorageBackend::Replit) {
            let url = self
                .replit_db_url
                .as_deref()
                .ok_or_else(|| anyhow!("storage.backend = replit needs storage.replit_db_url or REPLIT_DB_URL"))?;
            let lower = url.to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(anyhow!("storage.replit_db_url must start with http:// or https://"));
            }
        }
        if self.bulk_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(anyhow!("storage timeouts must be positive seconds"));
        }
        Ok(())
    }

    /// Backend after normalization; `file` if normalization never ran.
    pub fn resolved_backend(&self) -> StorageBackend {
        self.backend.unwrap_or(StorageBackend::File)
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl InvoicesConfig {
    fn normalize(&mut self) {
        let trimmed = self.url_prefix.trim().trim_end_matches('/');
        self.url_prefix = if trimmed.is_empty() {
            default_url_prefix()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
    }
}
