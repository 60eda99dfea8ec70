use crate::error::{OciError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4730;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobServer {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl JobServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for JobServer {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadEncoding {
    #[default]
    Json,
}

/// Settings shared by job clients and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub servers: Vec<JobServer>,
    pub timeout_ms: u64,
    pub encoding: WorkloadEncoding,
    /// Log every worker loop iteration.
    pub debug: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            servers: vec![JobServer::default()],
            timeout_ms: DEFAULT_TIMEOUT_MS,
            encoding: WorkloadEncoding::Json,
            debug: false,
        }
    }
}

impl JobConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(OciError::Config(
                "at least one job server is required".to_string(),
            ));
        }
        if let Some(server) = self
            .servers
            .iter()
            .find(|s| s.host.trim().is_empty() || s.port == 0)
        {
            return Err(OciError::Config(format!(
                "invalid job server address {:?}",
                server.address()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(OciError::Config(
                "job timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Key identifying the server set, in declaration order.
    pub fn servers_key(&self) -> String {
        self.servers
            .iter()
            .map(JobServer::address)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Job adapters known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// In-process broker shared by every client and worker configured with
    /// the same servers.
    Local,
}

impl FromStr for AdapterKind {
    type Err = OciError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            other => Err(OciError::Config(format!("Unknown job adapter: {}", other))),
        }
    }
}
