//! Job submission and processing.
//!
//! Clients submit named functions with a JSON workload, in the foreground
//! (wait for the result) or the background (fire and forget), at three
//! priorities. Workers register functions and drain queued jobs. Adapters
//! are a closed set picked from configuration.

pub mod config;
pub mod local;

pub use config::{AdapterKind, JobConfig, JobServer, WorkloadEncoding};
pub use local::{LocalBroker, LocalClient, LocalWorker};

use crate::error::{OciError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// No worker has registered the submitted function.
pub const JOB_NO_WORKER: i32 = 1;
/// The workload could not be encoded or decoded.
pub const JOB_BAD_WORKLOAD: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    Background,
    Foreground,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Background job accepted by the broker.
    Queued { handle: JobHandle },
    Completed {
        handle: JobHandle,
        data: serde_json::Value,
    },
    Failed { handle: JobHandle, message: String },
}

impl JobOutcome {
    pub fn handle(&self) -> &JobHandle {
        match self {
            JobOutcome::Queued { handle }
            | JobOutcome::Completed { handle, .. }
            | JobOutcome::Failed { handle, .. } => handle,
        }
    }
}

/// A unit of work as seen by a worker function.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    handle: JobHandle,
    function: String,
    workload: String,
    unique: Option<String>,
    priority: Priority,
}

impl Job {
    pub(crate) fn new(
        handle: JobHandle,
        function: &str,
        workload: String,
        unique: Option<&str>,
        priority: Priority,
    ) -> Self {
        Self {
            handle,
            function: function.to_string(),
            workload,
            unique: unique.map(str::to_string),
            priority,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Encoded workload, as submitted.
    pub fn workload(&self) -> &str {
        &self.workload
    }

    pub fn unique(&self) -> Option<&str> {
        self.unique.as_deref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

pub type JobFunction = Arc<dyn Fn(&Job) -> Result<serde_json::Value> + Send + Sync>;

pub(crate) fn encode_workload(
    encoding: WorkloadEncoding,
    data: &serde_json::Value,
) -> Result<String> {
    match encoding {
        WorkloadEncoding::Json => serde_json::to_string(data).map_err(|e| OciError::Job {
            message: format!("Failed to encode workload: {}", e),
            code: JOB_BAD_WORKLOAD,
        }),
    }
}

pub(crate) fn decode_workload(encoding: WorkloadEncoding, raw: &str) -> Result<serde_json::Value> {
    match encoding {
        WorkloadEncoding::Json => serde_json::from_str(raw).map_err(|e| OciError::Job {
            message: format!("Failed to decode workload: {}", e),
            code: JOB_BAD_WORKLOAD,
        }),
    }
}

/// Submits jobs to workers.
pub trait JobClient {
    fn submit(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
        mode: JobMode,
        priority: Priority,
    ) -> Result<JobOutcome>;

    fn do_background(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
    ) -> Result<JobOutcome> {
        self.submit(function, workload, unique, JobMode::Background, Priority::Normal)
    }

    fn do_high_background(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
    ) -> Result<JobOutcome> {
        self.submit(function, workload, unique, JobMode::Background, Priority::High)
    }

    fn do_low_background(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
    ) -> Result<JobOutcome> {
        self.submit(function, workload, unique, JobMode::Background, Priority::Low)
    }

    fn do_task(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
    ) -> Result<JobOutcome> {
        self.submit(function, workload, unique, JobMode::Foreground, Priority::Normal)
    }

    fn do_high_task(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
    ) -> Result<JobOutcome> {
        self.submit(function, workload, unique, JobMode::Foreground, Priority::High)
    }

    fn do_low_task(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
    ) -> Result<JobOutcome> {
        self.submit(function, workload, unique, JobMode::Foreground, Priority::Low)
    }
}

/// Processes jobs for the functions it registered.
pub trait JobWorker {
    fn add_function(&self, function: &str, callback: JobFunction) -> Result<()>;

    /// Decoded workload of `job`.
    fn notify_data(&self, job: &Job) -> Result<serde_json::Value>;

    /// Runs at most one queued job. `Ok(false)` when nothing was runnable.
    fn work_once(&self) -> Result<bool>;

    /// Runs jobs until none is left, returning how many ran.
    fn run_until_idle(&self) -> Result<usize> {
        let mut count = 0;
        while self.work_once()? {
            count += 1;
        }
        Ok(count)
    }
}

/// Client adapter selected by name.
pub enum JobClientAdapter {
    Local(LocalClient),
}

impl JobClientAdapter {
    pub fn from_config(adapter: &str, config: JobConfig) -> Result<Self> {
        config.validate()?;
        match adapter.parse::<AdapterKind>()? {
            AdapterKind::Local => Ok(Self::Local(LocalClient::new(config))),
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::Local(_) => AdapterKind::Local,
        }
    }
}

impl JobClient for JobClientAdapter {
    fn submit(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
        mode: JobMode,
        priority: Priority,
    ) -> Result<JobOutcome> {
        match self {
            Self::Local(client) => client.submit(function, workload, unique, mode, priority),
        }
    }
}

/// Worker adapter selected by name.
pub enum JobWorkerAdapter {
    Local(LocalWorker),
}

impl JobWorkerAdapter {
    pub fn from_config(adapter: &str, config: JobConfig) -> Result<Self> {
        config.validate()?;
        match adapter.parse::<AdapterKind>()? {
            AdapterKind::Local => Ok(Self::Local(LocalWorker::new(config))),
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::Local(_) => AdapterKind::Local,
        }
    }
}

impl JobWorker for JobWorkerAdapter {
    fn add_function(&self, function: &str, callback: JobFunction) -> Result<()> {
        match self {
            Self::Local(worker) => worker.add_function(function, callback),
        }
    }

    fn notify_data(&self, job: &Job) -> Result<serde_json::Value> {
        match self {
            Self::Local(worker) => worker.notify_data(job),
        }
    }

    fn work_once(&self) -> Result<bool> {
        match self {
            Self::Local(worker) => worker.work_once(),
        }
    }

    fn run_until_idle(&self) -> Result<usize> {
        match self {
            Self::Local(worker) => worker.run_until_idle(),
        }
    }
}
