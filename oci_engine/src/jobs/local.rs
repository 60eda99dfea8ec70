use super::config::JobConfig;
use super::{
    decode_workload, encode_workload, Job, JobClient, JobFunction, JobHandle, JobMode,
    JobOutcome, JobWorker, Priority, JOB_NO_WORKER,
};
use crate::error::{OciError, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

static BROKERS: OnceLock<Mutex<HashMap<String, Arc<LocalBroker>>>> = OnceLock::new();

#[derive(Default)]
struct BrokerState {
    next_id: u64,
    queues: BTreeMap<Priority, VecDeque<Job>>,
    functions: HashMap<String, JobFunction>,
}

impl BrokerState {
    fn next_handle(&mut self) -> JobHandle {
        self.next_id += 1;
        JobHandle(format!("H:local:{}", self.next_id))
    }
}

/// In-process job queue: one FIFO per priority plus the registered
/// functions.
#[derive(Default)]
pub struct LocalBroker {
    state: Mutex<BrokerState>,
}

impl LocalBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The broker for `config`'s server set; clients and workers built from
    /// the same servers share it.
    pub fn shared(config: &JobConfig) -> Arc<Self> {
        let registry = BROKERS.get_or_init(|| Mutex::new(HashMap::new()));
        let mut brokers = registry.lock().unwrap_or_else(|poisoned| {
            log::error!("Job broker registry mutex poisoned");
            poisoned.into_inner()
        });
        Arc::clone(brokers.entry(config.servers_key()).or_default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BrokerState>> {
        self.state
            .lock()
            .map_err(|_| OciError::Internal("Job broker lock poisoned".to_string()))
    }

    /// Jobs waiting at every priority.
    pub fn queued(&self) -> Result<usize> {
        Ok(self.lock()?.queues.values().map(VecDeque::len).sum())
    }

    pub fn queued_at(&self, priority: Priority) -> Result<usize> {
        Ok(self
            .lock()?
            .queues
            .get(&priority)
            .map(VecDeque::len)
            .unwrap_or(0))
    }

    fn next_handle(&self) -> Result<JobHandle> {
        Ok(self.lock()?.next_handle())
    }

    /// Queues a background job. A job already waiting with the same function
    /// and unique key is reused instead of queued twice.
    fn enqueue(
        &self,
        function: &str,
        workload: String,
        unique: Option<&str>,
        priority: Priority,
    ) -> Result<JobHandle> {
        let mut state = self.lock()?;
        if let Some(key) = unique {
            let existing = state
                .queues
                .values()
                .flatten()
                .find(|job| job.function() == function && job.unique() == Some(key));
            if let Some(job) = existing {
                return Ok(job.handle().clone());
            }
        }

        let handle = state.next_handle();
        let job = Job::new(handle.clone(), function, workload, unique, priority);
        state.queues.entry(priority).or_default().push_back(job);
        Ok(handle)
    }

    fn function(&self, name: &str) -> Result<Option<JobFunction>> {
        Ok(self.lock()?.functions.get(name).cloned())
    }

    fn register(&self, name: &str, callback: JobFunction) -> Result<()> {
        self.lock()?.functions.insert(name.to_string(), callback);
        Ok(())
    }

    /// Removes the first job, highest priority first, that has a registered
    /// function.
    fn next_runnable(&self) -> Result<Option<(Job, JobFunction)>> {
        let mut state = self.lock()?;
        let BrokerState {
            queues, functions, ..
        } = &mut *state;

        for queue in queues.values_mut() {
            let found = queue
                .iter()
                .position(|job| functions.contains_key(job.function()));
            if let Some(idx) = found {
                if let Some(job) = queue.remove(idx) {
                    if let Some(callback) = functions.get(job.function()).cloned() {
                        return Ok(Some((job, callback)));
                    }
                }
            }
        }
        Ok(None)
    }
}

pub struct LocalClient {
    config: JobConfig,
    broker: Arc<LocalBroker>,
}

impl LocalClient {
    pub fn new(config: JobConfig) -> Self {
        let broker = LocalBroker::shared(&config);
        Self::with_broker(config, broker)
    }

    pub fn with_broker(config: JobConfig, broker: Arc<LocalBroker>) -> Self {
        Self { config, broker }
    }

    pub fn broker(&self) -> &Arc<LocalBroker> {
        &self.broker
    }
}

impl JobClient for LocalClient {
    fn submit(
        &self,
        function: &str,
        workload: &serde_json::Value,
        unique: Option<&str>,
        mode: JobMode,
        priority: Priority,
    ) -> Result<JobOutcome> {
        let payload = encode_workload(self.config.encoding, workload)?;

        match mode {
            JobMode::Background => {
                let handle = self.broker.enqueue(function, payload, unique, priority)?;
                log::debug!("Queued job {} for {} ({:?})", handle.as_str(), function, priority);
                Ok(JobOutcome::Queued { handle })
            }
            JobMode::Foreground => {
                let callback = self.broker.function(function)?.ok_or_else(|| OciError::Job {
                    message: format!("No worker registered for function {}", function),
                    code: JOB_NO_WORKER,
                })?;
                let handle = self.broker.next_handle()?;
                let job = Job::new(handle.clone(), function, payload, unique, priority);

                match callback(&job) {
                    Ok(data) => Ok(JobOutcome::Completed { handle, data }),
                    Err(e) => {
                        log::warn!("Job {} ({}) failed: {}", handle.as_str(), function, e);
                        Ok(JobOutcome::Failed {
                            handle,
                            message: e.to_string(),
                        })
                    }
                }
            }
        }
    }
}

pub struct LocalWorker {
    config: JobConfig,
    broker: Arc<LocalBroker>,
}

impl LocalWorker {
    pub fn new(config: JobConfig) -> Self {
        let broker = LocalBroker::shared(&config);
        Self::with_broker(config, broker)
    }

    pub fn with_broker(config: JobConfig, broker: Arc<LocalBroker>) -> Self {
        Self { config, broker }
    }

    pub fn broker(&self) -> &Arc<LocalBroker> {
        &self.broker
    }
}

impl JobWorker for LocalWorker {
    fn add_function(&self, function: &str, callback: JobFunction) -> Result<()> {
        log::debug!("Worker registered function {}", function);
        self.broker.register(function, callback)
    }

    fn notify_data(&self, job: &Job) -> Result<serde_json::Value> {
        decode_workload(self.config.encoding, job.workload())
    }

    fn work_once(&self) -> Result<bool> {
        let (job, callback) = match self.broker.next_runnable()? {
            Some(next) => next,
            None => return Ok(false),
        };

        // Run without holding the broker lock: callbacks may submit jobs.
        match callback(&job) {
            Ok(_) => {
                if self.config.debug {
                    log::debug!("Job {} ({}) completed", job.handle().as_str(), job.function());
                }
            }
            Err(e) => log::warn!(
                "Job {} ({}) failed: {}",
                job.handle().as_str(),
                job.function(),
                e
            ),
        }
        Ok(true)
    }

    /// Drains the queue, giving up once the configured timeout has elapsed.
    fn run_until_idle(&self) -> Result<usize> {
        let deadline = Instant::now() + Duration::from_millis(self.config.timeout_ms);
        let mut count = 0;
        while self.work_once()? {
            count += 1;
            if Instant::now() >= deadline {
                log::warn!(
                    "Worker stopped after {} ms with {} jobs still queued",
                    self.config.timeout_ms,
                    self.broker.queued()?
                );
                break;
            }
        }
        Ok(count)
    }
}
