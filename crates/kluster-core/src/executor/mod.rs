//! Background execution of provisioner capabilities
//!
//! Lifecycle calls return as soon as the document is persisted. The long
//! running `init`/`setup`/`destroy` work is queued here and run by a worker
//! loop on the runtime. Outcomes are written to the cluster's status sidecar
//! and published to the [`ProvisionTask`] handle; they never flow back
//! through the lifecycle call that queued them.

use crate::cluster::{ClusterRef, ClusterState};
use crate::cluster::state::{clear_state, write_state};
use crate::lock::ClusterGuard;
use crate::provisioner::{Capability, ProvisionParams, Provisioner};
use crate::store::ConfigStore;
use anyhow::{Context, Result};
use kluster_common::ClusterStatus;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a job does with its provisioner
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    /// `init` then `setup`
    Provision,
    /// `destroy`
    Teardown,
}

/// Progress of one queued job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed(String),
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// One unit of background work
pub(crate) struct Job {
    pub kind: JobKind,
    pub cluster: ClusterRef,
    pub provisioner: Arc<dyn Provisioner>,
    pub params: ProvisionParams,
    /// Status sidecar of the cluster
    pub status: ConfigStore,
    /// Held until the job finishes so lifecycle calls see the cluster as busy
    pub guard: ClusterGuard,
    /// The job parks here until the submitter resolves or drops the sender
    pub hold: Option<oneshot::Receiver<()>>,
}

struct QueuedJob {
    job: Job,
    state: watch::Sender<TaskState>,
}

/// Handle to a queued job
#[derive(Debug, Clone)]
pub struct ProvisionTask {
    cluster: ClusterRef,
    kind: JobKind,
    state: watch::Receiver<TaskState>,
}

impl ProvisionTask {
    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Current state without waiting
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Wait until the job has finished.
    ///
    /// If the executor goes away first, the last published state is returned.
    pub async fn wait(&mut self) -> TaskState {
        if let Ok(state) = self.state.wait_for(TaskState::is_finished).await {
            return state.clone();
        }
        self.state.borrow().clone()
    }
}

/// Sending side of the executor queue
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::UnboundedSender<QueuedJob>,
    shutdown: CancellationToken,
}

impl fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ExecutorHandle {
    /// Queue a job; gives the job back if the executor is not running
    pub(crate) fn submit(&self, job: Job) -> Result<ProvisionTask, Box<Job>> {
        let (state, rx) = watch::channel(TaskState::Queued);
        let task = ProvisionTask {
            cluster: job.cluster.clone(),
            kind: job.kind,
            state: rx,
        };

        if self.shutdown.is_cancelled() {
            return Err(Box::new(job));
        }
        self.tx
            .send(QueuedJob { job, state })
            .map(|()| task)
            .map_err(|mpsc::error::SendError(queued)| Box::new(queued.job))
    }

    /// Stop accepting jobs; jobs already queued still run
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }
}

/// Worker that runs queued jobs, each on its own task
pub struct ProvisionExecutor {
    rx: mpsc::UnboundedReceiver<QueuedJob>,
    shutdown: CancellationToken,
    running: JoinSet<()>,
}

impl ProvisionExecutor {
    /// Create an executor and the handle that feeds it
    pub fn new() -> (Self, ExecutorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let executor = Self {
            rx,
            shutdown: shutdown.clone(),
            running: JoinSet::new(),
        };
        (executor, ExecutorHandle { tx, shutdown })
    }

    /// Create an executor and spawn its worker loop on the current runtime
    pub fn spawn() -> (ExecutorHandle, JoinHandle<()>) {
        let (executor, handle) = Self::new();
        let worker = tokio::spawn(executor.run());
        (handle, worker)
    }

    /// Run the worker loop until shutdown or until every handle is dropped.
    ///
    /// In-flight jobs are awaited before returning.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                msg = self.rx.recv() => {
                    match msg {
                        Some(QueuedJob { job, state }) => {
                            debug!(cluster = %job.cluster, kind = %job.kind, "Job queued");
                            self.running.spawn(run_job(job, state));
                        }
                        None => break,
                    }
                }
                () = self.shutdown.cancelled() => break,
                Some(joined) = self.running.join_next(), if !self.running.is_empty() => {
                    log_join(joined);
                }
            }
        }
        info!("Provision executor shutting down");

        // Jobs sent before shutdown still run
        self.rx.close();
        while let Some(QueuedJob { job, state }) = self.rx.recv().await {
            self.running.spawn(run_job(job, state));
        }

        if !self.running.is_empty() {
            info!(count = self.running.len(), "Waiting for in-flight jobs");
        }
        while let Some(joined) = self.running.join_next().await {
            log_join(joined);
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Provision job aborted");
    }
}

async fn run_job(job: Job, state: watch::Sender<TaskState>) {
    let Job {
        kind,
        cluster,
        provisioner,
        params,
        status,
        guard,
        hold,
    } = job;

    if let Some(hold) = hold {
        let _ = hold.await;
    }
    state.send_replace(TaskState::Running);

    let outcome = match kind {
        JobKind::Provision => provision(&cluster, provisioner.as_ref(), &params, &status).await,
        JobKind::Teardown => teardown(&cluster, provisioner.as_ref(), &params, &status).await,
    };

    let final_state = match outcome {
        Ok(()) => TaskState::Succeeded,
        Err(message) => TaskState::Failed(message),
    };

    // Release the cluster before observers wake up
    drop(guard);
    state.send_replace(final_state);
}

async fn provision(
    cluster: &ClusterRef,
    provisioner: &dyn Provisioner,
    params: &ProvisionParams,
    status: &ConfigStore,
) -> Result<(), String> {
    record(status, ClusterState::new(ClusterStatus::Provisioning)).await;
    info!(cluster = %cluster, "Provisioning started");

    let result: Result<()> = async {
        provisioner
            .init(Some(params))
            .await
            .with_context(|| format!("{} failed", Capability::Init))?;
        provisioner
            .setup(Some(params))
            .await
            .with_context(|| format!("{} failed", Capability::Setup))
    }
    .await;

    match result {
        Ok(()) => {
            info!(cluster = %cluster, "Cluster ready");
            record(status, ClusterState::new(ClusterStatus::Ready)).await;
            Ok(())
        }
        Err(e) => {
            let message = format!("{e:#}");
            error!(cluster = %cluster, error = %message, "Provisioning failed");
            record(status, ClusterState::failed(ClusterStatus::Failed, &message)).await;
            Err(message)
        }
    }
}

async fn teardown(
    cluster: &ClusterRef,
    provisioner: &dyn Provisioner,
    params: &ProvisionParams,
    status: &ConfigStore,
) -> Result<(), String> {
    info!(cluster = %cluster, "Teardown started");

    match provisioner
        .destroy(Some(params))
        .await
        .with_context(|| format!("{} failed", Capability::Destroy))
    {
        Ok(()) => {
            if let Err(e) = clear_state(status).await {
                warn!(cluster = %cluster, error = %e, "Failed to remove status record");
            }
            info!(cluster = %cluster, "Cluster destroyed");
            Ok(())
        }
        Err(e) => {
            let message = format!("{e:#}");
            error!(cluster = %cluster, error = %message, "Teardown failed");
            record(status, ClusterState::failed(ClusterStatus::DestroyFailed, &message)).await;
            Err(message)
        }
    }
}

/// Status writes are best effort; the task handle still reports the outcome
async fn record(store: &ConfigStore, state: ClusterState) {
    if let Err(e) = write_state(store, &state).await {
        warn!(
            key = %store.file_name(),
            status = %state.status,
            error = %e,
            "Failed to record cluster status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::state::read_state;
    use crate::lock::ClusterLocks;
    use crate::store::StorageKind;
    use crate::testing::RecordingProvisioner;
    use tempfile::TempDir;

    fn job(
        kind: JobKind,
        provisioner: Arc<dyn Provisioner>,
        dir: &TempDir,
        locks: &ClusterLocks,
    ) -> Job {
        let cluster = ClusterRef::new("aws", "demo");
        Job {
            kind,
            params: ProvisionParams::for_cluster("aws", "demo"),
            status: ConfigStore::new(
                StorageKind::Local,
                cluster.status_file(),
                dir.path().display().to_string(),
                "",
            ),
            guard: locks.try_acquire(&cluster.key()).unwrap(),
            hold: None,
            cluster,
            provisioner,
        }
    }

    #[tokio::test]
    async fn test_provision_runs_init_then_setup() {
        let dir = TempDir::new().unwrap();
        let locks = ClusterLocks::new();
        let provisioner = Arc::new(RecordingProvisioner::new());
        let (handle, worker) = ProvisionExecutor::spawn();

        let job = job(JobKind::Provision, provisioner.clone(), &dir, &locks);
        let status = job.status.clone();
        let mut task = handle.submit(job).map_err(|_| ()).unwrap();

        assert_eq!(task.wait().await, TaskState::Succeeded);
        assert_eq!(
            provisioner.calls(),
            vec![Capability::Init, Capability::Setup]
        );
        assert_eq!(
            read_state(&status).await.unwrap().unwrap().status,
            ClusterStatus::Ready
        );
        assert!(!locks.is_locked("aws-demo"));

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_init_skips_setup_and_records_failure() {
        let dir = TempDir::new().unwrap();
        let locks = ClusterLocks::new();
        let provisioner = Arc::new(RecordingProvisioner::failing(Capability::Init));
        let (handle, worker) = ProvisionExecutor::spawn();

        let job = job(JobKind::Provision, provisioner.clone(), &dir, &locks);
        let status = job.status.clone();
        let mut task = handle.submit(job).map_err(|_| ()).unwrap();

        let TaskState::Failed(message) = task.wait().await else {
            panic!("expected failure");
        };
        assert!(message.contains("init failed"), "{message}");
        assert_eq!(provisioner.calls(), vec![Capability::Init]);

        let state = read_state(&status).await.unwrap().unwrap();
        assert_eq!(state.status, ClusterStatus::Failed);
        assert_eq!(state.message.as_deref(), Some(message.as_str()));

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_clears_status() {
        let dir = TempDir::new().unwrap();
        let locks = ClusterLocks::new();
        let provisioner = Arc::new(RecordingProvisioner::new());
        let (handle, worker) = ProvisionExecutor::spawn();

        let job = job(JobKind::Teardown, provisioner.clone(), &dir, &locks);
        let status = job.status.clone();
        write_state(&status, &ClusterState::new(ClusterStatus::Removing))
            .await
            .unwrap();

        let mut task = handle.submit(job).map_err(|_| ()).unwrap();
        assert_eq!(task.kind(), JobKind::Teardown);
        assert_eq!(task.wait().await, TaskState::Succeeded);
        assert_eq!(provisioner.calls(), vec![Capability::Destroy]);
        assert_eq!(read_state(&status).await.unwrap(), None);

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_held_job_keeps_cluster_locked() {
        let dir = TempDir::new().unwrap();
        let locks = ClusterLocks::new();
        let provisioner = Arc::new(RecordingProvisioner::new());
        let (handle, worker) = ProvisionExecutor::spawn();

        let (release, hold) = oneshot::channel();
        let mut job = job(JobKind::Teardown, provisioner.clone(), &dir, &locks);
        job.hold = Some(hold);
        let mut task = handle.submit(job).map_err(|_| ()).unwrap();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(task.state(), TaskState::Queued);
        assert!(provisioner.calls().is_empty());
        assert!(locks.is_locked("aws-demo"));

        release.send(()).unwrap();
        assert_eq!(task.wait().await, TaskState::Succeeded);
        assert_eq!(provisioner.calls(), vec![Capability::Destroy]);
        assert!(!locks.is_locked("aws-demo"));

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_returns_job() {
        let dir = TempDir::new().unwrap();
        let locks = ClusterLocks::new();
        let (handle, worker) = ProvisionExecutor::spawn();
        handle.shutdown();
        worker.await.unwrap();

        assert!(handle.is_closed());
        let job = job(
            JobKind::Provision,
            Arc::new(RecordingProvisioner::new()),
            &dir,
            &locks,
        );
        let returned = handle.submit(job).err().unwrap();
        assert_eq!(returned.cluster.name, "demo");
    }
}
