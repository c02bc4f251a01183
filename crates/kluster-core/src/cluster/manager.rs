//! Create / Destroy / Get lifecycle
//!
//! Synchronous part of every call: validation, then persistence, then
//! dispatch. The provisioner work itself runs on the [`ProvisionExecutor`];
//! a successful return means the document change is durable, not that the
//! cluster exists.
//!
//! [`ProvisionExecutor`]: crate::executor::ProvisionExecutor

use super::state::{ClusterState, read_state, write_state};
use super::{ClusterConfig, ClusterError, ClusterRef, ProviderDocument, decode_document};
use crate::config::{ManagerConfig, OverwritePolicy, StoreSettings};
use crate::executor::{ExecutorHandle, Job, JobKind, ProvisionTask};
use crate::lock::{ClusterGuard, ClusterLocks};
use crate::provisioner::{ProvisionParams, Provisioner, ProvisionerRegistry};
use crate::store::ConfigStore;
use kluster_common::ClusterStatus;
use kluster_common::naming::{cluster_name_from_file, provider_prefix};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Entry point for cluster lifecycle operations
#[derive(Clone)]
pub struct ClusterManager {
    settings: StoreSettings,
    registry: ProvisionerRegistry,
    executor: ExecutorHandle,
    locks: ClusterLocks,
    config: ManagerConfig,
}

impl std::fmt::Debug for ClusterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterManager")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClusterManager {
    pub fn new(
        settings: StoreSettings,
        registry: ProvisionerRegistry,
        executor: ExecutorHandle,
        config: ManagerConfig,
    ) -> Self {
        Self {
            settings,
            registry,
            executor,
            locks: ClusterLocks::new(),
            config,
        }
    }

    /// Validate and persist `cluster`, then queue `init` + `setup`.
    ///
    /// Nothing is written if validation fails or no provisioner is
    /// registered for the provider.
    pub async fn create<C: ClusterConfig>(
        &self,
        cluster: &C,
    ) -> Result<ProvisionTask, ClusterError> {
        let id = cluster.cluster_ref();

        cluster
            .validate()
            .map_err(|report| ClusterError::Validation {
                cluster: id.clone(),
                report,
            })?;

        let store = self.handle(&id)?;
        let provisioner = self.resolve(&id)?;
        let guard = self.acquire(&id)?;

        let exists = store
            .check_config_exists()
            .await
            .map_err(|e| ClusterError::store(&id, "check", e))?;
        if exists {
            match self.config.overwrite {
                OverwritePolicy::Reject => {
                    return Err(ClusterError::AlreadyExists { cluster: id });
                }
                OverwritePolicy::Replace => {
                    warn!(cluster = %id, "Replacing existing cluster document");
                }
            }
        }

        store
            .create_config(&ProviderDocument(cluster))
            .await
            .map_err(|e| ClusterError::store(&id, "persist", e))?;
        info!(cluster = %id, key = %store.file_name(), "Cluster document persisted");

        let status = store.sibling(id.status_file());
        write_state(&status, &ClusterState::new(ClusterStatus::Persisted))
            .await
            .map_err(|e| ClusterError::store(&id, "record status of", e))?;

        self.dispatch(JobKind::Provision, id, provisioner, status, guard, None)
    }

    /// Queue `destroy` and remove the persisted document.
    ///
    /// Unknown names fail with `NotFound` before any provisioner is touched.
    /// The teardown job waits until the document is gone, so the cluster
    /// stays locked across the delete.
    pub async fn destroy<C: ClusterConfig>(
        &self,
        name: &str,
    ) -> Result<ProvisionTask, ClusterError> {
        let id = ClusterRef::new(C::PROVIDER, name);
        let store = self.handle(&id)?;

        self.ensure_exists(&id, &store).await?;

        let provisioner = self.resolve(&id)?;
        let guard = self.acquire(&id)?;

        let status = store.sibling(id.status_file());
        let (release, hold) = oneshot::channel();

        // Dispatch first: a crash before the delete leaves a stale document,
        // never an orphaned cluster without one.
        let task = self.dispatch(
            JobKind::Teardown,
            id.clone(),
            provisioner,
            status.clone(),
            guard,
            Some(hold),
        )?;

        // The job is parked on `hold`; dropping `release` on any early
        // return lets it run.
        let removing = ClusterState::new(ClusterStatus::Removing);
        if let Err(e) = write_state(&status, &removing).await {
            warn!(cluster = %id, error = %e, "Failed to record removing status");
        }

        store
            .delete_config()
            .await
            .map_err(|e| ClusterError::store(&id, "delete", e))?;
        info!(cluster = %id, "Cluster document removed");

        let _ = release.send(());
        Ok(task)
    }

    /// Read back the persisted configuration
    pub async fn get<C: ClusterConfig>(&self, name: &str) -> Result<C, ClusterError> {
        let id = ClusterRef::new(C::PROVIDER, name);
        let store = self.handle(&id)?;

        self.ensure_exists(&id, &store).await?;

        let bytes = store
            .get_config()
            .await
            .map_err(|e| ClusterError::store(&id, "read", e))?;

        decode_document(&bytes).map_err(|source| ClusterError::Decode {
            cluster: id,
            source,
        })
    }

    /// Last recorded lifecycle state.
    ///
    /// A document without a status record reports `persisted`.
    pub async fn status<C: ClusterConfig>(
        &self,
        name: &str,
    ) -> Result<ClusterState, ClusterError> {
        let id = ClusterRef::new(C::PROVIDER, name);
        let store = self.handle(&id)?;
        let status = store.sibling(id.status_file());

        if let Some(state) = read_state(&status)
            .await
            .map_err(|e| ClusterError::store(&id, "read status of", e))?
        {
            return Ok(state);
        }

        self.ensure_exists(&id, &store).await?;
        Ok(ClusterState::new(ClusterStatus::Persisted))
    }

    /// Names of the persisted clusters of one provider, sorted
    pub async fn list<C: ClusterConfig>(&self) -> Result<Vec<String>, ClusterError> {
        let prefix = provider_prefix(C::PROVIDER);
        let id = ClusterRef::new(C::PROVIDER, "*");
        let store = self.settings.handle(String::new());

        let files = store
            .list_configs(&prefix)
            .await
            .map_err(|e| ClusterError::store(&id, "list", e))?;

        Ok(files
            .iter()
            .filter_map(|file| cluster_name_from_file(C::PROVIDER, file))
            .collect())
    }

    /// Validated handle for the cluster's configuration document
    fn handle(&self, id: &ClusterRef) -> Result<ConfigStore, ClusterError> {
        let store = self.settings.handle(id.config_file());
        store
            .validate_config()
            .map_err(|e| ClusterError::store(id, "validate", e))?;
        Ok(store)
    }

    async fn ensure_exists(
        &self,
        id: &ClusterRef,
        store: &ConfigStore,
    ) -> Result<(), ClusterError> {
        let exists = store
            .check_config_exists()
            .await
            .map_err(|e| ClusterError::store(id, "check", e))?;
        if !exists {
            debug!(cluster = %id, "No persisted document");
            return Err(ClusterError::NotFound {
                cluster: id.clone(),
            });
        }
        Ok(())
    }

    fn resolve(&self, id: &ClusterRef) -> Result<Arc<dyn Provisioner>, ClusterError> {
        self.registry
            .get(&id.provider)
            .ok_or_else(|| ClusterError::UnsupportedProvisioner {
                cluster: id.clone(),
                provisioner: id.provider.clone(),
            })
    }

    fn acquire(&self, id: &ClusterRef) -> Result<ClusterGuard, ClusterError> {
        self.locks
            .try_acquire(&id.key())
            .ok_or_else(|| ClusterError::Busy {
                cluster: id.clone(),
            })
    }

    fn dispatch(
        &self,
        kind: JobKind,
        id: ClusterRef,
        provisioner: Arc<dyn Provisioner>,
        status: ConfigStore,
        guard: ClusterGuard,
        hold: Option<oneshot::Receiver<()>>,
    ) -> Result<ProvisionTask, ClusterError> {
        let job = Job {
            kind,
            params: ProvisionParams::for_cluster(&id.provider, &id.name),
            cluster: id,
            provisioner,
            status,
            guard,
            hold,
        };

        self.executor.submit(job).map_err(|job| {
            warn!(cluster = %job.cluster, kind = %job.kind, "Executor closed, job dropped");
            ClusterError::ExecutorClosed {
                cluster: job.cluster,
            }
        })
    }
}
