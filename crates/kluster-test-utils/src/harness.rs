//! A cluster manager over a temporary local store

use anyhow::Result;
use kluster_core::cluster::{AwsCluster, ClusterManager};
use kluster_core::config::{ManagerConfig, OverwritePolicy, StoreSettings};
use kluster_core::executor::{ExecutorHandle, ProvisionExecutor};
use kluster_core::provisioner::{Provisioner, ProvisionerRegistry};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Manager, its store directory and its executor, torn down together
pub struct TestHarness {
    pub manager: ClusterManager,
    executor: ExecutorHandle,
    worker: JoinHandle<()>,
    dir: TempDir,
}

impl TestHarness {
    /// Harness with the given provisioners registered by name
    pub fn new(provisioners: Vec<(&str, Arc<dyn Provisioner>)>) -> Result<Self> {
        Self::with_policy(provisioners, OverwritePolicy::Reject)
    }

    pub fn with_policy(
        provisioners: Vec<(&str, Arc<dyn Provisioner>)>,
        overwrite: OverwritePolicy,
    ) -> Result<Self> {
        let dir = TempDir::new()?;
        let registry = provisioners
            .into_iter()
            .fold(ProvisionerRegistry::builder(), |builder, (name, p)| {
                builder.register_arc(name, p)
            })
            .build();

        let (executor, worker) = ProvisionExecutor::spawn();
        let manager = ClusterManager::new(
            StoreSettings::local(dir.path().display().to_string()),
            registry,
            executor.clone(),
            ManagerConfig { overwrite },
        );

        Ok(Self {
            manager,
            executor,
            worker,
            dir,
        })
    }

    /// Directory backing the local store
    pub fn store_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Whether a document with this key is on disk
    pub fn has_file(&self, file_name: &str) -> bool {
        self.dir.path().join(file_name).exists()
    }

    /// Number of entries in the store directory
    pub fn file_count(&self) -> usize {
        std::fs::read_dir(self.dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Stop the executor and wait for in-flight jobs
    pub async fn shutdown(self) -> Result<()> {
        self.executor.shutdown();
        self.worker.await?;
        Ok(())
    }
}

/// The `demo` cluster from the getting-started guide
pub fn demo_aws_cluster() -> AwsCluster {
    AwsCluster {
        clustername: "demo".to_string(),
        os: "ubuntu".to_string(),
        aws_default_region: "us-west-2".to_string(),
        aws_ssh_keypair: "demo-key".to_string(),
        aws_vpc_cidr_block: "10.250.192.0/18".to_string(),
        aws_cidr_subnets_private: "[\"10.250.192.0/20\",\"10.250.208.0/20\"]".to_string(),
        aws_cidr_subnets_public: "[\"10.250.224.0/20\",\"10.250.240.0/20\"]".to_string(),
        aws_bastion_size: "t2.medium".to_string(),
        aws_kube_master_num: 1,
        aws_kube_master_size: "t2.medium".to_string(),
        aws_etcd_num: 1,
        aws_etcd_size: "t2.medium".to_string(),
        aws_kube_worker_num: 2,
        aws_kube_worker_size: "t2.medium".to_string(),
        aws_elb_api_port: 6443,
        k8s_secure_api_port: 6443,
        kube_insecure_apiserver_address: "0.0.0.0".to_string(),
        kubeadm_enabled: false,
        kube_network_plugin: "flannel".to_string(),
        ..AwsCluster::default()
    }
}
