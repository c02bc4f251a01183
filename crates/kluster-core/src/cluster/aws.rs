//! AWS (kubespray-on-EC2) cluster record

use super::ClusterConfig;
use super::validate;
use serde::{Deserialize, Serialize};

/// Configuration of a self-managed Kubernetes cluster on EC2
///
/// Missing fields decode to their zero value. YAML and JSON keys are the
/// field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AwsCluster {
    #[garde(custom(validate::cluster_name))]
    pub clustername: String,
    #[garde(skip)]
    pub os: String,
    #[garde(skip)]
    pub aws_access_key_id: String,
    #[garde(skip)]
    pub aws_secret_access_key: String,
    #[garde(skip)]
    pub aws_ssh_keypair: String,
    #[garde(skip)]
    pub aws_default_region: String,
    #[garde(custom(validate::optional_cidr))]
    pub aws_vpc_cidr_block: String,
    /// Terraform list literal, e.g. `["10.250.192.0/20","10.250.208.0/20"]`
    #[garde(skip)]
    pub aws_cidr_subnets_private: String,
    #[garde(skip)]
    pub aws_cidr_subnets_public: String,
    #[garde(skip)]
    pub aws_bastion_size: String,
    #[garde(skip)]
    pub aws_kube_master_num: u32,
    #[garde(skip)]
    pub aws_kube_master_size: String,
    #[garde(skip)]
    pub aws_etcd_num: u32,
    #[garde(skip)]
    pub aws_etcd_size: String,
    #[garde(skip)]
    pub aws_kube_worker_num: u32,
    #[garde(skip)]
    pub aws_kube_worker_size: String,
    #[garde(skip)]
    pub aws_elb_api_port: u16,
    #[garde(skip)]
    pub k8s_secure_api_port: u16,
    #[garde(skip)]
    pub kube_insecure_apiserver_address: String,
    #[garde(skip)]
    pub kubeadm_enabled: bool,
    #[garde(skip)]
    pub kube_network_plugin: String,
}

impl ClusterConfig for AwsCluster {
    const PROVIDER: &'static str = "aws";

    fn cluster_name(&self) -> &str {
        &self.clustername
    }
}
