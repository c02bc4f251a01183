//! EKS (managed control plane) cluster record

use super::ClusterConfig;
use super::validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, garde::Validate)]
#[serde(default, deny_unknown_fields)]
pub struct EksCluster {
    #[garde(custom(validate::cluster_name))]
    pub clustername: String,
    #[garde(skip)]
    pub aws_region: String,
    #[garde(skip)]
    pub node_instance_type: String,
    #[garde(range(min = 1))]
    pub desired_capacity: u32,
    #[garde(skip)]
    pub autoscaling_group_min_size: u32,
    #[garde(skip)]
    pub autoscaling_group_max_size: u32,
    /// Path of the SSH public key uploaded for worker nodes
    #[garde(skip)]
    pub key_file_path: String,
}

impl ClusterConfig for EksCluster {
    const PROVIDER: &'static str = "eks";

    fn cluster_name(&self) -> &str {
        &self.clustername
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[test]
    fn requires_capacity() {
        let cluster = EksCluster {
            clustername: "demo".to_string(),
            ..Default::default()
        };
        assert!(cluster.validate().is_err());

        let cluster = EksCluster {
            desired_capacity: 2,
            ..cluster
        };
        assert!(cluster.validate().is_ok());
    }

    #[test]
    fn document_key_is_eks() {
        let cluster = EksCluster {
            clustername: "demo".to_string(),
            desired_capacity: 1,
            ..Default::default()
        };
        let yaml = super::super::encode_document(&cluster).unwrap();
        assert!(yaml.starts_with("eks:"));
    }
}
