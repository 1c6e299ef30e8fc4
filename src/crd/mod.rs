//! Custom Resource Definitions for the MySQL Backup Operator

mod mysql_cluster;

pub use mysql_cluster::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Vec<String> {
    vec![serde_yaml::to_string(&MysqlCluster::crd()).unwrap()]
}
