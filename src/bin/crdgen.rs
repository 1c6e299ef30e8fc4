//! CRD YAML Generator
//!
//! Generates the Kubernetes CRD manifest for the MysqlCluster resource.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/all.yaml

use mysql_backup_operator::crd::generate_crds;

fn main() {
    for crd in generate_crds() {
        println!("---");
        print!("{}", crd);
    }
}
