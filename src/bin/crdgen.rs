//! # CRD Generator
//!
//! Prints the `ArgoAddon` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > charts/capsule-argo-addon/crds/argoaddon.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The Capsule `Tenant` CRD is owned by Capsule and is not generated here.

use capsule_argo_addon::crd::ArgoAddon;
use kube::CustomResourceExt;

fn main() {
    let crd = ArgoAddon::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("# Change the ArgoAddon types in src/crd/addon.rs instead");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
