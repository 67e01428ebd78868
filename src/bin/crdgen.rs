//! # CRD Generator
//!
//! Prints the `GithubActionSecretsSync` and `GithubSyncRepo` CustomResourceDefinitions
//! as one multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use github_actions_sync_controller::crd::{GithubActionSecretsSync, GithubSyncRepo};
use kube::core::CustomResourceExt;

fn main() {
    let documents = [
        serde_yaml::to_string(&GithubActionSecretsSync::crd()),
        serde_yaml::to_string(&GithubSyncRepo::crd()),
    ];

    let mut rendered = Vec::with_capacity(documents.len());
    for document in documents {
        match document {
            Ok(yaml) => rendered.push(yaml),
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }

    print!("{}", rendered.join("---\n"));
}
