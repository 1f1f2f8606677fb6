use std::path::PathBuf;

use cucumber::World as _;
use ledger_cucumber::{LedgerWorld, StepError, parse_backend};
use ledger_testing_config::{LedgerNetwork, constants::DEFAULT_FEATURES_DIR};
use ledger_testing_env as tf_env;

/// Feature files shipped with the workspace.
#[must_use]
pub fn features_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(DEFAULT_FEATURES_DIR)
}

/// Backend named by `LEDGER_BACKEND`, or the local ledger when unset.
pub fn backend_from_env() -> Result<LedgerNetwork, StepError> {
    let raw = tf_env::ledger_backend();
    if raw.is_none() {
        println!("'LEDGER_BACKEND' not set, defaulting to the local ledger");
    }
    backend_from(raw.as_deref())
}

/// An unrecognised name is an error rather than a silent local run.
pub fn backend_from(raw: Option<&str>) -> Result<LedgerNetwork, StepError> {
    raw.map_or(Ok(LedgerNetwork::Local), parse_backend)
}

pub async fn run(backend: LedgerNetwork) {
    LedgerWorld::cucumber()
        .with_default_cli()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .before(move |_feature, _rule, _scenario, world| {
            Box::pin(async move {
                if let Err(e) = world.set_backend(backend) {
                    panic!("Failed to set backend: {e}");
                }
            })
        })
        .run_and_exit(features_path())
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_backend_means_local() {
        assert_eq!(backend_from(None).unwrap(), LedgerNetwork::Local);
    }

    #[test]
    fn known_backends_are_selected() {
        assert_eq!(backend_from(Some("previewnet")).unwrap(), LedgerNetwork::Previewnet);
        assert_eq!(backend_from(Some(" TESTNET ")).unwrap(), LedgerNetwork::Testnet);
    }

    #[test]
    fn misspelled_backend_is_rejected() {
        let err = backend_from(Some("tesnet")).unwrap_err();
        assert!(matches!(err, StepError::UnsupportedBackend { value } if value == "tesnet"));
    }
}
