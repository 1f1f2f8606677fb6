use cucumber::World as _;
use ledger_cucumber::LedgerWorld;
use ledger_testing_config::LedgerNetwork;

const FEATURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../runner/cucumber/features");

#[tokio::main]
async fn main() {
    LedgerWorld::cucumber()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .before(|_feature, _rule, _scenario, world| {
            Box::pin(async move {
                if let Err(e) = world.set_backend(LedgerNetwork::Local) {
                    panic!("Failed to select the local backend: {e}");
                }
            })
        })
        .run_and_exit(FEATURES)
        .await;
}
