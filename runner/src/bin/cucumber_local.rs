use ledger_runner::{
    cucumber::run,
    defaults::{init_logging_defaults, init_tracing},
};
use ledger_testing_config::LedgerNetwork;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging_defaults();
    init_tracing();

    run(LedgerNetwork::Local).await;
}
