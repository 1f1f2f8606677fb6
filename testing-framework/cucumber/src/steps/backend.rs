use cucumber::given;

use crate::world::{LedgerWorld, StepResult, parse_backend};

#[given(expr = "the ledger backend is {string}")]
async fn ledger_backend_is(world: &mut LedgerWorld, backend: String) -> StepResult {
    world.set_backend(parse_backend(&backend)?)
}
