use cucumber::{given, then, when};
use ledger_testing_config::timeouts::mint_failure_timeout;
use ledger_testing_core::ledger::{Status, TokenInfo};
use tracing::info;

use crate::world::{AccountSlot, LedgerWorld, StepError, StepResult, expect_eq};

const NO_SUPPLY_KEY: &str = "TOKEN_HAS_NO_SUPPLY_KEY";
const FAILED_MINT_AMOUNT: u64 = 100;

async fn token_info(world: &mut LedgerWorld) -> Result<TokenInfo, StepError> {
    let token_id = world.token_id()?;
    Ok(world.client()?.token_info(token_id).await?)
}

#[when(regex = r"^I create a token named Test Token \(HTT\)$")]
async fn create_mintable_token(world: &mut LedgerWorld) -> StepResult {
    world.create_token(0, true).await?;
    Ok(())
}

#[when(regex = r"^I create a fixed supply token named Test Token \(HTT\) with (\d+) tokens$")]
async fn create_fixed_supply_token(world: &mut LedgerWorld, supply: u64) -> StepResult {
    world.create_token(supply, false).await?;
    Ok(())
}

#[given(regex = r"^A token named Test Token \(HTT\) with (\d+) tokens$")]
async fn token_with_supply(world: &mut LedgerWorld, supply: u64) -> StepResult {
    world.create_token(supply, false).await?;
    Ok(())
}

#[then(regex = r#"^The token has the name "([^"]*)"$"#)]
async fn token_has_name(world: &mut LedgerWorld, name: String) -> StepResult {
    expect_eq("token name", name, token_info(world).await?.name)
}

#[then(regex = r#"^The token has the symbol "([^"]*)"$"#)]
async fn token_has_symbol(world: &mut LedgerWorld, symbol: String) -> StepResult {
    expect_eq("token symbol", symbol, token_info(world).await?.symbol)
}

#[then(regex = r"^The token has (\d+) decimals$")]
async fn token_has_decimals(world: &mut LedgerWorld, decimals: u32) -> StepResult {
    expect_eq("token decimals", decimals, token_info(world).await?.decimals)
}

#[then(regex = r"^The token is owned by the account$")]
async fn token_is_owned_by_account(world: &mut LedgerWorld) -> StepResult {
    let owner = world.account_or_fixture(AccountSlot::First)?.id;
    let treasury = token_info(world).await?.treasury_account_id;
    expect_eq("token treasury", owner, treasury)
}

#[then(regex = r"^An attempt to mint (\d+) additional tokens succeeds$")]
async fn mint_succeeds(world: &mut LedgerWorld, amount: u64) -> StepResult {
    let receipt = world.mint(amount).await?;
    expect_eq("mint receipt status", Status::Success, receipt.status)?;
    expect_eq("total supply", amount, token_info(world).await?.total_supply)
}

#[then(regex = r"^The total supply of the token is (\d+)$")]
async fn total_supply_is(world: &mut LedgerWorld, supply: u64) -> StepResult {
    expect_eq("total supply", supply, token_info(world).await?.total_supply)
}

#[then(regex = r"^An attempt to mint tokens fails$")]
async fn mint_fails(world: &mut LedgerWorld) -> StepResult {
    let limit = mint_failure_timeout();
    let outcome = tokio::time::timeout(limit, world.mint(FAILED_MINT_AMOUNT))
        .await
        .map_err(|_| StepError::Timeout {
            what: "rejected mint",
            seconds: limit.as_secs(),
        })?;

    match outcome {
        Ok(receipt) => Err(StepError::Assertion {
            what: "mint without a supply key".to_owned(),
            expected: NO_SUPPLY_KEY.to_owned(),
            actual: receipt.status.to_string(),
        }),
        Err(err) if err.to_string().contains(NO_SUPPLY_KEY) => {
            info!(error = %err, "mint rejected as expected");
            Ok(())
        }
        Err(err) => Err(StepError::Assertion {
            what: "mint error".to_owned(),
            expected: format!("an error mentioning {NO_SUPPLY_KEY}"),
            actual: err.to_string(),
        }),
    }
}
