use cucumber::{given, then};

use crate::world::{AccountSlot, LedgerWorld, StepResult};

/// The first account pays for everything the scenario submits.
async fn first_account_as_operator(world: &mut LedgerWorld, hbars: u64) -> StepResult {
    world.use_as_operator(AccountSlot::First).await?;
    world.assert_hbars_above(AccountSlot::First, hbars).await
}

#[given(regex = r"^a first account with more than (\d+) hbars$")]
async fn first_account_with_hbars(world: &mut LedgerWorld, hbars: u64) -> StepResult {
    first_account_as_operator(world, hbars).await
}

#[given(regex = r"^A second account with more than (\d+) hbars$")]
async fn second_account_with_hbars(world: &mut LedgerWorld, hbars: u64) -> StepResult {
    world.introduce_account(AccountSlot::Second).await?;
    world.assert_hbars_above(AccountSlot::Second, hbars).await
}

#[given(regex = r"^A Hedera account with more than (\d+) hbar$")]
async fn hedera_account_with_hbar(world: &mut LedgerWorld, hbars: u64) -> StepResult {
    first_account_as_operator(world, hbars).await
}

#[given(regex = r"^A first hedera account with more than (\d+) hbar$")]
async fn first_hedera_account(world: &mut LedgerWorld, hbars: u64) -> StepResult {
    first_account_as_operator(world, hbars).await
}

#[given(regex = r"^A second Hedera account$")]
async fn second_hedera_account(world: &mut LedgerWorld) -> StepResult {
    world.introduce_account(AccountSlot::Second).await?;
    Ok(())
}

/// Creates a mintable token on first use so the other accounts can be
/// funded from the treasury.
#[given(regex = r"^A first hedera account with more than (\d+) hbar and (\d+) HTT tokens$")]
async fn first_hedera_account_with_tokens(
    world: &mut LedgerWorld,
    hbars: u64,
    tokens: u64,
) -> StepResult {
    first_account_as_operator(world, hbars).await?;

    if world.token_id.is_none() {
        world.create_token(tokens, true).await?;
    }
    world
        .arrange_token_balance(AccountSlot::First, tokens)
        .await?;
    world.assert_token_balance(AccountSlot::First, tokens).await
}

#[given(regex = r"^A (second|third|fourth) Hedera account with (\d+) hbar and (\d+) HTT tokens$")]
async fn nth_hedera_account_with_tokens(
    world: &mut LedgerWorld,
    slot: AccountSlot,
    hbars: u64,
    tokens: u64,
) -> StepResult {
    world.introduce_account(slot).await?;
    world.assert_hbars_at_least(slot, hbars).await?;
    world.arrange_token_balance(slot, tokens).await?;
    world.assert_token_balance(slot, tokens).await
}

#[given(regex = r"^The (first|second|third|fourth) account holds (\d+) HTT tokens$")]
async fn account_is_given_tokens(world: &mut LedgerWorld, slot: AccountSlot, tokens: u64) -> StepResult {
    world.arrange_token_balance(slot, tokens).await?;
    world.assert_token_balance(slot, tokens).await
}

#[then(regex = r"^The (first|second|third|fourth) account holds (\d+) HTT tokens$")]
async fn account_holds_tokens(world: &mut LedgerWorld, slot: AccountSlot, tokens: u64) -> StepResult {
    world.assert_token_balance(slot, tokens).await
}

#[then(regex = r"^The first account has paid for the transaction fee$")]
async fn account_paid_fee(world: &mut LedgerWorld) -> StepResult {
    world.assert_paid_fee(AccountSlot::First).await
}
