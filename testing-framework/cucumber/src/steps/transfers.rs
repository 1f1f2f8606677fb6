use cucumber::{then, when};
use ledger_testing_core::ledger::{Transaction, TransactionId, Transfer};
use tracing::info;

use crate::world::{AccountSlot, LedgerWorld, StepError, StepResult, expect_eq, signed_amount};

#[when(regex = r"^The first account creates a transaction to transfer (\d+) HTT tokens to the second account$")]
async fn first_sends_to_second(world: &mut LedgerWorld, amount: u64) -> StepResult {
    let token_id = world.token_id()?;
    let first = world.account(AccountSlot::First)?.clone();
    let second = world.account(AccountSlot::Second)?.clone();
    let amount = signed_amount(amount)?;

    let transfer = Transfer::new()
        .token_transfer(token_id, first.id, -amount)
        .token_transfer(token_id, second.id, amount);
    let prepared = world.prepare(Transaction::new(transfer), &[&first.private_key])?;
    world.pending_transfer = Some(prepared);
    Ok(())
}

/// The first account receives the tokens and pays the fee.
#[when(regex = r"^The second account creates a transaction to transfer (\d+) HTT tokens to the first account$")]
async fn second_sends_to_first(world: &mut LedgerWorld, amount: u64) -> StepResult {
    let token_id = world.token_id()?;
    let first = world.account(AccountSlot::First)?.clone();
    let second = world.account(AccountSlot::Second)?.clone();
    let amount = signed_amount(amount)?;

    let transfer = Transfer::new()
        .token_transfer(token_id, second.id, -amount)
        .token_transfer(token_id, first.id, amount);
    let transaction =
        Transaction::new(transfer).with_transaction_id(TransactionId::generate(first.id))?;
    let prepared = world.prepare(transaction, &[&second.private_key, &first.private_key])?;
    world.pending_transfer = Some(prepared);
    Ok(())
}

#[when(regex = r"^A transaction is created to transfer (\d+) HTT tokens out of the first and second account and (\d+) HTT tokens into the third account and (\d+) HTT tokens into the fourth account$")]
async fn multi_party_transfer(
    world: &mut LedgerWorld,
    debit: u64,
    third_credit: u64,
    fourth_credit: u64,
) -> StepResult {
    let token_id = world.token_id()?;
    let first = world.account(AccountSlot::First)?.clone();
    let second = world.account(AccountSlot::Second)?.clone();
    let third = world.account(AccountSlot::Third)?.id;
    let fourth = world.account(AccountSlot::Fourth)?.id;
    let debit = signed_amount(debit)?;

    let transfer = Transfer::new()
        .token_transfer(token_id, first.id, -debit)
        .token_transfer(token_id, second.id, -debit)
        .token_transfer(token_id, third, signed_amount(third_credit)?)
        .token_transfer(token_id, fourth, signed_amount(fourth_credit)?);
    let prepared = world.prepare(
        Transaction::new(transfer),
        &[&first.private_key, &second.private_key],
    )?;
    world.pending_transfer = Some(prepared);
    Ok(())
}

#[when(regex = r"^The first account submits the transaction$")]
async fn first_submits(world: &mut LedgerWorld) -> StepResult {
    let transaction = world
        .pending_transfer
        .take()
        .ok_or(StepError::MissingPendingTransfer)?;
    world.snapshot_hbars().await?;

    let receipt = world.submit(transaction).await?;
    info!(transaction_id = %receipt.transaction_id, "transfer submitted");
    Ok(())
}

#[then(regex = r"^The transaction succeeds$")]
async fn transaction_succeeds(world: &mut LedgerWorld) -> StepResult {
    let receipt = world
        .last_receipt
        .as_ref()
        .ok_or(StepError::MissingReceipt)?;
    expect_eq("receipt status", "SUCCESS", receipt.status.as_str())
}
