use cucumber::{given, then, when};
use ledger_testing_config::timeouts::subscribe_timeout;
use ledger_testing_core::{
    TopicMessageQuery,
    ledger::{Key, KeyList, TopicCreate, TopicMessageSubmit, Transaction},
};
use tracing::info;

use crate::world::{AccountSlot, LedgerWorld, StepError, StepResult, expect_eq};

async fn create_topic(world: &mut LedgerWorld, memo: String, submit_key: Key) -> StepResult {
    let receipt = world
        .submit(Transaction::new(TopicCreate::new(memo).submit_key(submit_key)))
        .await?;
    let topic_id = receipt.topic_id.ok_or_else(|| StepError::Assertion {
        what: "topic create receipt".to_owned(),
        expected: "a topic id".to_owned(),
        actual: "none".to_owned(),
    })?;

    info!(%topic_id, "topic created");
    world.topic_id = Some(topic_id);
    Ok(())
}

#[when(regex = r#"^A topic is created with the memo "([^"]*)" with the first account as the submit key$"#)]
async fn topic_with_first_account_key(world: &mut LedgerWorld, memo: String) -> StepResult {
    let submit_key = world.account(AccountSlot::First)?.public_key();
    create_topic(world, memo, submit_key.into()).await
}

#[when(regex = r#"^A topic is created with the memo "([^"]*)" with the threshold key as the submit key$"#)]
async fn topic_with_threshold_key(world: &mut LedgerWorld, memo: String) -> StepResult {
    let submit_key = world.threshold_key()?;
    create_topic(world, memo.clone(), submit_key.into()).await?;

    let topic_id = world.topic_id()?;
    let info = world.client()?.topic_info(topic_id).await?;
    expect_eq("topic memo", memo, info.memo)
}

#[when(regex = r#"^The message "([^"]*)" is published to the topic$"#)]
async fn publish_message(world: &mut LedgerWorld, message: String) -> StepResult {
    let topic_id = world.topic_id()?;

    // Every introduced key signs so a threshold submit key can be met.
    let mut signers = vec![world.account(AccountSlot::First)?.private_key.clone()];
    if let Ok(second) = world.account(AccountSlot::Second) {
        signers.push(second.private_key.clone());
    }
    let signers: Vec<_> = signers.iter().collect();

    let receipt = world
        .sign_and_submit(
            Transaction::new(TopicMessageSubmit::new(topic_id, message)),
            &signers,
        )
        .await?;
    expect_eq("publish receipt status", "SUCCESS", receipt.status.as_str())
}

#[then(regex = r#"^The message "([^"]*)" is received by the topic and can be printed to the console$"#)]
async fn message_received(world: &mut LedgerWorld, message: String) -> StepResult {
    let topic_id = world.topic_id()?;
    let client = world.client()?;
    let published = client.topic_info(topic_id).await?.sequence_number;
    let limit = usize::try_from(published.max(1)).unwrap_or(usize::MAX);

    let received = client
        .topic_messages(
            TopicMessageQuery::new(topic_id)
                .limit(limit)
                .timeout(subscribe_timeout()),
        )
        .await?;

    let Some(found) = received
        .iter()
        .find(|candidate| candidate.contents_lossy() == message)
    else {
        return Err(StepError::Assertion {
            what: format!("messages received on topic {topic_id}"),
            expected: format!("{message:?}"),
            actual: format!(
                "{:?}",
                received
                    .iter()
                    .map(|m| m.contents_lossy())
                    .collect::<Vec<_>>()
            ),
        });
    };

    println!("Received message: {}", found.contents_lossy());
    info!(%topic_id, sequence = found.sequence_number, "message received");
    Ok(())
}

#[given(regex = r"^A (\d+) of (\d+) threshold key with the first and second account$")]
async fn threshold_key(world: &mut LedgerWorld, threshold: u32, total: u32) -> StepResult {
    if total != 2 {
        return Err(StepError::InvalidArgument {
            message: format!("a threshold key over the first and second account has 2 keys, not {total}"),
        });
    }

    let first = world.account_or_fixture(AccountSlot::First)?.public_key();
    let second = world.account_or_fixture(AccountSlot::Second)?.public_key();
    world.threshold_key = Some(KeyList::threshold(
        vec![first.into(), second.into()],
        threshold,
    )?);
    Ok(())
}
