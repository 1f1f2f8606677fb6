use std::{fs, io, path::PathBuf};

use anyhow::Context as _;
use cucumber::{World as _, WriterExt as _, writer, writer::Verbosity};
use ledger_cucumber::LedgerWorld;
use ledger_runner::{
    cucumber::{backend_from_env, features_path},
    defaults::{init_logging_defaults, init_tracing},
};
use ledger_testing_env as tf_env;

const DEFAULT_JUNIT_OUTPUT: &str = "cucumber-output-junit.xml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging_defaults();
    init_tracing();

    let backend = backend_from_env().context("selecting the ledger backend")?;
    let retries = tf_env::ledger_cucumber_retries().unwrap_or(0);
    let junit_path =
        tf_env::ledger_junit_output().unwrap_or_else(|| PathBuf::from(DEFAULT_JUNIT_OUTPUT));
    println!("backend: {backend}, retries: {retries}, junit: {}", junit_path.display());

    let file = fs::File::create(&junit_path)
        .with_context(|| format!("creating junit report {}", junit_path.display()))?;

    LedgerWorld::cucumber()
        .retries(retries)
        // following config needed to use eprint statements in the tests
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .with_writer(
            writer::Summarize::new(writer::Basic::new(
                io::stdout(),
                writer::Coloring::Auto,
                Verbosity::ShowWorldAndDocString,
            ))
            .tee::<LedgerWorld, _>(writer::JUnit::for_tee(file, 0))
            .normalized(),
        )
        .before(move |feature, _rule, scenario, world| {
            Box::pin(async move {
                println!(
                    "\nStarting '{}' : '{}' : '{}'\n",
                    feature.name, scenario.keyword, scenario.name
                );
                if let Err(e) = world.set_backend(backend) {
                    panic!("Failed to set backend: {e}");
                }
            })
        })
        .run_and_exit(features_path())
        .await;

    Ok(())
}
