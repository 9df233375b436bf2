//! Command dispatch.
//!
//! The relational store and the history archive are external collaborators
//! of the ingestion core. This tool embeds the in-memory implementations,
//! which is enough for the self-contained commands (stress-test,
//! init-genesis-state, trigger-state-rebuild) and for serving a remote
//! captive backend; deployments that ingest a real network wire their own
//! `IngestionSink` and `HistoryArchive` implementations around
//! `IngestionSystem` instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use aurora_archive::InMemoryArchive;
use aurora_backend::{
    CaptiveConfig, CaptiveCoreBackend, DatabaseBackend, InMemoryCoreStore, LedgerBackend,
};
use aurora_ingest::{IngestionSystem, SystemConfig};
use aurora_remote::{RemoteCaptiveBackend, RemoteCaptiveServer};
use aurora_sink::InMemorySink;
use tracing::info;

use crate::cli::{Cli, Command, RunArgs, ServeRemoteCaptiveArgs};

type EmbeddedSystem = IngestionSystem<Box<dyn LedgerBackend>, Arc<InMemoryArchive>, InMemorySink>;

fn embedded_system(network_passphrase: &str, backend: Box<dyn LedgerBackend>) -> EmbeddedSystem {
    IngestionSystem::new(
        SystemConfig::new(network_passphrase),
        backend,
        Arc::new(InMemoryArchive::new()),
        InMemorySink::new(),
    )
}

fn database_backend() -> Box<dyn LedgerBackend> {
    Box::new(DatabaseBackend::new(Arc::new(InMemoryCoreStore::new())))
}

fn captive_backend(
    core_binary: &str,
    core_config: Option<&str>,
    history_urls: &[String],
    network_passphrase: &str,
) -> CaptiveCoreBackend {
    let config = CaptiveConfig {
        executable_path: PathBuf::from(core_binary),
        config_path: core_config.map(PathBuf::from),
        network_passphrase: network_passphrase.to_string(),
        history_urls: history_urls.to_vec(),
    };
    CaptiveCoreBackend::new(config, Arc::new(InMemoryArchive::new()))
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::VerifyRange(args) => {
            let mut system = embedded_system(&cli.network_passphrase, database_backend());
            system
                .verify_range(args.from, args.to, args.verify_state)
                .context("verify-range failed")?;
            info!("range run successfully");
            Ok(())
        }
        Command::StressTest(args) => {
            let mut system = embedded_system(&cli.network_passphrase, database_backend());
            let report = system
                .stress_test(args.transactions, args.changes)
                .context("stress test failed")?;
            info!(
                transactions = report.transactions,
                changes = report.changes_per_transaction,
                accounts_created = report.accounts_created,
                "stress test completed successfully"
            );
            Ok(())
        }
        Command::TriggerStateRebuild(_) => {
            let mut system = embedded_system(&cli.network_passphrase, database_backend());
            system.trigger_state_rebuild()?;
            info!("triggered state rebuild");
            Ok(())
        }
        Command::InitGenesisState(_) => {
            let mut system = embedded_system(&cli.network_passphrase, database_backend());
            system
                .build_genesis_state()
                .context("cannot ingest genesis state")?;
            info!("genesis ledger state successfully ingested");
            Ok(())
        }
        Command::ServeRemoteCaptive(args) => serve_remote_captive(&cli.network_passphrase, args),
        Command::Run(args) => run_ingestion(&cli.network_passphrase, args),
    }
}

fn serve_remote_captive(
    network_passphrase: &str,
    args: ServeRemoteCaptiveArgs,
) -> anyhow::Result<()> {
    let bind = args.bind.parse().context("invalid bind address")?;
    let backend = captive_backend(
        &args.core_binary,
        args.core_config.as_deref(),
        &args.history_urls,
        network_passphrase,
    );
    let server = RemoteCaptiveServer::new(bind, Box::new(backend));

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(server.serve()).context("server failed")
}

fn run_ingestion(network_passphrase: &str, args: RunArgs) -> anyhow::Result<()> {
    let backend: Box<dyn LedgerBackend> = match &args.remote_captive_url {
        Some(url) => Box::new(RemoteCaptiveBackend::new(url)?),
        None => Box::new(captive_backend(
            &args.core_binary,
            args.core_config.as_deref(),
            &args.history_urls,
            network_passphrase,
        )),
    };
    let mut system = embedded_system(network_passphrase, backend);
    system.run().context("ingestion stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn stress_test_command_runs_end_to_end() {
        let cli = Cli::try_parse_from([
            "aurora",
            "stress-test",
            "--transactions",
            "2",
            "--changes",
            "3",
        ])
        .unwrap();
        run_command(cli).unwrap();
    }

    #[test]
    fn init_genesis_state_runs_end_to_end() {
        let cli = Cli::try_parse_from(["aurora", "init-genesis-state"]).unwrap();
        run_command(cli).unwrap();
    }

    #[test]
    fn verify_range_rejects_non_checkpoint_from() {
        let cli =
            Cli::try_parse_from(["aurora", "verify-range", "--from", "64", "--to", "127"]).unwrap();
        let err = run_command(cli).unwrap_err();
        assert!(format!("{err:#}").contains("checkpoint"));
    }
}
