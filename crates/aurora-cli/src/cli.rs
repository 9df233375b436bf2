use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "aurora",
    about = "aurora ledger-ingestion operator tool",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Network passphrase the validator and archive belong to.
    #[arg(long, global = true, default_value = "Test Network ; September 2015")]
    pub network_passphrase: String,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest a ledger range into a clean store, optionally verifying state
    VerifyRange(VerifyRangeArgs),
    /// Project a synthesized high-volume ledger and check row counts
    StressTest(StressTestArgs),
    /// Force a state rebuild on the next run of a live instance
    TriggerStateRebuild(TriggerStateRebuildArgs),
    /// Ingest the synthesized genesis state (ledger 1)
    InitGenesisState(InitGenesisStateArgs),
    /// Serve a captive validator backend over HTTP
    ServeRemoteCaptive(ServeRemoteCaptiveArgs),
    /// Follow the live network, projecting every closed ledger
    Run(RunArgs),
}

#[derive(Args)]
pub struct VerifyRangeArgs {
    /// First ledger of the range; must be a checkpoint or 1
    #[arg(long)]
    pub from: u32,
    /// Last ledger of the range (inclusive)
    #[arg(long)]
    pub to: u32,
    /// Verify state at the last ledger of the range
    #[arg(long)]
    pub verify_state: bool,
}

#[derive(Args)]
pub struct StressTestArgs {
    /// Total number of transactions to ingest (at most 1000)
    #[arg(long, default_value = "1000")]
    pub transactions: usize,
    /// Changes per transaction to ingest (at most 4000)
    #[arg(long, default_value = "4000")]
    pub changes: usize,
}

#[derive(Args)]
pub struct TriggerStateRebuildArgs {}

#[derive(Args)]
pub struct InitGenesisStateArgs {}

#[derive(Args)]
pub struct ServeRemoteCaptiveArgs {
    #[arg(long, default_value = "127.0.0.1:8001")]
    pub bind: String,
    /// Path to the validator binary
    #[arg(long)]
    pub core_binary: String,
    /// Operator validator config; required for online mode
    #[arg(long)]
    pub core_config: Option<String>,
    /// History archive URLs, one flag per archive
    #[arg(long = "history-url")]
    pub history_urls: Vec<String>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the validator binary
    #[arg(long)]
    pub core_binary: String,
    /// Operator validator config; required for online mode
    #[arg(long)]
    pub core_config: Option<String>,
    /// History archive URLs, one flag per archive
    #[arg(long = "history-url")]
    pub history_urls: Vec<String>,
    /// Use a remote captive-core server instead of a local subprocess
    #[arg(long)]
    pub remote_captive_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_verify_range() {
        let cli =
            Cli::try_parse_from(["aurora", "verify-range", "--from", "63", "--to", "127"]).unwrap();
        if let Command::VerifyRange(args) = cli.command {
            assert_eq!(args.from, 63);
            assert_eq!(args.to, 127);
            assert!(!args.verify_state);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verify_range_with_state() {
        let cli = Cli::try_parse_from([
            "aurora",
            "verify-range",
            "--from",
            "63",
            "--to",
            "127",
            "--verify-state",
        ])
        .unwrap();
        if let Command::VerifyRange(args) = cli.command {
            assert!(args.verify_state);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn verify_range_requires_bounds() {
        assert!(Cli::try_parse_from(["aurora", "verify-range", "--from", "63"]).is_err());
    }

    #[test]
    fn parse_stress_test_defaults() {
        let cli = Cli::try_parse_from(["aurora", "stress-test"]).unwrap();
        if let Command::StressTest(args) = cli.command {
            assert_eq!(args.transactions, 1000);
            assert_eq!(args.changes, 4000);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_trigger_state_rebuild() {
        let cli = Cli::try_parse_from(["aurora", "trigger-state-rebuild"]).unwrap();
        assert!(matches!(cli.command, Command::TriggerStateRebuild(_)));
    }

    #[test]
    fn parse_serve_remote_captive() {
        let cli = Cli::try_parse_from([
            "aurora",
            "serve-remote-captive",
            "--core-binary",
            "/usr/bin/hcnet-core",
            "--history-url",
            "http://a",
            "--history-url",
            "http://b",
            "--bind",
            "0.0.0.0:9000",
        ])
        .unwrap();
        if let Command::ServeRemoteCaptive(args) = cli.command {
            assert_eq!(args.bind, "0.0.0.0:9000");
            assert_eq!(args.history_urls, vec!["http://a", "http://b"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_run_with_remote() {
        let cli = Cli::try_parse_from([
            "aurora",
            "run",
            "--core-binary",
            "hcnet-core",
            "--remote-captive-url",
            "http://localhost:8001",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.remote_captive_url.as_deref(), Some("http://localhost:8001"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_passphrase() {
        let cli = Cli::try_parse_from([
            "aurora",
            "--network-passphrase",
            "Public Network",
            "init-genesis-state",
        ])
        .unwrap();
        assert_eq!(cli.network_passphrase, "Public Network");
    }
}
