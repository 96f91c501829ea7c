use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mkt",
    about = "Marketplace listing indexer: reconcile listing events into a queryable table",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Server/indexer config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Event log path; overrides `wal_path` from the config file
    #[arg(long, global = true)]
    pub wal: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest a JSON-lines file of raw events
    Ingest(IngestArgs),
    /// Show one listing by its key
    Get(GetArgs),
    /// List listings
    List(ListArgs),
    /// Rebuild the table from the event log and report
    Replay(ReplayArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    pub file: PathBuf,
    /// Sort events by block position before ingesting
    #[arg(long)]
    pub ordered: bool,
}

#[derive(Args)]
pub struct GetArgs {
    /// Listing key: `<contract>_<tokenId>_<seller>`
    pub key: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only listings without a buyer
    #[arg(long)]
    pub active: bool,
    #[arg(long)]
    pub contract: Option<String>,
    #[arg(long)]
    pub seller: Option<String>,
    /// Decimal or 0x-prefixed hex token id
    #[arg(long)]
    pub token_id: Option<String>,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Check the rebuilt table against a fresh fold of the log
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Overrides `bind_addr` from the config file
    #[arg(long)]
    pub bind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ingest() {
        let cli = Cli::try_parse_from(["mkt", "ingest", "events.jsonl"]).unwrap();
        if let Command::Ingest(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("events.jsonl"));
            assert!(!args.ordered);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_ingest_ordered() {
        let cli = Cli::try_parse_from(["mkt", "ingest", "--ordered", "backfill.jsonl"]).unwrap();
        if let Command::Ingest(args) = cli.command {
            assert!(args.ordered);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn ingest_requires_file() {
        assert!(Cli::try_parse_from(["mkt", "ingest"]).is_err());
    }

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["mkt", "get", "0xcc_1_0xaa"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.key, "0xcc_1_0xaa");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_list_filters() {
        let cli = Cli::try_parse_from([
            "mkt", "list", "--active", "--contract", "0xcc", "--seller", "0xaa",
        ])
        .unwrap();
        if let Command::List(args) = cli.command {
            assert!(args.active);
            assert_eq!(args.contract, Some("0xcc".into()));
            assert_eq!(args.seller, Some("0xaa".into()));
            assert_eq!(args.token_id, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_list_token_id() {
        let cli = Cli::try_parse_from([
            "mkt", "list", "--contract", "0xcc", "--token-id", "42",
        ])
        .unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.token_id, Some("42".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_replay_verify() {
        let cli = Cli::try_parse_from(["mkt", "replay", "--verify"]).unwrap();
        if let Command::Replay(args) = cli.command {
            assert!(args.verify);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["mkt", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "mkt", "list", "--verbose", "--wal", "/tmp/events.wal", "--config", "mkt.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.wal, Some(PathBuf::from("/tmp/events.wal")));
        assert_eq!(cli.config, Some(PathBuf::from("mkt.toml")));
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["mkt", "--format", "json", "replay"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
