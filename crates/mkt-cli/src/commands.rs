use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;

use mkt_fabric::{IngestOutcome, Indexer, RecoveryReport};
use mkt_index::{decode_json_lines, Applied, ListingFilter, ReplayEngine};
use mkt_server::{ListingServer, ListingView, ServerConfig};
use mkt_store::InMemoryListingStore;
use mkt_types::{ListingRecord, ListingState};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        format,
        config,
        wal,
        ..
    } = cli;
    let config = load_config(config.as_deref(), wal)?;

    match command {
        Command::Ingest(args) => cmd_ingest(&config, &format, args),
        Command::Get(args) => cmd_get(&config, &format, args),
        Command::List(args) => cmd_list(&config, &format, args),
        Command::Replay(args) => cmd_replay(&config, &format, args),
        Command::Serve(args) => cmd_serve(config, args),
    }
}

fn load_config(path: Option<&Path>, wal: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if wal.is_some() {
        config.wal_path = wal;
    }
    Ok(config)
}

/// Open the indexer described by `config`, rebuilding the table from the
/// event log when one is configured.
fn open_indexer(config: &ServerConfig) -> anyhow::Result<(Indexer, RecoveryReport)> {
    match &config.wal_path {
        Some(path) => {
            let indexer = Indexer::open(
                Arc::new(InMemoryListingStore::new()),
                path,
                config.wal_config(),
            )
            .with_context(|| format!("opening event log {}", path.display()))?;
            let report = indexer.recover()?;
            Ok((indexer, report))
        }
        None => {
            tracing::warn!("no event log configured (--wal); the table will not persist");
            Ok((Indexer::in_memory(), RecoveryReport::default()))
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct IngestSummary {
    read: u64,
    applied: u64,
    ignored: u64,
    duplicates: u64,
}

fn ingest_file(indexer: &Indexer, path: &Path, ordered: bool) -> anyhow::Result<IngestSummary> {
    let input =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut envelopes = decode_json_lines(&input)?;
    if ordered {
        envelopes.sort_by_key(|e| e.position);
    }

    let mut summary = IngestSummary {
        read: envelopes.len() as u64,
        ..IngestSummary::default()
    };
    for envelope in &envelopes {
        match indexer.ingest(envelope)? {
            IngestOutcome::Applied(Applied::Ignored) => summary.ignored += 1,
            IngestOutcome::Applied(_) => summary.applied += 1,
            IngestOutcome::Duplicate => summary.duplicates += 1,
        }
    }
    Ok(summary)
}

fn cmd_ingest(config: &ServerConfig, format: &OutputFormat, args: IngestArgs) -> anyhow::Result<()> {
    let (indexer, _) = open_indexer(config)?;
    let summary = ingest_file(&indexer, &args.file, args.ordered)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!(
                "{} Ingested {} events from {}",
                "✓".green().bold(),
                summary.read.to_string().bold(),
                args.file.display()
            );
            println!("  Applied:    {}", summary.applied.to_string().green());
            println!("  Ignored:    {}", summary.ignored.to_string().yellow());
            println!("  Duplicates: {}", summary.duplicates.to_string().dimmed());
            println!("  Listings:   {}", indexer.query().count()?);
        }
    }
    Ok(())
}

fn cmd_get(config: &ServerConfig, format: &OutputFormat, args: GetArgs) -> anyhow::Result<()> {
    let (indexer, _) = open_indexer(config)?;
    let Some(record) = indexer.query().get_encoded(&args.key)? else {
        match format {
            OutputFormat::Json => println!("null"),
            OutputFormat::Text => println!("Listing {} not found", args.key.yellow()),
        }
        return Ok(());
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&ListingView::from(record))?)
        }
        OutputFormat::Text => {
            println!("Listing {}", args.key.yellow().bold());
            println!("  Contract: {}", record.contract.to_hex().cyan());
            println!("  Token:    {}", record.token_id);
            println!("  Seller:   {}", record.seller.to_hex());
            println!("  Price:    {}", record.price.to_string().bold());
            match record.buyer {
                Some(buyer) => println!("  Buyer:    {}", buyer.to_hex()),
                None => println!("  Buyer:    {}", "-".dimmed()),
            }
            println!("  State:    {}", colored_state(record.state()));
        }
    }
    Ok(())
}

fn cmd_list(config: &ServerConfig, format: &OutputFormat, args: ListArgs) -> anyhow::Result<()> {
    let filter = ListingFilter::parse(
        args.active,
        args.contract.as_deref(),
        args.seller.as_deref(),
        args.token_id.as_deref(),
    )?;

    let (indexer, _) = open_indexer(config)?;
    let records = indexer.query().list(&filter)?;

    match format {
        OutputFormat::Json => {
            let views: Vec<ListingView> = records.into_iter().map(ListingView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No listings.");
            }
            for record in &records {
                print_listing_line(record);
            }
        }
    }
    Ok(())
}

fn cmd_replay(config: &ServerConfig, format: &OutputFormat, args: ReplayArgs) -> anyhow::Result<()> {
    if config.wal_path.is_none() {
        anyhow::bail!("replay needs an event log: pass --wal or set wal_path in the config");
    }
    let (indexer, report) = open_indexer(config)?;
    let stats = indexer.stats()?;

    let converged = if args.verify {
        Some(verify_against_log(&indexer)?)
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "recovery": report,
                "stats": stats,
                "listings": indexer.query().count()?,
                "converged": converged,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("{} Replay complete.", "✓".green().bold());
            println!("  Log entries: {}", report.recovered);
            println!("  Applied:     {}", report.applied.to_string().green());
            println!("  Ignored:     {}", report.ignored.to_string().yellow());
            println!("  Duplicates:  {}", report.duplicates);
            if report.corrupt > 0 {
                println!("  Corrupt:     {}", report.corrupt.to_string().red());
            }
            match stats.high_water {
                Some(position) => println!("  High water:  {position}"),
                None => println!("  High water:  {}", "-".dimmed()),
            }
            println!("  Listings:    {}", indexer.query().count()?);
            match converged {
                Some(true) => println!("  Convergence: {}", "verified".green()),
                Some(false) => println!("  Convergence: {}", "MISMATCH".red().bold()),
                None => {}
            }
        }
    }
    Ok(())
}

/// Fold the logged events into a fresh table and compare with the live one.
fn verify_against_log(indexer: &Indexer) -> anyhow::Result<bool> {
    let Some(wal) = indexer.wal() else {
        return Ok(true);
    };
    let mut seen = HashSet::new();
    let envelopes: Vec<_> = wal
        .recover()?
        .into_iter()
        .filter(|entry| entry.verify_integrity() && seen.insert(entry.id))
        .map(|entry| entry.envelope)
        .collect();
    Ok(ReplayEngine::verify_convergence(
        indexer.store().as_ref(),
        &envelopes,
    )?)
}

fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid --bind address {bind}"))?;
    }
    println!(
        "Listing server on {} ({})",
        config.bind_addr.to_string().bold(),
        match &config.wal_path {
            Some(path) => format!("log: {}", path.display()),
            None => "in-memory".to_string(),
        }
    );
    let server = ListingServer::new(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn colored_state(state: ListingState) -> colored::ColoredString {
    match state {
        ListingState::Active => state.to_string().green(),
        ListingState::Sold => state.to_string().blue(),
        ListingState::NonExistent => state.to_string().dimmed(),
    }
}

fn print_listing_line(record: &ListingRecord) {
    println!(
        "{} #{} {} {}  {}",
        record.contract.short().cyan(),
        record.token_id.to_string().bold(),
        "by".dimmed(),
        record.seller.short(),
        format!("{} [{}]", record.price, colored_state(record.state())),
    );
}
