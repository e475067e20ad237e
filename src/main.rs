use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use medley::config;
use medley::orchestrator::Orchestrator;
use medley::source::{MediaType, Source};

#[derive(Parser)]
#[command(name = "medley", about = "Multi-source music acquisition pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download one or more URLs (or source:media_type:id triples)
    Get {
        /// URLs or `source:media_type:id` references
        refs: Vec<String>,
    },
    /// Resolve a Last.fm playlist URL, falling back to the configured
    /// fallback source for entries the primary source can't find
    Lastfm {
        url: String,
    },
    /// Search a source and print/select/dump hits
    Search {
        source: String,
        media_type: String,
        query: String,

        /// Pick the first hit non-interactively
        #[arg(long)]
        first: bool,

        /// Write results as JSON to this path instead of prompting
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() {
    medley::logging::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Splits the mixed `refs` list from the `get` subcommand into URLs
/// (handed to `Orchestrator::add_all`) and `source:media_type:id`
/// triples (handed to `add_all_by_id`), per spec.md §6's "User-supplied
/// URLs ... or (source, media_type, id) triples".
fn split_refs(refs: Vec<String>) -> anyhow::Result<(Vec<String>, Vec<(Source, MediaType, String)>)> {
    let mut urls = Vec::new();
    let mut triples = Vec::new();
    for r in refs {
        if r.contains("://") {
            urls.push(r);
            continue;
        }
        let parts: Vec<&str> = r.splitn(3, ':').collect();
        match parts.as_slice() {
            [source, media_type, id] => {
                let source = Source::parse(source)
                    .ok_or_else(|| anyhow::anyhow!("unknown source in reference: {r}"))?;
                let media_type = MediaType::parse(media_type)
                    .ok_or_else(|| anyhow::anyhow!("unknown media type in reference: {r}"))?;
                triples.push((source, media_type, id.to_string()));
            }
            _ => anyhow::bail!("could not parse reference (expected a URL or source:media_type:id): {r}"),
        }
    }
    Ok((urls, triples))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Arc::new(config::load_config()?);
    let orchestrator = Orchestrator::new(config)?;

    match cli.command {
        Command::Get { refs } => {
            let (urls, triples) = split_refs(refs)?;
            orchestrator.add_all(&urls).await;
            orchestrator.add_all_by_id(triples).await;
            orchestrator.resolve().await;
            let summary = orchestrator.rip().await;
            eprintln!(
                "Done: {} succeeded, {} failed",
                summary.succeeded, summary.failed
            );
            orchestrator.teardown().await;
            if summary.failed > 0 {
                process::exit(1);
            }
        }
        Command::Lastfm { url } => {
            orchestrator.resolve_lastfm(&url).await?;
            let summary = orchestrator.rip().await;
            eprintln!(
                "Done: {} succeeded, {} failed",
                summary.succeeded, summary.failed
            );
            orchestrator.teardown().await;
            if summary.failed > 0 {
                process::exit(1);
            }
        }
        Command::Search {
            source,
            media_type,
            query,
            first,
            output,
            limit,
        } => {
            let source = Source::parse(&source)
                .ok_or_else(|| anyhow::anyhow!("unknown source: {source}"))?;
            let media_type = MediaType::parse(&media_type)
                .ok_or_else(|| anyhow::anyhow!("unknown media type: {media_type}"))?;

            if let Some(path) = output {
                let n = orchestrator
                    .search_output_file(source, media_type, &query, &path, limit)
                    .await?;
                eprintln!("Wrote {n} results to {}", path.display());
            } else if first {
                orchestrator.search_take_first(source, media_type, &query).await?;
                orchestrator.resolve().await;
                let summary = orchestrator.rip().await;
                eprintln!(
                    "Done: {} succeeded, {} failed",
                    summary.succeeded, summary.failed
                );
            } else {
                orchestrator
                    .search_interactive(source, media_type, &query, limit)
                    .await?;
                orchestrator.resolve().await;
                let summary = orchestrator.rip().await;
                eprintln!(
                    "Done: {} succeeded, {} failed",
                    summary.succeeded, summary.failed
                );
            }
            orchestrator.teardown().await;
        }
    }

    Ok(())
}
