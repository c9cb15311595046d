//! Batch maintenance for a consolidation catalog.
//!
//! ```bash
//! consolidate --catalog catalog.json disambiguate --output catalog.out.json
//! consolidate --catalog catalog.json --config consolidata.toml materialize '{"ddpID": 4}'
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{error, info};

use consolidata::provider::InMemoryCatalog;
use consolidata::storage::persistent::open_cache;
use consolidata::{
    AuthorDisambiguator, ConsolidationConfig, ConsolidationError, GroupingPass, Materializer,
    ProposalGrouper, UpstreamError,
};

/// Author and proposal consolidation over a JSON catalog
#[derive(Parser, Debug)]
#[clap(name = "consolidate")]
#[clap(about = "Discover alias links and materialize consolidated views")]
struct Args {
    /// Catalog tables as JSON
    #[clap(long, value_name = "FILE")]
    catalog: PathBuf,

    /// TOML configuration (defaults apply when omitted)
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the author pass, collapse chains, then both proposal passes
    Disambiguate {
        /// Where to write the catalog with its new alias links
        #[clap(long, value_name = "FILE")]
        output: PathBuf,

        /// Skip the proposal passes
        #[clap(long)]
        authors_only: bool,
    },

    /// Materialize one request into the file cache and print the response
    Materialize {
        /// Request parameters as a JSON object
        params: String,

        /// Cache directory (overrides `cache.root`)
        #[clap(long, value_name = "DIR")]
        cache: Option<PathBuf>,
    },
}

fn load_catalog(path: &Path) -> Result<InMemoryCatalog, ConsolidationError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| UpstreamError::query("catalog", format!("{}: {e}", path.display())))?;
    Ok(InMemoryCatalog::from_json(&text)?)
}

fn disambiguate(
    catalog: &InMemoryCatalog,
    config: &ConsolidationConfig,
    output: &Path,
    authors_only: bool,
) -> Result<(), ConsolidationError> {
    let authors = AuthorDisambiguator::new(catalog, catalog).max_hops(config.alias.max_hops);
    let report = authors.run()?;
    let collapsed = authors.collapse()?;
    info!(
        links = report.links_inserted,
        skipped = report.links_skipped,
        collapsed,
        "author pass finished"
    );

    if !authors_only {
        let grouper = ProposalGrouper::new(catalog, catalog, config.clone());
        for pass in [GroupingPass::modified(), GroupingPass::collaborative()] {
            let report = grouper.run(&pass)?;
            info!(
                kind = %pass.kind,
                groups = report.groups,
                links = report.links_inserted,
                skipped = report.links_skipped,
                "proposal pass finished"
            );
        }
    }

    let data = catalog.snapshot()?;
    let json = serde_json::to_string_pretty(&data)
        .map_err(|e| ConsolidationError::internal(format!("encode catalog: {e}")))?;
    std::fs::write(output, json)
        .map_err(|e| ConsolidationError::internal(format!("{}: {e}", output.display())))?;
    info!(path = %output.display(), "catalog written");
    Ok(())
}

fn materialize(
    catalog: InMemoryCatalog,
    config: &ConsolidationConfig,
    params: &str,
    cache: Option<PathBuf>,
) -> Result<(), ConsolidationError> {
    let params: Map<String, Value> = serde_json::from_str(params)
        .map_err(|e| UpstreamError::malformed("params", e.to_string()))?;
    let root = cache.unwrap_or_else(|| config.cache.root.clone());
    let store = open_cache(&root, &config.cache)?;

    let catalog = Arc::new(catalog);
    let materializer = Materializer::new(Arc::new(store), catalog.clone(), catalog);
    let response = materializer.trigger(&params)?;
    let json = serde_json::to_string(&response)
        .map_err(|e| ConsolidationError::internal(format!("encode response: {e}")))?;
    println!("{json}");
    Ok(())
}

fn run(args: Args) -> Result<(), ConsolidationError> {
    let config = match &args.config {
        Some(path) => ConsolidationConfig::from_path(path)?,
        None => ConsolidationConfig::default(),
    };
    let catalog = load_catalog(&args.catalog)?;

    match args.command {
        Command::Disambiguate {
            output,
            authors_only,
        } => disambiguate(&catalog, &config, &output, authors_only),
        Command::Materialize { params, cache } => materialize(catalog, &config, &params, cache),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "consolidate failed");
            ExitCode::FAILURE
        }
    }
}
