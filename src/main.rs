//! ministering-graph: build, enrich and export ministering assignments
//!
//! Reads a snapshot (the directory's page data, or a bare `elders` document),
//! optionally seeds pre-fetched member cards, fills in the rest from the
//! member directory and writes the assignment views as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use ministering_graph::config::Config;
use ministering_graph::export::DEFAULT_EXPORT_FILE;
use ministering_graph::outreach::select_recipients;
use ministering_graph::{
    BatchPolicy, DirectoryClient, MemberDirectory, OfflineDirectory, RelationGraph, Roster,
};

#[derive(Parser)]
#[command(name = "ministering-graph")]
#[command(about = "Build, enrich and export ministering assignments")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ministering-graph.toml")]
    config: PathBuf,

    /// Directory base URL (overrides config file)
    #[arg(long, env = "MINISTERING_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the relation graph of a snapshot
    Graph {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },
    /// Enrich every person and export the assignment views
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file
        #[arg(short, long, default_value = DEFAULT_EXPORT_FILE)]
        output: PathBuf,
    },
    /// List who would receive an assignment message
    Recipients {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Snapshot JSON file
    snapshot: PathBuf,

    /// Pre-fetched card dump (JSON object of id → card)
    #[arg(long)]
    cards: Option<PathBuf>,

    /// Do not contact the directory; use seeded cards only
    #[arg(long)]
    offline: bool,
}

fn load_graph(path: &Path) -> anyhow::Result<RelationGraph> {
    let content = std::fs::read_to_string(path)?;
    Ok(RelationGraph::from_json(&content)?)
}

async fn load_roster(config: &Config, source: &SourceArgs) -> anyhow::Result<Roster> {
    let graph = load_graph(&source.snapshot)?;

    let directory: Arc<dyn MemberDirectory> = if source.offline {
        info!("Offline mode, directory disabled");
        Arc::new(OfflineDirectory)
    } else {
        Arc::new(DirectoryClient::new(config.directory.clone())?)
    };

    let roster = Roster::new(graph, directory);

    if let Some(cards) = &source.cards {
        let content = std::fs::read_to_string(cards)?;
        let seeded = roster.cache().seed_cards_from_json(&content)?;
        info!(seeded = seeded, "Seeded cards from {}", cards.display());
    }

    roster
        .enrich_all(config.enrichment.schedule(), |p| {
            info!(done = p.done, total = p.total, "Enrichment progress");
        })
        .await;

    Ok(roster)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ministering_graph=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.directory.base_url = base_url;
    }

    match cli.command {
        Command::Graph { snapshot } => {
            let graph = load_graph(&snapshot)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Command::Export { source, output } => {
            let roster = load_roster(&config, &source).await?;
            let batch = roster.project_all(BatchPolicy::SkipFailures)?;
            let skipped = batch.failures.len();

            let document = ministering_graph::ExportDocument::new(batch.views);
            let file = std::fs::File::create(&output)?;
            document.write_json(std::io::BufWriter::new(file), config.export.pretty)?;

            info!(
                exported = document.count,
                skipped = skipped,
                "Wrote {}",
                output.display()
            );
        }
        Command::Recipients { source } => {
            let roster = load_roster(&config, &source).await?;
            let batch = roster.project_all(BatchPolicy::SkipFailures)?;

            for recipient in select_recipients(&batch.views) {
                println!(
                    "{}\t{}\t{}",
                    recipient.id, recipient.email, recipient.view.member.nickname
                );
            }
        }
    }

    Ok(())
}
