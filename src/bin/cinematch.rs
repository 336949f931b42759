//! Offline companion to the server.
//!
//! ```bash
//! # Build artifacts from MovieLens movies.csv
//! cinematch build --dataset ml-latest-small/movies.csv --out artifacts
//!
//! # Smoke-test a query against built artifacts
//! cinematch recommend --artifacts artifacts --title "Toy Story" --top-k 5
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cinematch_api::{
    db::{ArtifactStore, FileArtifactStore},
    models::{BuildConfig, ItemKey, Profile},
    services::{artifacts, dataset, query},
};

#[derive(Parser)]
#[command(name = "cinematch", about = "Build and query movie similarity artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build artifacts from a dataset and write them to a directory
    Build {
        /// Dataset file (.csv or .json)
        #[arg(long)]
        dataset: PathBuf,
        /// Output directory
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,
        /// Pipeline preset: genre-title or cast-crew
        #[arg(long, default_value = "genre-title")]
        profile: Profile,
        /// Largest catalogue accepted
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// Print recommendations from previously built artifacts
    Recommend {
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        title: Option<String>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinematch_api=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Build {
            dataset: path,
            out,
            profile,
            max_items,
        } => {
            let mut config = BuildConfig::for_profile(profile);
            if let Some(max_items) = max_items {
                config.max_items = max_items;
            }

            let records = dataset::load_records(&path)?;
            let set = Arc::new(artifacts::build(&records, &config)?.into_artifacts()?);

            let store = FileArtifactStore::new(&out);
            store
                .save(set.clone())
                .await
                .with_context(|| format!("writing artifacts to {}", out.display()))?;

            println!("Built {} items into {}", set.len(), out.display());
        }
        Command::Recommend {
            artifacts: dir,
            title,
            id,
            top_k,
        } => {
            let set = FileArtifactStore::new(&dir).load().await?;
            let key = match (id, title) {
                (Some(id), _) => ItemKey::Id(id),
                (None, Some(title)) => ItemKey::Title(title),
                (None, None) => anyhow::bail!("--title or --id is required"),
            };

            let results = query::recommend(&set, &key, top_k)?;
            println!("Input: {}", key);
            if results.len() < top_k {
                println!("(only {} of {} requested available)", results.len(), top_k);
            }
            for rec in results {
                println!("{:.3}  {}", rec.score, rec.title);
            }
        }
    }

    Ok(())
}
