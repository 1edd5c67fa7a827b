//! # Confluence RAG CLI (`carag`)
//!
//! Indexes architecture decisions from Confluence and answers questions
//! grounded in them.
//!
//! ## Usage
//!
//! ```bash
//! carag --config ./config/carag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `carag init` | Create the `ConfluenceChunk` collection |
//! | `carag ingest` | Fetch, chunk, embed and index decision pages |
//! | `carag ask "<question>"` | Answer from indexed excerpts |
//! | `carag search "<question>"` | Show the closest excerpts, no model call |
//! | `carag live "<question>"` | Build context straight from Confluence |
//!
//! Every command except `init` needs `CONFLUENCE_BASE_URL`,
//! `CONFLUENCE_EMAIL` and `CONFLUENCE_API_TOKEN`. `CONFLUENCE_SPACE_KEY`
//! sets the default space.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use confluence_rag::ask::{self, AskOptions};
use confluence_rag::config::{self, ConfluenceSettings};
use confluence_rag::live::{self, DEFAULT_LIVE_PAGE_LIMIT};
use confluence_rag::progress::ProgressMode;
use confluence_rag::{index, ingest, logging, search};
use confluence_rag_core::retrieval::DEFAULT_TOP_K;

/// Confluence RAG: grounded answers about past architecture decisions.
#[derive(Parser)]
#[command(
    name = "carag",
    about = "Ask what was decided, and why, from Confluence decision records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/carag.toml")]
    config: PathBuf,

    /// Log pipeline steps to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector collection if it does not exist.
    Init,

    /// Index decision pages from Confluence.
    ///
    /// Searches for ADRs, decisions and minutes, converts each page to
    /// plain text, chunks and embeds it, then writes the chunks to the index.
    Ingest {
        /// Space key to restrict the search to.
        #[arg(long)]
        space: Option<String>,

        /// Maximum number of pages to fetch.
        #[arg(long)]
        limit: Option<usize>,

        /// Fetch and chunk only; print counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer a question from indexed decision records.
    Ask {
        question: String,

        #[arg(long)]
        space: Option<String>,

        /// Number of excerpts to retrieve.
        #[arg(long)]
        topk: Option<usize>,

        /// Rescore retrieved excerpts against the question.
        #[arg(long)]
        rerank: bool,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the indexed excerpts closest to a question.
    Search {
        question: String,

        #[arg(long)]
        space: Option<String>,

        #[arg(long)]
        topk: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Build context for a question directly from Confluence, bypassing the index.
    Live {
        question: String,

        #[arg(long)]
        space: Option<String>,

        /// Maximum number of pages to fetch.
        #[arg(long, default_value_t = DEFAULT_LIVE_PAGE_LIMIT)]
        limit: usize,

        /// Number of chunks to keep after reranking.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        topk: usize,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    // Only commands that talk to Confluence need credentials.
    let settings = ConfluenceSettings::from_env;

    match cli.command {
        Commands::Init => index::run_init(&cfg).await?,
        Commands::Ingest {
            space,
            limit,
            dry_run,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(
                &cfg,
                &settings()?,
                space.as_deref(),
                limit,
                dry_run,
                mode.reporter(),
            )
            .await?;
        }
        Commands::Ask {
            question,
            space,
            topk,
            rerank,
            json,
        } => {
            let opts = AskOptions {
                space,
                top_k: topk,
                rerank,
                json,
            };
            ask::run_ask(&cfg, &settings()?, &question, &opts).await?;
        }
        Commands::Search {
            question,
            space,
            topk,
            json,
        } => {
            search::run_search(&cfg, &settings()?, &question, space.as_deref(), topk, json)
                .await?;
        }
        Commands::Live {
            question,
            space,
            limit,
            topk,
            json,
        } => {
            live::run_live(
                &cfg,
                &settings()?,
                &question,
                space.as_deref(),
                limit,
                topk,
                json,
            )
            .await?;
        }
    }

    Ok(())
}
