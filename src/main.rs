use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info, warn};

use epitrace::artifacts::ArtifactStore;
use epitrace::config::Config;
use epitrace::fetch::pubmed::PubMedClient;
use epitrace::output::terminal;
use epitrace::pipeline;
use epitrace::terms::category::SeedTermSet;
use epitrace::terms::download::{download_model, embedding_files_present};
use epitrace::terms::embeddings::SentenceEmbedder;
use epitrace::terms::traits::SimilarityScorer;
use epitrace::terms::wikipedia::WikipediaSource;

/// Epitrace: categorize biomedical literature and map term co-occurrence.
///
/// Expands seed terms for mental health, epigenetics, socioeconomic status
/// and ethnicity, fetches abstracts, counts term mentions per category and
/// builds a document-level co-occurrence matrix.
#[derive(Parser)]
#[command(name = "epitrace", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand the seed terms into expanded_terms.json
    Expand {
        /// Query the reference source even if expanded terms already exist
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch abstracts into raw_documents.json
    Fetch {
        /// PubMed query (default: built from the expanded terms)
        #[arg(long)]
        query: Option<String>,

        /// Maximum number of articles (default: 100)
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Read *.txt files from this directory instead of PubMed
        #[arg(long, conflicts_with = "query")]
        dir: Option<PathBuf>,
    },

    /// Count term mentions per category into preprocessed_articles.json
    Categorize,

    /// Build the co-occurrence matrix into modeling_output.json
    Cooccur {
        /// Also count pairs of terms from the same category
        #[arg(long)]
        include_same_category: bool,

        /// Number of top pairs to print (default: 15)
        #[arg(long, default_value = "15")]
        top: usize,
    },

    /// Run expand, fetch, categorize and cooccur in order
    Run {
        /// PubMed query (default: built from the expanded terms)
        #[arg(long)]
        query: Option<String>,

        /// Maximum number of articles (default: 100)
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Query the reference source even if expanded terms already exist
        #[arg(long)]
        refresh: bool,
    },

    /// Suggest corpus keywords not yet in any category
    Suggest {
        /// Number of suggestions (default: 25)
        #[arg(long, default_value = "25")]
        top: usize,
    },

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Show which artifacts exist and whether the model is present
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("epitrace=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let store = ArtifactStore::new(&config.data_dir);
    let seeds = SeedTermSet::default();

    match cli.command {
        Commands::Expand { refresh } => {
            expand_stage(&config, &store, &seeds, refresh).await?;
        }

        Commands::Fetch { query, limit, dir } => {
            let summary = match dir {
                Some(dir) => {
                    println!("Loading documents from {}...", dir.display());
                    pipeline::fetch::run_directory(&store, &dir)?
                }
                None => {
                    let query = query.unwrap_or_else(|| pipeline::fetch::default_query(&store, &seeds));
                    fetch_stage(&config, &store, &query, limit).await?
                }
            };
            terminal::display_stage_summary(&summary);
        }

        Commands::Categorize => {
            let (summary, _) = pipeline::categorize::run(&store)?;
            terminal::display_stage_summary(&summary);
        }

        Commands::Cooccur {
            include_same_category,
            top,
        } => {
            let mut options = config.cooccurrence_options();
            if include_same_category {
                options.cross_category_only = false;
            }
            let (summary, matrix) = pipeline::cooccur::run(&store, options)?;
            terminal::display_cooccurrence(&matrix, top);
            println!();
            terminal::display_stage_summary(&summary);
        }

        Commands::Run {
            query,
            limit,
            refresh,
        } => {
            println!("{}", "Step 1/4: expanding terms".bold());
            let expanded = expand_stage(&config, &store, &seeds, refresh).await?;

            println!("\n{}", "Step 2/4: fetching documents".bold());
            let query = query.unwrap_or_else(|| {
                epitrace::fetch::query::build_query(
                    &expanded,
                    epitrace::fetch::query::DEFAULT_TERMS_PER_CATEGORY,
                )
            });
            let fetched = fetch_stage(&config, &store, &query, limit).await?;
            terminal::display_stage_summary(&fetched);

            println!("\n{}", "Step 3/4: categorizing".bold());
            let (categorized, _) = pipeline::categorize::run(&store)?;
            terminal::display_stage_summary(&categorized);

            println!("\n{}", "Step 4/4: building co-occurrence".bold());
            let (cooccur, matrix) = pipeline::cooccur::run(&store, config.cooccurrence_options())?;
            terminal::display_cooccurrence(&matrix, 15);
            println!();
            terminal::display_stage_summary(&cooccur);
        }

        Commands::Suggest { top } => {
            let suggestions = pipeline::suggest::run(&store, top)?;
            terminal::display_suggestions(&suggestions);
        }

        Commands::DownloadModel => {
            println!("Downloading sentence embedding model...");
            println!("  Destination: {}", config.model_dir.display());

            let fetched = download_model(&config.model_dir).await?;

            if fetched == 0 {
                println!("\n{}", "Model already downloaded.".bold());
            } else {
                println!("\n{}", format!("Downloaded {fetched} model file(s).").bold());
            }
            println!("Run `epitrace expand --refresh` to rank candidates by similarity.");
        }

        Commands::Status => {
            epitrace::status::show(&store, &config.model_dir);
        }
    }

    Ok(())
}

/// Run the expand stage and print its results.
async fn expand_stage(
    config: &Config,
    store: &ArtifactStore,
    seeds: &SeedTermSet,
    refresh: bool,
) -> Result<epitrace::terms::category::ExpandedTermSet> {
    let source = WikipediaSource::new(
        &config.wikipedia_api_url,
        config.ncbi_email.as_deref(),
        config.request_timeout,
    )?;
    let embedder = load_embedder(config);
    let scorer = embedder.as_ref().map(|e| e as &dyn SimilarityScorer);

    let outcome = pipeline::expand::run(
        store,
        &source,
        scorer,
        config.expansion_params(),
        seeds,
        refresh,
    )
    .await?;
    if let Some(embedder) = &embedder {
        debug!(seeds = embedder.cached_seeds(), "Seed vectors computed");
    }

    terminal::display_expansion(&outcome.terms, outcome.report.as_ref());
    println!();
    terminal::display_stage_summary(&outcome.summary);
    Ok(outcome.terms)
}

/// Run the PubMed fetch stage.
async fn fetch_stage(
    config: &Config,
    store: &ArtifactStore,
    query: &str,
    limit: usize,
) -> Result<pipeline::StageSummary> {
    println!("Query: {}", query.dimmed());
    let client = PubMedClient::new(
        &config.pubmed_api_url,
        config.ncbi_email.clone(),
        config.ncbi_api_key.clone(),
        config.request_timeout,
    )?;
    pipeline::fetch::run(store, &client, query, limit).await
}

/// Load the sentence embedder if the model has been downloaded.
///
/// Without it, expansion still applies the existence and shape filters
/// but keeps candidates unranked.
fn load_embedder(config: &Config) -> Option<SentenceEmbedder> {
    if !embedding_files_present(&config.model_dir) {
        warn!("Embedding model not downloaded, candidates will not be ranked by similarity. Run `epitrace download-model`.");
        return None;
    }
    match SentenceEmbedder::load(&config.model_dir) {
        Ok(e) => {
            info!("Loaded sentence embedding model");
            Some(e)
        }
        Err(e) => {
            warn!("Failed to load embedding model, candidates will not be ranked: {e}");
            None
        }
    }
}
