mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use keystone_index::{CodeIndexer, CorpusWalker, HybridRetriever, IndexReport};
use keystone_llm::any::AnyEmbedder;
use keystone_memory::document::TextLoader;
use keystone_memory::{QdrantOps, VectorStore};

use crate::config::{Config, resolve_config_path};

#[derive(Debug, Parser)]
#[command(name = "keystone")]
#[command(about = "Index a legacy codebase into a vector store and retrieve grounding context")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk a source tree, chunk every file and write the chunks to the collection
    Index {
        /// Root of the codebase
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Delete the collection before indexing
        #[arg(long)]
        fresh: bool,

        /// First numeric chunk id to assign
        #[arg(long, default_value_t = 0)]
        start_id: u64,

        /// Also ingest the documents at this path, numbered after the code chunks
        #[arg(long)]
        docs: Option<PathBuf>,
    },
    /// Print the context block retrieved for a query
    Query {
        text: String,

        /// Number of chunks to request (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Load text documents and write their paragraphs to the collection
    IngestDocs {
        /// A document file or a directory of documents
        path: PathBuf,

        /// First numeric chunk id to assign: the "next chunk id" printed by the
        /// last run against the collection
        #[arg(long)]
        start_id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config.validate()?;
    tracing::debug!(path = %config_path.display(), "config loaded");

    let embedder = Arc::new(
        AnyEmbedder::from_name(
            &config.embedding.provider,
            &config.embedding.base_url,
            &config.embedding.model,
        )
        .context("failed to create embedding provider")?,
    );
    let store: Arc<dyn VectorStore> = Arc::new(
        QdrantOps::new(&config.store.qdrant_url).context("failed to create qdrant client")?,
    );

    match cli.command {
        Command::Index {
            root,
            fresh,
            start_id,
            docs,
        } => {
            run_index(
                &config,
                store,
                embedder,
                &root,
                docs.as_deref(),
                fresh,
                start_id,
            )
            .await
        }
        Command::Query { text, k } => {
            let retriever = HybridRetriever::new(
                store,
                embedder,
                config.store.collection.clone(),
                config.retrieval.to_retrieval_config(),
            );
            println!("{}", retriever.context_for(&text, k).await);
            Ok(())
        }
        Command::IngestDocs { path, start_id } => {
            run_ingest_docs(&config, store, embedder, &path, start_id).await
        }
    }
}

async fn run_index(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<AnyEmbedder>,
    root: &Path,
    docs: Option<&Path>,
    fresh: bool,
    start_id: u64,
) -> anyhow::Result<()> {
    if !root.is_dir() {
        anyhow::bail!("index root is not a directory: {}", root.display());
    }
    if let Some(docs) = docs
        && !docs.exists()
    {
        anyhow::bail!("document path does not exist: {}", docs.display());
    }

    let indexer = CodeIndexer::new(
        store,
        embedder,
        config.store.collection.clone(),
        config.indexer.to_indexer_config(),
    );
    let vector_size = indexer
        .prepare(fresh)
        .await
        .context("failed to prepare collection")?;
    tracing::info!(
        collection = indexer.collection(),
        vector_size,
        root = %root.display(),
        "indexing started"
    );

    let walker = CorpusWalker::new(root, &config.walker.to_walker_config(), start_id);
    let Some(docs) = docs else {
        let report = indexer.index_corpus(walker).await;
        print_report(&report);
        return Ok(());
    };

    let (code, documents) = indexer
        .index_code_and_documents(
            walker,
            docs,
            &TextLoader::default(),
            &config.walker.excluded_dirs,
            config.walker.batch_size,
        )
        .await;
    println!("code:");
    print_report(&code);
    println!("documents:");
    print_report(&documents);
    Ok(())
}

async fn run_ingest_docs(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<AnyEmbedder>,
    path: &Path,
    start_id: u64,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("document path does not exist: {}", path.display());
    }

    let indexer = CodeIndexer::new(
        store,
        embedder,
        config.store.collection.clone(),
        config.indexer.to_indexer_config(),
    );
    indexer
        .prepare(false)
        .await
        .context("failed to prepare collection")?;

    let report = indexer
        .index_documents(
            path,
            &TextLoader::default(),
            &config.walker.excluded_dirs,
            start_id,
            config.walker.batch_size,
        )
        .await;
    print_report(&report);
    Ok(())
}

fn print_report(report: &IndexReport) {
    println!("files seen:      {}", report.walk.files_seen);
    println!("files chunked:   {}", report.walk.files_chunked);
    println!("files empty:     {}", report.walk.files_empty);
    println!("files skipped:   {}", report.walk.skipped.len());
    println!("chunks written:  {}", report.chunks_written);
    println!(
        "batches failed:  {} ({} chunks)",
        report.batches_failed, report.chunks_failed
    );
    println!("next chunk id:   {}", report.next_id);
    println!("duration:        {} ms", report.duration_ms);
    for skipped in &report.walk.skipped {
        println!("  skipped {}: {:?}", skipped.path, skipped.reason);
    }
    for failure in &report.failures {
        println!("  failed batch: {failure}");
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
