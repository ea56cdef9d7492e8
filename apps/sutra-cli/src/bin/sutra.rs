use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use sutra_cli::{init_tracing, read_passages, render_answer};
use sutra_core::config::{Config, EngineConfig};
use sutra_core::traits::LexicalBackend;
use sutra_dict::MemoryGlossary;
use sutra_embed::default_embedder;
use sutra_hybrid::{AnswerOptions, Backends, DeepAnswerEngine, HttpGenerator};
use sutra_query::QueryExpander;
use sutra_text::TantivyPassageIndex;
use sutra_vector::LanceVectorIndex;

/// Grounded question answering over an indexed Buddhist canon
#[derive(Parser, Debug)]
#[command(name = "sutra", version, about)]
struct Args {
    /// Base directory that relative data paths resolve against
    #[arg(long, env = "SUTRA_HOME", default_value = ".")]
    home: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question with cited passages
    Ask {
        question: String,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
        /// Include per-stage timings and counts
        #[arg(long)]
        performance: bool,
    },
    /// Lexical search only; prints ranked passages
    Search {
        terms: String,
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,
    },
    /// Load passages from a JSON-lines file into both stores
    Index {
        passages: PathBuf,
        /// Only write the tantivy index
        #[arg(long)]
        skip_vectors: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = Config::load().context("loading config")?.engine()?;

    match args.command {
        Command::Ask { question, json, performance } => ask(&config, &args.home, &question, json, performance).await,
        Command::Search { terms, top_k } => search(&config, &args.home, &terms, top_k).await,
        Command::Index { passages, skip_vectors } => index(&config, &args.home, &passages, skip_vectors).await,
    }
}

async fn open_vectors(config: &EngineConfig, home: &Path) -> anyhow::Result<LanceVectorIndex> {
    let dir = config.data.lancedb_dir(home);
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let uri = dir.to_string_lossy();
    Ok(LanceVectorIndex::open(&uri, &config.data.table_name, config.embedding.dimension).await?)
}

fn load_glossary(config: &EngineConfig, home: &Path) -> anyhow::Result<MemoryGlossary> {
    let path = config.data.glossary_path(home);
    match MemoryGlossary::load(&path) {
        Ok(glossary) => Ok(glossary),
        Err(sutra_core::Error::NotFound(_)) => {
            warn!(path = %path.display(), "glossary not found; dictionary retrieval disabled");
            Ok(MemoryGlossary::new(Vec::new()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn ask(config: &EngineConfig, home: &Path, question: &str, json: bool, performance: bool) -> anyhow::Result<()> {
    let text = Arc::new(TantivyPassageIndex::open(&config.data.tantivy_index_dir(home))?);
    let vectors = Arc::new(open_vectors(config, home).await?);
    let backends = Backends {
        embedder: default_embedder(&config.embedding)?,
        vectors,
        lexical: text.clone(),
        glossary: Arc::new(load_glossary(config, home)?),
        passages: Some(text),
        generator: Arc::new(HttpGenerator::from_config(&config.generation)?),
    };
    let engine = DeepAnswerEngine::with_backends(config, backends)?;

    let answer = engine.answer_question_with(question, AnswerOptions { include_performance: performance }).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", render_answer(&answer));
        if let Some(perf) = &answer.performance {
            println!("\n{}", serde_json::to_string_pretty(perf)?);
        }
    }
    Ok(())
}

async fn search(config: &EngineConfig, home: &Path, terms: &str, top_k: usize) -> anyhow::Result<()> {
    let text = TantivyPassageIndex::open(&config.data.tantivy_index_dir(home))?;
    let terms = QueryExpander::new(&config.query).extract_lexical_terms(terms);
    if terms.is_empty() {
        anyhow::bail!("no searchable terms");
    }
    let hits = text.search(&terms, top_k).await?;
    println!("terms: {}", terms.join(" | "));
    for (i, hit) in hits.iter().enumerate() {
        let snippet: String = hit.passage.content.chars().take(80).collect();
        println!("{:>2}. [{:.3}] {} {} | {}", i + 1, hit.score, hit.passage.id, hit.passage.title, snippet);
    }
    if hits.is_empty() {
        println!("no matches");
    }
    Ok(())
}

async fn index(config: &EngineConfig, home: &Path, path: &Path, skip_vectors: bool) -> anyhow::Result<()> {
    let passages = read_passages(path)?;
    println!("Loaded {} passages from {}", passages.len(), path.display());

    let text = TantivyPassageIndex::open_or_create(&config.data.tantivy_index_dir(home))?;
    let indexed = text.index_passages(&passages)?;
    println!("Indexed {indexed} passages into tantivy ({} total)", text.num_passages());

    if skip_vectors {
        return Ok(());
    }
    let vectors = open_vectors(config, home).await?;
    let embedder = default_embedder(&config.embedding)?;
    let written = vectors.add_passages(&passages, embedder.as_ref(), true).await?;
    println!("Wrote {written} passages into lancedb ({} total)", vectors.num_passages().await?);
    if let Some(params) = vectors.build_ann_index().await? {
        println!("Built IVF_PQ index (partitions={}, sub_vectors={})", params.nlist, params.m);
    }
    Ok(())
}
