//! flow-triage entrypoint: reads JSON-lines flow rows (file argument or stdin),
//! strips the label column, runs the batch and writes one JSON result line per
//! row to stdout.

use flow_triage::{
    batch::{read_rows, BatchRunner, ClassificationRow, FailureRow, RecordOutcome},
    config::{EmbeddingProvider, PipelineConfig},
    logging::StructuredLogger,
    model::{ModelBackend, ModelInvoker, OpenAiChatBackend},
    pipeline::{CancelToken, PipelineExecutor},
    retrieval::{default_corpus, load_corpus, Embedder, HashingEmbedder, RemoteEmbedder, VectorRetriever},
};
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn open_input(source: Option<String>) -> std::io::Result<Box<dyn BufRead>> {
    Ok(match source.as_deref() {
        None | Some("-") => Box::new(BufReader::new(std::io::stdin())),
        Some(path) => Box::new(BufReader::new(std::fs::File::open(path)?)),
    })
}

fn build_embedder(config: &PipelineConfig) -> Result<Arc<dyn Embedder>, BoxError> {
    let embedder: Arc<dyn Embedder> = match config.embedding.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.embedding.dimension)),
        EmbeddingProvider::Remote => Arc::new(RemoteEmbedder::from_config(&config.embedding)?),
    };
    Ok(embedder)
}

fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();
    let config_path = std::env::var("FLOW_TRIAGE_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = PipelineConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), model = %config.model.model, "flow-triage starting");

    let docs = match &config.retrieval.corpus_path {
        Some(path) => load_corpus(path)?,
        None => default_corpus(),
    };
    let retriever = Arc::new(VectorRetriever::build(docs, build_embedder(&config)?)?);

    let backend: Arc<dyn ModelBackend> = Arc::new(OpenAiChatBackend::from_config(&config.model)?);
    let invoker = Arc::new(ModelInvoker::new(
        backend,
        Duration::from_millis(config.model.retry_backoff_ms),
    ));
    let executor = Arc::new(PipelineExecutor::new(invoker, retriever, config.retrieval.top_k));

    let (rows, rejected) = read_rows(open_input(std::env::args().nth(1))?, &config.batch.label_column)?;
    info!(
        rows = rows.len(),
        rejected = rejected.len(),
        workers = config.batch.workers,
        "rows loaded"
    );

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    let _ = ctrlc::set_handler(move || on_signal.cancel());

    let outcomes = BatchRunner::new(executor, config.batch.workers).run(rows, &cancel)?;

    // one line per input row, in input order
    let mut lines: Vec<(usize, serde_json::Value)> = Vec::with_capacity(outcomes.len() + rejected.len());
    for row in &rejected {
        lines.push((row.index, serde_json::to_value(row)?));
    }
    for outcome in &outcomes {
        let line = match outcome {
            RecordOutcome::Classified { index, true_label, state } => {
                match ClassificationRow::from_state(*index, true_label.clone(), state) {
                    Some(row) => serde_json::to_value(&row)?,
                    None => {
                        warn!(index, "classified record is missing stage output");
                        continue;
                    }
                }
            }
            RecordOutcome::Failed { index, true_label, error } => {
                serde_json::to_value(FailureRow::new(*index, true_label.clone(), error))?
            }
        };
        lines.push((outcome.index(), line));
    }
    lines.sort_by_key(|(index, _)| *index);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (_, line) in &lines {
        StructuredLogger::emit_json(line, &mut out)?;
    }
    out.flush()?;
    info!("flow-triage complete");
    Ok(())
}
