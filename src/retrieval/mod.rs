//! In-memory knowledge retrieval: corpus embedded once, queried by cosine
//! similarity with a linear scan. Meant for tens to low hundreds of snippets.

mod corpus;
mod embed;

pub use corpus::{default_corpus, load_corpus};
pub use embed::{HashingEmbedder, RemoteEmbedder};

use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding call failed: {0}")]
    Embedding(String),
    #[error("embedder returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding dimension {got} does not match corpus dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("corpus file: {0}")]
    Corpus(String),
}

/// Turns text into fixed-length vectors, one per input, order preserved.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeSnippet {
    /// Corpus insertion index
    pub id: usize,
    pub text: String,
    /// L2-normalized
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub snippet: Arc<KnowledgeSnippet>,
    pub score: f32,
}

/// Hits ordered by descending score; equal scores keep corpus order.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.snippet.text.as_str())
    }
}

/// Scale `v` to unit length in place. Zero vectors are left as they are.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub struct VectorRetriever {
    snippets: Vec<Arc<KnowledgeSnippet>>,
    dimension: usize,
    embedder: Arc<dyn Embedder>,
}

impl VectorRetriever {
    /// Embed `docs` once. The corpus is fixed from here on.
    pub fn build(docs: Vec<String>, embedder: Arc<dyn Embedder>) -> Result<Self, RetrievalError> {
        if docs.is_empty() {
            return Ok(Self {
                snippets: Vec::new(),
                dimension: 0,
                embedder,
            });
        }
        let vectors = embedder.embed(&docs)?;
        if vectors.len() != docs.len() {
            return Err(RetrievalError::CountMismatch {
                expected: docs.len(),
                got: vectors.len(),
            });
        }
        let dimension = vectors[0].len();
        let mut snippets = Vec::with_capacity(docs.len());
        for (id, (text, mut embedding)) in docs.into_iter().zip(vectors).enumerate() {
            if embedding.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    got: embedding.len(),
                });
            }
            l2_normalize(&mut embedding);
            snippets.push(Arc::new(KnowledgeSnippet { id, text, embedding }));
        }
        info!(snippets = snippets.len(), dimension, "knowledge corpus embedded");
        Ok(Self {
            snippets,
            dimension,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn snippets(&self) -> &[Arc<KnowledgeSnippet>] {
        &self.snippets
    }

    /// Top `min(k, corpus size)` snippets for `query`.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        if k == 0 || self.snippets.is_empty() {
            return Ok(RetrievalResult::default());
        }
        let mut q = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or(RetrievalError::CountMismatch { expected: 1, got: 0 })?;
        if q.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                got: q.len(),
            });
        }
        l2_normalize(&mut q);

        let mut hits: Vec<RetrievalHit> = self
            .snippets
            .iter()
            .map(|s| RetrievalHit {
                score: dot(&s.embedding, &q),
                snippet: Arc::clone(s),
            })
            .collect();
        // stable sort; equal scores (including +0.0 and -0.0) keep corpus order
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(RetrievalResult { hits })
    }
}
