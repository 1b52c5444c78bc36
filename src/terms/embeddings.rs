// Seed-to-candidate similarity with all-MiniLM-L6-v2, run locally via ONNX.
//
// Expansion scores every candidate of a seed against that seed. The seed's
// vector is computed once and cached on the embedder, so only candidates go
// through the model on each call. Pooled vectors are L2-normalized, which
// makes cosine similarity a dot product.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::debug;

use super::download::{embedding_model_dir, missing_files, MODEL_FILE, TOKENIZER_FILE};
use super::traits::SimilarityScorer;

/// Hidden size of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longest input the model was trained on, in word pieces.
const MAX_TOKENS: usize = 256;

/// Candidates per inference call. Link lists run to hundreds of titles.
const CANDIDATE_BATCH: usize = 64;

/// Normalized seed vectors, keyed by seed text.
#[derive(Default)]
pub struct SeedVectors {
    vectors: Mutex<HashMap<String, Arc<[f32]>>>,
}

impl SeedVectors {
    pub fn get(&self, seed: &str) -> Result<Option<Arc<[f32]>>> {
        Ok(self.lock()?.get(seed).cloned())
    }

    pub fn insert(&self, seed: &str, vector: Arc<[f32]>) -> Result<()> {
        self.lock()?.insert(seed.to_string(), vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<[f32]>>>> {
        self.vectors
            .lock()
            .map_err(|e| anyhow::anyhow!("Seed vector cache poisoned: {e}"))
    }
}

/// Sentence embedder over a local ONNX model.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    seeds: SeedVectors,
}

impl SentenceEmbedder {
    /// Load the model under `base` (the configured model directory).
    pub fn load(base: &Path) -> Result<Self> {
        let missing = missing_files(base);
        if !missing.is_empty() {
            anyhow::bail!(
                "Embedding model incomplete in {} (missing {})\nRun `epitrace download-model` to download it.",
                embedding_model_dir(base).display(),
                missing.join(", ")
            );
        }
        let dir = embedding_model_dir(base);

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(dir.join(MODEL_FILE))
            .with_context(|| format!("Failed to load embedding model from {}", dir.display()))?;

        let mut tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {e}"))?;

        debug!(dir = %dir.display(), "Loaded sentence embedding model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            seeds: SeedVectors::default(),
        })
    }

    /// Number of distinct seeds embedded so far.
    pub fn cached_seeds(&self) -> usize {
        self.seeds.len()
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        tokio::task::spawn_blocking(move || run_model(&session, &tokenizer, texts))
            .await
            .context("Embedding task panicked")?
    }

    async fn seed_vector(&self, seed: &str) -> Result<Arc<[f32]>> {
        if let Some(vector) = self.seeds.get(seed)? {
            return Ok(vector);
        }
        let vector: Arc<[f32]> = self
            .embed(vec![seed.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model returned no vector for seed {seed:?}"))?
            .into();
        self.seeds.insert(seed, Arc::clone(&vector))?;
        debug!(seed = seed, "Embedded seed");
        Ok(vector)
    }
}

#[async_trait]
impl SimilarityScorer for SentenceEmbedder {
    async fn similarities(&self, seed: &str, candidates: &[String]) -> Result<Vec<f64>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let seed_vector = self.seed_vector(seed).await?;

        let mut scores = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(CANDIDATE_BATCH) {
            let vectors = self.embed(batch.to_vec()).await?;
            scores.extend(vectors.iter().map(|v| dot(&seed_vector, v)));
        }
        debug!(seed = seed, candidates = candidates.len(), "Scored candidates");
        Ok(scores)
    }
}

fn flatten(encodings: &[Encoding], field: impl Fn(&Encoding) -> &[u32]) -> Vec<i64> {
    encodings
        .iter()
        .flat_map(|e| field(e).iter().map(|&v| v as i64))
        .collect()
}

/// Tokenize, run inference and pool. Blocking.
fn run_model(session: &Mutex<Session>, tokenizer: &Tokenizer, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    let encodings = tokenizer
        .encode_batch(texts, true)
        .map_err(|e| anyhow::anyhow!("Tokenization failed: {e}"))?;

    // The tokenizer pads the batch to its longest member
    let batch = encodings.len();
    let seq_len = encodings.first().map_or(0, Encoding::len);
    if seq_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch]);
    }

    let shape = [batch as i64, seq_len as i64];
    let mask = flatten(&encodings, Encoding::get_attention_mask);
    let input_ids = Tensor::from_array((shape, flatten(&encodings, Encoding::get_ids)))
        .context("Failed to create input_ids tensor")?;
    let attention_mask =
        Tensor::from_array((shape, mask.clone())).context("Failed to create attention_mask tensor")?;
    let token_type_ids = Tensor::from_array((shape, flatten(&encodings, Encoding::get_type_ids)))
        .context("Failed to create token_type_ids tensor")?;

    let mut session = session
        .lock()
        .map_err(|e| anyhow::anyhow!("Embedding session poisoned: {e}"))?;
    let outputs = session
        .run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids
        })
        .context("Embedding inference failed")?;

    // last_hidden_state: [batch, seq_len, EMBEDDING_DIM]
    let (_, hidden) = outputs[0]
        .try_extract_tensor::<f32>()
        .context("Failed to extract embedding output")?;
    let per_sequence = seq_len * EMBEDDING_DIM;
    if hidden.len() != batch * per_sequence {
        anyhow::bail!(
            "Embedding output has {} values, expected {}x{}x{}",
            hidden.len(),
            batch,
            seq_len,
            EMBEDDING_DIM
        );
    }

    let pooled = hidden
        .chunks_exact(per_sequence)
        .zip(mask.chunks_exact(seq_len))
        .map(|(tokens, mask)| mean_pool(tokens, mask, EMBEDDING_DIM))
        .collect();
    Ok(pooled)
}

/// Mean of the unmasked token vectors in `hidden` (`[seq_len, dim]`),
/// scaled to unit length.
fn mean_pool(hidden: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0_f32; dim];
    let mut tokens = 0;
    for (token, _) in hidden.chunks_exact(dim).zip(mask).filter(|(_, m)| **m != 0) {
        tokens += 1;
        for (acc, &v) in pooled.iter_mut().zip(token) {
            *acc += v;
        }
    }
    if tokens == 0 {
        return pooled;
    }

    let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        // The mean's 1/n factor cancels under normalization
        pooled.iter_mut().for_each(|v| *v /= norm);
    }
    pooled
}

/// Cosine similarity of two unit vectors.
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}
