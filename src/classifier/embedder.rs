//! Local embedding backend for the classifier's vector tier, using
//! `fastembed`'s bundled ONNX runtime (nomic-embed-text-v1.5, 768 dims)
//! instead of a remote embedding API.

use crate::classifier::Embedder;
use crate::error::{BrainError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// `fastembed`'s model handle isn't `Sync`-safe to call concurrently, so
/// each call runs on a blocking thread behind a mutex.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn try_new() -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::NomicEmbedTextV15))
            .map_err(|e| BrainError::ClassifierFailure(format!("failed to load embedding model: {e}")))?;
        Ok(Self { model: Arc::new(Mutex::new(model)) })
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        let mut vectors = tokio::task::spawn_blocking(move || {
            let model = model.lock().expect("embedding model mutex poisoned");
            model.embed(vec![text], None)
        })
        .await
        .map_err(|e| BrainError::ClassifierFailure(format!("embedding task panicked: {e}")))?
        .map_err(|e| BrainError::ClassifierFailure(format!("embedding failed: {e}")))?;

        vectors
            .pop()
            .ok_or_else(|| BrainError::ClassifierFailure("embedder returned no vector".into()))
    }
}
