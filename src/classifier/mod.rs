//! The classifier cascade: fingerprint cache -> regex patterns -> vector
//! similarity -> learned fallback (spec.md §4.D).

pub mod cache;
pub mod embedder;
pub mod patterns;

use crate::error::{BrainError, Result};
use crate::ids::{RiskLevel, UnitId};
use async_trait::async_trait;
use cache::ClassificationCache;
use patterns::{default_risk_patterns, default_unit_patterns, RiskPattern, UnitPattern};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Which cascade tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Regex,
    Vector,
    Llm,
    Default,
}

/// The result of classifying one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub primary_unit: UnitId,
    pub secondary_units: Vec<UnitId>,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub method: ClassificationMethod,
}

/// Similarity threshold above which the vector tier accepts its top hit
/// (spec.md §9 open question, resolved as recommended: 0.6).
pub const VECTOR_TIER_THRESHOLD: f32 = 0.6;

/// Confidence reported by the fallback (LLM) tier.
pub const FALLBACK_TIER_CONFIDENCE: f64 = 0.6;

/// Confidence reported when every tier is unavailable.
pub const DEFAULT_TIER_CONFIDENCE: f64 = 0.5;

/// Optional embedding collaborator for the vector tier.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Optional learned-fallback collaborator (an LLM asked to pick from the
/// full unit list).
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str, candidates: &[UnitId]) -> Result<UnitId>;
}

/// A unit id plus its pre-embedded prototype phrases, for the vector tier.
pub struct UnitPrototypes {
    pub unit_id: UnitId,
    pub phrases: Vec<Vec<f32>>,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// The three-tier cascade behind a bounded cache.
pub struct Classifier {
    unit_patterns: Vec<UnitPattern>,
    risk_patterns: Vec<RiskPattern>,
    embedder: Option<Arc<dyn Embedder>>,
    prototypes: Vec<UnitPrototypes>,
    fallback: Option<Arc<dyn TextClassifier>>,
    cache: ClassificationCache,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            unit_patterns: default_unit_patterns(),
            risk_patterns: default_risk_patterns(),
            embedder: None,
            prototypes: Vec::new(),
            fallback: None,
            cache: ClassificationCache::default(),
        }
    }

    pub fn with_patterns(mut self, unit_patterns: Vec<UnitPattern>, risk_patterns: Vec<RiskPattern>) -> Self {
        self.unit_patterns = unit_patterns;
        self.risk_patterns = risk_patterns;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>, prototypes: Vec<UnitPrototypes>) -> Self {
        self.embedder = Some(embedder);
        self.prototypes = prototypes;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn TextClassifier>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ClassificationCache::new(capacity);
        self
    }

    /// Run the cascade: cache -> pattern -> vector -> fallback.
    pub async fn classify(&self, input: &str) -> Result<Classification> {
        let key = cache::fingerprint(input);

        if let Some(hit) = self.cache.get(&key) {
            debug!(method = ?hit.method, "classifier cache hit");
            return Ok(hit);
        }

        let risk_level = patterns::match_risk(&self.risk_patterns, input).unwrap_or(RiskLevel::Low);

        if let Some(unit_id) = patterns::match_unit(&self.unit_patterns, input) {
            let classification = Classification {
                primary_unit: unit_id,
                secondary_units: Vec::new(),
                risk_level,
                confidence: patterns::PATTERN_TIER_CONFIDENCE,
                method: ClassificationMethod::Regex,
            };
            self.cache.insert(key, classification.clone());
            return Ok(classification);
        }

        if let Some(embedder) = &self.embedder {
            if !self.prototypes.is_empty() {
                match self.classify_by_vector(embedder.as_ref(), input).await {
                    Ok(Some((unit_id, score))) => {
                        let classification = Classification {
                            primary_unit: unit_id,
                            secondary_units: Vec::new(),
                            risk_level,
                            confidence: score as f64,
                            method: ClassificationMethod::Vector,
                        };
                        self.cache.insert(key, classification.clone());
                        return Ok(classification);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("vector tier degraded: {e}"),
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            let candidates = UnitId::canonical().to_vec();
            match fallback.classify(input, &candidates).await {
                Ok(unit_id) => {
                    let classification = Classification {
                        primary_unit: unit_id,
                        secondary_units: Vec::new(),
                        risk_level,
                        confidence: FALLBACK_TIER_CONFIDENCE,
                        method: ClassificationMethod::Llm,
                    };
                    self.cache.insert(key, classification.clone());
                    return Ok(classification);
                }
                Err(e) => debug!("fallback tier degraded: {e}"),
            }
        }

        let classification = Classification {
            primary_unit: UnitId::Reasoning,
            secondary_units: Vec::new(),
            risk_level,
            confidence: DEFAULT_TIER_CONFIDENCE,
            method: ClassificationMethod::Default,
        };
        self.cache.insert(key, classification.clone());
        Ok(classification)
    }

    async fn classify_by_vector(
        &self,
        embedder: &dyn Embedder,
        input: &str,
    ) -> Result<Option<(UnitId, f32)>> {
        let query = embedder
            .embed(input)
            .await
            .map_err(|e| BrainError::ClassifierFailure(e.to_string()))?;

        let mut best: Option<(UnitId, f32)> = None;
        for proto in &self.prototypes {
            for phrase in &proto.phrases {
                let score = cosine_similarity(&query, phrase);
                if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
                    best = Some((proto.unit_id.clone(), score));
                }
            }
        }

        Ok(best.filter(|(_, score)| *score >= VECTOR_TIER_THRESHOLD))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
