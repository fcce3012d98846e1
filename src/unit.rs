//! The unit capability set: the polymorphic interface implemented by
//! domain lobes supplied externally (spec.md §6.1).

use crate::blackboard::Blackboard;
use crate::error::Result;
use crate::ids::UnitId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A rough resource estimate a unit reports before or after running.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceEstimate {
    pub tokens: u32,
    pub time_ms: u32,
    pub gpu: bool,
}

/// Execution metadata attached to every [`LobeResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub start: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub tokens_used: u32,
    pub model_used: Option<String>,
    pub cache_hit: bool,
}

/// The outcome of a single unit invocation, including the three
/// replanning signals the phase executor inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobeResult {
    pub unit_id: UnitId,
    pub content: Value,
    pub metadata: ResultMetadata,
    pub confidence: f64,
    pub caveats: Vec<String>,
    pub request_replan: bool,
    pub replan_reason: Option<String>,
    pub suggest_units: Vec<UnitId>,
}

impl LobeResult {
    /// Construct a minimal result with default (zeroed) metadata, handy
    /// in tests and for units that don't track cost.
    pub fn new(unit_id: UnitId, content: Value, confidence: f64) -> Self {
        Self {
            unit_id,
            content,
            metadata: ResultMetadata {
                start: chrono::Utc::now(),
                duration_ms: 0,
                tokens_used: 0,
                model_used: None,
                cache_hit: false,
            },
            confidence,
            caveats: Vec::new(),
            request_replan: false,
            replan_reason: None,
            suggest_units: Vec::new(),
        }
    }

    pub fn with_replan(mut self, reason: impl Into<String>, suggest: Vec<UnitId>) -> Self {
        self.request_replan = true;
        self.replan_reason = Some(reason.into());
        self.suggest_units = suggest;
        self
    }

    /// Content rendered as a display string, used by phase aggregation
    /// when every result in a phase carries string content.
    pub fn content_as_str(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// The polymorphic capability set every cognitive unit implements. Units
/// are stateless with respect to each other; any mutable working memory
/// lives in the `Blackboard` clone handed to `process`.
#[async_trait]
pub trait Unit: Send + Sync {
    /// This unit's stable identifier.
    fn id(&self) -> UnitId;

    /// Run this unit against `input`, reading and writing only `state`
    /// (already an isolated clone owned by the caller). Must return
    /// promptly once `cancel` is triggered.
    async fn process(
        &self,
        input: &str,
        state: &Blackboard,
        cancel: CancellationToken,
    ) -> Result<LobeResult>;

    /// How well this unit thinks it can handle `text`, in `[0, 1]`.
    fn estimate_fitness(&self, text: &str) -> f64;

    /// A rough resource estimate for processing `input`.
    fn estimate_resources(&self, input: &str) -> ResourceEstimate;
}
