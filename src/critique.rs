//! Self-critique loop (component H): gates a candidate result behind a
//! metacognition (quality) check and an inhibition (safety) check, with a
//! bounded refinement budget (spec.md §4.H).

use crate::blackboard::Blackboard;
use crate::error::Result;
use crate::ids::UnitId;
use crate::registry::UnitRegistry;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Bounded refinement attempts before giving up and flagging for replan.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Combined confidence floor below which another refinement pass is tried.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Multiplicative penalty applied when inhibition raises a concern.
const SAFETY_PENALTY: f64 = 0.5;

pub struct CritiqueConfig {
    pub max_retries: u32,
    pub min_confidence: f64,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Outcome of running the critique loop over a candidate result.
#[derive(Debug, Clone)]
pub struct CritiqueOutcome {
    pub content: Value,
    pub combined_confidence: f64,
    pub attempts: u32,
    pub concerns: Vec<String>,
    pub refinements: Vec<String>,
    pub needs_replan: bool,
}

/// Runs the metacognition+inhibition dual gate over a candidate result,
/// looked up from the unit registry by their canonical ids.
pub struct CritiqueLoop<'a> {
    registry: &'a UnitRegistry,
    config: CritiqueConfig,
}

impl<'a> CritiqueLoop<'a> {
    pub fn new(registry: &'a UnitRegistry) -> Self {
        Self {
            registry,
            config: CritiqueConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CritiqueConfig) -> Self {
        self.config = config;
        self
    }

    /// Gate `content` (at `initial_confidence`) through up to `max_retries`
    /// refinement rounds, consulting [`UnitId::Metacognition`] and
    /// [`UnitId::Inhibition`] against `state`.
    pub async fn run(
        &self,
        content: Value,
        initial_confidence: f64,
        state: &Blackboard,
        cancel: CancellationToken,
    ) -> Result<CritiqueOutcome> {
        let metacog = self.registry.get(&UnitId::Metacognition);
        let inhibition = self.registry.get(&UnitId::Inhibition);

        let mut current_content = content;
        let mut current_confidence = initial_confidence;
        let mut concerns = Vec::new();
        let mut refinements = Vec::new();

        for attempt in 0..self.config.max_retries {
            if cancel.is_cancelled() {
                info!(attempt, "critique loop cancelled, returning best effort");
                return Ok(CritiqueOutcome {
                    content: current_content,
                    combined_confidence: current_confidence,
                    attempts: attempt,
                    concerns,
                    refinements,
                    needs_replan: false,
                });
            }

            let (metacog_confidence, metacog_requested_replan, suggestions) = match &metacog {
                Some(unit) => {
                    let input = current_content.to_string();
                    match unit.process(&input, state, cancel.clone()).await {
                        Ok(result) => (result.confidence, result.request_replan, result.caveats),
                        Err(e) => {
                            warn!("metacognition unit failed: {e}");
                            (current_confidence, false, Vec::new())
                        }
                    }
                }
                None => (current_confidence, false, Vec::new()),
            };
            refinements.extend(suggestions);

            let mut combined = (metacog_confidence + current_confidence) / 2.0;

            if let Some(unit) = &inhibition {
                let input = current_content.to_string();
                match unit.process(&input, state, cancel.clone()).await {
                    Ok(result) => {
                        if result.request_replan || !result.caveats.is_empty() {
                            combined *= SAFETY_PENALTY;
                            concerns.extend(result.caveats);
                        }
                    }
                    Err(e) => warn!("inhibition unit failed: {e}"),
                }
            }

            if combined >= self.config.min_confidence {
                return Ok(CritiqueOutcome {
                    content: current_content,
                    combined_confidence: combined,
                    attempts: attempt + 1,
                    concerns,
                    refinements,
                    needs_replan: false,
                });
            }

            if !metacog_requested_replan {
                return Ok(CritiqueOutcome {
                    content: current_content,
                    combined_confidence: combined,
                    attempts: attempt + 1,
                    concerns,
                    refinements,
                    needs_replan: false,
                });
            }

            state.set("critique_feedback", Value::from(refinements.clone()));
            state.set("critique_confidence", Value::from(combined));
            current_confidence = combined;
        }

        info!(max_retries = self.config.max_retries, "critique budget exhausted");
        Ok(CritiqueOutcome {
            content: current_content,
            combined_confidence: current_confidence,
            attempts: self.config.max_retries,
            concerns,
            refinements,
            needs_replan: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{LobeResult, ResourceEstimate, Unit};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct ConfidentMetacog;

    #[async_trait]
    impl Unit for ConfidentMetacog {
        fn id(&self) -> UnitId {
            UnitId::Metacognition
        }
        async fn process(
            &self,
            _input: &str,
            _state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            Ok(LobeResult::new(UnitId::Metacognition, json!("ok"), 0.95))
        }
        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }
        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    struct CleanInhibition;

    #[async_trait]
    impl Unit for CleanInhibition {
        fn id(&self) -> UnitId {
            UnitId::Inhibition
        }
        async fn process(
            &self,
            _input: &str,
            _state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            Ok(LobeResult::new(UnitId::Inhibition, json!("clean"), 1.0))
        }
        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }
        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    struct FlaggingInhibition;

    #[async_trait]
    impl Unit for FlaggingInhibition {
        fn id(&self) -> UnitId {
            UnitId::Inhibition
        }
        async fn process(
            &self,
            _input: &str,
            _state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            Ok(LobeResult::new(UnitId::Inhibition, json!("risk"), 1.0)
                .with_replan("risky phrasing", vec![]))
        }
        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }
        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    fn registry(units: Vec<Arc<dyn Unit>>) -> UnitRegistry {
        let reg = UnitRegistry::new();
        for u in units {
            reg.register(u);
        }
        reg
    }

    #[tokio::test]
    async fn high_confidence_accepts_on_first_pass() {
        let reg = registry(vec![Arc::new(ConfidentMetacog), Arc::new(CleanInhibition)]);
        let loop_ = CritiqueLoop::new(&reg);
        let bb = Blackboard::new("conv-1");

        let outcome = loop_
            .run(json!("draft"), 0.9, &bb, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.needs_replan);
        assert!(outcome.combined_confidence >= DEFAULT_MIN_CONFIDENCE);
    }

    #[tokio::test]
    async fn p9_exhausted_budget_flags_needs_replan() {
        struct LowMetacog;
        #[async_trait]
        impl Unit for LowMetacog {
            fn id(&self) -> UnitId {
                UnitId::Metacognition
            }
            async fn process(
                &self,
                _input: &str,
                _state: &Blackboard,
                _cancel: CancellationToken,
            ) -> Result<LobeResult> {
                Ok(LobeResult::new(UnitId::Metacognition, json!("weak"), 0.2)
                    .with_replan("needs another pass", vec![]))
            }
            fn estimate_fitness(&self, _text: &str) -> f64 {
                0.5
            }
            fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
                ResourceEstimate::default()
            }
        }

        let reg = registry(vec![Arc::new(LowMetacog), Arc::new(FlaggingInhibition)]);
        let loop_ = CritiqueLoop::new(&reg).with_config(CritiqueConfig {
            max_retries: 2,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        });
        let bb = Blackboard::new("conv-1");

        let outcome = loop_
            .run(json!("draft"), 0.5, &bb, CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.needs_replan);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn no_replan_requested_accepts_despite_low_confidence() {
        struct LowMetacogNoReplan;
        #[async_trait]
        impl Unit for LowMetacogNoReplan {
            fn id(&self) -> UnitId {
                UnitId::Metacognition
            }
            async fn process(
                &self,
                _input: &str,
                _state: &Blackboard,
                _cancel: CancellationToken,
            ) -> Result<LobeResult> {
                Ok(LobeResult::new(UnitId::Metacognition, json!("meh"), 0.4))
            }
            fn estimate_fitness(&self, _text: &str) -> f64 {
                0.5
            }
            fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
                ResourceEstimate::default()
            }
        }

        let reg = registry(vec![Arc::new(LowMetacogNoReplan), Arc::new(CleanInhibition)]);
        let loop_ = CritiqueLoop::new(&reg);
        let bb = Blackboard::new("conv-1");

        let outcome = loop_
            .run(json!("draft"), 0.4, &bb, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.needs_replan);
    }
}
