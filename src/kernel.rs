//! Executive Facade (component K): the single end-to-end entry point,
//! `process(input) -> ExecutionResult` (spec.md §4.K).

use crate::blackboard::Blackboard;
use crate::classifier::Classifier;
use crate::error::Result;
use crate::executor::phase::PhaseExecutor;
use crate::executor::ExecutionResult;
use crate::outcome_logger::{ExecutionRecord, Outcome, OutcomeLogger};
use crate::registry::UnitRegistry;
use crate::resource_monitor::ResourceMonitor;
use crate::strategy::canonical;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// The brain kernel: owns the unit registry and wires classification,
/// strategy selection, and phase execution into one call.
pub struct BrainKernel {
    registry: Arc<UnitRegistry>,
    classifier: Classifier,
    outcome_logger: Option<OutcomeLogger>,
    resource_monitor: Option<Arc<ResourceMonitor>>,
}

impl BrainKernel {
    pub fn new(registry: Arc<UnitRegistry>, classifier: Classifier) -> Self {
        Self {
            registry,
            classifier,
            outcome_logger: None,
            resource_monitor: None,
        }
    }

    pub fn with_outcome_logger(mut self, logger: OutcomeLogger) -> Self {
        self.outcome_logger = Some(logger);
        self
    }

    pub fn with_resource_monitor(mut self, monitor: Arc<ResourceMonitor>) -> Self {
        self.resource_monitor = Some(monitor);
        self
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    pub fn outcome_logger(&self) -> Option<&OutcomeLogger> {
        self.outcome_logger.as_ref()
    }

    /// Classify, select a strategy, execute it, and attach the
    /// classification to the result.
    pub async fn process(&self, input: &str) -> Result<ExecutionResult> {
        self.process_with_cancel(input, CancellationToken::new()).await
    }

    pub async fn process_with_cancel(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let classification = self.classifier.classify(input).await?;
        let strategy = if classification.risk_level.forces_safety_first() {
            canonical::safety_first()
        } else {
            canonical::for_primary_unit(&classification.primary_unit)
        };

        info!(
            request_id = %request_id,
            primary_unit = %classification.primary_unit,
            risk = ?classification.risk_level,
            strategy = %strategy.name,
            "kernel dispatching request"
        );

        let blackboard = Blackboard::new(request_id.clone());
        let executor = PhaseExecutor::new(&self.registry);
        let outcome = executor
            .run(input, blackboard, strategy, cancel, None)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(mut result) => {
                result.classification = Some(classification.clone());
                self.log_outcome(&request_id, input, Some(classification), &result, latency_ms);
                Ok(result)
            }
            Err(e) => {
                if let Some(logger) = &self.outcome_logger {
                    logger.record(ExecutionRecord {
                        id: request_id,
                        input: input.to_string(),
                        classification: Some(classification),
                        strategy: "unknown".to_string(),
                        result: serde_json::Value::Null,
                        outcome: Outcome {
                            success: false,
                            confidence: 0.0,
                            latency_ms,
                            tokens_used: 0,
                            replan_count: 0,
                            error: Some(e.to_string()),
                        },
                        feedback: None,
                        system_metrics: self.resource_monitor.as_ref().map(|m| m.get_metrics()),
                        created_at: Utc::now(),
                    });
                }
                Err(e)
            }
        }
    }

    fn log_outcome(
        &self,
        request_id: &str,
        input: &str,
        classification: Option<crate::classifier::Classification>,
        result: &ExecutionResult,
        latency_ms: u64,
    ) {
        let Some(logger) = &self.outcome_logger else {
            return;
        };

        let tokens_used: u32 = result
            .results
            .iter()
            .map(|r| r.metadata.tokens_used)
            .sum();

        logger.record(ExecutionRecord {
            id: request_id.to_string(),
            input: input.to_string(),
            classification,
            strategy: result.strategy_used.clone(),
            result: result.final_content.clone(),
            outcome: Outcome {
                success: true,
                confidence: result.results.last().map(|r| r.confidence).unwrap_or(0.0),
                latency_ms,
                tokens_used,
                replan_count: result.replan_count,
                error: None,
            },
            feedback: None,
            system_metrics: self.resource_monitor.as_ref().map(|m| m.get_metrics()),
            created_at: Utc::now(),
        });
    }
}
