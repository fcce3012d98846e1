//! Parallel branch executor (component G, "Mind-Evolution"): runs several
//! thinking strategies concurrently over isolated blackboard clones and
//! selects a winner by confidence-weighted consensus (spec.md §4.G).
//!
//! A semaphore bounds concurrency, each branch runs as its own spawned
//! task, and results are joined and folded by a dedicated aggregation step.

use crate::blackboard::Blackboard;
use crate::error::{BrainError, Result};
use crate::executor::phase::PhaseExecutor;
use crate::executor::ExecutionResult;
use crate::registry::UnitRegistry;
use crate::strategy::Strategy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default cap on concurrently running branches.
pub const DEFAULT_MAX_BRANCHES: usize = 3;

/// Confidence floor below which a completed branch is discarded.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 0.3;

/// A relevant reusable skill pattern surfaced by a [`SkillLibrary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillPattern {
    pub name: String,
    pub content: String,
}

/// Predicts likely-useful memories before a branch set launches.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, input: &str) -> Result<Vec<(String, String, f64)>>;
}

/// Surfaces reusable skill patterns before a branch set launches.
#[async_trait]
pub trait SkillLibrary: Send + Sync {
    async fn relevant_skills(&self, input: &str, k: usize) -> Result<Vec<SkillPattern>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Pruned,
}

/// Per-branch execution record, kept regardless of outcome for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchState {
    pub id: String,
    pub strategy_name: String,
    pub status: BranchStatus,
    pub confidence: f64,
    pub start: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(skip)]
    pub content: serde_json::Value,
}

/// Aggregated outcome of a branch set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub content: serde_json::Value,
    pub confidence: f64,
    pub branch_count: usize,
    pub winning_branch_id: String,
    pub duration_ms: u64,
    pub branches: Vec<BranchState>,
}

pub struct BranchExecutorConfig {
    pub max_branches: usize,
    pub prune_threshold: f64,
    pub skills_k: usize,
}

impl Default for BranchExecutorConfig {
    fn default() -> Self {
        Self {
            max_branches: DEFAULT_MAX_BRANCHES,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            skills_k: 5,
        }
    }
}

/// Runs a set of strategies concurrently as branches and aggregates by
/// confidence-weighted consensus.
pub struct BranchExecutor {
    registry: Arc<UnitRegistry>,
    config: BranchExecutorConfig,
    predictor: Option<Arc<dyn Predictor>>,
    skill_library: Option<Arc<dyn SkillLibrary>>,
}

impl BranchExecutor {
    pub fn new(registry: Arc<UnitRegistry>) -> Self {
        Self {
            registry,
            config: BranchExecutorConfig::default(),
            predictor: None,
            skill_library: None,
        }
    }

    pub fn with_config(mut self, config: BranchExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_skill_library(mut self, skill_library: Arc<dyn SkillLibrary>) -> Self {
        self.skill_library = Some(skill_library);
        self
    }

    /// Explore `strategies` (truncated to `max_branches`) concurrently over
    /// isolated clones of `blackboard`, then select the highest-confidence
    /// survivor (spec.md P10).
    pub async fn run(
        &self,
        input: &str,
        blackboard: Blackboard,
        strategies: Vec<Strategy>,
        cancel: CancellationToken,
    ) -> Result<ConsensusResult> {
        let start = Instant::now();
        let seeded = self.prepare_blackboard(input, blackboard).await?;

        let strategies: Vec<Strategy> = strategies.into_iter().take(self.config.max_branches).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.max_branches));

        let tasks = strategies.into_iter().enumerate().map(|(index, strategy)| {
            let branch_bb = seeded.clone();
            let registry = self.registry.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.child_token();
            let input = input.to_string();
            let strategy_name = strategy.name.clone();
            let branch_id = format!("branch-{index}");

            async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let branch_start = Utc::now();
                let branch_start_instant = Instant::now();

                if cancel.is_cancelled() {
                    return BranchState {
                        id: branch_id,
                        strategy_name,
                        status: BranchStatus::Failed,
                        confidence: 0.0,
                        start: branch_start,
                        duration_ms: 0,
                        error: Some("cancelled".to_string()),
                        content: serde_json::Value::Null,
                    };
                }

                let executor = PhaseExecutor::new(&registry);
                let outcome = executor
                    .run(&input, branch_bb, strategy, cancel.clone(), None)
                    .await;

                let duration_ms = branch_start_instant.elapsed().as_millis() as u64;
                match outcome {
                    Ok(result) => BranchState {
                        id: branch_id,
                        strategy_name,
                        status: BranchStatus::Completed,
                        confidence: branch_confidence(&result),
                        start: branch_start,
                        duration_ms,
                        error: None,
                        content: result.final_content,
                    },
                    Err(e) => BranchState {
                        id: branch_id,
                        strategy_name,
                        status: BranchStatus::Failed,
                        confidence: 0.0,
                        start: branch_start,
                        duration_ms,
                        error: Some(e.to_string()),
                        content: serde_json::Value::Null,
                    },
                }
            }
        });

        let spawned: Vec<_> = tasks.map(tokio::spawn).collect();
        let results = join_all(spawned).await;

        let mut branch_states = Vec::with_capacity(results.len());
        for outcome in results {
            match outcome {
                Ok(state) => branch_states.push(state),
                Err(e) => warn!("branch task panicked: {e}"),
            }
        }

        self.aggregate(branch_states, start.elapsed())
    }

    async fn prepare_blackboard(&self, input: &str, blackboard: Blackboard) -> Result<Blackboard> {
        if let Some(predictor) = &self.predictor {
            match predictor.predict(input).await {
                Ok(predictions) => {
                    for (id, content, confidence) in predictions {
                        blackboard.add_memory(crate::blackboard::Memory {
                            id,
                            content,
                            source: "prediction".to_string(),
                            relevance: confidence,
                        });
                    }
                }
                Err(e) => warn!("predictor degraded: {e}"),
            }
        }

        if let Some(library) = &self.skill_library {
            match library.relevant_skills(input, self.config.skills_k).await {
                Ok(skills) => {
                    blackboard.set(
                        "available_skills".to_string(),
                        serde_json::to_value(&skills).unwrap_or(serde_json::Value::Null),
                    );
                }
                Err(e) => warn!("skill library degraded: {e}"),
            }
        }

        Ok(blackboard)
    }

    fn aggregate(&self, branches: Vec<BranchState>, elapsed: Duration) -> Result<ConsensusResult> {
        let (survivor_count, winning_branch_id, winning_content, winning_confidence) = {
            let survivors: Vec<&BranchState> = branches
                .iter()
                .filter(|b| b.status == BranchStatus::Completed && b.confidence >= self.config.prune_threshold)
                .collect();

            let winner = survivors.iter().max_by(|a, b| {
                a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal)
            });

            let Some(winner) = winner else {
                info!(attempted = branches.len(), "no branch survived pruning");
                return Err(BrainError::NoBranchesCompleted);
            };

            (survivors.len(), winner.id.clone(), winner.content.clone(), winner.confidence)
        };

        info!(
            winner = %winning_branch_id,
            survivors = survivor_count,
            attempted = branches.len(),
            "branch consensus selected"
        );

        Ok(ConsensusResult {
            content: winning_content,
            confidence: winning_confidence,
            branch_count: survivor_count,
            winning_branch_id,
            duration_ms: elapsed.as_millis() as u64,
            branches,
        })
    }
}

fn branch_confidence(result: &ExecutionResult) -> f64 {
    if result.results.is_empty() {
        return 0.0;
    }
    let sum: f64 = result.results.iter().map(|r| r.confidence).sum();
    sum / result.results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UnitId;
    use crate::registry::UnitRegistry;
    use crate::strategy::Strategy;
    use crate::unit::{LobeResult, ResourceEstimate, Unit};
    use serde_json::json;

    struct ConfidentUnit(f64);

    #[async_trait]
    impl Unit for ConfidentUnit {
        fn id(&self) -> UnitId {
            UnitId::Reasoning
        }
        async fn process(
            &self,
            _input: &str,
            _state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            Ok(LobeResult::new(UnitId::Reasoning, json!("answer"), self.0))
        }
        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }
        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    struct FailingUnit;

    #[async_trait]
    impl Unit for FailingUnit {
        fn id(&self) -> UnitId {
            UnitId::Creative
        }
        async fn process(
            &self,
            _input: &str,
            _state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            Err(BrainError::other("branch failed"))
        }
        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }
        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    fn strategy_for(unit: UnitId) -> Strategy {
        Strategy::new(format!("{unit:?}"))
            .phase("only", vec![unit], false, 5_000, false)
            .build()
    }

    #[tokio::test]
    async fn scenario_parallel_branches_pick_max_confidence_survivor() {
        let registry = Arc::new(UnitRegistry::new());
        registry.register(Arc::new(ConfidentUnit(0.82)));
        registry.register(Arc::new(FailingUnit));

        let executor = BranchExecutor::new(registry);
        let strategies = vec![strategy_for(UnitId::Reasoning), strategy_for(UnitId::Creative)];
        let bb = Blackboard::new("conv-1");

        let result = executor.run("plan this", bb, strategies, CancellationToken::new()).await.unwrap();
        assert_eq!(result.branch_count, 1);
        assert_eq!(result.confidence, 0.82);
    }

    #[tokio::test]
    async fn p10_no_surviving_branch_returns_sentinel_error() {
        let registry = Arc::new(UnitRegistry::new());
        registry.register(Arc::new(ConfidentUnit(0.1)));
        let executor = BranchExecutor::new(registry);
        let strategies = vec![strategy_for(UnitId::Reasoning)];
        let bb = Blackboard::new("conv-1");

        let err = executor.run("plan this", bb, strategies, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BrainError::NoBranchesCompleted));
    }
}
