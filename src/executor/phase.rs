//! Runs the phases of a strategy against a blackboard: parallel vs
//! sequential semantics, per-phase timeouts, and bounded replanning
//! (spec.md §4.F).

use super::{aggregate_final_content, ExecutionResult, PhaseSummary, MAX_REPLANS};
use crate::blackboard::Blackboard;
use crate::error::{BrainError, Result};
use crate::ids::UnitId;
use crate::registry::UnitRegistry;
use crate::strategy::{Phase, Strategy, REPLAN_EXTENSION_TIMEOUT_MS};
use crate::unit::LobeResult;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Executes a [`Strategy`] to completion, folding unit results into a
/// chain of blackboard clones and honoring the replan budget.
pub struct PhaseExecutor<'a> {
    registry: &'a UnitRegistry,
}

impl<'a> PhaseExecutor<'a> {
    pub fn new(registry: &'a UnitRegistry) -> Self {
        Self { registry }
    }

    /// Run `strategy` against `blackboard` for `input`. `deadline` is an
    /// optional outer wall-clock bound: per spec.md §9's open question,
    /// the outer deadline always wins over a replan-appended phase's own
    /// timeout.
    pub async fn run(
        &self,
        input: &str,
        blackboard: Blackboard,
        mut strategy: Strategy,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let mut current_bb = blackboard;
        let mut all_results: Vec<LobeResult> = Vec::new();
        let mut phase_summaries: Vec<PhaseSummary> = Vec::new();
        let mut replan_count: u32 = 0;

        let mut i = 0;
        while i < strategy.phases.len() {
            if cancel.is_cancelled() {
                return Err(BrainError::RequestCancelled);
            }

            let phase = strategy.phases[i].clone();
            let phase_timeout = clamp_to_deadline(phase.timeout_ms, deadline);
            let phase_start = Instant::now();

            let (exit_bb, phase_results) = self
                .run_phase(input, &current_bb, &phase, phase_timeout, cancel.clone())
                .await?;

            let duration_ms = phase_start.elapsed().as_millis() as u64;
            current_bb = exit_bb;

            let mut replanned = false;
            if phase.can_replan {
                replanned = self.apply_replans(&phase_results, &mut strategy, i, &mut replan_count);
            }

            phase_summaries.push(PhaseSummary {
                name: phase.name.clone(),
                duration_ms,
                units: phase.units.clone(),
                replanned,
            });

            info!(phase = %phase.name, duration_ms, replanned, "phase complete");
            all_results.extend(phase_results);
            i += 1;
        }

        let final_content = aggregate_final_content(&all_results);
        Ok(ExecutionResult {
            results: all_results,
            final_content,
            total_wall_time_ms: start.elapsed().as_millis() as u64,
            replan_count,
            phase_summaries,
            strategy_used: strategy.name,
            classification: None,
        })
    }

    async fn run_phase(
        &self,
        input: &str,
        phase_entry: &Blackboard,
        phase: &Phase,
        timeout_ms: u64,
        cancel: CancellationToken,
    ) -> Result<(Blackboard, Vec<LobeResult>)> {
        let phase_cancel = cancel.child_token();
        let timeout_dur = Duration::from_millis(timeout_ms.max(1));

        let body = if phase.parallel {
            self.run_parallel_phase(input, phase_entry, phase, phase_cancel.clone())
        } else {
            self.run_sequential_phase(input, phase_entry, phase, phase_cancel.clone())
        };

        match tokio::time::timeout(timeout_dur, body).await {
            Ok(inner) => inner,
            Err(_) => {
                phase_cancel.cancel();
                Err(BrainError::PhaseTimeout {
                    phase: phase.name.clone(),
                    timeout_ms,
                })
            }
        }
    }

    async fn run_sequential_phase(
        &self,
        input: &str,
        phase_entry: &Blackboard,
        phase: &Phase,
        cancel: CancellationToken,
    ) -> Result<(Blackboard, Vec<LobeResult>)> {
        let mut working = phase_entry.clone();
        let mut results = Vec::new();

        for unit_id in &phase.units {
            let Some(unit) = self.registry.get(unit_id) else {
                warn!(unit = %unit_id, "unit not registered, skipping in sequential phase");
                continue;
            };

            let result = unit
                .process(input, &working, cancel.clone())
                .await
                .map_err(|e| {
                    BrainError::unit_processing(unit_id.to_string(), e.to_string())
                        .context(format!("phase '{}'", phase.name))
                })?;

            let next = working.clone();
            next.merge(&result);
            working = next;
            results.push(result);
        }

        Ok((working, results))
    }

    async fn run_parallel_phase(
        &self,
        input: &str,
        phase_entry: &Blackboard,
        phase: &Phase,
        cancel: CancellationToken,
    ) -> Result<(Blackboard, Vec<LobeResult>)> {
        let units: Vec<_> = phase
            .units
            .iter()
            .filter_map(|id| match self.registry.get(id) {
                Some(u) => Some(u),
                None => {
                    warn!(unit = %id, "unit not registered, skipping in parallel phase");
                    None
                }
            })
            .collect();

        let tasks = units.into_iter().map(|unit| {
            let branch_bb = phase_entry.clone();
            let input = input.to_string();
            let cancel = cancel.clone();
            tokio::spawn(async move { unit.process(&input, &branch_bb, cancel).await })
        });

        let joined = join_all(tasks).await;

        let mut working = phase_entry.clone();
        let mut results = Vec::new();
        for outcome in joined {
            let result = outcome
                .map_err(|e| BrainError::other(format!("unit task panicked: {e}")))?
                .map_err(|e| {
                    BrainError::unit_processing("parallel-phase-unit", e.to_string())
                        .context(format!("phase '{}'", phase.name))
                })?;

            let next = working.clone();
            next.merge(&result);
            working = next;
            results.push(result);
        }

        Ok((working, results))
    }

    /// Scan completed results for replan requests and extend the strategy
    /// in place, honoring the bounded budget (spec.md §4.F, P6).
    fn apply_replans(
        &self,
        phase_results: &[LobeResult],
        strategy: &mut Strategy,
        current_index: usize,
        replan_count: &mut u32,
    ) -> bool {
        let mut replanned = false;

        for result in phase_results {
            if !result.request_replan || result.suggest_units.is_empty() {
                continue;
            }

            if *replan_count >= MAX_REPLANS {
                warn!("replan budget exhausted, ignoring further replan request");
                continue;
            }

            let suggested: Vec<UnitId> = result.suggest_units.clone();
            if let Some(next_phase) = strategy.phases.get_mut(current_index + 1) {
                next_phase.units.extend(suggested);
            } else {
                strategy.phases.push(Phase {
                    name: "Replan Extension".to_string(),
                    units: suggested,
                    parallel: true,
                    timeout_ms: REPLAN_EXTENSION_TIMEOUT_MS,
                    can_replan: true,
                });
            }

            *replan_count += 1;
            replanned = true;
        }

        replanned
    }
}

fn clamp_to_deadline(phase_timeout_ms: u64, deadline: Option<Instant>) -> u64 {
    match deadline {
        Some(d) => {
            let remaining = d.saturating_duration_since(Instant::now()).as_millis() as u64;
            phase_timeout_ms.min(remaining.max(1))
        }
        None => phase_timeout_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::ids::UnitId;
    use crate::registry::UnitRegistry;
    use crate::unit::{ResourceEstimate, Unit};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct EchoUnit(UnitId);

    #[async_trait]
    impl Unit for EchoUnit {
        fn id(&self) -> UnitId {
            self.0.clone()
        }

        async fn process(
            &self,
            input: &str,
            _state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            Ok(LobeResult::new(self.0.clone(), json!(format!("{:?}:{input}", self.0)), 0.8))
        }

        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }

        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    struct SeesPriorWritesUnit {
        id: UnitId,
        saw_prior: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Unit for SeesPriorWritesUnit {
        fn id(&self) -> UnitId {
            self.id.clone()
        }

        async fn process(
            &self,
            _input: &str,
            state: &Blackboard,
            _cancel: CancellationToken,
        ) -> Result<LobeResult> {
            if state.get("Memory").1 {
                self.saw_prior.fetch_add(1, Ordering::SeqCst);
            }
            Ok(LobeResult::new(self.id.clone(), json!("ok"), 1.0))
        }

        fn estimate_fitness(&self, _text: &str) -> f64 {
            0.5
        }

        fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
            ResourceEstimate::default()
        }
    }

    fn registry_with(units: Vec<Arc<dyn Unit>>) -> UnitRegistry {
        let reg = UnitRegistry::new();
        for u in units {
            reg.register(u);
        }
        reg
    }

    #[tokio::test]
    async fn scenario_quick_coding_query_concatenates_phase_outputs() {
        let reg = registry_with(vec![Arc::new(EchoUnit(UnitId::Coding))]);
        let executor = PhaseExecutor::new(&reg);
        let strategy = crate::strategy::canonical::coding();
        let bb = Blackboard::new("conv-1");

        let result = executor
            .run("write a python function to reverse a string", bb, strategy, CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.replan_count, 0);
        assert!(result.final_content.as_str().unwrap().contains("Coding"));
    }

    #[tokio::test]
    async fn p7_sequential_units_see_prior_merged_writes() {
        let saw_prior = Arc::new(AtomicUsize::new(0));
        let reg = registry_with(vec![
            Arc::new(EchoUnit(UnitId::Memory)),
            Arc::new(SeesPriorWritesUnit {
                id: UnitId::Reasoning,
                saw_prior: saw_prior.clone(),
            }),
        ]);
        let executor = PhaseExecutor::new(&reg);
        let strategy = Strategy::new("seq-test")
            .phase("p1", vec![UnitId::Memory, UnitId::Reasoning], false, 5_000, false)
            .build();
        let bb = Blackboard::new("conv-1");

        executor.run("hi", bb, strategy, CancellationToken::new(), None).await.unwrap();
        assert_eq!(saw_prior.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn p5_parallel_phase_confidence_is_order_independent() {
        let reg = registry_with(vec![
            Arc::new(EchoUnit(UnitId::Memory)),
            Arc::new(EchoUnit(UnitId::Reasoning)),
            Arc::new(EchoUnit(UnitId::Planning)),
        ]);
        let executor = PhaseExecutor::new(&reg);
        let strategy = Strategy::new("parallel-test")
            .phase("p1", vec![UnitId::Memory, UnitId::Reasoning, UnitId::Planning], true, 5_000, false)
            .build();
        let bb = Blackboard::new("conv-1");

        let result = executor.run("hi", bb, strategy, CancellationToken::new(), None).await.unwrap();

        // Each EchoUnit reports confidence 0.8; the product is
        // order-independent regardless of completion order.
        let mut contents: Vec<String> = result
            .results
            .iter()
            .map(|r| r.content.as_str().unwrap().to_string())
            .collect();
        contents.sort();
        assert_eq!(contents.len(), 3);
        assert!(contents.iter().any(|c| c.contains("Memory")));
        assert!(contents.iter().any(|c| c.contains("Reasoning")));
        assert!(contents.iter().any(|c| c.contains("Planning")));
    }

    #[tokio::test]
    async fn scenario_deep_reasoning_replan_appends_suggested_units() {
        struct ReplanOnceUnit;
        #[async_trait]
        impl Unit for ReplanOnceUnit {
            fn id(&self) -> UnitId {
                UnitId::Reasoning
            }
            async fn process(
                &self,
                _input: &str,
                _state: &Blackboard,
                _cancel: CancellationToken,
            ) -> Result<LobeResult> {
                Ok(LobeResult::new(UnitId::Reasoning, json!("partial plan"), 0.7)
                    .with_replan("need causal/temporal context", vec![UnitId::Causal, UnitId::Temporal]))
            }
            fn estimate_fitness(&self, _text: &str) -> f64 {
                0.5
            }
            fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
                ResourceEstimate::default()
            }
        }

        let reg = registry_with(vec![
            Arc::new(EchoUnit(UnitId::Memory)),
            Arc::new(ReplanOnceUnit),
            Arc::new(EchoUnit(UnitId::Planning)),
            Arc::new(EchoUnit(UnitId::Causal)),
            Arc::new(EchoUnit(UnitId::Temporal)),
        ]);
        let executor = PhaseExecutor::new(&reg);
        let strategy = crate::strategy::canonical::deep_reasoning();
        let bb = Blackboard::new("conv-1");

        let result = executor
            .run("plan a migration from service A to service B", bb, strategy, CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(result.replan_count, 1);
        let planning_units: Vec<&UnitId> = result
            .phase_summaries
            .iter()
            .find(|p| p.name == "planning")
            .map(|p| p.units.iter().collect())
            .unwrap_or_default();
        assert!(planning_units.contains(&&UnitId::Causal));
        assert!(planning_units.contains(&&UnitId::Temporal));
    }

    #[tokio::test]
    async fn p6_replan_budget_caps_appended_phases() {
        struct AlwaysReplanUnit;
        #[async_trait]
        impl Unit for AlwaysReplanUnit {
            fn id(&self) -> UnitId {
                UnitId::Reasoning
            }
            async fn process(
                &self,
                _input: &str,
                _state: &Blackboard,
                _cancel: CancellationToken,
            ) -> Result<LobeResult> {
                Ok(LobeResult::new(UnitId::Reasoning, json!("more"), 0.9)
                    .with_replan("needs more context", vec![UnitId::Memory]))
            }
            fn estimate_fitness(&self, _text: &str) -> f64 {
                0.5
            }
            fn estimate_resources(&self, _input: &str) -> ResourceEstimate {
                ResourceEstimate::default()
            }
        }

        let reg = registry_with(vec![Arc::new(AlwaysReplanUnit), Arc::new(EchoUnit(UnitId::Memory))]);
        let executor = PhaseExecutor::new(&reg);
        // A single can_replan phase whose only unit always requests a
        // replan: each run of this phase consumes one budget slot via the
        // trailing "Replan Extension" phase it appends, which itself can
        // replan, so the loop runs until the budget of 3 is exhausted.
        let strategy = Strategy::new("replan-test")
            .phase("p1", vec![UnitId::Reasoning], false, 5_000, true)
            .build();
        let bb = Blackboard::new("conv-1");

        let result = executor.run("go", bb, strategy, CancellationToken::new(), None).await.unwrap();
        assert!(result.replan_count <= MAX_REPLANS);
    }
}
