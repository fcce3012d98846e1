//! Declarative plan of phases over units (spec.md §4.E). Strategies are
//! values: not thread-shared, each request gets its own copy so the phase
//! executor can mutate the phase list in place when it replans.

use crate::ids::{ComputeTier, UnitId};

/// Default per-phase timeout when a phase doesn't specify one
/// (spec.md §4.F: "default 5 minutes if unspecified").
pub const DEFAULT_PHASE_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Timeout applied to an auto-appended "Replan Extension" phase.
pub const REPLAN_EXTENSION_TIMEOUT_MS: u64 = 30_000;

/// One element of a strategy: a set of units executed together under a
/// shared parallel-or-sequential policy, timeout, and replan eligibility.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: String,
    pub units: Vec<UnitId>,
    pub parallel: bool,
    pub timeout_ms: u64,
    pub can_replan: bool,
}

impl Phase {
    pub fn new(name: impl Into<String>, units: Vec<UnitId>, parallel: bool) -> Self {
        Self {
            name: name.into(),
            units,
            parallel,
            timeout_ms: DEFAULT_PHASE_TIMEOUT_MS,
            can_replan: false,
        }
    }
}

/// An ordered plan of phases over units, with a name and compute tier.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: String,
    pub tier: ComputeTier,
    pub phases: Vec<Phase>,
}

impl Strategy {
    pub fn new(name: impl Into<String>) -> StrategyBuilder {
        StrategyBuilder {
            name: name.into(),
            tier: ComputeTier::Hybrid,
            phases: Vec::new(),
        }
    }
}

/// Builder for [`Strategy`], matching the fluent `.tier(t).phase(...)...`
/// shape from spec.md §4.E.
pub struct StrategyBuilder {
    name: String,
    tier: ComputeTier,
    phases: Vec<Phase>,
}

impl StrategyBuilder {
    pub fn tier(mut self, tier: ComputeTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn phase(
        mut self,
        name: impl Into<String>,
        units: Vec<UnitId>,
        parallel: bool,
        timeout_ms: u64,
        can_replan: bool,
    ) -> Self {
        self.phases.push(Phase {
            name: name.into(),
            units,
            parallel,
            timeout_ms,
            can_replan,
        });
        self
    }

    pub fn build(self) -> Strategy {
        Strategy {
            name: self.name,
            tier: self.tier,
            phases: self.phases,
        }
    }
}

/// The kernel's canonical strategy library.
pub mod canonical {
    use super::*;

    pub fn quick_answer() -> Strategy {
        Strategy::new("quick-answer")
            .tier(ComputeTier::Fast)
            .phase("answer", vec![UnitId::Reasoning], false, 15_000, false)
            .build()
    }

    pub fn deep_reasoning() -> Strategy {
        Strategy::new("deep-reasoning")
            .tier(ComputeTier::Deep)
            .phase(
                "memory-and-reasoning",
                vec![UnitId::Memory, UnitId::Reasoning],
                true,
                60_000,
                true,
            )
            .phase("planning", vec![UnitId::Planning], false, 60_000, true)
            .phase("executive-summary", vec![UnitId::Executive], false, 30_000, false)
            .build()
    }

    pub fn coding() -> Strategy {
        Strategy::new("coding")
            .tier(ComputeTier::Deep)
            .phase("understand", vec![UnitId::Language, UnitId::Memory], true, 30_000, false)
            .phase("implement", vec![UnitId::Coding], false, 90_000, true)
            .build()
    }

    pub fn creative() -> Strategy {
        Strategy::new("creative")
            .tier(ComputeTier::Hybrid)
            .phase("ideate", vec![UnitId::Creative, UnitId::Emotional], true, 45_000, false)
            .phase("refine", vec![UnitId::Executive], false, 30_000, false)
            .build()
    }

    pub fn safety_first() -> Strategy {
        Strategy::new("safety-first")
            .tier(ComputeTier::Fast)
            .phase(
                "safety-screen",
                vec![UnitId::Safety, UnitId::Inhibition],
                true,
                10_000,
                false,
            )
            .phase("grounded-response", vec![UnitId::Reasoning, UnitId::Safety], true, 30_000, false)
            .build()
    }

    /// Pick the canonical strategy matching a primary unit. Callers apply
    /// the risk override (spec.md P8) before or after this lookup.
    pub fn for_primary_unit(unit_id: &UnitId) -> Strategy {
        match unit_id {
            UnitId::Coding => coding(),
            UnitId::Planning | UnitId::Causal | UnitId::Temporal => deep_reasoning(),
            UnitId::Creative | UnitId::Emotional => creative(),
            UnitId::Safety | UnitId::Inhibition => safety_first(),
            _ => quick_answer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_phases_in_declaration_order() {
        let strategy = Strategy::new("custom")
            .tier(ComputeTier::Max)
            .phase("p1", vec![UnitId::Reasoning], false, 1000, false)
            .phase("p2", vec![UnitId::Coding], true, 2000, true)
            .build();

        assert_eq!(strategy.phases.len(), 2);
        assert_eq!(strategy.phases[0].name, "p1");
        assert_eq!(strategy.phases[1].name, "p2");
        assert!(strategy.phases[1].can_replan);
    }

    #[test]
    fn canonical_strategies_are_non_empty() {
        for s in [
            canonical::quick_answer(),
            canonical::deep_reasoning(),
            canonical::coding(),
            canonical::creative(),
            canonical::safety_first(),
        ] {
            assert!(!s.phases.is_empty());
        }
    }
}
