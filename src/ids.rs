//! Stable identifiers for units, risk levels, and compute tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque identifier naming a cognitive processing unit ("lobe").
///
/// The kernel predefines the canonical families below; anything else is a
/// `Custom` id, which is still a valid `UnitId` but must be registered in
/// the [`crate::unit::UnitRegistry`] before it can be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitId {
    // -- Perception --------------------------------------------------
    Perception,
    Language,
    Visual,

    // -- Cognition ----------------------------------------------------
    Reasoning,
    Memory,
    Planning,
    Causal,
    Temporal,

    // -- Social / emotional --------------------------------------------
    Emotional,
    Social,
    Empathy,

    // -- Specialized reasoning ------------------------------------------
    Coding,
    Mathematical,
    Creative,
    Research,

    // -- Executive --------------------------------------------------
    Executive,
    Metacognition,
    Attention,

    // -- Safety --------------------------------------------------------
    Inhibition,
    Safety,

    /// An id not in the canonical set, for deployments with extra lobes.
    Custom(String),
}

impl UnitId {
    /// The ~20 canonical identifiers the kernel predefines, grouped by family.
    pub fn canonical() -> &'static [UnitId] {
        use UnitId::*;
        const CANON: &[UnitId] = &[
            Perception,
            Language,
            Visual,
            Reasoning,
            Memory,
            Planning,
            Causal,
            Temporal,
            Emotional,
            Social,
            Empathy,
            Coding,
            Mathematical,
            Creative,
            Research,
            Executive,
            Metacognition,
            Attention,
            Inhibition,
            Safety,
        ];
        CANON
    }

    /// True for every canonical id; `Custom` ids are valid only once
    /// registered, which the registry itself enforces.
    pub fn is_canonical(&self) -> bool {
        !matches!(self, UnitId::Custom(_))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Custom(name) => write!(f, "custom:{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Derived hazard category. High and critical risk override strategy
/// selection to the safety-first strategy regardless of primary unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Whether this risk level forces safety-first strategy selection.
    pub fn forces_safety_first(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

/// Declarative hint to strategy selection. Not enforced by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeTier {
    Fast,
    Deep,
    Max,
    Hybrid,
}

impl Default for ComputeTier {
    fn default() -> Self {
        ComputeTier::Hybrid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_set_has_about_twenty_ids() {
        let canon = UnitId::canonical();
        assert!(canon.len() >= 18 && canon.len() <= 22);
        assert!(canon.iter().all(UnitId::is_canonical));
    }

    #[test]
    fn custom_id_is_not_canonical() {
        assert!(!UnitId::Custom("whatever".into()).is_canonical());
    }

    #[test]
    fn risk_override_only_high_and_critical() {
        assert!(!RiskLevel::Low.forces_safety_first());
        assert!(!RiskLevel::Medium.forces_safety_first());
        assert!(RiskLevel::High.forces_safety_first());
        assert!(RiskLevel::Critical.forces_safety_first());
    }
}
