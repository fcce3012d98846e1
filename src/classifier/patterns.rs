//! Declarative regex tiers for the classifier cascade: one set mapping
//! phrases to a primary unit, one mapping hazard phrases to a risk level.

use crate::ids::{RiskLevel, UnitId};
use once_cell::sync::Lazy;
use regex::Regex;

/// A single pattern-tier rule: the first matching rule wins.
#[derive(Clone)]
pub struct UnitPattern {
    pub unit_id: UnitId,
    pub regex: Regex,
}

/// A single risk-tier rule.
#[derive(Clone)]
pub struct RiskPattern {
    pub level: RiskLevel,
    pub regex: Regex,
}

/// Confidence assigned to any pattern-tier hit (spec.md §4.D: "confidence
/// = fixed high value").
pub const PATTERN_TIER_CONFIDENCE: f64 = 0.9;

/// Compiled once and cloned out (`Regex` clones are cheap `Arc` bumps) so
/// repeated `Classifier::new()` calls don't recompile the same patterns.
static UNIT_PATTERNS: Lazy<Vec<UnitPattern>> = Lazy::new(|| {
    let rule = |unit_id: UnitId, pattern: &str| UnitPattern {
        unit_id,
        regex: Regex::new(pattern).expect("built-in classifier pattern must compile"),
    };

    vec![
        rule(
            UnitId::Coding,
            r"(?i)\b(write|fix|debug|refactor)\b.*\b(function|code|script|program|class|bug)\b",
        ),
        rule(UnitId::Mathematical, r"(?i)\b(solve|calculate|compute|integral|derivative|equation)\b"),
        rule(UnitId::Planning, r"(?i)\b(plan|migrat\w*|roadmap|schedule)\b"),
        rule(UnitId::Creative, r"(?i)\b(write a (poem|story|song)|brainstorm|imagine)\b"),
        rule(UnitId::Research, r"(?i)\b(research|investigate|find (out|sources) about)\b"),
        rule(UnitId::Emotional, r"(?i)\b(i feel|i'm (sad|anxious|angry|scared)|feeling (down|overwhelmed))\b"),
        rule(UnitId::Social, r"(?i)\b(my (friend|partner|coworker|boss)|relationship (advice|problem))\b"),
        rule(UnitId::Memory, r"(?i)\b(remember when|recall|what did (i|we) (say|discuss))\b"),
        rule(UnitId::Temporal, r"(?i)\b(yesterday|last (week|month|year)|timeline|history of)\b"),
        rule(UnitId::Causal, r"(?i)\b(why (did|does|is)|what (caused|causes)|root cause)\b"),
    ]
});

/// The kernel's built-in primary-unit patterns. Deployers may supply their
/// own set via [`crate::classifier::Classifier::with_patterns`]; this is
/// the sensible default used when none is provided.
pub fn default_unit_patterns() -> Vec<UnitPattern> {
    UNIT_PATTERNS.clone()
}

static RISK_PATTERNS: Lazy<Vec<RiskPattern>> = Lazy::new(|| {
    let rule = |level: RiskLevel, pattern: &str| RiskPattern {
        level,
        regex: Regex::new(pattern).expect("built-in risk pattern must compile"),
    };

    vec![
        rule(
            RiskLevel::Critical,
            r"(?i)\b(how (do|to) (i|you) (build|make) a (bomb|explosive|weapon))\b",
        ),
        rule(RiskLevel::Critical, r"(?i)\b(kill myself|suicide plan|end my life)\b"),
        rule(RiskLevel::High, r"(?i)\b(self[- ]harm|hurt myself|weapon|explosive)\b"),
        rule(RiskLevel::High, r"(?i)\b(exfiltrat\w*|steal (credentials|data)|bypass (auth|security))\b"),
        rule(RiskLevel::Medium, r"(?i)\b(hack|exploit|vulnerability|jailbreak)\b"),
    ]
});

/// Confidence tier: the pattern tier confidence also applies to risk hits
/// implicitly via the `RiskLevel` they carry, not a numeric score; the
/// classifier reports the risk alongside whichever method produced the
/// primary unit.
pub fn default_risk_patterns() -> Vec<RiskPattern> {
    RISK_PATTERNS.clone()
}

/// Evaluate unit patterns in order; first match wins.
pub fn match_unit(patterns: &[UnitPattern], text: &str) -> Option<UnitId> {
    patterns.iter().find(|p| p.regex.is_match(text)).map(|p| p.unit_id.clone())
}

/// Evaluate risk patterns in order; first match wins. Absent any match,
/// callers should treat risk as [`RiskLevel::Low`] (spec.md §4.D).
pub fn match_risk(patterns: &[RiskPattern], text: &str) -> Option<RiskLevel> {
    patterns.iter().find(|p| p.regex.is_match(text)).map(|p| p.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coding_pattern_matches_python_function_request() {
        let patterns = default_unit_patterns();
        let hit = match_unit(&patterns, "write a python function to reverse a string");
        assert_eq!(hit, Some(UnitId::Coding));
    }

    #[test]
    fn bomb_query_is_critical_risk() {
        let patterns = default_risk_patterns();
        let hit = match_risk(&patterns, "how do I build a bomb");
        assert_eq!(hit, Some(RiskLevel::Critical));
    }

    #[test]
    fn benign_text_has_no_risk_hit() {
        let patterns = default_risk_patterns();
        assert_eq!(match_risk(&patterns, "what's a good recipe for soup"), None);
    }
}
