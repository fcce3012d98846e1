//! Strategy execution: the multi-phase executor (component F) and the
//! parallel branch executor with consensus selection (component G).

pub mod branch;
pub mod phase;

use crate::classifier::Classification;
use crate::ids::UnitId;
use crate::unit::LobeResult;
use serde::{Deserialize, Serialize};

/// Maximum number of replan-appended phases allowed per request
/// (spec.md §4.F, P6).
pub const MAX_REPLANS: u32 = 3;

/// Per-phase execution summary for the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub name: String,
    pub duration_ms: u64,
    pub units: Vec<UnitId>,
    pub replanned: bool,
}

/// The final report produced by running a strategy to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub results: Vec<LobeResult>,
    pub final_content: serde_json::Value,
    pub total_wall_time_ms: u64,
    pub replan_count: u32,
    pub phase_summaries: Vec<PhaseSummary>,
    pub strategy_used: String,
    pub classification: Option<Classification>,
}

/// Concatenate string contents with newlines when every result's content
/// is a string; otherwise fall back to the last result's content verbatim
/// (spec.md §4.F: "Aggregation").
pub fn aggregate_final_content(results: &[LobeResult]) -> serde_json::Value {
    if results.is_empty() {
        return serde_json::Value::Null;
    }

    let all_strings: Option<Vec<&str>> = results.iter().map(|r| r.content_as_str()).collect();
    match all_strings {
        Some(strings) => serde_json::Value::String(strings.join("\n")),
        None => results.last().expect("checked non-empty above").content.clone(),
    }
}
