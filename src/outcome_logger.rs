//! Outcome Logger (component J): a bounded in-memory ring of execution
//! records plus aggregate statistics (spec.md §4.J).

use crate::classifier::Classification;
use crate::resource_monitor::SystemMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Default number of records retained before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 1000;

/// User-supplied feedback attached after the fact to a completed record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The per-request outcome: whether it succeeded and the cost/latency it
/// incurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub confidence: f64,
    pub latency_ms: u64,
    pub tokens_used: u32,
    pub replan_count: u32,
    pub error: Option<String>,
}

/// One logged execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub input: String,
    pub classification: Option<Classification>,
    pub strategy: String,
    pub result: serde_json::Value,
    pub outcome: Outcome,
    pub feedback: Option<Feedback>,
    pub system_metrics: Option<SystemMetrics>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics computed over the current ring contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AggregateStats {
    pub total_executions: usize,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub avg_tokens_used: f64,
    pub avg_rating: Option<f64>,
    pub unit_usage: HashMap<String, usize>,
    pub strategy_usage: HashMap<String, usize>,
}

/// Bounded ring buffer of [`ExecutionRecord`]s under a single lock.
pub struct OutcomeLogger {
    records: Mutex<VecDeque<ExecutionRecord>>,
    capacity: usize,
}

impl OutcomeLogger {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Append a record, evicting the oldest if at capacity.
    pub fn record(&self, record: ExecutionRecord) {
        let mut records = self.records.lock().expect("outcome logger lock poisoned");
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Attach feedback to the most recently logged record.
    pub fn attach_feedback(&self, feedback: Feedback) -> bool {
        let mut records = self.records.lock().expect("outcome logger lock poisoned");
        match records.back_mut() {
            Some(record) => {
                record.feedback = Some(feedback);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("outcome logger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn recent(&self, n: usize) -> Vec<ExecutionRecord> {
        let records = self.records.lock().expect("outcome logger lock poisoned");
        records.iter().rev().take(n).cloned().collect()
    }

    pub fn stats(&self) -> AggregateStats {
        let records = self.records.lock().expect("outcome logger lock poisoned");
        let total = records.len();
        if total == 0 {
            return AggregateStats::default();
        }

        let successes = records.iter().filter(|r| r.outcome.success).count();
        let total_latency: u64 = records.iter().map(|r| r.outcome.latency_ms).sum();
        let total_tokens: u64 = records.iter().map(|r| r.outcome.tokens_used as u64).sum();

        let ratings: Vec<u8> = records.iter().filter_map(|r| r.feedback.as_ref().map(|f| f.rating)).collect();
        let avg_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64)
        };

        let mut unit_usage: HashMap<String, usize> = HashMap::new();
        let mut strategy_usage: HashMap<String, usize> = HashMap::new();
        for record in records.iter() {
            *strategy_usage.entry(record.strategy.clone()).or_insert(0) += 1;
            if let Some(classification) = &record.classification {
                *unit_usage.entry(classification.primary_unit.to_string()).or_insert(0) += 1;
            }
        }

        AggregateStats {
            total_executions: total,
            success_rate: successes as f64 / total as f64,
            avg_latency_ms: total_latency as f64 / total as f64,
            avg_tokens_used: total_tokens as f64 / total as f64,
            avg_rating,
            unit_usage,
            strategy_usage,
        }
    }
}

impl Default for OutcomeLogger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UnitId;

    fn sample_record(id: &str, success: bool) -> ExecutionRecord {
        ExecutionRecord {
            id: id.to_string(),
            input: "hello".to_string(),
            classification: None,
            strategy: "quick-answer".to_string(),
            result: serde_json::json!("done"),
            outcome: Outcome {
                success,
                confidence: 0.9,
                latency_ms: 100,
                tokens_used: 50,
                replan_count: 0,
                error: None,
            },
            feedback: None,
            system_metrics: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bounded_capacity_evicts_oldest_record() {
        let logger = OutcomeLogger::new(2);
        logger.record(sample_record("a", true));
        logger.record(sample_record("b", true));
        logger.record(sample_record("c", true));
        assert_eq!(logger.len(), 2);
        let recent: Vec<String> = logger.recent(10).into_iter().map(|r| r.id).collect();
        assert!(!recent.contains(&"a".to_string()));
    }

    #[test]
    fn feedback_attaches_to_most_recent_record() {
        let logger = OutcomeLogger::new(10);
        logger.record(sample_record("a", true));
        logger.record(sample_record("b", true));
        assert!(logger.attach_feedback(Feedback {
            rating: 5,
            comment: Some("great".to_string()),
            timestamp: Utc::now(),
        }));
        let recent = logger.recent(1);
        assert_eq!(recent[0].id, "b");
        assert_eq!(recent[0].feedback.as_ref().unwrap().rating, 5);
    }

    #[test]
    fn stats_reports_success_rate_and_histograms() {
        let logger = OutcomeLogger::new(10);
        let mut rec_a = sample_record("a", true);
        rec_a.classification = Some(Classification {
            primary_unit: UnitId::Coding,
            secondary_units: vec![],
            risk_level: crate::ids::RiskLevel::Low,
            confidence: 0.9,
            method: crate::classifier::ClassificationMethod::Regex,
        });
        logger.record(rec_a);
        logger.record(sample_record("b", false));

        let stats = logger.stats();
        assert_eq!(stats.total_executions, 2);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.strategy_usage.get("quick-answer"), Some(&2));
        assert_eq!(stats.unit_usage.get("Coding"), Some(&1));
    }
}
