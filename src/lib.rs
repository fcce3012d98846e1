//! # Brain Kernel
//!
//! A cognitive request processor: routes free-form text through a
//! classifier cascade, a declarative multi-phase strategy, and a set of
//! pluggable processing units ("lobes"), producing a final response plus a
//! structured trace of intermediate results.
//!
//! ## Architecture
//!
//! - Three-tier classifier cascade (pattern, vector, learned fallback)
//!   behind a bounded cache
//! - Copy-on-write blackboard: O(1) snapshot, freeze-on-clone, auto-flatten
//! - Multi-phase executor: parallel/sequential phases, timeouts, replanning
//! - Parallel branch executor with confidence-weighted consensus
//! - Self-critique loop gating candidate results on quality and safety
//! - Resource monitor and bounded outcome log as ambient, non-binding signals

pub mod blackboard;
pub mod classifier;
pub mod config;
pub mod critique;
pub mod error;
pub mod executor;
pub mod ids;
pub mod kernel;
pub mod outcome_logger;
pub mod registry;
pub mod resource_monitor;
pub mod strategy;
pub mod unit;

pub use blackboard::{Blackboard, BlackboardSummary, Entity, Memory, UserState};
pub use classifier::embedder::FastEmbedder;
pub use classifier::{Classification, ClassificationMethod, Classifier};
pub use config::KernelConfig;
pub use critique::{CritiqueLoop, CritiqueOutcome};
pub use error::{BrainError, Result};
pub use executor::branch::{BranchExecutor, ConsensusResult};
pub use executor::phase::PhaseExecutor;
pub use executor::ExecutionResult;
pub use ids::{ComputeTier, RiskLevel, UnitId};
pub use kernel::BrainKernel;
pub use outcome_logger::{AggregateStats, ExecutionRecord, OutcomeLogger};
pub use registry::UnitRegistry;
pub use resource_monitor::{ResourceMonitor, SystemMetrics};
pub use strategy::{Phase, Strategy};
pub use unit::{LobeResult, Unit};

/// Re-export of the types most call sites need to wire up a kernel.
pub mod prelude {
    pub use crate::blackboard::Blackboard;
    pub use crate::classifier::{Classification, Classifier};
    pub use crate::config::KernelConfig;
    pub use crate::error::{BrainError, Result};
    pub use crate::executor::branch::BranchExecutor;
    pub use crate::executor::phase::PhaseExecutor;
    pub use crate::executor::ExecutionResult;
    pub use crate::ids::{ComputeTier, RiskLevel, UnitId};
    pub use crate::kernel::BrainKernel;
    pub use crate::outcome_logger::OutcomeLogger;
    pub use crate::registry::UnitRegistry;
    pub use crate::resource_monitor::ResourceMonitor;
    pub use crate::strategy::{canonical, Strategy};
    pub use crate::unit::{LobeResult, Unit};
}
