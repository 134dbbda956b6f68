//! # Data Quality Engine
//!
//! Streaming rule evaluation for tabular data. Sources yield bounded batches;
//! every rule folds the batches into its own state and produces exactly one
//! result per source, independent of how the data was chunked.
//!
//! - Per-value checks (mandatory, pattern, allowed values, range, date format)
//! - Duplicate and uniqueness detection across the whole stream
//! - Cross-field comparisons and custom row assertions
//! - Two-pass statistical outlier detection
//! - Conditional composition and referential integrity across sources
//!
//! ## Example
//!
//! ```rust
//! use quality_core::{EngineSettings, RuleSpecBuilder, Status};
//! use quality_engine::{DataValue, MemorySource, NoReferences, Orchestrator, Registry};
//!
//! let registry = Registry::with_builtins();
//! let orchestrator = Orchestrator::new(&registry, EngineSettings::default());
//!
//! let mut source = MemorySource::from_rows(
//!     "orders",
//!     &["order_id"],
//!     vec![vec![DataValue::Int(1)], vec![DataValue::Int(2)], vec![DataValue::Int(1)]],
//! );
//! let rules = vec![
//!     RuleSpecBuilder::new("duplicate_detection")
//!         .param("fields", vec!["order_id"])
//!         .build(),
//! ];
//!
//! let report = orchestrator.run(&mut source, &rules, &NoReferences).unwrap();
//! assert_eq!(report.status, Status::Failed);
//! assert_eq!(report.results[0].samples[0].message, "duplicate of row 0");
//! ```

mod batch;
pub mod condition;
mod engine;
mod error;
mod job;
pub mod references;
mod registry;
pub mod rules;
pub mod sources;
pub mod value;

pub use batch::*;
pub use engine::*;
pub use error::*;
pub use job::*;
pub use references::{
    MemoryReferences, NoReferences, ReferenceKey, ReferenceProvider, ReferenceSets,
};
pub use registry::*;
pub use rules::{ActiveRule, FailureCollector, RuleEvaluator, RuleOutcome};
pub use sources::{ArrowSource, BatchSource, CsvOptions, CsvSource, MemorySource};
pub use value::DataValue;
