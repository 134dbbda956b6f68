//! # Data Quality Core
//!
//! Core data structures and types for the Data Quality Engine.
//!
//! This crate provides the declarative building blocks shared by the parser,
//! the streaming engine and the CLI: rule definitions, suites of sources and
//! rules, engine settings, and the immutable reports the engine produces.
//!
//! ## Key Concepts
//!
//! - **RuleSpec**: Declarative description of one check (kind, severity, params, condition)
//! - **QualitySuite**: Settings, sources and rules evaluated together as one job
//! - **RuleResult / SourceReport / JobReport**: Final verdicts, rolled up by severity
//!
//! ## Example
//!
//! ```rust
//! use quality_core::{QualitySuiteBuilder, RuleSpecBuilder, Severity, SourceSpec};
//!
//! let suite = QualitySuiteBuilder::new("orders_suite")
//!     .source(SourceSpec::new("orders", "orders.csv"))
//!     .rule(
//!         RuleSpecBuilder::new("numeric_range")
//!             .param("field", "amount")
//!             .param("min", 0)
//!             .severity(Severity::Warning)
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(suite.rule_count(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod report;
pub mod rule;
pub mod suite;

pub use builder::*;
pub use error::*;
pub use report::*;
pub use rule::*;
pub use suite::*;
