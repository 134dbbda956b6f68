//! Batch sources.
//!
//! A [`BatchSource`] yields ordered, finite batches. Sources that can rewind
//! report it through [`BatchSource::can_reset`]; the orchestrator uses this to
//! choose between re-reading and buffering when a rule needs two passes.

mod arrow;
mod delimited;
mod memory;

pub use arrow::ArrowSource;
pub use delimited::{CsvOptions, CsvSource};
pub use memory::MemorySource;

use crate::{Batch, SourceError};
use quality_core::SourceMetadata;

/// An ordered, finite stream of batches.
pub trait BatchSource: Send {
    /// Name used in reports.
    fn name(&self) -> &str;

    /// Returns the next batch, or `None` once the stream is exhausted.
    fn next_batch(&mut self) -> Result<Option<Batch>, SourceError>;

    /// Row count (if known) and columns.
    fn metadata(&self) -> SourceMetadata;

    /// Whether [`BatchSource::reset`] rewinds to the first batch.
    fn can_reset(&self) -> bool {
        false
    }

    /// Rewinds to the first batch.
    fn reset(&mut self) -> Result<(), SourceError> {
        Err(SourceError::ResetUnsupported(self.name().to_string()))
    }
}
