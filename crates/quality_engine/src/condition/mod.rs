//! Row condition mini-language.
//!
//! Conditions restrict the rows a rule applies to, and are the assertion
//! language of `custom` rules:
//!
//! ```text
//! status == 'active' AND (amount > 100 OR priority IS NOT NULL)
//! ```
//!
//! An expression is compiled once per rule and evaluated column-wise for each
//! batch. Null or incomparable operands make every comparison false except
//! `!=`. Unknown fields are reported when the condition is applied, not when it
//! is compiled, because the schema is only known once batches arrive.

mod ast;
mod lexer;
mod parser;

pub use ast::{CompareOp, Expr};
pub use parser::{MAX_NESTING, parse};

use crate::value::compare;
use crate::{Batch, EvaluationError, ParseError, RowContext, RowMask};

/// A parsed, reusable condition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    source: String,
    root: Expr,
    fields: Vec<String>,
}

/// Compiles a condition expression.
///
/// # Example
///
/// ```rust
/// use quality_engine::condition::compile;
///
/// let condition = compile("country == 'US' and zip IS NULL").unwrap();
/// assert_eq!(condition.fields(), &["country".to_string(), "zip".to_string()]);
/// ```
pub fn compile(expression: &str) -> Result<CompiledCondition, ParseError> {
    let root = parse(expression)?;
    let mut fields = Vec::new();
    root.collect_fields(&mut fields);
    Ok(CompiledCondition {
        source: expression.to_string(),
        root,
        fields,
    })
}

impl CompiledCondition {
    /// The expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The syntax tree.
    pub fn expr(&self) -> &Expr {
        &self.root
    }

    /// Fields referenced by the condition.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Evaluates the condition for every row of a batch.
    pub fn apply(&self, batch: &Batch) -> Result<RowMask, EvaluationError> {
        apply_expr(&self.root, batch)
    }

    /// Evaluates the condition for a single row.
    pub fn matches(&self, row: &RowContext<'_>) -> Result<bool, EvaluationError> {
        matches_expr(&self.root, row)
    }
}

fn apply_expr(expr: &Expr, batch: &Batch) -> Result<RowMask, EvaluationError> {
    match expr {
        Expr::And(terms) => {
            let mut mask = RowMask::all(batch.num_rows());
            for term in terms {
                mask = mask.and(&apply_expr(term, batch)?);
            }
            Ok(mask)
        }
        Expr::Or(terms) => {
            let mut mask = RowMask::none(batch.num_rows());
            for term in terms {
                mask = mask.or(&apply_expr(term, batch)?);
            }
            Ok(mask)
        }
        Expr::Not(inner) => Ok(apply_expr(inner, batch)?.not()),
        Expr::Compare { field, op, value } => {
            let column = batch.require_column(field)?;
            Ok(RowMask::from_bits(
                column.iter().map(|v| op.holds(compare(v, value))).collect(),
            ))
        }
        Expr::IsNull { field, negated } => {
            let column = batch.require_column(field)?;
            Ok(RowMask::from_bits(
                column.iter().map(|v| v.is_missing() != *negated).collect(),
            ))
        }
    }
}

fn matches_expr(expr: &Expr, row: &RowContext<'_>) -> Result<bool, EvaluationError> {
    match expr {
        Expr::And(terms) => {
            for term in terms {
                if !matches_expr(term, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Or(terms) => {
            for term in terms {
                if matches_expr(term, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Not(inner) => Ok(!matches_expr(inner, row)?),
        Expr::Compare { field, op, value } => Ok(op.holds(compare(row.get(field)?, value))),
        Expr::IsNull { field, negated } => Ok(row.get(field)?.is_missing() != *negated),
    }
}
