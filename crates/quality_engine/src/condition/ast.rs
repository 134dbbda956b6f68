use crate::DataValue;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Parses an operator written symbolically (`>=`) or by name (`gte`).
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s.trim().to_lowercase().as_str() {
            "==" | "=" | "eq" => CompareOp::Eq,
            "!=" | "<>" | "ne" | "neq" => CompareOp::Ne,
            ">" | "gt" => CompareOp::Gt,
            ">=" | "gte" | "ge" => CompareOp::Ge,
            "<" | "lt" => CompareOp::Lt,
            "<=" | "lte" | "le" => CompareOp::Le,
            _ => return None,
        };
        Some(op)
    }

    /// Applies the operator to the outcome of a comparison.
    ///
    /// An incomparable pair (`None`) satisfies only `!=`.
    pub fn holds(&self, ordering: Option<Ordering>) -> bool {
        match ordering {
            None => *self == CompareOp::Ne,
            Some(ord) => match self {
                CompareOp::Eq => ord == Ordering::Equal,
                CompareOp::Ne => ord != Ordering::Equal,
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::Ge => ord != Ordering::Less,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Le => ord != Ordering::Greater,
            },
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        };
        f.write_str(symbol)
    }
}

/// Condition syntax tree.
///
/// Chains of `AND` and `OR` are flat, so a long chain does not deepen the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        field: String,
        op: CompareOp,
        value: DataValue,
    },
    IsNull {
        field: String,
        negated: bool,
    },
}

impl Expr {
    /// Appends referenced fields in order of first appearance.
    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            Expr::And(terms) | Expr::Or(terms) => {
                for term in terms {
                    term.collect_fields(out);
                }
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::Compare { field, .. } | Expr::IsNull { field, .. } => {
                if !out.contains(field) {
                    out.push(field.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomparable_only_satisfies_not_equal() {
        for op in [CompareOp::Eq, CompareOp::Gt, CompareOp::Ge, CompareOp::Lt, CompareOp::Le] {
            assert!(!op.holds(None));
        }
        assert!(CompareOp::Ne.holds(None));
    }

    #[test]
    fn test_parse_named_operators() {
        assert_eq!(CompareOp::parse("gte"), Some(CompareOp::Ge));
        assert_eq!(CompareOp::parse("<>"), Some(CompareOp::Ne));
        assert_eq!(CompareOp::parse("~"), None);
    }
}
