use super::ast::{CompareOp, Expr};
use super::lexer::{Token, TokenKind, tokenize};
use crate::value::{parse_date, parse_number, parse_timestamp};
use crate::{DataValue, ParseError};

/// Deepest nesting of parentheses and `NOT` a condition may use.
pub const MAX_NESTING: usize = 64;

/// Parses a condition expression into a syntax tree.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        end: input.len(),
        depth: 0,
    };

    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError::new(
            token.position,
            format!("unexpected {}", describe(&token.kind)),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    /// Enters one level of nesting, refusing to go past [`MAX_NESTING`].
    fn descend(&mut self, position: usize) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                position,
                format!("condition nested deeper than {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&TokenKind::Or) {
            terms.push(self.parse_and()?);
        }
        Ok(join(terms, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat(&TokenKind::And) {
            terms.push(self.parse_unary()?);
        }
        Ok(join(terms, Expr::And))
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        if self.eat(&TokenKind::Not) {
            self.descend(position)?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        if self.eat(&TokenKind::LParen) {
            self.descend(position)?;
            let expr = self.parse_or()?;
            if !self.eat(&TokenKind::RParen) {
                return Err(ParseError::new(self.position(), "expected ')'"));
            }
            self.depth -= 1;
            return Ok(expr);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        let field = match self.next() {
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) => word,
            Some(token) => {
                return Err(ParseError::new(
                    token.position,
                    format!("expected field name, found {}", describe(&token.kind)),
                ));
            }
            None => return Err(ParseError::new(position, "expected field name")),
        };

        if self.eat(&TokenKind::Is) {
            let negated = self.eat(&TokenKind::Not);
            let position = self.position();
            return match self.next() {
                Some(Token {
                    kind: TokenKind::Word(word),
                    ..
                }) if word.eq_ignore_ascii_case("null") => Ok(Expr::IsNull { field, negated }),
                _ => Err(ParseError::new(position, "expected NULL after IS")),
            };
        }

        let position = self.position();
        let op = match self.next() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => op,
            _ => {
                return Err(ParseError::new(
                    position,
                    format!("expected comparison operator after '{}'", field),
                ));
            }
        };

        let position = self.position();
        let value = match self.next() {
            Some(Token {
                kind: TokenKind::Quoted(text),
                ..
            }) => DataValue::String(text),
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) => classify(&word),
            _ => return Err(ParseError::new(position, "expected literal value")),
        };

        match (value, op) {
            (DataValue::Null, CompareOp::Eq) => Ok(Expr::IsNull {
                field,
                negated: false,
            }),
            (DataValue::Null, CompareOp::Ne) => Ok(Expr::IsNull {
                field,
                negated: true,
            }),
            (DataValue::Null, _) => Err(ParseError::new(
                position,
                "null can only be compared with == or !=",
            )),
            (value, op) => Ok(Expr::Compare { field, op, value }),
        }
    }
}

/// A single term stands alone; several become one flat node.
fn join(mut terms: Vec<Expr>, node: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.swap_remove(0)
    } else {
        node(terms)
    }
}

/// Classifies a bare-word literal.
fn classify(word: &str) -> DataValue {
    if word.eq_ignore_ascii_case("null") {
        return DataValue::Null;
    }
    if word.eq_ignore_ascii_case("true") {
        return DataValue::Bool(true);
    }
    if word.eq_ignore_ascii_case("false") {
        return DataValue::Bool(false);
    }
    if let Ok(i) = word.parse::<i64>() {
        return DataValue::Int(i);
    }
    if let Some(f) = parse_number(word) {
        return DataValue::Float(f);
    }
    if let Some(d) = parse_date(word) {
        return DataValue::Date(d);
    }
    if let Some(ts) = parse_timestamp(word) {
        return DataValue::Timestamp(ts);
    }
    DataValue::String(word.to_string())
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Word(w) => format!("'{}'", w),
        TokenKind::Quoted(q) => format!("string '{}'", q),
        TokenKind::Op(op) => format!("operator '{}'", op),
        TokenKind::And => "AND".to_string(),
        TokenKind::Or => "OR".to_string(),
        TokenKind::Not => "NOT".to_string(),
        TokenKind::Is => "IS".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
    }
}
