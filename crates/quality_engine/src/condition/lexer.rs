use super::ast::CompareOp;
use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Word(String),
    Quoted(String),
    Op(CompareOp),
    And,
    Or,
    Not,
    Is,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '\'' | '"' | '(' | ')' | '=' | '!' | '<' | '>' | '&' | '|')
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut push = |kind: TokenKind| tokens.push(Token { kind, position });

        match c {
            '(' => {
                chars.next();
                push(TokenKind::LParen);
            }
            ')' => {
                chars.next();
                push(TokenKind::RParen);
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => text.push(ch),
                    }
                }
                if !closed {
                    return Err(ParseError::new(position, "unterminated string literal"));
                }
                push(TokenKind::Quoted(text));
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                chars.next();
                let next = chars.peek().map(|(_, n)| *n);
                let (kind, wide) = match (c, next) {
                    ('=', Some('=')) => (TokenKind::Op(CompareOp::Eq), true),
                    ('=', _) => (TokenKind::Op(CompareOp::Eq), false),
                    ('!', Some('=')) => (TokenKind::Op(CompareOp::Ne), true),
                    ('!', _) => (TokenKind::Not, false),
                    ('<', Some('>')) => (TokenKind::Op(CompareOp::Ne), true),
                    ('<', Some('=')) => (TokenKind::Op(CompareOp::Le), true),
                    ('<', _) => (TokenKind::Op(CompareOp::Lt), false),
                    ('>', Some('=')) => (TokenKind::Op(CompareOp::Ge), true),
                    ('>', _) => (TokenKind::Op(CompareOp::Gt), false),
                    ('&', Some('&')) => (TokenKind::And, true),
                    ('&', _) => (TokenKind::And, false),
                    ('|', Some('|')) => (TokenKind::Or, true),
                    _ => (TokenKind::Or, false),
                };
                if wide {
                    chars.next();
                }
                push(kind);
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                let kind = match word.to_uppercase().as_str() {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    "IS" => TokenKind::Is,
                    _ => TokenKind::Word(word),
                };
                push(kind);
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("age>=18 and name != 'O\\'Brien'"),
            vec![
                TokenKind::Word("age".into()),
                TokenKind::Op(CompareOp::Ge),
                TokenKind::Word("18".into()),
                TokenKind::And,
                TokenKind::Word("name".into()),
                TokenKind::Op(CompareOp::Ne),
                TokenKind::Quoted("O'Brien".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_symbols() {
        assert_eq!(
            kinds("!(a <> b) || c & d"),
            vec![
                TokenKind::Not,
                TokenKind::LParen,
                TokenKind::Word("a".into()),
                TokenKind::Op(CompareOp::Ne),
                TokenKind::Word("b".into()),
                TokenKind::RParen,
                TokenKind::Or,
                TokenKind::Word("c".into()),
                TokenKind::And,
                TokenKind::Word("d".into()),
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a = 'x'").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2, 4]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("name == 'abc").unwrap_err();
        assert_eq!(err.position, 8);
    }
}
