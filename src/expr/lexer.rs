//! Tokenizer.

use super::ExprError;

/// Token ceiling. It bounds the depth of left-leaning operator chains, which
/// the parser builds without recursing.
pub const MAX_TOKENS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    /// `^` or `**`.
    Caret,
    /// `<`, `<=`, `>`, `>=`
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LParen,
    RParen,
    Comma,
    End,
}

impl TokenKind {
    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(v) => format!("number {v}"),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Caret => "'^'".to_string(),
            TokenKind::Less => "'<'".to_string(),
            TokenKind::LessEq => "'<='".to_string(),
            TokenKind::Greater => "'>'".to_string(),
            TokenKind::GreaterEq => "'>='".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::End => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the source.
    pub offset: usize,
}

/// Split `src` into tokens. The last token is always `End`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        if tokens.len() >= MAX_TOKENS {
            return Err(ExprError::TooLong { limit: MAX_TOKENS });
        }
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let mut end = offset;
            let mut seen_exp = false;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    end = i + c.len_utf8();
                    chars.next();
                } else if (c == 'e' || c == 'E') && !seen_exp && exponent_follows(&src[i + 1..]) {
                    seen_exp = true;
                    chars.next();
                    end = i + 1;
                    if let Some(&(j, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            chars.next();
                            end = j + 1;
                        }
                    }
                } else {
                    break;
                }
            }
            let text = &src[offset..end];
            let value: f64 = text.parse().map_err(|_| ExprError::InvalidNumber {
                text: text.to_string(),
                offset,
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                offset,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let mut end = offset;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident(src[offset..end].to_string()),
                offset,
            });
            continue;
        }

        chars.next();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => {
                if matches!(chars.peek(), Some(&(_, '*'))) {
                    chars.next();
                    TokenKind::Caret
                } else {
                    TokenKind::Star
                }
            }
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '<' | '>' => {
                let or_equal = matches!(chars.peek(), Some(&(_, '=')));
                if or_equal {
                    chars.next();
                }
                match (ch, or_equal) {
                    ('<', false) => TokenKind::Less,
                    ('<', true) => TokenKind::LessEq,
                    ('>', false) => TokenKind::Greater,
                    _ => TokenKind::GreaterEq,
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            other => return Err(ExprError::UnexpectedChar { ch: other, offset }),
        };
        tokens.push(Token { kind, offset });
    }

    tokens.push(Token {
        kind: TokenKind::End,
        offset: src.len(),
    });
    Ok(tokens)
}

/// Whether the text right after an `e`/`E` continues a numeric exponent.
fn exponent_follows(rest: &str) -> bool {
    let mut it = rest.chars();
    match it.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') | Some('-') => it.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scientific_numbers_and_double_star() {
        assert_eq!(
            kinds("2.5e-3**x"),
            vec![
                TokenKind::Number(2.5e-3),
                TokenKind::Caret,
                TokenKind::Ident("x".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn trailing_e_is_an_identifier() {
        // `2e` is the number 2 followed by the symbol `e`.
        assert_eq!(
            kinds("2e"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Ident("e".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(
            kinds("ω*φ"),
            vec![
                TokenKind::Ident("ω".to_string()),
                TokenKind::Star,
                TokenKind::Ident("φ".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn rejects_unknown_characters() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err, ExprError::UnexpectedChar { ch: '#', offset: 2 });
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            kinds("x<=1>y<2>=z"),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::LessEq,
                TokenKind::Number(1.0),
                TokenKind::Greater,
                TokenKind::Ident("y".to_string()),
                TokenKind::Less,
                TokenKind::Number(2.0),
                TokenKind::GreaterEq,
                TokenKind::Ident("z".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn token_count_is_capped() {
        let long = "x+".repeat(100_000) + "x";
        assert_eq!(tokenize(&long), Err(ExprError::TooLong { limit: MAX_TOKENS }));
        let ok = "x+".repeat(MAX_TOKENS / 2 - 1) + "x";
        assert!(tokenize(&ok).is_ok());
    }

    #[test]
    fn malformed_number_is_reported() {
        assert!(matches!(
            tokenize("1.2.3"),
            Err(ExprError::InvalidNumber { .. })
        ));
    }
}
