//! Tokenizer for guard expressions.

use super::{Comparison, GuardError};

/// A guard token. Keywords (`and`, `is`, `defined`, ...) stay words; the
/// parser interprets them by position so they remain usable as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token<'a> {
    Word(&'a str),
    Quoted(String),
    Op(Comparison),
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl Token<'_> {
    pub(super) fn describe(&self) -> String {
        match self {
            Self::Word(w) => format!("`{w}`"),
            Self::Quoted(s) => format!("{s:?}"),
            Self::Op(op) => format!("`{}`", op.symbol()),
            Self::AndAnd => "`&&`".to_owned(),
            Self::OrOr => "`||`".to_owned(),
            Self::Bang => "`!`".to_owned(),
            Self::LParen => "`(`".to_owned(),
            Self::RParen => "`)`".to_owned(),
            Self::Comma => "`,`".to_owned(),
            Self::Eof => "end of expression".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Spanned<'a> {
    pub token: Token<'a>,
    pub position: usize,
}

/// Characters that end a bare word.
pub(super) fn is_delimiter(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '=' | '!' | '<' | '>' | '&' | '|' | ',' | '(' | ')' | '"' | '\''
        )
}

pub(super) fn tokenize(input: &str) -> Result<Vec<Spanned<'_>>, GuardError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let next_is = |expected: char| input[position + c.len_utf8()..].starts_with(expected);
        let (token, width) = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '=' if next_is('=') => (Token::Op(Comparison::Eq), 2),
            '!' if next_is('=') => (Token::Op(Comparison::Ne), 2),
            '!' => (Token::Bang, 1),
            '<' if next_is('=') => (Token::Op(Comparison::Le), 2),
            '<' => (Token::Op(Comparison::Lt), 1),
            '>' if next_is('=') => (Token::Op(Comparison::Ge), 2),
            '>' => (Token::Op(Comparison::Gt), 1),
            '&' if next_is('&') => (Token::AndAnd, 2),
            '|' if next_is('|') => (Token::OrOr, 2),
            '"' | '\'' => {
                let (text, width) = quoted(input, position, c)?;
                (Token::Quoted(text), width)
            }
            '=' | '&' | '|' => {
                return Err(GuardError::UnexpectedChar { found: c, position });
            }
            _ => {
                let rest = &input[position..];
                let width = rest.find(is_delimiter).unwrap_or(rest.len());
                (Token::Word(&rest[..width]), width)
            }
        };
        tokens.push(Spanned { token, position });
        while chars.peek().is_some_and(|&(p, _)| p < position + width) {
            chars.next();
        }
    }

    if tokens.is_empty() {
        return Err(GuardError::EmptyInput);
    }
    tokens.push(Spanned {
        token: Token::Eof,
        position: input.len(),
    });
    Ok(tokens)
}

/// Read a quoted string starting at `start`. Returns the unescaped text and
/// the byte width consumed, quotes included.
fn quoted(input: &str, start: usize, quote: char) -> Result<(String, usize), GuardError> {
    let mut text = String::new();
    let mut escaped = false;
    for (offset, c) in input[start + 1..].char_indices() {
        if escaped {
            text.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((text, offset + 2));
        } else {
            text.push(c);
        }
    }
    Err(GuardError::UnterminatedString { position: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token<'_>> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn tokenizes_comparison_chain() {
        assert_eq!(
            kinds("initiator == packit && distro != fedora-40"),
            vec![
                Token::Word("initiator"),
                Token::Op(Comparison::Eq),
                Token::Word("packit"),
                Token::AndAnd,
                Token::Word("distro"),
                Token::Op(Comparison::Ne),
                Token::Word("fedora-40"),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_without_spaces() {
        assert_eq!(
            kinds("!(arch>=x86_64)"),
            vec![
                Token::Bang,
                Token::LParen,
                Token::Word("arch"),
                Token::Op(Comparison::Ge),
                Token::Word("x86_64"),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn quoted_strings_unescape() {
        assert_eq!(
            kinds(r#"name == "a \"b\"", 'c'"#),
            vec![
                Token::Word("name"),
                Token::Op(Comparison::Eq),
                Token::Quoted("a \"b\"".to_owned()),
                Token::Comma,
                Token::Quoted("c".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rejects_single_ampersand_and_equals() {
        assert_eq!(
            tokenize("a & b"),
            Err(GuardError::UnexpectedChar {
                found: '&',
                position: 2
            })
        );
        assert!(matches!(
            tokenize("a = b"),
            Err(GuardError::UnexpectedChar { found: '=', .. })
        ));
    }

    #[test]
    fn reports_unterminated_string() {
        assert_eq!(
            tokenize("a == 'open"),
            Err(GuardError::UnterminatedString { position: 5 })
        );
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(tokenize("   "), Err(GuardError::EmptyInput));
    }
}
