//! Recursive-descent parser for guard expressions.

use super::lexer::{Spanned, Token};
use super::{Guard, GuardError};

/// Maximum nesting of parentheses and negations.
const MAX_NESTING: usize = 32;

pub(super) struct Parser<'a> {
    tokens: Vec<Spanned<'a>>,
    index: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(tokens: Vec<Spanned<'a>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    pub(super) fn parse(mut self) -> Result<Guard, GuardError> {
        let guard = self.parse_or()?;
        if self.current().token != Token::Eof {
            return Err(self.unexpected("end of expression"));
        }
        Ok(guard)
    }

    fn parse_or(&mut self) -> Result<Guard, GuardError> {
        let mut parts = vec![self.parse_and()?];
        while self.eat_or() {
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Guard::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Guard, GuardError> {
        let mut parts = vec![self.parse_unary()?];
        while self.eat_and() {
            parts.push(self.parse_unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Guard::And(parts)
        })
    }

    fn parse_unary(&mut self) -> Result<Guard, GuardError> {
        if matches!(self.current().token, Token::Bang | Token::Word("not")) {
            self.advance();
            self.enter()?;
            let inner = self.parse_unary()?;
            self.nesting -= 1;
            return Ok(Guard::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Guard, GuardError> {
        match self.current().token.clone() {
            Token::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_or()?;
                if self.current().token != Token::RParen {
                    return Err(self.unexpected("`)`"));
                }
                self.advance();
                self.nesting -= 1;
                Ok(inner)
            }
            Token::Word("true") => {
                self.advance();
                Ok(Guard::Literal(true))
            }
            Token::Word("false") => {
                self.advance();
                Ok(Guard::Literal(false))
            }
            Token::Word(dimension) => {
                self.advance();
                self.parse_condition(dimension)
            }
            _ => Err(self.unexpected("dimension, `(` or `not`")),
        }
    }

    /// Parse what follows a dimension name: `is [not] defined` or a
    /// comparison with a comma-separated value list.
    fn parse_condition(&mut self, dimension: &str) -> Result<Guard, GuardError> {
        match self.current().token.clone() {
            Token::Word("is") => {
                self.advance();
                let negated = self.current().token == Token::Word("not");
                if negated {
                    self.advance();
                }
                if self.current().token != Token::Word("defined") {
                    return Err(self.unexpected("`defined`"));
                }
                self.advance();
                Ok(Guard::Defined {
                    dimension: dimension.to_owned(),
                    negated,
                })
            }
            Token::Op(op) => {
                self.advance();
                let mut values = vec![self.parse_value()?];
                while self.current().token == Token::Comma {
                    self.advance();
                    values.push(self.parse_value()?);
                }
                Ok(Guard::Compare {
                    dimension: dimension.to_owned(),
                    op,
                    values,
                })
            }
            _ => Err(self.unexpected("comparison operator or `is`")),
        }
    }

    fn parse_value(&mut self) -> Result<String, GuardError> {
        let value = match &self.current().token {
            Token::Word(word) => (*word).to_owned(),
            Token::Quoted(text) => text.clone(),
            _ => return Err(self.unexpected("value")),
        };
        self.advance();
        Ok(value)
    }

    fn eat_or(&mut self) -> bool {
        let hit = matches!(self.current().token, Token::OrOr | Token::Word("or"));
        if hit {
            self.advance();
        }
        hit
    }

    fn eat_and(&mut self) -> bool {
        let hit = matches!(self.current().token, Token::AndAnd | Token::Word("and"));
        if hit {
            self.advance();
        }
        hit
    }

    fn enter(&mut self) -> Result<(), GuardError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(GuardError::NestingTooDeep {
                max: MAX_NESTING,
                position: self.current().position,
            });
        }
        Ok(())
    }

    fn current(&self) -> &Spanned<'a> {
        // The token stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    fn unexpected(&self, expected: &'static str) -> GuardError {
        let current = self.current();
        GuardError::UnexpectedToken {
            expected,
            found: current.token.describe(),
            position: current.position,
        }
    }
}
