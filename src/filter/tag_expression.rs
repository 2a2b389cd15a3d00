//! Boolean tag expressions
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr := and ("or" and)*
//! and  := not ("and" not)*
//! not  := "not" not | "(" expr ")" | TAG
//! ```
//!
//! Tags start with `@`. A backslash escapes `(`, `)`, `\` and whitespace
//! inside a tag name. The empty expression matches every pickle.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a tag expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagExpressionError {
    #[error("Tag expression \"{expression}\" could not be parsed: unmatched \"(\"")]
    UnmatchedOpen { expression: String },

    #[error("Tag expression \"{expression}\" could not be parsed: unmatched \")\"")]
    UnmatchedClose { expression: String },

    #[error("Tag expression \"{expression}\" could not be parsed: expected an operand after \"{after}\"")]
    MissingOperand { expression: String, after: String },

    #[error("Tag expression \"{expression}\" could not be parsed: unexpected \"{token}\"")]
    UnexpectedToken { expression: String, token: String },

    #[error("Tag expression \"{expression}\" could not be parsed: \"{tag}\" is not a tag, tags start with \"@\"")]
    InvalidTag { expression: String, tag: String },

    #[error("Tag expression \"{expression}\" could not be parsed: trailing escape character")]
    TrailingEscape { expression: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Tag(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
            Token::And => f.write_str("and"),
            Token::Or => f.write_str("or"),
            Token::Not => f.write_str("not"),
            Token::Tag(name) => f.write_str(name),
        }
    }
}

/// Parsed tag expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagExpression {
    /// Matches everything
    True,
    Tag(String),
    Not(Box<TagExpression>),
    And(Box<TagExpression>, Box<TagExpression>),
    Or(Box<TagExpression>, Box<TagExpression>),
}

impl TagExpression {
    pub fn parse(input: &str) -> Result<Self, TagExpressionError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(TagExpression::True);
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            expression: input,
        };
        let expr = parser.parse_or()?;

        match parser.peek() {
            None => Ok(expr),
            Some(Token::Close) => Err(TagExpressionError::UnmatchedClose {
                expression: input.to_string(),
            }),
            Some(token) => Err(TagExpressionError::UnexpectedToken {
                expression: input.to_string(),
                token: token.to_string(),
            }),
        }
    }

    /// Evaluate against the tag names of one pickle
    pub fn evaluate<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        match self {
            TagExpression::True => true,
            TagExpression::Tag(name) => tags.iter().any(|t| t.as_ref() == name),
            TagExpression::Not(inner) => !inner.evaluate(tags),
            TagExpression::And(left, right) => left.evaluate(tags) && right.evaluate(tags),
            TagExpression::Or(left, right) => left.evaluate(tags) || right.evaluate(tags),
        }
    }
}

impl FromStr for TagExpression {
    type Err = TagExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Default for TagExpression {
    fn default() -> Self {
        TagExpression::True
    }
}

impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagExpression::True => f.write_str("true"),
            TagExpression::Tag(name) => {
                for c in name.chars() {
                    if c == '(' || c == ')' || c == '\\' || c.is_whitespace() {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
            TagExpression::Not(inner) => write!(f, "not ( {inner} )"),
            TagExpression::And(left, right) => write!(f, "( {left} and {right} )"),
            TagExpression::Or(left, right) => write!(f, "( {left} or {right} )"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, TagExpressionError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' | ')' => {
                flush(&mut current, &mut tokens, input)?;
                tokens.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens, input)?,
            c => current.push(c),
        }
    }

    if escaped {
        return Err(TagExpressionError::TrailingEscape {
            expression: input.to_string(),
        });
    }
    flush(&mut current, &mut tokens, input)?;
    Ok(tokens)
}

fn flush(current: &mut String, tokens: &mut Vec<Token>, input: &str) -> Result<(), TagExpressionError> {
    if current.is_empty() {
        return Ok(());
    }
    let word = std::mem::take(current);
    let token = match word.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ if word.starts_with('@') => Token::Tag(word),
        _ => {
            return Err(TagExpressionError::InvalidTag {
                expression: input.to_string(),
                tag: word,
            })
        }
    };
    tokens.push(token);
    Ok(())
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    expression: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<TagExpression, TagExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = TagExpression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<TagExpression, TagExpressionError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = TagExpression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<TagExpression, TagExpressionError> {
        let previous = self
            .pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.to_string())
            .unwrap_or_default();
        let expression = self.expression.to_string();

        match self.next().cloned() {
            Some(Token::Not) => Ok(TagExpression::Not(Box::new(self.parse_not()?))),
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(TagExpressionError::UnmatchedOpen { expression }),
                }
            }
            Some(Token::Tag(name)) => Ok(TagExpression::Tag(name)),
            Some(Token::Close) if previous.is_empty() => {
                Err(TagExpressionError::UnmatchedClose { expression })
            }
            Some(token @ (Token::And | Token::Or)) if previous.is_empty() => {
                Err(TagExpressionError::UnexpectedToken {
                    expression,
                    token: token.to_string(),
                })
            }
            Some(_) | None => Err(TagExpressionError::MissingOperand {
                expression,
                after: previous,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str, tags: &[&str]) -> bool {
        TagExpression::parse(expr).unwrap().evaluate(tags)
    }

    #[test]
    fn test_empty_expression_matches_everything() {
        assert_eq!(TagExpression::parse("  ").unwrap(), TagExpression::True);
        assert!(eval("", &[]));
        assert!(eval("", &["@a"]));
    }

    #[test]
    fn test_precedence() {
        // and binds tighter than or
        assert!(eval("@a or @b and @c", &["@a"]));
        assert!(!eval("@a or @b and @c", &["@b"]));
        assert!(eval("(@a or @b) and @c", &["@b", "@c"]));
        assert!(!eval("(@a or @b) and @c", &["@a"]));
    }

    #[test]
    fn test_not() {
        assert!(eval("not @wip", &["@fast"]));
        assert!(!eval("not @wip", &["@wip"]));
        assert!(eval("not not @wip", &["@wip"]));
        assert!(eval("@a and not (@b or @c)", &["@a"]));
        assert!(!eval("@a and not (@b or @c)", &["@a", "@c"]));
    }

    #[test]
    fn test_escaped_tags() {
        let expr = TagExpression::parse(r"@with\ space or @paren\(1\)").unwrap();
        assert!(expr.evaluate(&["@with space"]));
        assert!(expr.evaluate(&["@paren(1)"]));
        assert_eq!(expr.to_string(), r"( @with\ space or @paren\(1\) )");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            TagExpression::parse("(@a or @b"),
            Err(TagExpressionError::UnmatchedOpen { .. })
        ));
        assert!(matches!(
            TagExpression::parse("@a)"),
            Err(TagExpressionError::UnmatchedClose { .. })
        ));
        assert!(matches!(
            TagExpression::parse("@a and"),
            Err(TagExpressionError::MissingOperand { .. })
        ));
        assert!(matches!(
            TagExpression::parse("or @a"),
            Err(TagExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            TagExpression::parse("@a @b"),
            Err(TagExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            TagExpression::parse("wip"),
            Err(TagExpressionError::InvalidTag { .. })
        ));
        assert!(matches!(
            TagExpression::parse(r"@a\"),
            Err(TagExpressionError::TrailingEscape { .. })
        ));
    }
}
