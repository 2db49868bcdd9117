//! Reading one-dimensional PostgreSQL array literals such as `{a,"b,c",NULL}`.
//!
//! Clients commonly send array parameters in this text form.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrayLiteralError {
    #[error("array literal must start with \"{{\"")]
    MissingOpeningBrace,
    #[error("array literal must end with \"}}\"")]
    MissingClosingBrace,
    #[error("unterminated quoted element")]
    UnterminatedQuote,
    #[error("unexpected character {0:?} after quoted element")]
    UnexpectedCharacter(char),
    #[error("multi-dimensional arrays are not supported")]
    MultiDimensional,
}

/// Split an array literal into its elements. Unquoted `NULL` (any case)
/// becomes `None`; a quoted `"NULL"` is the string.
pub fn parse(literal: &str) -> Result<Vec<Option<String>>, ArrayLiteralError> {
    let mut literal = literal.trim();
    // optional dimension decoration, e.g. `[1:3]={1,2,3}`
    if literal.starts_with('[') {
        if let Some(at) = literal.find('=') {
            literal = literal[at + 1..].trim_start();
        }
    }
    let inner = literal
        .strip_prefix('{')
        .ok_or(ArrayLiteralError::MissingOpeningBrace)?
        .strip_suffix('}')
        .ok_or(ArrayLiteralError::MissingClosingBrace)?;

    let mut elements = Vec::new();
    if inner.trim().is_empty() {
        return Ok(elements);
    }

    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        match chars.peek() {
            Some('{') => return Err(ArrayLiteralError::MultiDimensional),
            Some('"') => {
                chars.next();
                let mut element = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => element.push(escaped),
                            None => return Err(ArrayLiteralError::UnterminatedQuote),
                        },
                        Some('"') => break,
                        Some(c) => element.push(c),
                        None => return Err(ArrayLiteralError::UnterminatedQuote),
                    }
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                elements.push(Some(element));
            }
            _ => {
                let mut element = String::new();
                while let Some(c) = chars.next_if(|c| *c != ',') {
                    if c == '\\' {
                        if let Some(escaped) = chars.next() {
                            element.push(escaped);
                        }
                    } else {
                        element.push(c);
                    }
                }
                let element = element.trim_end();
                if element.eq_ignore_ascii_case("NULL") {
                    elements.push(None);
                } else {
                    elements.push(Some(element.to_string()));
                }
            }
        }

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(other) => return Err(ArrayLiteralError::UnexpectedCharacter(other)),
        }
    }

    Ok(elements)
}
