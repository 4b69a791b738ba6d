//! Tokenizer for template expressions.

use super::ParseError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// Operators and punctuation, stored as their source text.
    Punct(&'static str),
}

// Longest first so that `===` wins over `==` and `=`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "??", "==", "!=", "<=", ">=", "&&", "||", "=>", "->", "+=", "-=", "*=", "/=",
    "~=", ".=", "++", "--", "(", ")", "[", "]", "{", "}", ",", ":", ";", ".", "?", "!", "<",
    ">", "+", "-", "*", "/", "%", "~", "=",
];

/// Split `input` into tokens.
///
/// Identifiers may carry a leading `$`, which is dropped, so `$user->name`
/// and `user.name` lex to the same tokens apart from the arrow.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '\'' || c == '"' || c == '`' {
            let (text, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(text));
            i = next;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            let mut is_float = false;
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let token = if is_float {
                Token::Float(text.parse().map_err(|_| {
                    ParseError::new(format!("invalid number literal '{}'", text))
                })?)
            } else {
                Token::Int(text.parse().map_err(|_| {
                    ParseError::new(format!("invalid number literal '{}'", text))
                })?)
            };
            tokens.push(token);
            continue;
        }

        if c == '$' || c == '_' || c.is_alphabetic() {
            let start = if c == '$' { i + 1 } else { i };
            i = start;
            while i < chars.len() && (chars[i] == '_' || chars[i].is_alphanumeric()) {
                i += 1;
            }
            if i == start {
                return Err(ParseError::new("expected a variable name after '$'"));
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        match PUNCTUATION.iter().find(|p| rest.starts_with(**p)) {
            Some(p) => {
                tokens.push(Token::Punct(p));
                i += p.chars().count();
            }
            None => {
                return Err(ParseError::new(format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted string starting at `start`; returns the unescaped text and
/// the index after the closing quote.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            match next {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '\\' => out.push('\\'),
                c if c == quote => out.push(c),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            i += 2;
            continue;
        }
        if c == quote {
            return Ok((out, i + 1));
        }
        out.push(c);
        i += 1;
    }

    Err(ParseError::new("unterminated string literal"))
}
