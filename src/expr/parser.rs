//! Pratt parser for template expressions and statements.

use serde_json::{Number, Value};

use super::ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
use super::lexer::{tokenize, Token};
use super::ParseError;

/// Parse a complete expression.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.expression(0)?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a comma-separated argument list (possibly empty).
pub fn parse_args(input: &str) -> Result<Vec<Expr>, ParseError> {
    let mut parser = Parser::new(input)?;
    let mut args = Vec::new();
    while !parser.at_end() {
        args.push(parser.expression(0)?);
        if !parser.eat(",") {
            break;
        }
    }
    parser.expect_end()?;
    Ok(args)
}

/// Parse `;`-separated statements from a raw-code block.
pub fn parse_statements(input: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(input)?;
    let mut stmts = Vec::new();
    while !parser.at_end() {
        if parser.eat(";") {
            continue;
        }
        stmts.push(parser.statement()?);
        if !parser.at_end() && !parser.eat(";") {
            return Err(parser.unexpected("';'"));
        }
    }
    Ok(stmts)
}

/// Header of a collection-iteration loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachHeader {
    pub iterable: Expr,
    pub key: Option<String>,
    pub value: String,
}

/// Parse `items as item` or `items as key => item`.
pub fn parse_foreach(input: &str) -> Result<ForeachHeader, ParseError> {
    let mut parser = Parser::new(input)?;
    let iterable = parser.expression(0)?;
    match parser.next() {
        Some(Token::Ident(kw)) if kw == "as" => {}
        _ => return Err(ParseError::new("expected 'as' in foreach header")),
    }
    let first = parser.ident()?;
    let header = if parser.eat("=>") {
        let value = parser.ident()?;
        ForeachHeader {
            iterable,
            key: Some(first),
            value,
        }
    } else {
        ForeachHeader {
            iterable,
            key: None,
            value: first,
        }
    };
    parser.expect_end()?;
    Ok(header)
}

/// Header of a counted loop: `init; condition; step`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub init: Vec<Stmt>,
    pub condition: Expr,
    pub step: Vec<Stmt>,
}

/// Parse `i = 0; i < 3; i++`. Each clause may hold comma-separated
/// statements; an empty condition is always true.
pub fn parse_for(input: &str) -> Result<ForHeader, ParseError> {
    let parts = split_top_level(input, ';');
    if parts.len() != 3 {
        return Err(ParseError::new(
            "for loop header needs three clauses separated by ';'",
        ));
    }

    let clause = |src: &str| -> Result<Vec<Stmt>, ParseError> {
        split_top_level(src, ',')
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                let mut parser = Parser::new(&s)?;
                let stmt = parser.statement()?;
                parser.expect_end()?;
                Ok(stmt)
            })
            .collect()
    };

    let condition = if parts[1].trim().is_empty() {
        Expr::Literal(Value::Bool(true))
    } else {
        parse_expr(&parts[1])?
    };

    Ok(ForHeader {
        init: clause(&parts[0])?,
        condition,
        step: clause(&parts[2])?,
    })
}

/// Split on `sep` outside of quotes and brackets.
pub fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut prev = '\0';

    for c in input.chars() {
        match quote {
            Some(q) => {
                if c == q && prev != '\\' {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ if c == sep && depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                    prev = c;
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
        prev = c;
    }
    parts.push(current);
    parts
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(q)) if *q == p)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) -> Result<(), ParseError> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", p)))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::new(format!(
                "expected {}, found {}",
                wanted,
                describe(token)
            )),
            None => ParseError::new(format!("expected {}, found end of input", wanted)),
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => Err(ParseError::new(format!(
                "expected a name, found {}",
                describe(&other)
            ))),
            None => Err(ParseError::new("expected a name, found end of input")),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if let (Some(Token::Ident(name)), Some(Token::Punct(op))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            let assign = match *op {
                "=" => Some(AssignOp::Set),
                "+=" => Some(AssignOp::Add),
                "-=" => Some(AssignOp::Sub),
                "*=" => Some(AssignOp::Mul),
                "/=" => Some(AssignOp::Div),
                "~=" | ".=" => Some(AssignOp::Concat),
                "++" | "--" => {
                    let op = if *op == "++" {
                        AssignOp::Add
                    } else {
                        AssignOp::Sub
                    };
                    self.pos += 2;
                    return Ok(Stmt::Assign {
                        target: name,
                        op,
                        value: Expr::Literal(Value::from(1)),
                    });
                }
                _ => None,
            };
            if let Some(op) = assign {
                self.pos += 2;
                let value = self.expression(0)?;
                return Ok(Stmt::Assign {
                    target: name,
                    op,
                    value,
                });
            }
        }
        Ok(Stmt::Eval(self.expression(0)?))
    }

    fn expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.prefix()?;

        loop {
            let op = match self.peek() {
                Some(Token::Punct(p)) => *p,
                Some(Token::Ident(word)) => match word.as_str() {
                    "and" => "&&",
                    "or" => "||",
                    _ => break,
                },
                _ => break,
            };

            if op == "?" {
                // Ternary binds loosest and associates to the right.
                if min_bp > 1 {
                    break;
                }
                self.pos += 1;
                let then = self.expression(0)?;
                self.expect(":")?;
                let otherwise = self.expression(1)?;
                lhs = Expr::Ternary {
                    cond: Box::new(lhs),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                };
                continue;
            }

            let Some((binop, bp)) = binary_op(op) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            // `??` is right associative, everything else left associative.
            let next_bp = if binop == BinaryOp::Coalesce { bp } else { bp + 1 };
            let rhs = self.expression(next_bp)?;
            lhs = Expr::Binary {
                op: binop,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, ParseError> {
        let token = self
            .next()
            .ok_or_else(|| ParseError::new("expected an expression, found end of input"))?;

        let expr = match token {
            Token::Int(n) => Expr::Literal(Value::from(n)),
            Token::Float(f) => Expr::Literal(
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| ParseError::new("invalid float literal"))?,
            ),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::Ident(word) => match word.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "not" => self.unary(UnaryOp::Not)?,
                _ if self.is_punct("(") => {
                    self.pos += 1;
                    let args = self.call_args()?;
                    Expr::Call { name: word, args }
                }
                _ => Expr::Var(word),
            },
            Token::Punct("!") => self.unary(UnaryOp::Not)?,
            Token::Punct("-") => self.unary(UnaryOp::Neg)?,
            Token::Punct("(") => {
                let inner = self.expression(0)?;
                self.expect(")")?;
                inner
            }
            Token::Punct("[") => self.array()?,
            Token::Punct("{") => self.object()?,
            other => {
                return Err(ParseError::new(format!(
                    "expected an expression, found {}",
                    describe(&other)
                )))
            }
        };

        self.postfix(expr)
    }

    fn unary(&mut self, op: UnaryOp) -> Result<Expr, ParseError> {
        let expr = self.expression(UNARY_BP)?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            if self.eat(".") || self.eat("->") {
                let name = match self.next() {
                    Some(Token::Ident(name)) => name,
                    Some(Token::Int(n)) => n.to_string(),
                    _ => return Err(ParseError::new("expected a property name after '.'")),
                };
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat("[") {
                let index = self.expression(0)?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expression(0)?);
            if self.eat(")") {
                return Ok(args);
            }
            self.expect(",")?;
        }
    }

    /// `[a, b]` is a list; `['k' => v]` is an associative array.
    fn array(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        let mut entries = Vec::new();

        while !self.eat("]") {
            let item = self.expression(0)?;
            if self.eat("=>") {
                let key = literal_key(&item)?;
                entries.push((key, self.expression(0)?));
            } else {
                items.push(item);
            }
            if !self.eat(",") {
                self.expect("]")?;
                break;
            }
        }

        match (items.is_empty(), entries.is_empty()) {
            (_, true) => Ok(Expr::Array(items)),
            (true, false) => Ok(Expr::Object(entries)),
            (false, false) => Err(ParseError::new(
                "cannot mix keyed and positional entries in an array literal",
            )),
        }
    }

    fn object(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        while !self.eat("}") {
            let key = match self.next() {
                Some(Token::Ident(name)) => name,
                Some(Token::Str(s)) => s,
                Some(Token::Int(n)) => n.to_string(),
                _ => return Err(ParseError::new("expected an object key")),
            };
            self.expect(":")?;
            entries.push((key, self.expression(0)?));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

const UNARY_BP: u8 = 20;

fn binary_op(op: &str) -> Option<(BinaryOp, u8)> {
    let entry = match op {
        "??" => (BinaryOp::Coalesce, 2),
        "||" => (BinaryOp::Or, 3),
        "&&" => (BinaryOp::And, 4),
        "==" | "===" => (BinaryOp::Eq, 5),
        "!=" | "!==" => (BinaryOp::Ne, 5),
        "<" => (BinaryOp::Lt, 6),
        "<=" => (BinaryOp::Le, 6),
        ">" => (BinaryOp::Gt, 6),
        ">=" => (BinaryOp::Ge, 6),
        "~" => (BinaryOp::Concat, 7),
        "+" => (BinaryOp::Add, 8),
        "-" => (BinaryOp::Sub, 8),
        "*" => (BinaryOp::Mul, 9),
        "/" => (BinaryOp::Div, 9),
        "%" => (BinaryOp::Rem, 9),
        _ => return None,
    };
    Some(entry)
}

fn literal_key(expr: &Expr) -> Result<String, ParseError> {
    match expr {
        Expr::Literal(Value::String(s)) => Ok(s.clone()),
        Expr::Literal(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ParseError::new("array keys must be string or number literals")),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("'{}'", name),
        Token::Int(n) => n.to_string(),
        Token::Float(f) => f.to_string(),
        Token::Str(s) => format!("string '{}'", s),
        Token::Punct(p) => format!("'{}'", p),
    }
}
