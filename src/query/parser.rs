//! ## Expression parser
//!
//! A hand-rolled recursive-descent parser for the restricted infix expression
//! mini-language (§4.4). There is no parsing crate anywhere in this crate's dependency
//! stack, so this is written by hand rather than pulling one in for a grammar this small.
//!
//! A well-formed expression yields exactly one [`QueryNode`]; anything else is a
//! [`QdexError::MalformedExpression`].

use super::node::{and, not, or, Comparator, Operand, QueryNode};
use crate::error::QdexError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Pipe,
    Tilde,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn lex(src: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut toks = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '&' => {
                toks.push(Tok::Amp);
                i += 1;
            }
            '|' => {
                toks.push(Tok::Pipe);
                i += 1;
            }
            '~' => {
                toks.push(Tok::Tilde);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::EqEq);
                    i += 2;
                } else {
                    return Err(format!("unexpected '=' at position {i}"));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::NotEq);
                    i += 2;
                } else {
                    return Err(format!("unexpected '!' at position {i}"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err("unterminated string literal".to_string());
                }
                i += 1;
                toks.push(Tok::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        is_float = true;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    toks.push(Tok::Float(text.parse().map_err(|_| format!("bad number {text:?}"))?));
                } else {
                    toks.push(Tok::Int(text.parse().map_err(|_| format!("bad number {text:?}"))?));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                toks.push(Tok::Ident(text));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }
    Ok(toks)
}

/// A parsed-but-not-yet-classified term: the index-name/identifier form, a literal
/// value, or a bracketed/tupled list (whose elements are names or values in turn).
enum Term {
    Name(String),
    Value(Value),
    List(Vec<Operand>),
}

fn term_to_operand(term: Term) -> Operand {
    match term {
        Term::Name(n) => Operand::Name(n),
        Term::Value(v) => Operand::Literal(v),
        Term::List(items) => Operand::List(items),
    }
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if s == word)
    }

    fn peek2_ident(&self, word: &str) -> bool {
        matches!(self.toks.get(self.pos + 1), Some(Tok::Ident(s)) if s == word)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), String> {
        if self.peek() == Some(tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected {tok:?}, found {:?}", self.peek()))
        }
    }

    fn parse_or(&mut self) -> Result<QueryNode, String> {
        let mut left = self.parse_and()?;
        loop {
            if matches!(self.peek(), Some(Tok::Pipe)) || self.peek_ident("or") {
                self.advance();
                let right = self.parse_and()?;
                left = or(vec![left, right]);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<QueryNode, String> {
        let mut left = self.parse_unary()?;
        loop {
            if matches!(self.peek(), Some(Tok::Amp)) || self.peek_ident("and") {
                self.advance();
                let right = self.parse_unary()?;
                left = and(vec![left, right]);
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<QueryNode, String> {
        if matches!(self.peek(), Some(Tok::Tilde)) || self.peek_ident("not") {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(not(inner));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<QueryNode, String> {
        if matches!(self.peek(), Some(Tok::LParen)) {
            self.advance();
            let inner = self.parse_or()?;
            self.expect(&Tok::RParen)?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_term(&mut self) -> Result<Term, String> {
        match self.advance() {
            Some(Tok::Int(n)) => Ok(Term::Value(Value::Int(n))),
            Some(Tok::Minus) => match self.advance() {
                Some(Tok::Int(n)) => Ok(Term::Value(Value::Int(-n))),
                Some(Tok::Float(f)) => Ok(Term::Value(Value::Float(-f))),
                other => Err(format!("expected a number after '-', found {other:?}")),
            },
            Some(Tok::Float(f)) => Ok(Term::Value(Value::Float(f))),
            Some(Tok::Str(s)) => Ok(Term::Value(Value::Str(s))),
            Some(Tok::Ident(name)) => Ok(Term::Name(name)),
            Some(Tok::LBracket) => {
                let items = self.parse_list_items(&Tok::RBracket)?;
                Ok(Term::List(items))
            }
            Some(Tok::LParen) => {
                let items = self.parse_list_items(&Tok::RParen)?;
                Ok(Term::List(items))
            }
            other => Err(format!("expected a value or name, found {other:?}")),
        }
    }

    fn parse_list_items(&mut self, close: &Tok) -> Result<Vec<Operand>, String> {
        let mut items = Vec::new();
        if self.peek() == Some(close) {
            self.advance();
            return Ok(items);
        }
        loop {
            let term = self.parse_term()?;
            items.push(term_to_operand(term));
            match self.peek() {
                Some(Tok::Comma) => {
                    self.advance();
                }
                _ => break,
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    /// Parses exactly one bracketed or tupled list argument to `any(...)`/`all(...)`,
    /// rejecting any other arity (a bare scalar, or more than one top-level argument).
    fn parse_single_list_arg(&mut self) -> Result<Vec<Operand>, String> {
        self.expect(&Tok::LParen)?;
        let term = self.parse_term()?;
        let Term::List(items) = term else {
            return Err("any()/all() requires exactly one list or tuple argument".to_string());
        };
        self.expect(&Tok::RParen)?;
        Ok(items)
    }

    fn parse_comparison(&mut self) -> Result<QueryNode, String> {
        let left = self.parse_term()?;

        // "val in name" / "val not in name" / the any()/all() function-call forms.
        let negated_in = self.peek_ident("not") && self.peek2_ident("in");
        if negated_in || self.peek_ident("in") {
            if negated_in {
                self.advance();
            }
            self.advance(); // consume "in"

            if self.peek_ident("any") || self.peek_ident("all") {
                let is_any = self.peek_ident("any");
                self.advance();
                let items = self.parse_single_list_arg()?;
                let Term::Name(index) = left else {
                    return Err("any()/all() requires an index name on the left of 'in'".to_string());
                };
                let operand = Operand::List(items);
                let comparator = match (is_any, negated_in) {
                    (true, false) => Comparator::Any(operand),
                    (true, true) => Comparator::NotAny(operand),
                    (false, false) => Comparator::All(operand),
                    (false, true) => Comparator::NotAll(operand),
                };
                return Ok(QueryNode::Cmp { index, comparator });
            }

            let index = match self.parse_term()? {
                Term::Name(n) => n,
                _ => return Err("'in' requires an index name on the right".to_string()),
            };
            let operand = term_to_operand(left);
            let comparator = if negated_in {
                Comparator::NotContains(operand)
            } else {
                Comparator::Contains(operand)
            };
            return Ok(QueryNode::Cmp { index, comparator });
        }

        let op = match self.peek() {
            Some(Tok::EqEq) => Tok::EqEq,
            Some(Tok::NotEq) => Tok::NotEq,
            Some(Tok::Lt) => Tok::Lt,
            Some(Tok::Le) => Tok::Le,
            Some(Tok::Gt) => Tok::Gt,
            Some(Tok::Ge) => Tok::Ge,
            other => return Err(format!("expected a comparison operator, found {other:?}")),
        };
        self.advance();
        let right = self.parse_term()?;

        // "a < name < b" and its three Le/Lt variants: a numeric literal, a range
        // operator, the index name, then a second range operator and a numeric literal.
        if matches!(op, Tok::Lt | Tok::Le) {
            if let (Term::Value(start_val), Term::Name(index)) = (&left, &right) {
                if matches!(self.peek(), Some(Tok::Lt) | Some(Tok::Le)) {
                    let op2 = self.advance().unwrap();
                    let end = self.parse_term()?;
                    let Term::Value(end_val) = end else {
                        return Err("range upper bound must be a literal".to_string());
                    };
                    return Ok(QueryNode::Cmp {
                        index: index.clone(),
                        comparator: Comparator::InRange {
                            start: Operand::Literal(start_val.clone()),
                            end: Operand::Literal(end_val),
                            start_exclusive: op == Tok::Lt,
                            end_exclusive: op2 == Tok::Lt,
                        },
                    });
                }
            }
        }

        let Term::Name(index) = left else {
            return Err("the index name must be the left operand of a comparison".to_string());
        };
        let operand = term_to_operand(right);
        let comparator = match op {
            Tok::EqEq => Comparator::Eq(operand),
            Tok::NotEq => Comparator::NotEq(operand),
            Tok::Lt => Comparator::Lt(operand),
            Tok::Le => Comparator::Le(operand),
            Tok::Gt => Comparator::Gt(operand),
            Tok::Ge => Comparator::Ge(operand),
            _ => unreachable!(),
        };
        Ok(QueryNode::Cmp { index, comparator })
    }
}

/// Parses a restricted infix expression into exactly one query tree (§4.4).
pub fn parse(input: &str) -> Result<QueryNode, QdexError> {
    let toks = lex(input).map_err(|reason| QdexError::MalformedExpression {
        expr: input.to_string(),
        reason,
    })?;
    let mut parser = Parser { toks, pos: 0 };
    let node = parser.parse_or().map_err(|reason| QdexError::MalformedExpression {
        expr: input.to_string(),
        reason,
    })?;
    if parser.pos != parser.toks.len() {
        return Err(QdexError::MalformedExpression {
            expr: input.to_string(),
            reason: "trailing input after a complete expression".to_string(),
        });
    }
    Ok(node)
}
