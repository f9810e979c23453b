//! Sandboxed expression evaluation capability.
//!
//! Evaluates a model-authored expression against caller-supplied named
//! values. The evaluator is a closed interpreter: its only bindings are the
//! numbers passed in, so there is no filesystem, network, or host access to
//! escape to. Resource limits make it a real execution bound, not a
//! convenience:
//!
//! - input length cap (oversized expressions are rejected up front)
//! - recursion depth cap (deeply nested parentheses)
//! - a fuel counter bounding total evaluation steps
//!
//! Supports arithmetic (`+ - * /`), parentheses, unary negation,
//! comparisons (`< > <= >= == !=`), decimal numbers, and identifiers bound
//! from the `variables` object.

use async_trait::async_trait;
use deskhand_core::capability::Capability;
use deskhand_core::context::ExecutionContext;
use deskhand_core::error::CapabilityError;
use std::collections::HashMap;

/// Resource limits for one evaluation.
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    /// Maximum expression length in bytes.
    pub max_input_len: usize,
    /// Maximum parser/evaluator recursion depth.
    pub max_depth: usize,
    /// Maximum evaluation steps.
    pub max_fuel: u32,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_input_len: 1024,
            max_depth: 32,
            max_fuel: 10_000,
        }
    }
}

#[derive(Default)]
pub struct ExpressionCapability {
    limits: SandboxLimits,
}

impl ExpressionCapability {
    pub fn with_limits(limits: SandboxLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl Capability for ExpressionCapability {
    fn name(&self) -> &str {
        "evaluate_expression"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic or comparison expression against named numeric values. Supports +, -, *, /, parentheses, <, >, <=, >=, ==, !=."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(subtotal + tax) * 1.02' or 'balance > 500'"
                },
                "variables": {
                    "type": "object",
                    "description": "Named numeric values the expression may reference"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<String, CapabilityError> {
        let expression = input["expression"]
            .as_str()
            .ok_or_else(|| CapabilityError::InvalidInput("missing 'expression'".into()))?;

        if expression.len() > self.limits.max_input_len {
            return Err(CapabilityError::SandboxLimit(format!(
                "expression exceeds {} bytes",
                self.limits.max_input_len
            )));
        }

        let mut variables = HashMap::new();
        if let Some(map) = input["variables"].as_object() {
            for (key, value) in map {
                let number = value.as_f64().ok_or_else(|| {
                    CapabilityError::InvalidInput(format!("variable '{key}' is not a number"))
                })?;
                variables.insert(key.clone(), number);
            }
        }

        match evaluate(expression, &variables, &self.limits) {
            Ok(EvalValue::Number(n)) => Ok(format_number(n)),
            Ok(EvalValue::Bool(b)) => Ok(b.to_string()),
            Err(EvalError::Limit(msg)) => Err(CapabilityError::SandboxLimit(msg)),
            Err(EvalError::Parse(msg)) => Err(CapabilityError::ExecutionFailed {
                capability: "evaluate_expression".into(),
                reason: msg,
            }),
        }
    }
}

/// Format a result number, removing trailing .0 for integers.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────

/// The result of an evaluation: a number or a comparison outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvalValue {
    Number(f64),
    Bool(bool),
}

#[derive(Debug)]
enum EvalError {
    Parse(String),
    Limit(String),
}

/// Evaluate an expression against named values under the given limits.
fn evaluate(
    expr: &str,
    variables: &HashMap<String, f64>,
    limits: &SandboxLimits,
) -> Result<EvalValue, EvalError> {
    let tokens = tokenize(expr).map_err(EvalError::Parse)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        variables,
        fuel: limits.max_fuel,
        max_depth: limits.max_depth,
    };
    let result = parser.parse_comparison(0)?;
    if parser.pos < parser.tokens.len() {
        return Err(EvalError::Parse(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, parser.tokens[parser.pos]
        )));
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    return Err("Single '=' is not an operator, use '=='".into());
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    return Err("Unexpected character: '!'".into());
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    variables: &'a HashMap<String, f64>,
    fuel: u32,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn burn(&mut self) -> Result<(), EvalError> {
        if self.fuel == 0 {
            return Err(EvalError::Limit("evaluation fuel exhausted".into()));
        }
        self.fuel -= 1;
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<(), EvalError> {
        if depth > self.max_depth {
            Err(EvalError::Limit(format!(
                "expression nesting exceeds depth {}",
                self.max_depth
            )))
        } else {
            Ok(())
        }
    }

    // comparison = sum (cmp_op sum)?
    fn parse_comparison(&mut self, depth: usize) -> Result<EvalValue, EvalError> {
        self.burn()?;
        self.check_depth(depth)?;
        let left = self.parse_sum(depth + 1)?;

        let op = match self.peek() {
            Some(Token::Lt) => Some(Token::Lt),
            Some(Token::Gt) => Some(Token::Gt),
            Some(Token::Le) => Some(Token::Le),
            Some(Token::Ge) => Some(Token::Ge),
            Some(Token::EqEq) => Some(Token::EqEq),
            Some(Token::NotEq) => Some(Token::NotEq),
            _ => None,
        };

        let Some(op) = op else {
            return Ok(EvalValue::Number(left));
        };
        self.consume();
        let right = self.parse_sum(depth + 1)?;

        let result = match op {
            Token::Lt => left < right,
            Token::Gt => left > right,
            Token::Le => left <= right,
            Token::Ge => left >= right,
            Token::EqEq => left == right,
            Token::NotEq => left != right,
            _ => unreachable!(),
        };
        Ok(EvalValue::Bool(result))
    }

    // sum = term (('+' | '-') term)*
    fn parse_sum(&mut self, depth: usize) -> Result<f64, EvalError> {
        self.burn()?;
        self.check_depth(depth)?;
        let mut left = self.parse_term(depth + 1)?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    self.burn()?;
                    left += self.parse_term(depth + 1)?;
                }
                Token::Minus => {
                    self.consume();
                    self.burn()?;
                    left -= self.parse_term(depth + 1)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self, depth: usize) -> Result<f64, EvalError> {
        self.burn()?;
        self.check_depth(depth)?;
        let mut left = self.parse_unary(depth + 1)?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    self.burn()?;
                    left *= self.parse_unary(depth + 1)?;
                }
                Token::Slash => {
                    self.consume();
                    self.burn()?;
                    let right = self.parse_unary(depth + 1)?;
                    if right == 0.0 {
                        return Err(EvalError::Parse("Division by zero".into()));
                    }
                    left /= right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = '-' unary | primary
    fn parse_unary(&mut self, depth: usize) -> Result<f64, EvalError> {
        self.burn()?;
        self.check_depth(depth)?;
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let val = self.parse_unary(depth + 1)?;
            return Ok(-val);
        }
        self.parse_primary(depth + 1)
    }

    // primary = NUMBER | IDENT | '(' comparison ')'
    fn parse_primary(&mut self, depth: usize) -> Result<f64, EvalError> {
        self.burn()?;
        self.check_depth(depth)?;
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.variables.get(&name).copied().ok_or_else(|| {
                    EvalError::Parse(format!("Unknown variable: {name}"))
                })
            }
            Some(Token::LParen) => {
                let val = self.parse_comparison(depth + 1)?;
                let EvalValue::Number(val) = val else {
                    return Err(EvalError::Parse(
                        "Comparison cannot be nested in arithmetic".into(),
                    ));
                };
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err(EvalError::Parse("Expected closing parenthesis".into())),
                }
            }
            Some(tok) => Err(EvalError::Parse(format!("Unexpected token: {tok:?}"))),
            None => Err(EvalError::Parse("Unexpected end of expression".into())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
