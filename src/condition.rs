//! `when` guard expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := compare ( "&&" compare )*
//! compare := unary ( ( "===" | "!==" | "==" | "!=" | ">" | ">=" | "<" | "<=" ) unary )?
//! unary   := "!" unary | primary
//! primary := "(" or ")" | string | number | true | false | null | undefined | path
//! ```
//!
//! Paths read state exactly like bindings. Truthiness follows JavaScript:
//! missing, `null`, `false`, `0`, `NaN` and `""` are falsy.

use crate::binding::{is_path_char, BindingCache, BindingPath};
use crate::error::{SduiError, SduiResult};
use crate::spec::When;
use crate::state::StateSnapshot;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Literal(Value),
    Undefined,
    Path(BindingPath),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Compare(Box<Condition>, CompareOp, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Num(f64),
    Keyword(&'static str),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn invalid(expr: &str, reason: impl Into<String>) -> SduiError {
    SduiError::InvalidCondition {
        expr: expr.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(expr: &str) -> SduiResult<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let after = chars.get(i + 2).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == c)
                    .map(|offset| start + offset)
                    .ok_or_else(|| invalid(expr, "unterminated string literal"))?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += if after == Some('=') { 3 } else { 2 };
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += if after == Some('=') { 3 } else { 2 };
            }
            '>' | '<' => {
                let inclusive = next == Some('=');
                let op = match (c, inclusive) {
                    ('>', true) => CompareOp::Ge,
                    ('>', false) => CompareOp::Gt,
                    (_, true) => CompareOp::Le,
                    (_, false) => CompareOp::Lt,
                };
                tokens.push(Token::Op(op));
                i += if inclusive { 2 } else { 1 };
            }
            c if c.is_ascii_digit()
                || (c == '-' && next.map(|n| n.is_ascii_digit()).unwrap_or(false)) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| invalid(expr, format!("invalid number '{}'", text)))?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (is_path_char(chars[i]) || matches!(chars[i], '.' | '[' | ']'))
                    && chars[i] != '-'
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "true" => Token::Keyword("true"),
                    "false" => Token::Keyword("false"),
                    "null" => Token::Keyword("null"),
                    "undefined" => Token::Keyword("undefined"),
                    _ => Token::Path(word),
                };
                tokens.push(token);
            }
            other => {
                return Err(invalid(expr, format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> SduiResult<Condition> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> SduiResult<Condition> {
        let mut left = self.parse_compare()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_compare()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> SduiResult<Condition> {
        let left = self.parse_unary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_unary()?;
            return Ok(Condition::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> SduiResult<Condition> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Condition::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> SduiResult<Condition> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(invalid(self.expr, "expected ')'")),
                }
            }
            Some(Token::Str(s)) => Ok(Condition::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Condition::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Some(Token::Keyword("true")) => Ok(Condition::Literal(Value::Bool(true))),
            Some(Token::Keyword("false")) => Ok(Condition::Literal(Value::Bool(false))),
            Some(Token::Keyword("null")) => Ok(Condition::Literal(Value::Null)),
            Some(Token::Keyword(_)) => Ok(Condition::Undefined),
            Some(Token::Path(path)) => Ok(Condition::Path(
                BindingPath::parse(&path).map_err(|e| invalid(self.expr, e.to_string()))?,
            )),
            Some(other) => Err(invalid(self.expr, format!("unexpected token {:?}", other))),
            None => Err(invalid(self.expr, "unexpected end of expression")),
        }
    }
}

impl Condition {
    pub fn parse(expr: &str) -> SduiResult<Self> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(Condition::Literal(Value::Bool(true)));
        }
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
        };
        let condition = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(invalid(expr, "unexpected trailing input"));
        }
        Ok(condition)
    }

    /// Operand value; `None` is JavaScript `undefined`.
    pub fn value(&self, state: &StateSnapshot) -> Option<Value> {
        match self {
            Condition::Literal(value) => Some(value.clone()),
            Condition::Undefined => None,
            Condition::Path(path) => path.resolve(state),
            Condition::Not(inner) => Some(Value::Bool(!inner.evaluate(state))),
            Condition::And(left, right) => {
                Some(Value::Bool(left.evaluate(state) && right.evaluate(state)))
            }
            Condition::Or(left, right) => {
                Some(Value::Bool(left.evaluate(state) || right.evaluate(state)))
            }
            Condition::Compare(left, op, right) => Some(Value::Bool(compare(
                left.value(state).as_ref(),
                *op,
                right.value(state).as_ref(),
            ))),
        }
    }

    pub fn evaluate(&self, state: &StateSnapshot) -> bool {
        is_truthy(self.value(state).as_ref())
    }
}

fn compare(left: Option<&Value>, op: CompareOp, right: Option<&Value>) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        _ => {
            let ordering = match (left, right) {
                (Some(Value::Number(a)), Some(Value::Number(b))) => {
                    match (a.as_f64(), b.as_f64()) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => None,
                    }
                }
                (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                Some(Ordering::Greater) => matches!(op, CompareOp::Gt | CompareOp::Ge),
                Some(Ordering::Less) => matches!(op, CompareOp::Lt | CompareOp::Le),
                Some(Ordering::Equal) => matches!(op, CompareOp::Ge | CompareOp::Le),
                None => false,
            }
        }
    }
}

fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// JavaScript truthiness. `None` stands for `undefined`.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Parsed conditions keyed by expression text, including parse failures.
#[derive(Debug, Default)]
pub struct ConditionCache {
    conditions: DashMap<String, Arc<SduiResult<Condition>>>,
}

impl ConditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, expr: &str) -> Arc<SduiResult<Condition>> {
        if let Some(found) = self.conditions.get(expr) {
            return Arc::clone(found.value());
        }
        let parsed = Arc::new(Condition::parse(expr));
        self.conditions.insert(expr.to_string(), Arc::clone(&parsed));
        parsed
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Evaluate a node guard. Absent guards and empty expressions render; an
/// expression containing `{{..}}` is resolved as a binding and tested for
/// truthiness (a missing path anywhere in it counts as undefined); a malformed
/// expression suppresses the node.
pub fn evaluate_when(
    when: Option<&When>,
    state: &StateSnapshot,
    bindings: &BindingCache,
    conditions: &ConditionCache,
) -> SduiResult<bool> {
    match when {
        None => Ok(true),
        Some(When::Flag(flag)) => Ok(*flag),
        Some(When::Expr(expr)) => {
            let expr = expr.trim();
            if expr.is_empty() {
                return Ok(true);
            }
            if expr.contains("{{") {
                let resolved = bindings.template(expr).resolve_complete(state);
                return Ok(is_truthy(resolved.as_ref()));
            }
            match &*conditions.get(expr) {
                Ok(condition) => Ok(condition.evaluate(state)),
                Err(err) => Err(err.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> StateSnapshot {
        StateSnapshot::from_value(json!({
            "count": 3,
            "name": "Ada",
            "isLoggedIn": true,
            "role": "admin",
            "empty": "",
            "items": [1, 2]
        }))
    }

    fn eval(expr: &str) -> bool {
        Condition::parse(expr).unwrap().evaluate(&state())
    }

    #[test]
    fn test_comparisons() {
        assert!(eval("state.count > 2"));
        assert!(eval("count >= 3"));
        assert!(!eval("count < 3"));
        assert!(eval("count === 3"));
        assert!(eval("count == 3.0"));
        assert!(eval("role !== 'guest'"));
        assert!(eval("name == \"Ada\""));
        assert!(!eval("name > 5"));
    }

    #[test]
    fn test_logic_and_grouping() {
        assert!(eval("isLoggedIn && role === 'admin'"));
        assert!(eval("!isLoggedIn || count > 1"));
        assert!(!eval("!(isLoggedIn && count > 1)"));
        assert!(eval("(count > 10 || role == 'admin') && isLoggedIn"));
    }

    #[test]
    fn test_truthiness() {
        assert!(eval("name"));
        assert!(!eval("empty"));
        assert!(!eval("missing"));
        assert!(eval("items"));
        assert!(eval("items.1 === 2"));
        assert!(eval("missing === undefined"));
        assert!(!eval("missing === null"));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["count >", "(count > 1", "count = 3", "count > 1 1", "'open", "#"] {
            assert!(
                matches!(Condition::parse(bad), Err(SduiError::InvalidCondition { .. })),
                "expected parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_evaluate_when_variants() {
        let state = state();
        let bindings = BindingCache::new();
        let conditions = ConditionCache::new();
        let check = |when: Option<When>| evaluate_when(when.as_ref(), &state, &bindings, &conditions);

        assert_eq!(check(None), Ok(true));
        assert_eq!(check(Some(When::Flag(false))), Ok(false));
        assert_eq!(check(Some(When::Expr("   ".into()))), Ok(true));
        assert_eq!(check(Some(When::Expr("{{state.isLoggedIn}}".into()))), Ok(true));
        assert_eq!(check(Some(When::Expr("{{state.empty}}".into()))), Ok(false));
        assert_eq!(check(Some(When::Expr("count > 5".into()))), Ok(false));
        assert!(check(Some(When::Expr("count >".into()))).is_err());
    }

    #[test]
    fn test_length_guards() {
        assert!(eval("state.items.length > 1"));
        assert!(eval("name.length === 3"));
        assert!(!eval("state.missing.length > 0"));
    }

    #[test]
    fn test_guard_with_unbound_placeholders_is_false() {
        let state = state();
        let bindings = BindingCache::new();
        let conditions = ConditionCache::new();
        let check = |expr: &str| evaluate_when(Some(&When::Expr(expr.into())), &state, &bindings, &conditions);

        assert_eq!(check("{{state.a}}{{state.b}}"), Ok(false));
        assert_eq!(check("{{state.name}} {{state.missing}}"), Ok(false));
        assert_eq!(check("{{state.name}}-{{state.role}}"), Ok(true));
        assert_eq!(check("{{state.items.length}}"), Ok(true));
    }

    #[test]
    fn test_condition_cache_keeps_errors() {
        let cache = ConditionCache::new();
        assert!(cache.get("a &&").is_err());
        assert!(cache.get("a &&").is_err());
        assert_eq!(cache.len(), 1);
    }
}
