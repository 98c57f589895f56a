//! `$filter` expressions.
//!
//! Grammar:
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := primary ("and" primary)*
//! primary := "(" expr ")"
//!          | "startswith" "(" member "," string ")"
//!          | "substringof" "(" string "," member ")"
//!          | member op literal
//! op      := "eq" | "ne" | "gt" | "ge" | "lt" | "le"
//! literal := string | number | "true" | "false" | "null" | "datetime" string
//! ```
//!
//! Literals are checked against the declared type of the member when parsing,
//! so a filter that can never be meaningful is rejected up front.

use crate::{
    error::Result,
    schema::{EntityType, FieldType, PrimitiveKind},
    validate::{self, parse_datetime, ID_FIELD, PUBLISHED_FIELD, UPDATED_FIELD},
    value::{FieldValue, Scalar},
    Error, Record,
};
use logos::Logos;
use std::cmp::Ordering;

const OPTION: &str = "$filter";

/// Lexical tokens of a filter expression.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,

    /// Member names, operators and keywords
    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*", |lex| lex.slice().to_string())]
    Word(String),

    /// Single-quoted string, `''` escapes a quote
    #[regex(r"'([^']|'')*'", |lex| unquote(lex.slice(), '\''))]
    Quoted(String),

    /// Double-quoted string, `""` escapes a quote
    #[regex(r#""([^"]|"")*""#, |lex| unquote(lex.slice(), '"'))]
    DoubleQuoted(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+\-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),
}

fn unquote(slice: &str, quote: char) -> String {
    let inner = &slice[1..slice.len() - 1];
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// Split a filter expression into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(Error::syntax(
                    OPTION,
                    format!(
                        "unexpected '{}' at offset {}",
                        lexer.slice(),
                        lexer.span().start
                    ),
                ));
            }
        }
    }
    Ok(tokens)
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "eq" => CompareOp::Eq,
            "ne" => CompareOp::Ne,
            "gt" => CompareOp::Gt,
            "ge" => CompareOp::Ge,
            "lt" => CompareOp::Lt,
            "le" => CompareOp::Le,
            _ => return None,
        })
    }

    fn is_relational(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

const ARITHMETIC: [&str; 5] = ["add", "sub", "mul", "div", "mod"];

/// How a member's stored value is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// `__id`
    Id,
    /// `__published`
    Published,
    /// `__updated`
    Updated,
    /// A declared primitive property
    Declared { name: String, kind: PrimitiveKind },
    /// A field with no schema entry
    Dynamic(String),
}

impl Member {
    fn resolve(name: &str, entity_type: &EntityType) -> Result<Self> {
        match name {
            ID_FIELD => return Ok(Member::Id),
            PUBLISHED_FIELD => return Ok(Member::Published),
            UPDATED_FIELD => return Ok(Member::Updated),
            _ => {}
        }
        match entity_type.property(name) {
            Some(property) => match &property.field_type {
                FieldType::Primitive(kind) => Ok(Member::Declared {
                    name: name.to_string(),
                    kind: *kind,
                }),
                FieldType::Complex(_) => Err(Error::syntax(
                    OPTION,
                    format!("cannot compare complex property '{}'", name),
                )),
            },
            None => {
                validate::check_name("property", name, usize::MAX)
                    .map_err(|_| Error::syntax(OPTION, format!("invalid member '{}'", name)))?;
                Ok(Member::Dynamic(name.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        match self {
            Member::Id => ID_FIELD,
            Member::Published => PUBLISHED_FIELD,
            Member::Updated => UPDATED_FIELD,
            Member::Declared { name, .. } | Member::Dynamic(name) => name,
        }
    }

    /// Declared kind, `None` for dynamic fields.
    fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            Member::Id => Some(PrimitiveKind::String),
            Member::Published | Member::Updated => Some(PrimitiveKind::DateTime),
            Member::Declared { kind, .. } => Some(*kind),
            Member::Dynamic(_) => None,
        }
    }

    /// The stored value, with datetimes read as milliseconds.
    fn read(&self, record: &Record) -> Option<FieldValue> {
        match self {
            Member::Id => Some(FieldValue::string(record.id.clone())),
            Member::Published => Some(FieldValue::int(record.published as i64)),
            Member::Updated => Some(FieldValue::int(record.updated as i64)),
            Member::Declared {
                name,
                kind: PrimitiveKind::DateTime,
            } => record.fields.get(name).map(datetime_as_millis),
            Member::Declared { name, .. } | Member::Dynamic(name) => {
                record.fields.get(name).cloned()
            }
        }
    }
}

fn datetime_as_millis(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Scalar(Scalar::String(s)) => parse_datetime(s)
            .map(FieldValue::int)
            .unwrap_or_else(|| value.clone()),
        FieldValue::List(items) => FieldValue::List(items.iter().map(datetime_as_millis).collect()),
        other => other.clone(),
    }
}

/// A literal operand; `None` is `null`.
type Literal = Option<Scalar>;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        member: Member,
        op: CompareOp,
        literal: Literal,
    },
    StartsWith {
        member: Member,
        prefix: String,
    },
    SubstringOf {
        member: Member,
        needle: String,
    },
}

impl Expr {
    /// Evaluate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Expr::And(a, b) => a.matches(record) && b.matches(record),
            Expr::Or(a, b) => a.matches(record) || b.matches(record),
            Expr::Compare {
                member,
                op,
                literal,
            } => compare(member.read(record), *op, literal.as_ref()),
            Expr::StartsWith { member, prefix } => {
                any_string(member.read(record), |s| s.starts_with(prefix.as_str()))
            }
            Expr::SubstringOf { member, needle } => {
                any_string(member.read(record), |s| s.contains(needle.as_str()))
            }
        }
    }
}

fn compare(stored: Option<FieldValue>, op: CompareOp, literal: Option<&Scalar>) -> bool {
    let present = !matches!(stored, None | Some(FieldValue::Null));
    let literal = match literal {
        None => {
            return match op {
                CompareOp::Eq => !present,
                _ => present,
            };
        }
        Some(literal) => literal,
    };

    let scalars: Vec<Scalar> = match stored {
        Some(FieldValue::Scalar(s)) => vec![s],
        Some(FieldValue::List(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                FieldValue::Scalar(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => return false,
    };

    if op == CompareOp::Ne {
        return present && !scalars.iter().any(|s| s.compare(literal) == Some(Ordering::Equal));
    }
    scalars
        .iter()
        .any(|s| s.compare(literal).is_some_and(|ordering| op.accepts(ordering)))
}

fn any_string(stored: Option<FieldValue>, test: impl Fn(&str) -> bool) -> bool {
    match stored {
        Some(FieldValue::Scalar(Scalar::String(s))) => test(&s),
        Some(FieldValue::List(items)) => items.iter().any(|i| i.as_str().is_some_and(&test)),
        _ => false,
    }
}

/// A compiled `$filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    /// Parse and type-check a filter against an entity type.
    pub fn parse(source: &str, entity_type: &EntityType) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(Error::syntax(OPTION, "expression is empty"));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            entity_type,
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(Error::syntax(
                OPTION,
                format!("unexpected {:?} after expression", token),
            ));
        }
        Ok(Self { expr })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.expr.matches(record)
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    entity_type: &'a EntityType,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::syntax(
                OPTION,
                format!("expected {:?}, found {:?}", expected, token),
            )),
            None => Err(Error::syntax(
                OPTION,
                format!("expected {:?}, found end of input", expected),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.peek_word("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_primary()?;
        while self.peek_word("and") {
            self.pos += 1;
            let right = self.parse_primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Word(word)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.parse_function(&word)
            }
            Some(Token::Word(word)) if word == "not" => {
                Err(Error::syntax(OPTION, "operator 'not' is not supported"))
            }
            Some(Token::Word(word)) => self.parse_comparison(&word),
            Some(token) => Err(Error::syntax(
                OPTION,
                format!("expected a member or '(', found {:?}", token),
            )),
            None => Err(Error::syntax(OPTION, "unexpected end of input")),
        }
    }

    fn parse_function(&mut self, name: &str) -> Result<Expr> {
        match name {
            "startswith" => {
                let member = self.parse_string_member()?;
                self.expect(Token::Comma)?;
                let prefix = self.parse_string_argument()?;
                self.expect(Token::RParen)?;
                Ok(Expr::StartsWith { member, prefix })
            }
            "substringof" => {
                let needle = self.parse_string_argument()?;
                self.expect(Token::Comma)?;
                let member = self.parse_string_member()?;
                self.expect(Token::RParen)?;
                Ok(Expr::SubstringOf { member, needle })
            }
            other => Err(Error::syntax(
                OPTION,
                format!("function '{}' is not supported", other),
            )),
        }
    }

    fn parse_string_member(&mut self) -> Result<Member> {
        let name = match self.next() {
            Some(Token::Word(name)) => name,
            other => {
                return Err(Error::syntax(
                    OPTION,
                    format!("expected a member, found {:?}", other),
                ));
            }
        };
        let member = Member::resolve(&name, self.entity_type)?;
        match member.kind() {
            None | Some(PrimitiveKind::String) | Some(PrimitiveKind::Untyped) => Ok(member),
            Some(kind) => Err(Error::type_mismatch(name, PrimitiveKind::String, kind.edm_name())),
        }
    }

    fn parse_string_argument(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Quoted(s)) | Some(Token::DoubleQuoted(s)) => Ok(s),
            other => Err(Error::syntax(
                OPTION,
                format!("expected a string argument, found {:?}", other),
            )),
        }
    }

    fn parse_comparison(&mut self, name: &str) -> Result<Expr> {
        let member = Member::resolve(name, self.entity_type)?;
        let op = match self.next() {
            Some(Token::Word(word)) => match CompareOp::from_word(&word) {
                Some(op) => op,
                None if ARITHMETIC.contains(&word.as_str()) => {
                    return Err(Error::syntax(
                        OPTION,
                        format!("arithmetic operator '{}' is not supported", word),
                    ));
                }
                None => {
                    return Err(Error::syntax(
                        OPTION,
                        format!("unknown operator '{}'", word),
                    ));
                }
            },
            other => {
                return Err(Error::syntax(
                    OPTION,
                    format!("expected an operator after '{}', found {:?}", name, other),
                ));
            }
        };
        let literal = self.parse_literal()?;
        let literal = check_literal(&member, op, literal)?;
        Ok(Expr::Compare {
            member,
            op,
            literal,
        })
    }

    fn parse_literal(&mut self) -> Result<RawLiteral> {
        match self.next() {
            Some(Token::Quoted(s)) | Some(Token::DoubleQuoted(s)) => Ok(RawLiteral::String(s)),
            Some(Token::Number(text)) => parse_number(&text),
            Some(Token::Word(word)) => match word.as_str() {
                "null" => Ok(RawLiteral::Null),
                "true" => Ok(RawLiteral::Bool(true)),
                "false" => Ok(RawLiteral::Bool(false)),
                "datetime" => match self.next() {
                    Some(Token::Quoted(s)) => parse_datetime_literal(&s).map(RawLiteral::DateTime),
                    other => Err(Error::syntax(
                        OPTION,
                        format!("expected a quoted datetime, found {:?}", other),
                    )),
                },
                other => Err(Error::syntax(
                    OPTION,
                    format!("'{}' is not a literal", other),
                )),
            },
            other => Err(Error::syntax(
                OPTION,
                format!("expected a literal, found {:?}", other),
            )),
        }
    }
}

/// A literal before it is checked against the member type.
#[derive(Debug, Clone, PartialEq)]
enum RawLiteral {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(i64),
}

impl RawLiteral {
    fn kind_name(&self) -> &'static str {
        match self {
            RawLiteral::Null => "Null",
            RawLiteral::Bool(_) => "Boolean",
            RawLiteral::Int(_) => "Int",
            RawLiteral::Float(_) => "Float",
            RawLiteral::String(_) => "String",
            RawLiteral::DateTime(_) => "DateTime",
        }
    }
}

fn parse_number(text: &str) -> Result<RawLiteral> {
    let integral = !text.contains(['.', 'e', 'E']);
    if integral {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(RawLiteral::Int(i));
        }
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(RawLiteral::Float)
        .ok_or_else(|| Error::syntax(OPTION, format!("invalid number '{}'", text)))
}

fn parse_datetime_literal(text: &str) -> Result<i64> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
    FORMATS
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(text, format).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| Error::syntax(OPTION, format!("invalid datetime '{}'", text)))
}

fn check_single_digits(field: &str, (int_digits, frac_digits): (usize, usize)) -> Result<()> {
    if int_digits > 5 || frac_digits > 5 {
        return Err(Error::InvalidValue {
            field: field.to_string(),
            detail: "at most 5 integer and 5 fractional digits allowed".into(),
        });
    }
    Ok(())
}

/// Check a literal against the member's declared type and convert it to the
/// scalar the evaluator compares with.
fn check_literal(member: &Member, op: CompareOp, literal: RawLiteral) -> Result<Literal> {
    if op.is_relational() && matches!(literal, RawLiteral::Null | RawLiteral::Bool(_)) {
        return Err(Error::syntax(
            OPTION,
            format!(
                "{} cannot be used with a relational operator",
                literal.kind_name()
            ),
        ));
    }
    if literal == RawLiteral::Null {
        return Ok(None);
    }

    let field = member.name();
    let scalar = match (member.kind(), literal) {
        (None | Some(PrimitiveKind::Untyped), literal) => match literal {
            RawLiteral::Bool(b) => Scalar::Bool(b),
            RawLiteral::Int(i) | RawLiteral::DateTime(i) => Scalar::Int(i),
            RawLiteral::Float(f) => Scalar::Float(f),
            RawLiteral::String(s) => Scalar::String(s),
            RawLiteral::Null => return Ok(None),
        },
        (Some(PrimitiveKind::String), RawLiteral::String(s)) => Scalar::String(s),
        (Some(PrimitiveKind::Boolean), RawLiteral::Bool(b)) => Scalar::Bool(b),
        (Some(PrimitiveKind::Int32), RawLiteral::Int(i)) => {
            if i32::try_from(i).is_err() {
                return Err(Error::InvalidValue {
                    field: field.to_string(),
                    detail: format!("{} is outside the 32-bit integer range", i),
                });
            }
            Scalar::Int(i)
        }
        (Some(PrimitiveKind::Single), RawLiteral::Int(i)) => {
            check_single_digits(field, (i.unsigned_abs().to_string().len(), 0))?;
            Scalar::Int(i)
        }
        (Some(PrimitiveKind::Single), RawLiteral::Float(f)) => {
            check_single_digits(field, validate::float_digits(f))?;
            Scalar::Float(f)
        }
        (Some(PrimitiveKind::Double), RawLiteral::Int(i)) => Scalar::Int(i),
        (Some(PrimitiveKind::Double), RawLiteral::Float(f)) => Scalar::Float(f),
        (Some(PrimitiveKind::DateTime), RawLiteral::Int(ms) | RawLiteral::DateTime(ms)) => {
            Scalar::Int(ms)
        }
        (Some(kind), literal) => {
            return Err(Error::type_mismatch(field, kind, literal.kind_name()));
        }
    };
    Ok(Some(scalar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Property;
    use crate::value::Fields;
    use serde_json::json;

    fn entity_type() -> EntityType {
        EntityType::new(
            "T",
            vec![
                Property::new("s", PrimitiveKind::String),
                Property::new("n", PrimitiveKind::Int32),
                Property::new("f", PrimitiveKind::Single),
                Property::new("d", PrimitiveKind::Double),
                Property::new("b", PrimitiveKind::Boolean),
                Property::new("t", PrimitiveKind::DateTime),
                Property::new("tags", PrimitiveKind::String).list(),
                Property::complex("c", "C"),
            ],
        )
    }

    fn record(id: &str, value: serde_json::Value) -> Record {
        let fields: Fields = match FieldValue::from(value) {
            FieldValue::Object(f) => f,
            _ => unreachable!(),
        };
        Record::new(id, "T", fields, 5000)
    }

    fn parse(source: &str) -> Result<Filter> {
        Filter::parse(source, &entity_type())
    }

    fn matches(source: &str, value: serde_json::Value) -> bool {
        parse(source).unwrap().matches(&record("r1", value))
    }

    #[test]
    fn tokens() {
        assert_eq!(
            tokenize("name eq 'it''s' and (x ge -1.5e3)").unwrap(),
            vec![
                Token::Word("name".into()),
                Token::Word("eq".into()),
                Token::Quoted("it's".into()),
                Token::Word("and".into()),
                Token::LParen,
                Token::Word("x".into()),
                Token::Word("ge".into()),
                Token::Number("-1.5e3".into()),
                Token::RParen,
            ]
        );
        assert!(tokenize("a eq 1 + 2").is_err());
    }

    #[test]
    fn equality_and_relational() {
        let doc = json!({"n": 123, "s": "abc"});
        assert!(matches("n eq 123", doc.clone()));
        assert!(!matches("n ne 123", doc.clone()));
        assert!(matches("n gt 100 and n le 123", doc.clone()));
        assert!(!matches("n lt 123", doc.clone()));
        assert!(matches("s eq 'abc' or n eq 0", doc.clone()));
        assert!(matches("s gt 'abb'", doc.clone()));
        assert!(matches("(n eq 1 or n eq 123) and s ne 'x'", doc));
    }

    #[test]
    fn numeric_comparison_is_value_based() {
        assert!(matches("f eq 1", json!({"f": 1.0})));
        assert!(matches("f eq 1.0", json!({"f": 1})));
        assert!(matches("d eq 1", json!({"d": 1.0})));
        assert!(matches("extra eq 2.0", json!({"extra": 2})));
        assert!(matches("extra ge 1.5", json!({"extra": 2})));
    }

    #[test]
    fn null_semantics() {
        assert!(matches("n eq null", json!({"n": null})));
        assert!(matches("n eq null", json!({})));
        assert!(!matches("n eq null", json!({"n": 1})));
        assert!(matches("n ne null", json!({"n": 1})));
        assert!(!matches("n ne null", json!({})));

        // A null field only matches an explicit null comparison.
        assert!(!matches("n eq 1", json!({"n": null})));
        assert!(!matches("n ne 1", json!({"n": null})));
        assert!(!matches("n lt 1", json!({})));
    }

    #[test]
    fn literal_types_checked_against_declarations() {
        assert!(matches!(parse("n eq 'abc'"), Err(Error::TypeMismatch { field, .. }) if field == "n"));
        assert!(matches!(parse("n eq \"abc\""), Err(Error::TypeMismatch { .. })));
        assert!(matches!(parse("n eq 1.5"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(parse("n eq 2147483648"), Err(Error::InvalidValue { .. })));
        assert!(matches!(parse("s eq 1"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(parse("b eq 1"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(parse("f eq 123456"), Err(Error::InvalidValue { .. })));
        assert!(matches!(parse("f eq 1.123456"), Err(Error::InvalidValue { .. })));
        assert!(parse("f eq 12345.12345").is_ok());
        assert!(parse("d eq 1.5e10").is_ok());
        assert!(parse("b eq true").is_ok());
        assert!(parse("undeclared eq 'anything'").is_ok());
    }

    #[test]
    fn relational_with_null_or_boolean_is_syntax_error() {
        assert!(matches!(parse("n gt null"), Err(Error::QuerySyntax { .. })));
        assert!(matches!(parse("b ge true"), Err(Error::QuerySyntax { .. })));
        assert!(matches!(parse("x lt false"), Err(Error::QuerySyntax { .. })));
    }

    #[test]
    fn unsupported_constructs() {
        for source in [
            "not n eq 1",
            "n add 1 eq 2",
            "endswith(s, 'x')",
            "n eq",
            "eq 1",
            "(n eq 1",
            "n eq 1 n eq 2",
            "n = 1",
            "",
            "c eq 1",
            "'s' eq 'x'",
        ] {
            assert!(
                matches!(parse(source), Err(Error::QuerySyntax { .. })),
                "accepted {:?}",
                source
            );
        }
    }

    #[test]
    fn string_functions() {
        let doc = json!({"s": "hello world"});
        assert!(matches("startswith(s, 'hello')", doc.clone()));
        assert!(!matches("startswith(s, 'world')", doc.clone()));
        assert!(matches("substringof('lo wo', s)", doc.clone()));
        assert!(!matches("substringof('xyz', s)", doc));

        assert!(matches!(parse("startswith(n, 'x')"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(parse("startswith(s, 1)"), Err(Error::QuerySyntax { .. })));
        assert!(matches!(parse("substringof(s, 'x')"), Err(Error::QuerySyntax { .. })));
    }

    #[test]
    fn lists_match_any_element() {
        let doc = json!({"tags": ["red", "blue"]});
        assert!(matches("tags eq 'blue'", doc.clone()));
        assert!(!matches("tags eq 'green'", doc.clone()));
        assert!(matches("tags ne 'green'", doc.clone()));
        assert!(!matches("tags ne 'red'", doc.clone()));
        assert!(matches("startswith(tags, 'bl')", doc));
    }

    #[test]
    fn datetime_members() {
        let doc = json!({"t": "/Date(1000)/"});
        assert!(matches("t eq 1000", doc.clone()));
        assert!(matches("t lt datetime'1970-01-01T00:00:02'", doc.clone()));
        assert!(matches("t gt datetime'1969-12-31T23:59'", doc.clone()));
        assert!(matches!(parse("t eq 'x'"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(parse("t eq datetime'yesterday'"), Err(Error::QuerySyntax { .. })));
    }

    #[test]
    fn system_members() {
        let r = record("abc", json!({}));
        assert!(parse("__id eq 'abc'").unwrap().matches(&r));
        assert!(parse("__published eq 5000").unwrap().matches(&r));
        assert!(parse("__updated ge datetime'1970-01-01T00:00'").unwrap().matches(&r));
        assert!(matches!(parse("__id eq 1"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn dynamic_type_mismatch_never_matches() {
        assert!(!matches("x eq '1'", json!({"x": 1})));
        assert!(!matches("x eq 1", json!({"x": "1"})));
        assert!(!matches("x eq 1", json!({"x": true})));
    }
}
